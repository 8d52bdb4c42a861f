use std::sync::Arc;

use geometry::{ContentIntRect, LayerIntSize};
use picture::Picture;

use crate::coverage::TilingSetCoverage;
use crate::priority::TileResolution;
use crate::tiling::{PriorityParams, Tiling, TilingClient};

/// All tilings of one layer, kept sorted from the largest contents scale to
/// the smallest. Indices stay stable until the next add or remove.
#[derive(Debug)]
pub struct TilingSet {
    layer_bounds: LayerIntSize,
    tilings: Vec<Tiling>,
}

impl TilingSet {
    pub fn new(layer_bounds: LayerIntSize) -> Self {
        Self {
            layer_bounds,
            tilings: Vec::new(),
        }
    }

    pub fn layer_bounds(&self) -> LayerIntSize {
        self.layer_bounds
    }

    pub fn set_layer_bounds(&mut self, client: &dyn TilingClient, layer_bounds: LayerIntSize) {
        if self.layer_bounds == layer_bounds {
            return;
        }
        self.layer_bounds = layer_bounds;
        for tiling in &mut self.tilings {
            tiling.set_layer_bounds(client, layer_bounds);
        }
    }

    pub fn num_tilings(&self) -> usize {
        self.tilings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tilings.is_empty()
    }

    pub fn tiling_at(&self, index: usize) -> &Tiling {
        &self.tilings[index]
    }

    pub fn tiling_at_mut(&mut self, index: usize) -> &mut Tiling {
        &mut self.tilings[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Tiling> + '_ {
        self.tilings.iter()
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = &mut Tiling> + '_ {
        self.tilings.iter_mut()
    }

    pub fn scales(&self) -> Vec<f32> {
        self.tilings.iter().map(Tiling::contents_scale).collect()
    }

    fn index_of_scale(&self, contents_scale: f32) -> Option<usize> {
        self.tilings
            .iter()
            .position(|tiling| tiling.contents_scale() == contents_scale)
    }

    pub fn tiling_at_scale(&self, contents_scale: f32) -> Option<&Tiling> {
        self.index_of_scale(contents_scale)
            .map(|index| &self.tilings[index])
    }

    pub fn tiling_at_scale_mut(&mut self, contents_scale: f32) -> Option<&mut Tiling> {
        self.index_of_scale(contents_scale)
            .map(move |index| &mut self.tilings[index])
    }

    pub fn scale_with_resolution(&self, resolution: TileResolution) -> Option<f32> {
        self.tilings
            .iter()
            .find(|tiling| tiling.resolution() == resolution)
            .map(Tiling::contents_scale)
    }

    pub fn add_tiling(&mut self, client: &dyn TilingClient, contents_scale: f32) -> &mut Tiling {
        assert!(
            self.index_of_scale(contents_scale).is_none(),
            "tiling at scale {contents_scale} already exists"
        );
        let tiling = Tiling::new(contents_scale, self.layer_bounds, client);
        let index = self
            .tilings
            .iter()
            .position(|existing| existing.contents_scale() < contents_scale)
            .unwrap_or(self.tilings.len());
        self.tilings.insert(index, tiling);
        log::debug!(
            "[tiling] added scale {contents_scale}, {} tilings",
            self.tilings.len()
        );
        &mut self.tilings[index]
    }

    pub fn remove_tiling(&mut self, contents_scale: f32) -> bool {
        let Some(index) = self.index_of_scale(contents_scale) else {
            return false;
        };
        self.tilings.remove(index);
        log::debug!(
            "[tiling] removed scale {contents_scale}, {} tilings",
            self.tilings.len()
        );
        true
    }

    pub fn remove_all_tilings(&mut self) {
        self.tilings.clear();
    }

    pub fn remove_all_tiles(&mut self) {
        for tiling in &mut self.tilings {
            tiling.reset();
        }
    }

    /// Makes this set hold exactly the tilings of `other` at or above
    /// `minimum_contents_scale`, copying their resolution tags. Surviving
    /// tilings keep their tiles.
    pub fn add_tilings_to_match_scales(
        &mut self,
        client: &dyn TilingClient,
        other: &TilingSet,
        minimum_contents_scale: f32,
    ) {
        self.tilings.retain(|tiling| {
            let scale = tiling.contents_scale();
            scale >= minimum_contents_scale && other.tiling_at_scale(scale).is_some()
        });
        for other_tiling in &other.tilings {
            let scale = other_tiling.contents_scale();
            if scale < minimum_contents_scale {
                continue;
            }
            let layer_bounds = self.layer_bounds;
            match self.index_of_scale(scale) {
                Some(index) => {
                    let tiling = &mut self.tilings[index];
                    tiling.set_resolution(other_tiling.resolution());
                    tiling.set_layer_bounds(client, layer_bounds);
                    tiling.create_missing_tiles_in_live_tiles_rect(client);
                }
                None => {
                    let tiling = self.add_tiling(client, scale);
                    tiling.set_resolution(other_tiling.resolution());
                }
            }
        }
    }

    pub fn needs_update_for_frame_at_time(&self, frame_time_in_seconds: f64) -> bool {
        self.tilings
            .iter()
            .any(|tiling| tiling.needs_update_for_frame_at_time(frame_time_in_seconds))
    }

    pub fn update_tile_priorities(&mut self, client: &dyn TilingClient, params: &PriorityParams) {
        for tiling in &mut self.tilings {
            tiling.update_tile_priorities(client, params);
        }
    }

    pub fn did_become_active(&mut self, picture: &Arc<Picture>) {
        for tiling in &mut self.tilings {
            tiling.did_become_active(picture);
        }
    }

    pub fn coverage(
        &self,
        contents_scale: f32,
        content_rect: ContentIntRect,
        ideal_contents_scale: f32,
    ) -> TilingSetCoverage<'_> {
        TilingSetCoverage::new(self, contents_scale, content_rect, ideal_contents_scale)
    }

    pub fn num_tiles(&self) -> usize {
        self.tilings.iter().map(Tiling::num_tiles).sum()
    }
}
