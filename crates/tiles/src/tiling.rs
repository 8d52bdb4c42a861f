use std::collections::BTreeMap;
use std::rc::Rc;
use std::sync::Arc;

use geometry::{
    ContentIntRect, ContentIntSize, LayerIntRect, LayerIntSize, LayerPixel, LayerToScreenTransform,
    Region, ScreenIntSize, expand_rect_equally_to_area_bounded_by, int_rect_from_size,
    intersect_or_empty, manhattan_distance, map_rect, scale_rect,
    scale_to_ceiled_size, scale_to_enclosing_rect, to_float_rect,
};
use picture::Picture;

use crate::coverage::TilingCoverage;
use crate::priority::{TilePriority, TileResolution, WhichTree, time_for_bounds_to_intersect};
use crate::tile::TileRef;
use crate::tiling_data::TilingData;

pub trait TilingClient {
    /// A fresh tile for `content_rect`, or `None` when the layer cannot
    /// raster that rect.
    fn create_tile(&self, contents_scale: f32, content_rect: ContentIntRect) -> Option<TileRef>;

    fn twin_tiling(&self, contents_scale: f32) -> Option<&Tiling>;

    /// Layer-space region whose tiles may not be taken from the twin.
    fn invalidation(&self) -> &Region<LayerPixel>;

    fn calculate_tile_size(&self, content_bounds: ContentIntSize) -> ContentIntSize;
}

#[derive(Debug, Clone, Copy)]
pub struct PriorityParams {
    pub tree: WhichTree,
    pub device_viewport: ScreenIntSize,
    pub viewport_in_layer_space: LayerIntRect,
    pub visible_layer_rect: LayerIntRect,
    pub last_layer_bounds: LayerIntSize,
    pub current_layer_bounds: LayerIntSize,
    pub last_layer_to_screen: LayerToScreenTransform,
    pub current_layer_to_screen: LayerToScreenTransform,
    pub frame_time_in_seconds: f64,
    pub max_tiles_for_interest_area: usize,
}

#[derive(Debug)]
pub struct Tiling {
    contents_scale: f32,
    layer_bounds: LayerIntSize,
    resolution: TileResolution,
    tiling_data: TilingData,
    live_tiles_rect: ContentIntRect,
    tiles: BTreeMap<(i32, i32), TileRef>,
    last_impl_frame_time_in_seconds: Option<f64>,
}

impl Tiling {
    pub fn new(contents_scale: f32, layer_bounds: LayerIntSize, client: &dyn TilingClient) -> Self {
        assert!(
            contents_scale > 0.0 && contents_scale.is_finite(),
            "tiling contents scale must be positive and finite, got {contents_scale}"
        );
        let content_bounds = scale_to_ceiled_size(layer_bounds, contents_scale);
        let tile_size = client.calculate_tile_size(content_bounds);
        Self {
            contents_scale,
            layer_bounds,
            resolution: TileResolution::NonIdeal,
            tiling_data: TilingData::new(tile_size, content_bounds),
            live_tiles_rect: ContentIntRect::zero(),
            tiles: BTreeMap::new(),
            last_impl_frame_time_in_seconds: None,
        }
    }

    pub fn contents_scale(&self) -> f32 {
        self.contents_scale
    }

    pub fn layer_bounds(&self) -> LayerIntSize {
        self.layer_bounds
    }

    pub fn content_bounds(&self) -> ContentIntSize {
        self.tiling_data.tiling_size()
    }

    pub fn content_rect(&self) -> ContentIntRect {
        self.tiling_data.tiling_rect()
    }

    pub fn tile_size(&self) -> ContentIntSize {
        self.tiling_data.tile_size()
    }

    pub fn tiling_data(&self) -> &TilingData {
        &self.tiling_data
    }

    pub fn resolution(&self) -> TileResolution {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: TileResolution) {
        self.resolution = resolution;
    }

    pub fn live_tiles_rect(&self) -> ContentIntRect {
        self.live_tiles_rect
    }

    pub fn tile_at(&self, i: i32, j: i32) -> Option<&TileRef> {
        self.tiles.get(&(i, j))
    }

    pub fn num_tiles(&self) -> usize {
        self.tiles.len()
    }

    pub fn tiles(&self) -> impl Iterator<Item = &TileRef> + '_ {
        self.tiles.values()
    }

    pub fn coverage(&self, dest_scale: f32, dest_rect: ContentIntRect) -> TilingCoverage<'_> {
        TilingCoverage::new(self, dest_scale, dest_rect)
    }

    pub fn set_layer_bounds(&mut self, client: &dyn TilingClient, layer_bounds: LayerIntSize) {
        if layer_bounds == self.layer_bounds {
            return;
        }
        self.layer_bounds = layer_bounds;
        let content_bounds = scale_to_ceiled_size(layer_bounds, self.contents_scale);
        let tile_size = client.calculate_tile_size(content_bounds);
        if tile_size != self.tiling_data.tile_size() {
            self.tiles.clear();
            self.tiling_data = TilingData::new(tile_size, content_bounds);
        } else {
            self.tiling_data.set_tiling_size(content_bounds);
        }
        let live = intersect_or_empty(self.live_tiles_rect, self.content_rect());
        self.set_live_tiles_rect(client, live);
    }

    pub fn reset(&mut self) {
        self.tiles.clear();
        self.live_tiles_rect = ContentIntRect::zero();
        self.last_impl_frame_time_in_seconds = None;
    }

    pub fn set_live_tiles_rect(&mut self, client: &dyn TilingClient, live_tiles_rect: ContentIntRect) {
        let live = intersect_or_empty(live_tiles_rect, self.content_rect());
        let data = self.tiling_data;
        self.tiles.retain(|&(i, j), _| {
            i < data.num_tiles_x()
                && j < data.num_tiles_y()
                && data.tile_bounds(i, j).intersects(&live)
        });
        self.live_tiles_rect = live;
        self.create_missing_tiles_in_live_tiles_rect(client);
    }

    pub fn create_missing_tiles_in_live_tiles_rect(&mut self, client: &dyn TilingClient) {
        if self.live_tiles_rect.is_empty() {
            return;
        }
        let twin = client
            .twin_tiling(self.contents_scale)
            .filter(|twin| twin.tile_size() == self.tile_size());
        let mut created = 0usize;
        let mut shared = 0usize;
        let data = self.tiling_data;
        for (i, j) in data.indices_in(self.live_tiles_rect) {
            if self.tiles.contains_key(&(i, j)) {
                continue;
            }
            let content_rect = data.tile_bounds(i, j);
            if let Some(candidate) = twin.and_then(|twin| twin.tile_at(i, j)) {
                let layer_rect: LayerIntRect =
                    scale_to_enclosing_rect(content_rect, 1.0 / self.contents_scale);
                if !client.invalidation().intersects_rect(layer_rect) {
                    self.tiles.insert((i, j), Rc::clone(candidate));
                    shared += 1;
                    continue;
                }
            }
            if let Some(tile) = client.create_tile(self.contents_scale, content_rect) {
                self.tiles.insert((i, j), tile);
                created += 1;
            }
        }
        if created + shared > 0 {
            log::trace!(
                "[tiling] scale {}: {created} tiles created, {shared} shared from twin",
                self.contents_scale
            );
        }
    }

    pub fn needs_update_for_frame_at_time(&self, frame_time_in_seconds: f64) -> bool {
        self.last_impl_frame_time_in_seconds != Some(frame_time_in_seconds)
    }

    pub fn has_ever_been_updated(&self) -> bool {
        self.last_impl_frame_time_in_seconds.is_some()
    }

    pub fn update_tile_priorities(&mut self, client: &dyn TilingClient, params: &PriorityParams) {
        if !self.needs_update_for_frame_at_time(params.frame_time_in_seconds) {
            return;
        }
        let content_rect = self.content_rect();
        if content_rect.is_empty() {
            self.last_impl_frame_time_in_seconds = Some(params.frame_time_in_seconds);
            return;
        }

        let tile_size = client.calculate_tile_size(self.content_bounds());
        if tile_size != self.tiling_data.tile_size() {
            self.tiles.clear();
            self.tiling_data.set_tile_size(tile_size);
        }

        let viewport_in_content_space: ContentIntRect =
            scale_to_enclosing_rect(params.viewport_in_layer_space, self.contents_scale);
        let visible_content_rect: ContentIntRect =
            scale_to_enclosing_rect(params.visible_layer_rect, self.contents_scale);
        let tile_size = self.tiling_data.tile_size();
        let interest_rect_area = (params.max_tiles_for_interest_area as i64)
            .saturating_mul(tile_size.width as i64 * tile_size.height as i64);
        let starting_rect = if visible_content_rect.is_empty() {
            viewport_in_content_space
        } else {
            visible_content_rect
        };
        let interest_rect =
            expand_rect_equally_to_area_bounded_by(starting_rect, interest_rect_area, content_rect);
        self.set_live_tiles_rect(client, interest_rect);

        let time_delta = match self.last_impl_frame_time_in_seconds {
            Some(last) if params.last_layer_bounds == params.current_layer_bounds => {
                (params.frame_time_in_seconds - last) as f32
            }
            _ => 0.0,
        };

        let view_rect = to_float_rect(int_rect_from_size(params.device_viewport));
        let content_to_layer = 1.0 / self.contents_scale;
        for (&(i, j), tile) in &self.tiles {
            let tile_bounds = to_float_rect(self.tiling_data.tile_bounds(i, j));
            let layer_rect = scale_rect::<_, LayerPixel>(tile_bounds, content_to_layer);
            let current_screen_rect = map_rect(&params.current_layer_to_screen, layer_rect);
            let last_screen_rect = map_rect(&params.last_layer_to_screen, layer_rect);
            let priority = TilePriority::new(
                self.resolution,
                time_for_bounds_to_intersect(
                    last_screen_rect,
                    current_screen_rect,
                    time_delta,
                    view_rect,
                ),
                manhattan_distance(current_screen_rect, view_rect),
            );
            tile.borrow_mut().set_priority(params.tree, priority);
        }

        log::trace!(
            "[tiling] scale {} priorities for {:?}: {} live tiles",
            self.contents_scale,
            params.tree,
            self.tiles.len()
        );
        self.last_impl_frame_time_in_seconds = Some(params.frame_time_in_seconds);
    }

    /// Pending priorities become active ones and tiles read `picture` from
    /// now on.
    pub fn did_become_active(&mut self, picture: &Arc<Picture>) {
        for tile in self.tiles.values() {
            let mut tile = tile.borrow_mut();
            tile.promote_pending_priority();
            tile.set_picture(Arc::clone(picture));
        }
    }
}
