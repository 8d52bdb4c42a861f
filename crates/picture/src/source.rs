use std::sync::Arc;

use geometry::{Color, LayerIntRect, LayerIntSize, LayerPixel, Region, int_rect_from_size, intersect_or_empty};

use crate::{LayerId, Picture, PictureError, PictureRecorder};

/// Everything the compositor needs from one main-thread layer at commit time.
#[derive(Debug, Clone)]
pub struct LayerCommit {
    pub id: LayerId,
    pub bounds: LayerIntSize,
    pub picture: Arc<Picture>,
    pub invalidation: Region<LayerPixel>,
    pub draws_content: bool,
    pub contents_opaque: bool,
    pub is_mask: bool,
    pub background_color: Color,
}

/// Main-thread picture layer: collects invalidations, drives its recorder and
/// hands out commits.
#[derive(Debug)]
pub struct PictureLayerSource {
    id: LayerId,
    bounds: LayerIntSize,
    recorder: PictureRecorder,
    picture: Arc<Picture>,
    pending_invalidation: Region<LayerPixel>,
    pile_invalidation: Region<LayerPixel>,
    draws_content: bool,
    contents_opaque: bool,
    is_mask: bool,
    background_color: Color,
    uses_lcd_text: bool,
}

impl PictureLayerSource {
    pub fn new(
        id: LayerId,
        cell_size: LayerIntSize,
        min_contents_scale: f32,
        pixel_distance_to_record: i32,
    ) -> Result<Self, PictureError> {
        Ok(Self {
            id,
            bounds: LayerIntSize::new(0, 0),
            recorder: PictureRecorder::new(cell_size, min_contents_scale, pixel_distance_to_record)?,
            picture: Picture::empty(true),
            pending_invalidation: Region::new(),
            pile_invalidation: Region::new(),
            draws_content: true,
            contents_opaque: false,
            is_mask: false,
            background_color: Color::TRANSPARENT,
            uses_lcd_text: true,
        })
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn bounds(&self) -> LayerIntSize {
        self.bounds
    }

    pub fn picture(&self) -> &Arc<Picture> {
        &self.picture
    }

    pub fn set_bounds(&mut self, bounds: LayerIntSize) {
        if bounds == self.bounds {
            return;
        }
        let old = int_rect_from_size(self.bounds);
        let new = int_rect_from_size(bounds);
        // Newly exposed area has never been painted.
        let mut exposed = Region::from(new);
        exposed.subtract_rect(old);
        self.pending_invalidation.union(&exposed);
        self.pending_invalidation.intersect_rect(new);
        self.bounds = bounds;
    }

    pub fn set_needs_display_rect(&mut self, rect: LayerIntRect) {
        let clamped = intersect_or_empty(rect, int_rect_from_size(self.bounds));
        if clamped.is_empty() {
            return;
        }
        self.pending_invalidation.union_rect(clamped);
    }

    pub fn set_needs_display(&mut self) {
        self.set_needs_display_rect(int_rect_from_size(self.bounds));
    }

    pub fn set_draws_content(&mut self, draws_content: bool) {
        self.draws_content = draws_content;
    }

    pub fn set_contents_opaque(&mut self, contents_opaque: bool) {
        self.contents_opaque = contents_opaque;
    }

    pub fn set_is_mask(&mut self, is_mask: bool) {
        self.is_mask = is_mask;
    }

    pub fn set_background_color(&mut self, color: Color) {
        self.background_color = color;
    }

    pub fn set_uses_lcd_text(&mut self, uses_lcd_text: bool) {
        self.uses_lcd_text = uses_lcd_text;
    }

    /// Re-records around `visible_layer_rect` and moves the accumulated
    /// invalidation into the set that travels with the next commit.
    pub fn update(&mut self, visible_layer_rect: LayerIntRect) -> Result<(), PictureError> {
        self.recorder.resize(self.bounds)?;
        let invalidation = std::mem::take(&mut self.pending_invalidation);
        self.picture = self
            .recorder
            .update(&invalidation, visible_layer_rect, self.uses_lcd_text);
        self.pile_invalidation.union(&invalidation);
        Ok(())
    }

    pub fn take_commit(&mut self) -> LayerCommit {
        if self.draws_content && self.bounds.is_empty() {
            log::warn!("[layer] {} commits drawable content with empty bounds", self.id);
        }
        LayerCommit {
            id: self.id,
            bounds: self.bounds,
            picture: Arc::clone(&self.picture),
            invalidation: std::mem::take(&mut self.pile_invalidation),
            draws_content: self.draws_content,
            contents_opaque: self.contents_opaque,
            is_mask: self.is_mask,
            background_color: self.background_color,
        }
    }
}
