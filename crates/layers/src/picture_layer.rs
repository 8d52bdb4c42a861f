use std::mem;
use std::sync::Arc;

use geometry::{
    Color, ContentIntRect, ContentIntSize, LayerIntRect, LayerIntSize, LayerPixel,
    LayerToScreenTransform, Region, enclosing_int_rect, int_rect_from_size, intersect_or_empty,
    project_rect_to_layer, scale_to_ceiled_size, scale_to_enclosing_rect, to_float_rect,
};
use picture::{LayerCommit, LayerId, Picture};
use smallvec::SmallVec;
use tiles::{
    PriorityParams, ResourceId, Tile, TileDrawingInfo, TileRef, TileResolution, Tiling,
    TilingClient, TilingSet, WhichTree, classify_resolutions,
};

use crate::quads::{AppendQuadsData, DEFAULT_CHECKERBOARD_COLOR, DrawQuad, debug_colors};
use crate::scale::{minimum_contents_scale, snapped_contents_scale};
use crate::settings::{
    LayerTreeSettings, LowResTilingPolicy, MAX_SCALE_RATIO_DURING_PINCH, RendererCapabilities,
};
use crate::tile_size::calculate_tile_size;
use crate::tree::{TreeKind, TreeState};

/// Ideal scales come from the current draw properties. Raster scales are the
/// ones tilings are actually created at; zero means unset.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LayerScales {
    pub ideal_page_scale: f32,
    pub ideal_device_scale: f32,
    pub ideal_source_scale: f32,
    pub ideal_contents_scale: f32,
    pub raster_page_scale: f32,
    pub raster_device_scale: f32,
    pub raster_source_scale: f32,
    pub raster_contents_scale: f32,
    pub low_res_raster_contents_scale: f32,
}

impl LayerScales {
    fn has_unset_raster_scale(&self) -> bool {
        self.raster_page_scale == 0.0
            || self.raster_device_scale == 0.0
            || self.raster_source_scale == 0.0
            || self.raster_contents_scale == 0.0
            || self.low_res_raster_contents_scale == 0.0
    }

    fn reset_raster_scales(&mut self) {
        self.raster_page_scale = 0.0;
        self.raster_device_scale = 0.0;
        self.raster_source_scale = 0.0;
        self.raster_contents_scale = 0.0;
        self.low_res_raster_contents_scale = 0.0;
    }

    fn copy_raster_scales_from(&mut self, other: &LayerScales) {
        self.raster_page_scale = other.raster_page_scale;
        self.raster_device_scale = other.raster_device_scale;
        self.raster_source_scale = other.raster_source_scale;
        self.raster_contents_scale = other.raster_contents_scale;
        self.low_res_raster_contents_scale = other.low_res_raster_contents_scale;
    }

    fn min_acceptable_high_res_scale(&self) -> f32 {
        self.raster_contents_scale.min(self.ideal_contents_scale)
    }

    fn max_acceptable_high_res_scale(&self) -> f32 {
        self.raster_contents_scale.max(self.ideal_contents_scale)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerDrawProperties {
    pub ideal_contents_scale: f32,
    pub animating_transform_to_screen: bool,
    pub visible_layer_rect: LayerIntRect,
    pub screen_space_transform: LayerToScreenTransform,
    pub can_use_lcd_text: bool,
}

impl Default for LayerDrawProperties {
    fn default() -> Self {
        Self {
            ideal_contents_scale: 1.0,
            animating_transform_to_screen: false,
            visible_layer_rect: LayerIntRect::zero(),
            screen_space_transform: LayerToScreenTransform::identity(),
            can_use_lcd_text: true,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LcdTextUpdate {
    Unchanged,
    NeedsCommit,
    SwitchedOffOnPending,
}

#[derive(Debug)]
pub struct PictureLayer {
    id: LayerId,
    kind: TreeKind,
    settings: LayerTreeSettings,
    bounds: LayerIntSize,
    draws_content: bool,
    contents_opaque: bool,
    background_color: Color,
    is_mask: bool,
    picture: Arc<Picture>,
    invalidation: Region<LayerPixel>,
    tilings: TilingSet,
    scales: LayerScales,
    raster_source_scale_was_animating: bool,
    is_using_lcd_text: bool,
    draw_properties: LayerDrawProperties,
    contents_scale: f32,
    content_bounds: ContentIntSize,
    last_bounds: LayerIntSize,
    last_screen_space_transform: LayerToScreenTransform,
}

struct LayerTilingClient<'a> {
    layer_id: LayerId,
    picture: &'a Arc<Picture>,
    invalidation: &'a Region<LayerPixel>,
    contents_opaque: bool,
    is_mask: bool,
    settings: &'a LayerTreeSettings,
    capabilities: RendererCapabilities,
    twin_tilings: Option<&'a TilingSet>,
}

impl TilingClient for LayerTilingClient<'_> {
    fn create_tile(&self, contents_scale: f32, content_rect: ContentIntRect) -> Option<TileRef> {
        if !self.picture.can_raster(contents_scale, content_rect) {
            return None;
        }
        let opaque_rect = if self.contents_opaque {
            content_rect
        } else {
            ContentIntRect::zero()
        };
        let tile = Tile::new(
            self.layer_id,
            Arc::clone(self.picture),
            content_rect,
            opaque_rect,
            contents_scale,
        );
        Some(tile.into_ref())
    }

    fn twin_tiling(&self, contents_scale: f32) -> Option<&Tiling> {
        self.twin_tilings?.tiling_at_scale(contents_scale)
    }

    fn invalidation(&self) -> &Region<LayerPixel> {
        self.invalidation
    }

    fn calculate_tile_size(&self, content_bounds: ContentIntSize) -> ContentIntSize {
        calculate_tile_size(content_bounds, self.settings, self.capabilities, self.is_mask)
    }
}

impl PictureLayer {
    pub fn new(id: LayerId, kind: TreeKind, settings: LayerTreeSettings) -> Self {
        Self {
            id,
            kind,
            settings,
            bounds: LayerIntSize::new(0, 0),
            draws_content: false,
            contents_opaque: false,
            background_color: Color::TRANSPARENT,
            is_mask: false,
            picture: Picture::empty(settings.can_use_lcd_text),
            invalidation: Region::new(),
            tilings: TilingSet::new(LayerIntSize::new(0, 0)),
            scales: LayerScales::default(),
            raster_source_scale_was_animating: false,
            is_using_lcd_text: settings.can_use_lcd_text,
            draw_properties: LayerDrawProperties::default(),
            contents_scale: 1.0,
            content_bounds: ContentIntSize::new(0, 0),
            last_bounds: LayerIntSize::new(0, 0),
            last_screen_space_transform: LayerToScreenTransform::identity(),
        }
    }

    pub fn create_twin(&self) -> Self {
        let kind = match self.kind {
            TreeKind::Active => TreeKind::Pending,
            TreeKind::Pending => TreeKind::Active,
        };
        Self::new(self.id, kind, self.settings)
    }

    pub fn id(&self) -> LayerId {
        self.id
    }

    pub fn tree_kind(&self) -> TreeKind {
        self.kind
    }

    pub fn settings(&self) -> &LayerTreeSettings {
        &self.settings
    }

    pub fn bounds(&self) -> LayerIntSize {
        self.bounds
    }

    pub fn draws_content(&self) -> bool {
        self.draws_content
    }

    pub fn contents_opaque(&self) -> bool {
        self.contents_opaque
    }

    pub fn background_color(&self) -> Color {
        self.background_color
    }

    pub fn is_mask(&self) -> bool {
        self.is_mask
    }

    pub fn picture(&self) -> &Arc<Picture> {
        &self.picture
    }

    pub fn invalidation(&self) -> &Region<LayerPixel> {
        &self.invalidation
    }

    pub fn tilings(&self) -> &TilingSet {
        &self.tilings
    }

    pub fn scales(&self) -> LayerScales {
        self.scales
    }

    pub fn raster_source_scale_was_animating(&self) -> bool {
        self.raster_source_scale_was_animating
    }

    pub fn is_using_lcd_text(&self) -> bool {
        self.is_using_lcd_text
    }

    pub fn can_use_lcd_text(&self) -> bool {
        self.settings.can_use_lcd_text && self.draw_properties.can_use_lcd_text
    }

    pub fn draw_properties(&self) -> &LayerDrawProperties {
        &self.draw_properties
    }

    pub fn set_draw_properties(&mut self, draw_properties: LayerDrawProperties) {
        self.draw_properties = draw_properties;
    }

    pub fn contents_scale(&self) -> f32 {
        self.contents_scale
    }

    pub fn content_bounds(&self) -> ContentIntSize {
        self.content_bounds
    }

    pub fn visible_content_rect(&self) -> ContentIntRect {
        let scaled: ContentIntRect =
            scale_to_enclosing_rect(self.draw_properties.visible_layer_rect, self.contents_scale);
        intersect_or_empty(scaled, int_rect_from_size(self.content_bounds))
    }

    pub fn minimum_contents_scale(&self) -> f32 {
        minimum_contents_scale(self.bounds, self.settings.minimum_contents_scale)
    }

    fn tiling_parts<'a>(
        &'a mut self,
        capabilities: RendererCapabilities,
        twin: Option<&'a PictureLayer>,
    ) -> (&'a mut TilingSet, LayerTilingClient<'a>) {
        let Self {
            id,
            kind,
            settings,
            picture,
            invalidation,
            contents_opaque,
            is_mask,
            tilings,
            ..
        } = self;
        // Sharing tiles across trees is gated on what the pending side
        // invalidated, whichever side is creating the tile.
        let invalidation: &'a Region<LayerPixel> = match (*kind, twin) {
            (TreeKind::Active, Some(twin)) => &twin.invalidation,
            _ => invalidation,
        };
        let client = LayerTilingClient {
            layer_id: *id,
            picture,
            invalidation,
            contents_opaque: *contents_opaque,
            is_mask: *is_mask,
            settings,
            capabilities,
            twin_tilings: twin.map(|twin| &twin.tilings),
        };
        (tilings, client)
    }

    /// Takes the main-thread state of a commit. Only pending layers receive
    /// commits; tilings are rebuilt by `sync_from_active_layer`.
    pub fn apply_commit(&mut self, commit: LayerCommit) {
        assert_eq!(
            self.kind,
            TreeKind::Pending,
            "commit for {} applied to an active layer",
            self.id
        );
        assert_eq!(commit.id, self.id, "commit for {} applied to {}", commit.id, self.id);
        self.bounds = commit.bounds;
        self.draws_content = commit.draws_content;
        self.contents_opaque = commit.contents_opaque;
        self.background_color = commit.background_color;
        self.set_is_mask(commit.is_mask);
        self.tilings = TilingSet::new(commit.bounds);
        self.invalidation = commit.invalidation;
        self.picture = self.picture_with_lcd_text(commit.picture);
    }

    fn picture_with_lcd_text(&self, picture: Arc<Picture>) -> Arc<Picture> {
        if picture.uses_lcd_text() == self.is_using_lcd_text {
            picture
        } else {
            picture.with_lcd_text(self.is_using_lcd_text)
        }
    }

    pub fn set_is_mask(&mut self, is_mask: bool) {
        if self.is_mask == is_mask {
            return;
        }
        self.is_mask = is_mask;
        self.tilings.remove_all_tiles();
    }

    pub fn should_adjust_raster_scale(
        &self,
        tree: &TreeState,
        animating_transform_to_screen: bool,
    ) -> bool {
        let scales = &self.scales;
        let is_active = self.kind == TreeKind::Active;
        if is_active && self.raster_source_scale_was_animating && !animating_transform_to_screen {
            return true;
        }

        let is_zooming = tree.is_zooming();
        if is_active && is_zooming && scales.raster_page_scale != 0.0 {
            // Zooming out needs a lower scale now; zooming in only once the
            // raster scale falls too far behind.
            let ratio = scales.ideal_page_scale / scales.raster_page_scale;
            if scales.raster_page_scale > scales.ideal_page_scale
                || ratio > MAX_SCALE_RATIO_DURING_PINCH
            {
                return true;
            }
        }

        if !is_zooming && scales.raster_page_scale != scales.ideal_page_scale {
            return true;
        }

        scales.raster_device_scale != scales.ideal_device_scale
    }

    pub fn recalculate_raster_scales(&mut self, tree: &TreeState, animating_transform_to_screen: bool) {
        let min_contents_scale = self.minimum_contents_scale();
        let existing_scales = self.tilings.scales();
        let low_res_factor = self.settings.low_res_contents_scale_factor;
        let scales = &mut self.scales;

        scales.raster_device_scale = scales.ideal_device_scale;
        scales.raster_source_scale = scales.ideal_source_scale;

        if !tree.is_zooming() || scales.raster_contents_scale == 0.0 {
            scales.raster_page_scale = scales.ideal_page_scale;
            scales.raster_contents_scale = scales.ideal_contents_scale;
        } else {
            let zooming_out = scales.raster_page_scale > scales.ideal_page_scale;
            let desired_contents_scale = if zooming_out {
                scales.raster_contents_scale / MAX_SCALE_RATIO_DURING_PINCH
            } else {
                scales.raster_contents_scale * MAX_SCALE_RATIO_DURING_PINCH
            };
            scales.raster_contents_scale =
                snapped_contents_scale(desired_contents_scale, &existing_scales)
                    .max(min_contents_scale);
            scales.raster_page_scale = scales.raster_contents_scale / scales.raster_device_scale;
        }

        // Animated scales never raster below the page and device scale.
        if animating_transform_to_screen {
            scales.raster_contents_scale = scales
                .raster_contents_scale
                .max(scales.ideal_page_scale * scales.ideal_device_scale);
        }

        scales.low_res_raster_contents_scale =
            (scales.raster_contents_scale * low_res_factor).max(min_contents_scale);

        log::debug!(
            "[layer] {} raster scale {} (low res {})",
            self.id,
            scales.raster_contents_scale,
            scales.low_res_raster_contents_scale
        );
    }

    pub fn manage_tilings(
        &mut self,
        tree: &TreeState,
        animating_transform_to_screen: bool,
        mut twin: Option<&mut PictureLayer>,
    ) {
        if self.picture.recorded_region().is_empty() {
            return;
        }

        let change_target_tiling = self.scales.has_unset_raster_scale()
            || self.tilings.scale_with_resolution(TileResolution::High).is_none()
            || self.should_adjust_raster_scale(tree, animating_transform_to_screen);

        if self.kind == TreeKind::Active {
            self.raster_source_scale_was_animating = animating_transform_to_screen;
        }

        if !change_target_tiling {
            return;
        }

        self.recalculate_raster_scales(tree, animating_transform_to_screen);
        let raster_scale = self.scales.raster_contents_scale;
        let low_res_scale = self.scales.low_res_raster_contents_scale;

        let previous_low_res = self.tilings.scale_with_resolution(TileResolution::Low);
        let mut high_res = self.tilings.tiling_at_scale(raster_scale).map(Tiling::contents_scale);
        let mut low_res = self.tilings.tiling_at_scale(low_res_scale).map(Tiling::contents_scale);

        if high_res.is_none() {
            self.add_tiling(tree, raster_scale, twin.as_deref_mut());
            high_res = Some(raster_scale);
            if raster_scale == low_res_scale {
                low_res = high_res;
            }
        }

        let may_add_low_res = match self.settings.low_res_tiling_policy {
            LowResTilingPolicy::WhenStatic => !tree.is_zooming() && !animating_transform_to_screen,
            LowResTilingPolicy::Never => false,
        };
        if may_add_low_res && low_res.is_none() && low_res_scale != raster_scale {
            self.add_tiling(tree, low_res_scale, twin.as_deref_mut());
            low_res = Some(low_res_scale);
        }

        let tags = classify_resolutions(&self.tilings.scales(), high_res, low_res, previous_low_res);
        for (index, tag) in tags.into_iter().enumerate() {
            self.tilings.tiling_at_mut(index).set_resolution(tag);
        }
    }

    pub fn calculate_contents_scale(
        &mut self,
        tree: &TreeState,
        ideal_contents_scale: f32,
        animating_transform_to_screen: bool,
        twin: Option<&mut PictureLayer>,
    ) {
        if !self.draws_content {
            return;
        }
        assert!(
            ideal_contents_scale > 0.0 && ideal_contents_scale.is_finite(),
            "{} got ideal contents scale {ideal_contents_scale}",
            self.id
        );

        let min_contents_scale = self.minimum_contents_scale();
        let min_source_scale = min_contents_scale / tree.min_page_scale_factor;

        let ideal_page_scale = tree.total_page_scale_factor;
        let ideal_device_scale = tree.device_scale_factor;
        let ideal_source_scale = ideal_contents_scale / ideal_page_scale / ideal_device_scale;

        self.scales.ideal_contents_scale = ideal_contents_scale.max(min_contents_scale);
        self.scales.ideal_page_scale = ideal_page_scale;
        self.scales.ideal_device_scale = ideal_device_scale;
        self.scales.ideal_source_scale = ideal_source_scale.max(min_source_scale);

        self.manage_tilings(tree, animating_transform_to_screen, twin);

        // Quads are generated in integer space at this scale, so it has to
        // reach the largest tiling.
        let max_contents_scale = self
            .tilings
            .iter()
            .map(Tiling::contents_scale)
            .fold(min_contents_scale, f32::max);
        self.contents_scale = max_contents_scale;
        self.content_bounds = scale_to_ceiled_size(self.bounds, max_contents_scale);
    }

    pub fn add_tiling(
        &mut self,
        tree: &TreeState,
        contents_scale: f32,
        twin: Option<&mut PictureLayer>,
    ) {
        let minimum = self.minimum_contents_scale();
        assert!(
            contents_scale >= minimum,
            "{}: tiling scale {contents_scale} is below the minimum contents scale {minimum}",
            self.id
        );
        {
            let (tilings, client) = self.tiling_parts(tree.capabilities, twin.as_deref());
            tilings.add_tiling(&client, contents_scale);
        }
        if let Some(twin) = twin {
            twin.sync_tiling(tree, contents_scale, self);
        }
    }

    pub fn remove_tiling(&mut self, contents_scale: f32) -> bool {
        self.tilings.remove_tiling(contents_scale)
    }

    /// Mirrors a tiling the twin just added. Its tiles are created by the
    /// next priority update.
    pub fn sync_tiling(&mut self, tree: &TreeState, contents_scale: f32, twin: &PictureLayer) {
        if !self.draws_content || contents_scale < self.minimum_contents_scale() {
            return;
        }
        if self.tilings.tiling_at_scale(contents_scale).is_some() {
            return;
        }
        let (tilings, client) = self.tiling_parts(tree.capabilities, Some(twin));
        tilings.add_tiling(&client, contents_scale);
    }

    /// Rebuilds this pending layer's tilings after a commit so they match the
    /// active twin, invalidating whatever the new picture can no longer draw.
    pub fn sync_from_active_layer(&mut self, tree: &TreeState, active: &PictureLayer) {
        assert_eq!(
            self.kind,
            TreeKind::Pending,
            "{} synced from the active tree while not pending",
            self.id
        );
        self.is_using_lcd_text = active.is_using_lcd_text;
        if self.picture.uses_lcd_text() != self.is_using_lcd_text {
            self.picture = self.picture.with_lcd_text(self.is_using_lcd_text);
        }

        if !self.draws_content {
            self.scales.reset_raster_scales();
            return;
        }

        self.scales.copy_raster_scales_from(&active.scales);

        // Cells that lost their recording must not share tiles with the twin.
        for (x, y) in self.picture.grid().iter_cells() {
            if !self.picture.has_recording_at(x, y) && active.picture.has_recording_at(x, y) {
                self.invalidation.union_rect(self.picture.cell_bounds(x, y));
            }
        }

        let mut exposed = Region::from(int_rect_from_size(self.bounds));
        exposed.subtract_rect(int_rect_from_size(active.bounds));
        self.invalidation.union(&exposed);

        self.tilings = TilingSet::new(self.bounds);
        let minimum = self.minimum_contents_scale();
        let (tilings, client) = self.tiling_parts(tree.capabilities, Some(active));
        tilings.add_tilings_to_match_scales(&client, &active.tilings, minimum);
        assert_eq!(self.bounds, self.tilings.layer_bounds());
        log::debug!(
            "[layer] {} synced {} tilings from active",
            self.id,
            self.tilings.num_tilings()
        );
    }

    pub fn update_tile_priorities(&mut self, tree: &TreeState, twin: Option<&PictureLayer>) {
        if self.tilings.is_empty() {
            return;
        }
        let frame_time_in_seconds = tree.frame_time_in_seconds;
        if !self.tilings.needs_update_for_frame_at_time(frame_time_in_seconds) {
            return;
        }

        let current_screen_space_transform = self.draw_properties.screen_space_transform;
        let device_viewport = to_float_rect(int_rect_from_size(tree.device_viewport_size));
        let viewport_in_layer_space =
            match project_rect_to_layer(&current_screen_space_transform, device_viewport) {
                Ok(rect) => enclosing_int_rect(rect),
                Err(error) => {
                    log::warn!("[layer] {}: {error}, prioritizing without viewport", self.id);
                    LayerIntRect::zero()
                }
            };

        let params = PriorityParams {
            tree: self.kind.which_tree(),
            device_viewport: tree.device_viewport_size,
            viewport_in_layer_space,
            visible_layer_rect: self.draw_properties.visible_layer_rect,
            last_layer_bounds: self.last_bounds,
            current_layer_bounds: self.bounds,
            last_layer_to_screen: self.last_screen_space_transform,
            current_layer_to_screen: current_screen_space_transform,
            frame_time_in_seconds,
            max_tiles_for_interest_area: self.settings.max_tiles_for_interest_area,
        };
        {
            let (tilings, client) = self.tiling_parts(tree.capabilities, twin);
            tilings.update_tile_priorities(&client, &params);
        }

        self.last_screen_space_transform = current_screen_space_transform;
        self.last_bounds = self.bounds;
    }

    /// Marks the tiles this pending layer needs before it may activate and
    /// returns how many were marked.
    ///
    /// Ready tiles of acceptable non-high-res tilings count first; whatever
    /// they leave uncovered in the visible rect is filled from the high
    /// resolution tiling, ready or not.
    pub fn mark_visible_resources_as_required(&self, active_twin: Option<&PictureLayer>) -> usize {
        assert_eq!(
            self.kind,
            TreeKind::Pending,
            "{} marks required tiles while not pending",
            self.id
        );
        for tiling in self.tilings.iter() {
            for tile in tiling.tiles() {
                tile.borrow_mut().set_required_for_activation(false);
            }
        }
        if self.tilings.is_empty() || self.picture.recorded_region().is_empty() {
            return 0;
        }

        let rect = self.visible_content_rect();
        let mut min_acceptable_scale = self.scales.min_acceptable_high_res_scale();
        if let Some(twin) = active_twin {
            // Zero until the twin has computed its scales once.
            let twin_min_acceptable_scale = twin.scales.min_acceptable_high_res_scale();
            if twin_min_acceptable_scale != 0.0 {
                min_acceptable_scale = min_acceptable_scale.min(twin_min_acceptable_scale);
            }
        }

        let mut marked = 0;
        let mut high_res: Option<&Tiling> = None;
        let mut missing_region = Region::from(rect);
        for tiling in self.tilings.iter() {
            if tiling.contents_scale() < min_acceptable_scale {
                continue;
            }
            debug_assert!(
                tiling.has_ever_been_updated(),
                "{} marks tiles of a tiling at {} before its priorities were updated",
                self.id,
                tiling.contents_scale()
            );
            if tiling.resolution() == TileResolution::High {
                assert!(high_res.is_none(), "{} has more than one high res tiling", self.id);
                high_res = Some(tiling);
                continue;
            }
            for cell in tiling.coverage(self.contents_scale, rect) {
                let Some(tile) = cell.tile.as_ref() else {
                    continue;
                };
                if !tile.borrow().is_ready_to_draw() {
                    continue;
                }
                missing_region.subtract_rect(cell.geometry_rect);
                tile.borrow_mut().set_required_for_activation(true);
                marked += 1;
            }
        }

        let Some(high_res) = high_res else {
            panic!("{} has content but no high res tiling", self.id);
        };
        for cell in high_res.coverage(self.contents_scale, rect) {
            // No tile means no recording; covered cells are already satisfied.
            let Some(tile) = cell.tile.as_ref() else {
                continue;
            };
            if !missing_region.intersects_rect(cell.geometry_rect) {
                continue;
            }
            tile.borrow_mut().set_required_for_activation(true);
            marked += 1;
        }

        log::trace!("[layer] {} requires {marked} tiles for activation", self.id);
        marked
    }

    pub fn clean_up_tilings_on_active_layer(
        &mut self,
        used_scales: &[f32],
        mut pending_twin: Option<&mut PictureLayer>,
    ) {
        assert_eq!(
            self.kind,
            TreeKind::Active,
            "{} cleans up tilings while not active",
            self.id
        );
        let mut min_acceptable_high_res_scale = self.scales.min_acceptable_high_res_scale();
        let mut max_acceptable_high_res_scale = self.scales.max_acceptable_high_res_scale();
        if let Some(twin) = pending_twin.as_deref() {
            min_acceptable_high_res_scale =
                min_acceptable_high_res_scale.min(twin.scales.min_acceptable_high_res_scale());
            max_acceptable_high_res_scale =
                max_acceptable_high_res_scale.max(twin.scales.max_acceptable_high_res_scale());
        }
        let low_res_factor = self.settings.low_res_contents_scale_factor;
        let min_acceptable_low_res_scale = low_res_factor * min_acceptable_high_res_scale;
        let max_acceptable_low_res_scale = low_res_factor * max_acceptable_high_res_scale;

        let to_remove: SmallVec<[f32; 4]> = self
            .tilings
            .iter()
            .map(Tiling::contents_scale)
            .filter(|&scale| {
                !(min_acceptable_high_res_scale..=max_acceptable_high_res_scale).contains(&scale)
                    && !(min_acceptable_low_res_scale..=max_acceptable_low_res_scale)
                        .contains(&scale)
                    && !used_scales.contains(&scale)
            })
            .collect();

        for scale in to_remove {
            if let Some(twin) = pending_twin.as_deref_mut() {
                twin.remove_tiling(scale);
            }
            self.tilings.remove_tiling(scale);
            log::debug!("[layer] {} cleaned up tiling at scale {scale}", self.id);
        }
    }

    /// LCD text is switched off for good once the layer cannot use it. The
    /// active tree never re-rasters in place: the pending instance does.
    pub fn update_lcd_text_status(&mut self, pending_twin: Option<&mut PictureLayer>) -> LcdTextUpdate {
        if !self.is_using_lcd_text || self.can_use_lcd_text() {
            return LcdTextUpdate::Unchanged;
        }
        self.is_using_lcd_text = false;

        match self.kind {
            TreeKind::Pending => {
                self.switch_off_lcd_text();
                LcdTextUpdate::SwitchedOffOnPending
            }
            TreeKind::Active => match pending_twin {
                None => {
                    log::debug!("[layer] {} lost lcd text, needs commit", self.id);
                    LcdTextUpdate::NeedsCommit
                }
                Some(pending) if !pending.is_using_lcd_text => LcdTextUpdate::Unchanged,
                Some(pending) => {
                    pending.switch_off_lcd_text();
                    LcdTextUpdate::SwitchedOffOnPending
                }
            },
        }
    }

    pub fn switch_off_lcd_text(&mut self) {
        assert_eq!(
            self.kind,
            TreeKind::Pending,
            "{} re-rasters lcd text on the active tree",
            self.id
        );
        self.invalidation.union_rect(int_rect_from_size(self.bounds));
        self.is_using_lcd_text = false;
        self.picture = self.picture.with_lcd_text(false);
        self.tilings.remove_all_tiles();
        log::debug!("[layer] {} switched off lcd text", self.id);
    }

    /// Activation: tilings, picture, raster scales and draw properties move to
    /// `active`; this instance keeps an empty picture until the next commit.
    pub fn push_properties_to(&mut self, active: &mut PictureLayer) {
        assert_eq!(self.kind, TreeKind::Pending, "{} pushed from the active tree", self.id);
        assert_eq!(active.kind, TreeKind::Active, "{} pushed into a pending layer", active.id);
        assert_eq!(self.id, active.id, "{} pushed into {}", self.id, active.id);

        active.bounds = self.bounds;
        active.draws_content = self.draws_content;
        active.contents_opaque = self.contents_opaque;
        active.background_color = self.background_color;
        active.set_is_mask(self.is_mask);

        active.tilings = mem::replace(&mut self.tilings, TilingSet::new(self.bounds));
        active.picture = mem::replace(&mut self.picture, Picture::empty(self.is_using_lcd_text));
        active.invalidation.clear();
        self.invalidation.clear();

        active.scales.copy_raster_scales_from(&self.scales);
        active.is_using_lcd_text = self.is_using_lcd_text;
        active.draw_properties = self.draw_properties;
        log::debug!(
            "[layer] {} pushed {} tilings to active",
            self.id,
            active.tilings.num_tilings()
        );
    }

    pub fn did_become_active(&mut self) {
        self.tilings.did_become_active(&self.picture);
    }

    pub fn did_lose_output_surface(&mut self) {
        self.tilings.remove_all_tilings();
        self.scales.reset_raster_scales();
    }

    pub fn contents_resource_id(&self) -> Option<ResourceId> {
        let content_rect = int_rect_from_size(self.content_bounds);
        let cell = self
            .tilings
            .coverage(self.contents_scale, content_rect, self.scales.ideal_contents_scale)
            .next()?;
        let tile = cell.tile.as_ref()?;
        let TileDrawingInfo::Resource { resource_id, .. } = tile.borrow().drawing_info() else {
            return None;
        };
        if cell.geometry_rect != content_rect {
            return None;
        }
        Some(resource_id)
    }

    pub fn append_quads(
        &self,
        tree: &TreeState,
        quads: &mut Vec<DrawQuad>,
        append_quads_data: &mut AppendQuadsData,
    ) -> SmallVec<[f32; 4]> {
        let rect = self.visible_content_rect();
        let content_rect = int_rect_from_size(self.content_bounds);
        let ideal_contents_scale = self.scales.ideal_contents_scale;

        if self.settings.show_debug_borders {
            for cell in self.tilings.coverage(self.contents_scale, rect, ideal_contents_scale) {
                let (color, width) = self.debug_border_for(
                    cell.tile.as_ref(),
                    cell.contents_scale,
                );
                quads.push(DrawQuad::DebugBorder {
                    layer_id: self.id,
                    rect: cell.geometry_rect,
                    color,
                    width,
                });
            }
        }

        let mut seen_scales: SmallVec<[f32; 4]> = SmallVec::new();
        for cell in self.tilings.coverage(self.contents_scale, rect, ideal_contents_scale) {
            let geometry_rect = cell.geometry_rect;
            let ready_tile = cell
                .tile
                .as_ref()
                .map(|tile| tile.borrow())
                .filter(|tile| tile.is_ready_to_draw());
            let Some(tile) = ready_tile else {
                quads.push(self.missing_tile_quad(tree, geometry_rect));
                append_quads_data.num_missing_tiles += 1;
                append_quads_data.had_incomplete_tile = true;
                continue;
            };

            match tile.drawing_info() {
                TileDrawingInfo::Resource {
                    resource_id,
                    contents_swizzled,
                } => {
                    if cell.contents_scale != ideal_contents_scale {
                        append_quads_data.had_incomplete_tile = true;
                    }
                    quads.push(DrawQuad::Tile {
                        layer_id: self.id,
                        rect: geometry_rect,
                        opaque_rect: intersect_or_empty(tile.opaque_rect(), content_rect),
                        resource_id,
                        texture_rect: cell.texture_rect,
                        texture_size: cell.texture_size,
                        contents_swizzled,
                    });
                }
                TileDrawingInfo::PicturePile => quads.push(DrawQuad::Picture {
                    layer_id: self.id,
                    rect: geometry_rect,
                    opaque_rect: intersect_or_empty(tile.opaque_rect(), content_rect),
                    texture_rect: cell.texture_rect,
                    texture_size: cell.texture_size,
                    content_rect: tile.content_rect(),
                    contents_scale: tile.contents_scale(),
                }),
                TileDrawingInfo::SolidColor(color) => quads.push(DrawQuad::SolidColor {
                    layer_id: self.id,
                    rect: geometry_rect,
                    color,
                }),
                TileDrawingInfo::NotReady => unreachable!("ready tile without drawing info"),
            }

            if seen_scales.last() != Some(&cell.contents_scale) {
                seen_scales.push(cell.contents_scale);
            }
        }
        seen_scales
    }

    fn missing_tile_quad(&self, tree: &TreeState, rect: ContentIntRect) -> DrawQuad {
        if self.settings.draw_checkerboard_for_missing_tiles {
            return DrawQuad::Checkerboard {
                layer_id: self.id,
                rect,
                color: DEFAULT_CHECKERBOARD_COLOR,
            };
        }
        // Opaque content has to hide whatever is behind it.
        let mut color = self.background_color;
        if self.contents_opaque && !color.is_opaque() {
            color = tree.background_color;
        }
        DrawQuad::SolidColor {
            layer_id: self.id,
            rect,
            color,
        }
    }

    fn debug_border_for(&self, tile: Option<&TileRef>, tiling_scale: f32) -> (Color, f32) {
        let Some(tile) = tile.map(|tile| tile.borrow()).filter(|tile| tile.is_ready_to_draw()) else {
            return (
                debug_colors::MISSING_TILE_BORDER,
                debug_colors::MISSING_TILE_BORDER_WIDTH,
            );
        };
        let color = match tile.drawing_info() {
            TileDrawingInfo::SolidColor(_) => debug_colors::SOLID_COLOR_TILE_BORDER,
            TileDrawingInfo::PicturePile => debug_colors::PICTURE_TILE_BORDER,
            _ => match tile.priority(WhichTree::Active).resolution {
                TileResolution::High => debug_colors::HIGH_RES_TILE_BORDER,
                TileResolution::Low => debug_colors::LOW_RES_TILE_BORDER,
                TileResolution::NonIdeal if tiling_scale > self.contents_scale => {
                    debug_colors::EXTRA_HIGH_RES_TILE_BORDER
                }
                TileResolution::NonIdeal => debug_colors::EXTRA_LOW_RES_TILE_BORDER,
            },
        };
        (color, debug_colors::TILE_BORDER_WIDTH)
    }
}
