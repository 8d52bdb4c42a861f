use std::collections::{BTreeMap, BTreeSet};

use geometry::check_scale;
use layers::{
    AppendQuadsData, DrawQuad, LayerDrawProperties, LayerTreePair, LayerTreeSettings,
    PictureLayer, TreeKind, TreeState,
};
use picture::{LayerCommit, LayerId};
use tiles::{RasterQueue, TreePriority};

use crate::error::HostError;
use crate::pipeline::{CommitPipeline, ReadyToActivate};
use crate::scheduler::FrameSchedulerInput;

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DrawFrame {
    pub quads: Vec<DrawQuad>,
    pub append_quads_data: AppendQuadsData,
}

#[derive(Debug)]
pub struct LayerTreeHostImpl {
    settings: LayerTreeSettings,
    tree_state: TreeState,
    trees: LayerTreePair,
    pending_tree_needs_update: bool,
    needs_redraw: bool,
    needs_commit: bool,
}

impl LayerTreeHostImpl {
    pub fn new(settings: LayerTreeSettings, tree_state: TreeState) -> Result<Self, HostError> {
        settings.validate()?;
        validate_tree_state(&tree_state)?;
        Ok(Self {
            settings,
            tree_state,
            trees: LayerTreePair::new(),
            pending_tree_needs_update: false,
            needs_redraw: false,
            needs_commit: false,
        })
    }

    pub fn settings(&self) -> &LayerTreeSettings {
        &self.settings
    }

    pub fn tree_state(&self) -> &TreeState {
        &self.tree_state
    }

    pub fn set_tree_state(&mut self, tree_state: TreeState) -> Result<(), HostError> {
        validate_tree_state(&tree_state)?;
        self.tree_state = tree_state;
        self.needs_redraw = true;
        Ok(())
    }

    pub fn set_frame_time(&mut self, frame_time_in_seconds: f64) {
        self.tree_state.frame_time_in_seconds = frame_time_in_seconds;
    }

    pub fn trees(&self) -> &LayerTreePair {
        &self.trees
    }

    pub fn has_pending_tree(&self) -> bool {
        self.trees.has_pending_tree()
    }

    pub fn needs_redraw(&self) -> bool {
        self.needs_redraw
    }

    pub fn set_needs_redraw(&mut self) {
        self.needs_redraw = true;
    }

    /// Some active layer lost LCD text while no pending tree could re-raster
    /// it; the main thread should send a commit.
    pub fn needs_commit(&self) -> bool {
        self.needs_commit
    }

    /// Turns `commits` into the pending tree. Layers missing from `commits`
    /// leave the pending tree; every other layer takes its commit and syncs
    /// its tilings from its active twin.
    pub fn commit(&mut self, commits: Vec<LayerCommit>) -> Result<(), HostError> {
        let mut ids = BTreeSet::new();
        for commit in &commits {
            if !ids.insert(commit.id) {
                return Err(HostError::DuplicateLayer(commit.id));
            }
        }

        let settings = self.settings;
        let pending = self.trees.create_pending_tree();
        pending.retain(|id| ids.contains(&id));
        for &id in &ids {
            if !pending.contains(id) {
                pending.insert(PictureLayer::new(id, TreeKind::Pending, settings));
            }
        }

        for commit in commits {
            let id = commit.id;
            let (layer, active) = self
                .trees
                .layer_and_twin_mut(TreeKind::Pending, id)
                .ok_or(HostError::UnknownLayer(id))?;
            layer.apply_commit(commit);
            if let Some(active) = active {
                layer.sync_from_active_layer(&self.tree_state, active);
            }
        }

        log::debug!("[host] committed {} layers", ids.len());
        self.pending_tree_needs_update = true;
        self.needs_commit = false;
        Ok(())
    }

    /// Applies the output of the transform pass and runs the commit pipeline
    /// on the pending tree, or on the active tree when there is none.
    ///
    /// Properties are keyed by layer id and land on both twins.
    pub fn update_draw_properties(
        &mut self,
        draw_properties: &BTreeMap<LayerId, LayerDrawProperties>,
    ) -> Result<ReadyToActivate, HostError> {
        let kind = if self.trees.has_pending_tree() {
            TreeKind::Pending
        } else {
            TreeKind::Active
        };
        for (&id, properties) in draw_properties {
            let known = self.trees.tree(kind).is_some_and(|tree| tree.contains(id));
            if !known {
                return Err(HostError::UnknownLayer(id));
            }
            check_scale(properties.ideal_contents_scale)?;
        }

        for (&id, properties) in draw_properties {
            if let Some((layer, twin)) = self.trees.layer_and_twin_mut(kind, id) {
                layer.set_draw_properties(*properties);
                if let Some(twin) = twin {
                    twin.set_draw_properties(*properties);
                }
            }
        }

        let report = self.run_pipeline(kind);
        match kind {
            TreeKind::Pending => self.pending_tree_needs_update = false,
            TreeKind::Active => self.needs_redraw = true,
        }
        Ok(report)
    }

    fn run_pipeline(&mut self, kind: TreeKind) -> ReadyToActivate {
        let report = CommitPipeline::begin(&mut self.trees, kind, &self.tree_state)
            .manage_tilings()
            .update_tile_priorities()
            .mark_required_for_activation();
        self.needs_commit |= report.needs_commit;
        report
    }

    pub fn raster_queue(&self, tree_priority: TreePriority) -> RasterQueue {
        let mut queue = RasterQueue::new(tree_priority);
        let trees = [Some(self.trees.active()), self.trees.pending()];
        for tree in trees.into_iter().flatten() {
            for layer in tree.layers() {
                queue.add_tiling_set(layer.tilings());
            }
        }
        queue
    }

    pub fn required_tiles_ready(&self) -> bool {
        self.raster_queue(TreePriority::NewContentTakesPriority)
            .all_required_for_activation_ready()
    }

    /// Activates the pending tree once every tile in `queue` that is
    /// required for activation is ready. Returns whether it activated.
    pub fn activate_if_ready(&mut self, queue: &RasterQueue) -> Result<bool, HostError> {
        if !self.trees.has_pending_tree() {
            return Err(HostError::NoPendingTree);
        }
        if self.pending_tree_needs_update {
            log::trace!("[host] pending tree not updated since commit, activation deferred");
            return Ok(false);
        }
        if !queue.all_required_for_activation_ready() {
            log::trace!(
                "[host] activation blocked on {} required tiles",
                queue.num_required_for_activation()
            );
            return Ok(false);
        }
        self.trees.activate();
        self.needs_redraw = true;
        log::debug!("[host] activated {} layers", self.trees.active().len());
        Ok(true)
    }

    /// Draws the active tree: priorities are brought up to date for the
    /// frame, quads are emitted per layer, then tilings the frame did not
    /// draw from and that no longer match the current scales are released.
    pub fn draw(&mut self) -> DrawFrame {
        self.run_pipeline(TreeKind::Active);

        let mut frame = DrawFrame::default();
        for id in self.trees.active().layer_ids() {
            let Some((layer, pending_twin)) = self.trees.layer_and_twin_mut(TreeKind::Active, id)
            else {
                continue;
            };
            let seen_scales =
                layer.append_quads(&self.tree_state, &mut frame.quads, &mut frame.append_quads_data);
            layer.clean_up_tilings_on_active_layer(&seen_scales, pending_twin);
        }
        self.needs_redraw = false;
        log::trace!(
            "[host] drew {} quads, {} missing tiles",
            frame.quads.len(),
            frame.append_quads_data.num_missing_tiles
        );
        frame
    }

    pub fn did_lose_output_surface(&mut self) {
        let trees = &mut self.trees;
        for layer in trees.active_mut().layers_mut() {
            layer.did_lose_output_surface();
        }
        if let Some(pending) = trees.pending_mut() {
            for layer in pending.layers_mut() {
                layer.did_lose_output_surface();
            }
        }
        self.pending_tree_needs_update = self.trees.has_pending_tree();
        self.needs_redraw = true;
        log::warn!("[host] output surface lost, all tilings dropped");
    }

    pub fn scheduler_input(&self, frame_sequence_id: u64) -> FrameSchedulerInput {
        let has_pending_tree = self.trees.has_pending_tree();
        FrameSchedulerInput {
            frame_sequence_id,
            has_pending_tree,
            pending_tree_needs_update: self.pending_tree_needs_update,
            required_tiles_ready: has_pending_tree && self.required_tiles_ready(),
            needs_redraw: self.needs_redraw,
        }
    }
}

fn validate_tree_state(tree_state: &TreeState) -> Result<(), HostError> {
    tree_state.capabilities.validate()?;
    check_scale(tree_state.device_scale_factor)?;
    check_scale(tree_state.total_page_scale_factor)?;
    check_scale(tree_state.min_page_scale_factor)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use geometry::{Color, GeometryError, LayerIntSize, Region, ScreenIntSize, int_rect};
    use layers::SettingsError;
    use picture::Picture;
    use tiles::{ResourceId, TileDrawingInfo};

    use super::*;

    fn tree_state() -> TreeState {
        TreeState {
            device_viewport_size: ScreenIntSize::new(800, 600),
            frame_time_in_seconds: 1.0,
            ..TreeState::default()
        }
    }

    fn host() -> LayerTreeHostImpl {
        LayerTreeHostImpl::new(LayerTreeSettings::default(), tree_state()).expect("valid host")
    }

    fn commit(id: u64, width: i32, height: i32) -> LayerCommit {
        let bounds = LayerIntSize::new(width, height);
        LayerCommit {
            id: LayerId(id),
            bounds,
            picture: Picture::fully_recorded(bounds, LayerIntSize::new(256, 256), 0.0625, true)
                .expect("fully recorded picture"),
            invalidation: Region::new(),
            draws_content: true,
            contents_opaque: false,
            is_mask: false,
            background_color: Color::WHITE,
        }
    }

    fn visible_everything(ids: &[u64]) -> BTreeMap<LayerId, LayerDrawProperties> {
        ids.iter()
            .map(|&id| {
                (
                    LayerId(id),
                    LayerDrawProperties {
                        visible_layer_rect: int_rect(0, 0, 800, 600),
                        ..LayerDrawProperties::default()
                    },
                )
            })
            .collect()
    }

    fn rasterize_everything(host: &LayerTreeHostImpl) {
        let mut queue = host.raster_queue(TreePriority::SamePriorityForBothTrees);
        for (index, tile) in queue.tiles_to_raster().into_iter().enumerate() {
            tile.borrow_mut().set_drawing_info(TileDrawingInfo::Resource {
                resource_id: ResourceId(index as u64 + 1),
                contents_swizzled: false,
            });
        }
    }

    fn commit_and_activate(host: &mut LayerTreeHostImpl, commits: Vec<LayerCommit>) {
        let ids: Vec<u64> = commits.iter().map(|commit| commit.id.0).collect();
        host.commit(commits).expect("commit");
        host.update_draw_properties(&visible_everything(&ids))
            .expect("draw properties");
        rasterize_everything(host);
        let queue = host.raster_queue(TreePriority::NewContentTakesPriority);
        assert!(host.activate_if_ready(&queue).expect("pending tree"));
    }

    #[test]
    fn activation_waits_for_required_tiles() {
        let mut host = host();
        host.commit(vec![commit(1, 800, 600)]).expect("commit");
        let report = host
            .update_draw_properties(&visible_everything(&[1]))
            .expect("draw properties");
        assert_eq!(report.tree, TreeKind::Pending);
        assert_eq!(report.num_required_tiles, 12);

        let queue = host.raster_queue(TreePriority::NewContentTakesPriority);
        assert_eq!(queue.num_required_for_activation(), 12);
        assert!(!host.activate_if_ready(&queue).expect("pending tree"));
        assert!(host.has_pending_tree());

        rasterize_everything(&host);
        assert!(host.required_tiles_ready());
        assert!(host.activate_if_ready(&queue).expect("pending tree"));
        assert!(!host.has_pending_tree());
        assert!(host.needs_redraw());
    }

    #[test]
    fn activation_waits_for_pipeline_after_commit() {
        let mut host = host();
        host.commit(vec![commit(1, 800, 600)]).expect("commit");
        let queue = host.raster_queue(TreePriority::NewContentTakesPriority);
        assert!(queue.is_empty());
        assert!(!host.activate_if_ready(&queue).expect("pending tree"));
    }

    #[test]
    fn draw_emits_ready_tiles_of_active_tree() {
        let mut host = host();
        commit_and_activate(&mut host, vec![commit(1, 800, 600)]);

        let frame = host.draw();

        assert_eq!(frame.quads.len(), 12);
        assert!(frame
            .quads
            .iter()
            .all(|quad| matches!(quad, DrawQuad::Tile { .. })));
        assert_eq!(frame.append_quads_data, AppendQuadsData::default());
        assert!(!host.needs_redraw());
    }

    #[test]
    fn second_commit_syncs_from_active_twin() {
        let mut host = host();
        commit_and_activate(&mut host, vec![commit(1, 800, 600)]);

        host.commit(vec![commit(1, 800, 600)]).expect("commit");

        let active = host.trees().active().layer(LayerId(1)).expect("active layer");
        let pending = host
            .trees()
            .pending_twin(active)
            .expect("pending twin");
        assert_eq!(pending.tilings().scales(), active.tilings().scales());
        assert_eq!(pending.scales().raster_contents_scale, 1.0);
    }

    #[test]
    fn pending_tree_shares_ready_tiles_and_activates_at_once() {
        let mut host = host();
        commit_and_activate(&mut host, vec![commit(1, 800, 600)]);

        host.commit(vec![commit(1, 800, 600)]).expect("commit");
        let next_frame = TreeState {
            frame_time_in_seconds: 2.0,
            ..tree_state()
        };
        host.set_tree_state(next_frame).expect("tree state");
        host.update_draw_properties(&visible_everything(&[1]))
            .expect("draw properties");

        assert!(host.required_tiles_ready());
        let queue = host.raster_queue(TreePriority::NewContentTakesPriority);
        assert!(host.activate_if_ready(&queue).expect("pending tree"));
    }

    #[test]
    fn commit_drops_layers_left_out() {
        let mut host = host();
        commit_and_activate(&mut host, vec![commit(1, 800, 600), commit(2, 400, 300)]);

        host.commit(vec![commit(2, 400, 300)]).expect("commit");
        let pending = host.trees().pending().expect("pending tree");
        assert_eq!(pending.layer_ids(), vec![LayerId(2)]);

        host.update_draw_properties(&visible_everything(&[2]))
            .expect("draw properties");
        rasterize_everything(&host);
        let queue = host.raster_queue(TreePriority::NewContentTakesPriority);
        assert!(host.activate_if_ready(&queue).expect("pending tree"));
        assert_eq!(host.trees().active().layer_ids(), vec![LayerId(2)]);
    }

    #[test]
    fn duplicate_layer_in_commit_is_rejected() {
        let mut host = host();
        let result = host.commit(vec![commit(1, 100, 100), commit(1, 100, 100)]);
        assert_eq!(result, Err(HostError::DuplicateLayer(LayerId(1))));
        assert!(!host.has_pending_tree());
    }

    #[test]
    fn draw_properties_for_unknown_layer_are_rejected() {
        let mut host = host();
        host.commit(vec![commit(1, 100, 100)]).expect("commit");
        let result = host.update_draw_properties(&visible_everything(&[7]));
        assert_eq!(result, Err(HostError::UnknownLayer(LayerId(7))));
    }

    #[test]
    fn invalid_ideal_scale_is_rejected() {
        let mut host = host();
        host.commit(vec![commit(1, 100, 100)]).expect("commit");
        let properties = BTreeMap::from([(
            LayerId(1),
            LayerDrawProperties {
                ideal_contents_scale: f32::NAN,
                ..LayerDrawProperties::default()
            },
        )]);
        let result = host.update_draw_properties(&properties);
        assert_eq!(result, Err(HostError::Geometry(GeometryError::InvalidScale)));
    }

    #[test]
    fn activation_without_pending_tree_is_an_error() {
        let mut host = host();
        let queue = host.raster_queue(TreePriority::default());
        assert_eq!(host.activate_if_ready(&queue), Err(HostError::NoPendingTree));
    }

    #[test]
    fn invalid_settings_are_rejected() {
        let settings = LayerTreeSettings {
            low_res_contents_scale_factor: 0.0,
            ..LayerTreeSettings::default()
        };
        let result = LayerTreeHostImpl::new(settings, tree_state());
        assert!(matches!(
            result,
            Err(HostError::Settings(SettingsError::LowResFactorOutOfRange(_)))
        ));

        let zero_page_scale = TreeState {
            total_page_scale_factor: 0.0,
            ..tree_state()
        };
        assert!(matches!(
            LayerTreeHostImpl::new(LayerTreeSettings::default(), zero_page_scale),
            Err(HostError::Geometry(GeometryError::InvalidScale))
        ));
    }

    #[test]
    fn lost_output_surface_drops_every_tiling() {
        let mut host = host();
        commit_and_activate(&mut host, vec![commit(1, 800, 600)]);

        host.did_lose_output_surface();
        let active = host.trees().active().layer(LayerId(1)).expect("active layer");
        assert!(active.tilings().is_empty());

        // The next draw recreates tilings, with nothing ready yet.
        let frame = host.draw();
        let active = host.trees().active().layer(LayerId(1)).expect("active layer");
        assert_eq!(active.tilings().scales(), vec![1.0, 0.125]);
        assert!(frame.append_quads_data.had_incomplete_tile);
    }

    #[test]
    fn active_layer_losing_lcd_text_asks_for_commit() {
        let mut host = host();
        commit_and_activate(&mut host, vec![commit(1, 800, 600)]);
        assert!(!host.needs_commit());

        let properties = BTreeMap::from([(
            LayerId(1),
            LayerDrawProperties {
                visible_layer_rect: int_rect(0, 0, 800, 600),
                can_use_lcd_text: false,
                ..LayerDrawProperties::default()
            },
        )]);
        let report = host.update_draw_properties(&properties).expect("draw properties");
        assert_eq!(report.tree, TreeKind::Active);
        assert!(report.needs_commit);
        assert!(host.needs_commit());

        host.commit(vec![commit(1, 800, 600)]).expect("commit");
        assert!(!host.needs_commit());
        let pending = host.trees().pending().and_then(|tree| tree.layer(LayerId(1)));
        assert_eq!(pending.map(PictureLayer::is_using_lcd_text), Some(false));
    }

    #[test]
    fn scheduler_input_reflects_host_state() {
        let mut host = host();
        host.commit(vec![commit(1, 800, 600)]).expect("commit");
        let input = host.scheduler_input(3);
        assert_eq!(input.frame_sequence_id, 3);
        assert!(input.has_pending_tree);
        assert!(input.pending_tree_needs_update);

        host.update_draw_properties(&visible_everything(&[1]))
            .expect("draw properties");
        let input = host.scheduler_input(4);
        assert!(!input.pending_tree_needs_update);
        assert!(!input.required_tiles_ready);
    }
}
