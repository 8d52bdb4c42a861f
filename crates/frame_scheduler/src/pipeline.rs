use layers::{LayerTree, LayerTreePair, LcdTextUpdate, TreeKind, TreeState};
use picture::LayerId;

/// Tile work for one tree after a commit or before a draw.
///
/// Each phase consumes the previous one: tilings are managed before
/// priorities are computed, and priorities are current before tiles are
/// marked for activation.
pub struct CommitPipeline<'a> {
    trees: &'a mut LayerTreePair,
    kind: TreeKind,
    tree_state: &'a TreeState,
    layer_ids: Vec<LayerId>,
}

pub struct TilingsManaged<'a> {
    pipeline: CommitPipeline<'a>,
}

pub struct PrioritiesUpdated<'a> {
    pipeline: CommitPipeline<'a>,
    needs_commit: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReadyToActivate {
    pub tree: TreeKind,
    pub num_layers: usize,
    /// Tiles marked required for activation, zero for the active tree.
    pub num_required_tiles: usize,
    /// An active layer lost LCD text and has no pending twin to re-raster.
    pub needs_commit: bool,
}

impl<'a> CommitPipeline<'a> {
    pub fn begin(trees: &'a mut LayerTreePair, kind: TreeKind, tree_state: &'a TreeState) -> Self {
        let layer_ids = trees.tree(kind).map(LayerTree::layer_ids).unwrap_or_default();
        Self {
            trees,
            kind,
            tree_state,
            layer_ids,
        }
    }

    pub fn manage_tilings(self) -> TilingsManaged<'a> {
        for &id in &self.layer_ids {
            let Some((layer, twin)) = self.trees.layer_and_twin_mut(self.kind, id) else {
                continue;
            };
            let properties = *layer.draw_properties();
            layer.calculate_contents_scale(
                self.tree_state,
                properties.ideal_contents_scale,
                properties.animating_transform_to_screen,
                twin,
            );
        }
        TilingsManaged { pipeline: self }
    }
}

impl<'a> TilingsManaged<'a> {
    /// LCD text status is settled first so tiles dropped by a switch are
    /// recreated by the same priority pass.
    pub fn update_tile_priorities(self) -> PrioritiesUpdated<'a> {
        let pipeline = self.pipeline;
        let mut needs_commit = false;
        for &id in &pipeline.layer_ids {
            let Some((layer, mut twin)) = pipeline.trees.layer_and_twin_mut(pipeline.kind, id)
            else {
                continue;
            };
            let update = match pipeline.kind {
                TreeKind::Active => layer.update_lcd_text_status(twin.as_deref_mut()),
                TreeKind::Pending => layer.update_lcd_text_status(None),
            };
            needs_commit |= update == LcdTextUpdate::NeedsCommit;
            layer.update_tile_priorities(pipeline.tree_state, twin.as_deref());
        }
        PrioritiesUpdated {
            pipeline,
            needs_commit,
        }
    }
}

impl PrioritiesUpdated<'_> {
    pub fn mark_required_for_activation(self) -> ReadyToActivate {
        let pipeline = self.pipeline;
        let mut num_required_tiles = 0;
        if pipeline.kind == TreeKind::Pending {
            if let Some(pending) = pipeline.trees.pending() {
                let active = pipeline.trees.active();
                for layer in pending.layers() {
                    num_required_tiles +=
                        layer.mark_visible_resources_as_required(active.layer(layer.id()));
                }
            }
        }
        log::debug!(
            "[host] {:?} tree updated: {} layers, {} tiles required for activation",
            pipeline.kind,
            pipeline.layer_ids.len(),
            num_required_tiles
        );
        ReadyToActivate {
            tree: pipeline.kind,
            num_layers: pipeline.layer_ids.len(),
            num_required_tiles,
            needs_commit: self.needs_commit,
        }
    }
}
