use std::collections::BTreeMap;

use geometry::{Color, ScreenIntSize};
use picture::LayerId;
use tiles::WhichTree;

use crate::picture_layer::PictureLayer;
use crate::settings::RendererCapabilities;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TreeKind {
    Active,
    Pending,
}

impl TreeKind {
    pub fn which_tree(self) -> WhichTree {
        match self {
            TreeKind::Active => WhichTree::Active,
            TreeKind::Pending => WhichTree::Pending,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TreeState {
    pub device_viewport_size: ScreenIntSize,
    pub device_scale_factor: f32,
    pub total_page_scale_factor: f32,
    pub min_page_scale_factor: f32,
    pub pinch_gesture_active: bool,
    pub double_tap_active: bool,
    pub frame_time_in_seconds: f64,
    pub background_color: Color,
    pub capabilities: RendererCapabilities,
}

impl Default for TreeState {
    fn default() -> Self {
        Self {
            device_viewport_size: ScreenIntSize::new(0, 0),
            device_scale_factor: 1.0,
            total_page_scale_factor: 1.0,
            min_page_scale_factor: 1.0,
            pinch_gesture_active: false,
            double_tap_active: false,
            frame_time_in_seconds: 0.0,
            background_color: Color::WHITE,
            capabilities: RendererCapabilities::default(),
        }
    }
}

impl TreeState {
    /// Pinch and double-tap zoom both count as a zoom gesture.
    pub fn is_zooming(&self) -> bool {
        self.pinch_gesture_active || self.double_tap_active
    }
}

#[derive(Debug)]
pub struct LayerTree {
    kind: TreeKind,
    layers: BTreeMap<LayerId, PictureLayer>,
}

impl LayerTree {
    pub fn new(kind: TreeKind) -> Self {
        Self {
            kind,
            layers: BTreeMap::new(),
        }
    }

    pub fn kind(&self) -> TreeKind {
        self.kind
    }

    pub fn len(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    pub fn contains(&self, id: LayerId) -> bool {
        self.layers.contains_key(&id)
    }

    pub fn layer(&self, id: LayerId) -> Option<&PictureLayer> {
        self.layers.get(&id)
    }

    pub fn layer_mut(&mut self, id: LayerId) -> Option<&mut PictureLayer> {
        self.layers.get_mut(&id)
    }

    pub fn layer_ids(&self) -> Vec<LayerId> {
        self.layers.keys().copied().collect()
    }

    pub fn layers(&self) -> impl Iterator<Item = &PictureLayer> + '_ {
        self.layers.values()
    }

    pub fn layers_mut(&mut self) -> impl Iterator<Item = &mut PictureLayer> + '_ {
        self.layers.values_mut()
    }

    pub fn insert(&mut self, layer: PictureLayer) -> Option<PictureLayer> {
        assert_eq!(
            layer.tree_kind(),
            self.kind,
            "{} inserted into the {:?} tree",
            layer.id(),
            self.kind
        );
        self.layers.insert(layer.id(), layer)
    }

    pub fn remove(&mut self, id: LayerId) -> Option<PictureLayer> {
        self.layers.remove(&id)
    }

    pub fn retain(&mut self, mut keep: impl FnMut(LayerId) -> bool) {
        self.layers.retain(|&id, _| keep(id));
    }
}

/// The active tree plus an optional pending tree. Twins are the layers with
/// the same id in both; a recycled tree keeps the layers of the last pending
/// tree so the next commit can reuse them.
#[derive(Debug)]
pub struct LayerTreePair {
    active: LayerTree,
    pending: Option<LayerTree>,
    recycle: Option<LayerTree>,
}

impl Default for LayerTreePair {
    fn default() -> Self {
        Self::new()
    }
}

impl LayerTreePair {
    pub fn new() -> Self {
        Self {
            active: LayerTree::new(TreeKind::Active),
            pending: None,
            recycle: None,
        }
    }

    pub fn active(&self) -> &LayerTree {
        &self.active
    }

    pub fn active_mut(&mut self) -> &mut LayerTree {
        &mut self.active
    }

    pub fn pending(&self) -> Option<&LayerTree> {
        self.pending.as_ref()
    }

    pub fn pending_mut(&mut self) -> Option<&mut LayerTree> {
        self.pending.as_mut()
    }

    pub fn has_pending_tree(&self) -> bool {
        self.pending.is_some()
    }

    pub fn tree(&self, kind: TreeKind) -> Option<&LayerTree> {
        match kind {
            TreeKind::Active => Some(&self.active),
            TreeKind::Pending => self.pending.as_ref(),
        }
    }

    pub fn create_pending_tree(&mut self) -> &mut LayerTree {
        let recycle = &mut self.recycle;
        self.pending
            .get_or_insert_with(|| recycle.take().unwrap_or_else(|| LayerTree::new(TreeKind::Pending)))
    }

    pub fn pending_twin(&self, layer: &PictureLayer) -> Option<&PictureLayer> {
        assert_eq!(
            layer.tree_kind(),
            TreeKind::Active,
            "pending twin looked up for {} which is not active",
            layer.id()
        );
        self.pending.as_ref()?.layer(layer.id())
    }

    pub fn active_twin(&self, layer: &PictureLayer) -> Option<&PictureLayer> {
        assert_eq!(
            layer.tree_kind(),
            TreeKind::Pending,
            "active twin looked up for {} which is not pending",
            layer.id()
        );
        self.active.layer(layer.id())
    }

    pub fn layer_and_twin_mut(
        &mut self,
        kind: TreeKind,
        id: LayerId,
    ) -> Option<(&mut PictureLayer, Option<&mut PictureLayer>)> {
        let active = self.active.layers.get_mut(&id);
        let pending = self
            .pending
            .as_mut()
            .and_then(|pending| pending.layers.get_mut(&id));
        match kind {
            TreeKind::Active => active.map(|layer| (layer, pending)),
            TreeKind::Pending => pending.map(|layer| (layer, active)),
        }
    }

    /// Moves every pending layer into the active tree. Active layers without
    /// a pending counterpart are dropped; the emptied pending tree is kept for
    /// recycling. Returns false when there is nothing to activate.
    pub fn activate(&mut self) -> bool {
        let Some(mut pending) = self.pending.take() else {
            return false;
        };
        self.active.retain(|id| pending.contains(id));
        for pending_layer in pending.layers.values_mut() {
            let active_layer = self
                .active
                .layers
                .entry(pending_layer.id())
                .or_insert_with(|| pending_layer.create_twin());
            pending_layer.push_properties_to(active_layer);
            active_layer.did_become_active();
        }
        log::debug!("[layer] activated {} layers", self.active.len());
        self.recycle = Some(pending);
        true
    }

    pub fn clear_pending(&mut self) {
        self.pending = None;
        self.recycle = None;
    }
}
