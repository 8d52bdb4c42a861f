use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use geometry::{Color, ContentIntRect};
use picture::{LayerId, Picture};

use crate::priority::{TilePriority, WhichTree};

/// A tile shared between a tiling and its twin in the other tree.
pub type TileRef = Rc<RefCell<Tile>>;

static NEXT_TILE_ID: AtomicU64 = AtomicU64::new(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct TileId(u64);

impl TileId {
    fn next() -> Self {
        Self(NEXT_TILE_ID.fetch_add(1, Ordering::Relaxed))
    }
}

impl fmt::Display for TileId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "tile#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId(pub u64);

/// How a tile can be drawn. Written by the rasterizer, read at draw time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TileDrawingInfo {
    #[default]
    NotReady,
    Resource {
        resource_id: ResourceId,
        contents_swizzled: bool,
    },
    SolidColor(Color),
    PicturePile,
}

impl TileDrawingInfo {
    pub fn is_ready_to_draw(&self) -> bool {
        !matches!(self, TileDrawingInfo::NotReady)
    }
}

#[derive(Debug)]
pub struct Tile {
    id: TileId,
    layer_id: LayerId,
    content_rect: ContentIntRect,
    opaque_rect: ContentIntRect,
    contents_scale: f32,
    priority: [TilePriority; 2],
    required_for_activation: bool,
    drawing_info: TileDrawingInfo,
    picture: Arc<Picture>,
}

impl Tile {
    pub fn new(
        layer_id: LayerId,
        picture: Arc<Picture>,
        content_rect: ContentIntRect,
        opaque_rect: ContentIntRect,
        contents_scale: f32,
    ) -> Self {
        assert!(
            !content_rect.is_empty(),
            "tile content rect must not be empty: {content_rect:?}"
        );
        assert!(
            contents_scale > 0.0,
            "tile contents scale must be positive, got {contents_scale}"
        );
        Self {
            id: TileId::next(),
            layer_id,
            content_rect,
            opaque_rect,
            contents_scale,
            priority: [TilePriority::default(); 2],
            required_for_activation: false,
            drawing_info: TileDrawingInfo::NotReady,
            picture,
        }
    }

    pub fn into_ref(self) -> TileRef {
        Rc::new(RefCell::new(self))
    }

    pub fn id(&self) -> TileId {
        self.id
    }

    pub fn layer_id(&self) -> LayerId {
        self.layer_id
    }

    pub fn content_rect(&self) -> ContentIntRect {
        self.content_rect
    }

    pub fn opaque_rect(&self) -> ContentIntRect {
        self.opaque_rect
    }

    pub fn contents_scale(&self) -> f32 {
        self.contents_scale
    }

    pub fn priority(&self, tree: WhichTree) -> TilePriority {
        self.priority[tree.slot()]
    }

    pub fn set_priority(&mut self, tree: WhichTree, priority: TilePriority) {
        self.priority[tree.slot()] = priority;
    }

    pub fn combined_priority(&self) -> TilePriority {
        TilePriority::combined(
            &self.priority(WhichTree::Active),
            &self.priority(WhichTree::Pending),
        )
    }

    pub fn is_required_for_activation(&self) -> bool {
        self.required_for_activation
    }

    pub fn set_required_for_activation(&mut self, required: bool) {
        self.required_for_activation = required;
    }

    pub fn drawing_info(&self) -> TileDrawingInfo {
        self.drawing_info
    }

    pub fn set_drawing_info(&mut self, drawing_info: TileDrawingInfo) {
        self.drawing_info = drawing_info;
    }

    pub fn is_ready_to_draw(&self) -> bool {
        self.drawing_info.is_ready_to_draw()
    }

    pub fn picture(&self) -> &Arc<Picture> {
        &self.picture
    }

    pub fn set_picture(&mut self, picture: Arc<Picture>) {
        self.picture = picture;
    }

    /// Active priority takes the pending one, which starts over.
    pub(crate) fn promote_pending_priority(&mut self) {
        self.priority[WhichTree::Active.slot()] = self.priority[WhichTree::Pending.slot()];
        self.priority[WhichTree::Pending.slot()] = TilePriority::default();
        self.required_for_activation = false;
    }
}
