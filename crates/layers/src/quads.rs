use geometry::{Color, ContentIntRect, ContentIntSize, ContentRect};
use picture::LayerId;
use tiles::ResourceId;

pub const DEFAULT_CHECKERBOARD_COLOR: Color = Color::rgba(241, 241, 241, 255);

/// Border colors for the per-tile debug overlay.
pub mod debug_colors {
    use geometry::Color;

    pub const HIGH_RES_TILE_BORDER: Color = Color::rgba(80, 200, 200, 100);
    pub const LOW_RES_TILE_BORDER: Color = Color::rgba(212, 83, 192, 100);
    pub const EXTRA_HIGH_RES_TILE_BORDER: Color = Color::rgba(239, 221, 40, 100);
    pub const EXTRA_LOW_RES_TILE_BORDER: Color = Color::rgba(239, 77, 40, 100);
    pub const SOLID_COLOR_TILE_BORDER: Color = Color::rgba(128, 128, 128, 160);
    pub const PICTURE_TILE_BORDER: Color = Color::rgba(64, 64, 255, 100);
    pub const MISSING_TILE_BORDER: Color = Color::rgba(255, 0, 0, 64);

    pub const TILE_BORDER_WIDTH: f32 = 1.0;
    pub const MISSING_TILE_BORDER_WIDTH: f32 = 1.0;
}

/// One draw primitive in the layer's content space.
#[derive(Debug, Clone, PartialEq)]
pub enum DrawQuad {
    Tile {
        layer_id: LayerId,
        rect: ContentIntRect,
        opaque_rect: ContentIntRect,
        resource_id: ResourceId,
        texture_rect: ContentRect,
        texture_size: ContentIntSize,
        contents_swizzled: bool,
    },
    /// Drawn straight from the picture without a rasterized resource.
    Picture {
        layer_id: LayerId,
        rect: ContentIntRect,
        opaque_rect: ContentIntRect,
        texture_rect: ContentRect,
        texture_size: ContentIntSize,
        content_rect: ContentIntRect,
        contents_scale: f32,
    },
    SolidColor {
        layer_id: LayerId,
        rect: ContentIntRect,
        color: Color,
    },
    Checkerboard {
        layer_id: LayerId,
        rect: ContentIntRect,
        color: Color,
    },
    DebugBorder {
        layer_id: LayerId,
        rect: ContentIntRect,
        color: Color,
        width: f32,
    },
}

impl DrawQuad {
    pub fn rect(&self) -> ContentIntRect {
        match self {
            DrawQuad::Tile { rect, .. }
            | DrawQuad::Picture { rect, .. }
            | DrawQuad::SolidColor { rect, .. }
            | DrawQuad::Checkerboard { rect, .. }
            | DrawQuad::DebugBorder { rect, .. } => *rect,
        }
    }

    pub fn is_debug_border(&self) -> bool {
        matches!(self, DrawQuad::DebugBorder { .. })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AppendQuadsData {
    pub num_missing_tiles: usize,
    pub had_incomplete_tile: bool,
}
