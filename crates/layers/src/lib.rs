//! Compositor-side picture layers.
//!
//! A [`PictureLayer`] exists once per tree. It picks the scales its content is
//! rasterized at, keeps a [`tiles::TilingSet`] in step with them and with its
//! twin in the other tree, decides which tiles gate activation, and turns
//! its tilings into draw quads.

mod picture_layer;
mod quads;
mod scale;
mod settings;
mod tile_size;
mod tree;

pub use picture_layer::{LayerDrawProperties, LayerScales, LcdTextUpdate, PictureLayer};
pub use quads::{AppendQuadsData, DEFAULT_CHECKERBOARD_COLOR, DrawQuad, debug_colors};
pub use scale::{minimum_contents_scale, snapped_contents_scale};
pub use settings::{
    LayerTreeSettings, LowResTilingPolicy, MAX_SCALE_RATIO_DURING_PINCH, RendererCapabilities,
    SNAP_TO_EXISTING_TILING_RATIO, SettingsError,
};
pub use tile_size::calculate_tile_size;
pub use tree::{LayerTree, LayerTreePair, TreeKind, TreeState};

#[cfg(test)]
mod tests;
