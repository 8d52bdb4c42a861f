//! Multi-resolution tilings of a layer's content.
//!
//! A [`TilingSet`] owns one [`Tiling`] per contents scale. Each tiling splits
//! its content into a grid of [`Tile`]s that live only inside the tiling's
//! interest area. Tiles can be shared with the twin tiling of the other tree,
//! so they are handed around as [`TileRef`].

mod coverage;
mod priority;
mod raster_queue;
mod resolution;
mod tile;
mod tiling;
mod tiling_data;
mod tiling_set;

pub use coverage::{CoverageCell, TilingCoverage, TilingSetCoverage, tiling_preference_order};
pub use priority::{
    BACKFLING_GUARD_DISTANCE_PIXELS, MAX_TIME_TO_VISIBLE_IN_SECONDS,
    PREPAINTING_WINDOW_TIME_SECONDS, TileBin, TilePriority, TileResolution, TreePriority,
    WhichTree, time_for_bounds_to_intersect,
};
pub use raster_queue::{QueuedTile, RasterQueue};
pub use resolution::classify_resolutions;
pub use tile::{ResourceId, Tile, TileDrawingInfo, TileId, TileRef};
pub use tiling::{PriorityParams, Tiling, TilingClient};
pub use tiling_data::TilingData;
pub use tiling_set::TilingSet;
