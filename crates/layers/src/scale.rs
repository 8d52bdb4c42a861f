use geometry::{LayerIntSize, positive_ratio};

use crate::settings::SNAP_TO_EXISTING_TILING_RATIO;

/// Smallest contents scale that still leaves at least one content pixel in
/// each dimension, never below `configured_minimum`.
pub fn minimum_contents_scale(bounds: LayerIntSize, configured_minimum: f32) -> f32 {
    let min_dimension = bounds.width.min(bounds.height);
    if min_dimension <= 0 {
        return configured_minimum;
    }
    (1.0 / min_dimension as f32).max(configured_minimum)
}

/// Snaps `candidate` to the existing scale closest to it, as long as that
/// scale is less than `SNAP_TO_EXISTING_TILING_RATIO` away in relative terms.
/// Ties keep the first scale in `existing_scales`.
pub fn snapped_contents_scale(candidate: f32, existing_scales: &[f32]) -> f32 {
    if candidate <= 0.0 {
        return candidate;
    }
    let mut snapped = candidate;
    let mut best_ratio = 1.0 + SNAP_TO_EXISTING_TILING_RATIO;
    for &scale in existing_scales {
        if scale <= 0.0 {
            continue;
        }
        let ratio = positive_ratio(scale, candidate);
        if ratio < best_ratio {
            snapped = scale;
            best_ratio = ratio;
        }
    }
    snapped
}
