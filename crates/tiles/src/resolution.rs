use crate::priority::TileResolution;

/// Resolution tags for `scales`.
///
/// The tiling at `high_res_scale` is high resolution. The tiling at
/// `low_res_scale` is low resolution unless it is the high-res one. When no
/// low-res tiling exists this pass, the one previously tagged low keeps its
/// tag. Everything else is non-ideal.
pub fn classify_resolutions(
    scales: &[f32],
    high_res_scale: Option<f32>,
    low_res_scale: Option<f32>,
    previous_low_res_scale: Option<f32>,
) -> Vec<TileResolution> {
    let low = low_res_scale.or(previous_low_res_scale);
    scales
        .iter()
        .map(|&scale| {
            if high_res_scale == Some(scale) {
                TileResolution::High
            } else if low == Some(scale) {
                TileResolution::Low
            } else {
                TileResolution::NonIdeal
            }
        })
        .collect()
}
