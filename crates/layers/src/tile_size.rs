use geometry::{ContentIntSize, round_up};

use crate::settings::{LayerTreeSettings, RendererCapabilities};

fn clamp_to_texture(size: ContentIntSize, max_texture_size: i32) -> ContentIntSize {
    ContentIntSize::new(
        size.width.min(max_texture_size),
        size.height.min(max_texture_size),
    )
}

/// Native buffers always step below `value`, even on an exact multiple.
fn round_to_step(value: i32, step: i32, native_buffers: bool) -> i32 {
    if native_buffers {
        round_up(value - step, step).max(step)
    } else {
        round_up(value, step)
    }
}

/// Tile size for a tiling whose content is `content_bounds` large.
///
/// Masks get one tile covering the whole content. Small layers and layers that
/// are long and skinny get a single row or column of tiles sized to the
/// content, rounded to a multiple of 64 (56 when power-of-two textures are to
/// be avoided). Everything else uses the default tile size.
pub fn calculate_tile_size(
    content_bounds: ContentIntSize,
    settings: &LayerTreeSettings,
    capabilities: RendererCapabilities,
    is_mask: bool,
) -> ContentIntSize {
    let max_texture_size = capabilities.max_texture_size;
    if is_mask {
        return clamp_to_texture(content_bounds, max_texture_size);
    }

    let default_tile_size = clamp_to_texture(settings.default_tile_size, max_texture_size);
    let max_untiled_size = clamp_to_texture(settings.max_untiled_layer_size, max_texture_size);

    let any_dimension_too_large = content_bounds.width > max_untiled_size.width
        || content_bounds.height > max_untiled_size.height;
    let any_dimension_one_tile = content_bounds.width <= default_tile_size.width
        || content_bounds.height <= default_tile_size.height;

    if !any_dimension_one_tile && any_dimension_too_large {
        return default_tile_size;
    }

    let step = if capabilities.avoid_pow2_textures { 56 } else { 64 };
    let native = settings.use_native_buffer_textures;
    let width = round_to_step(
        max_untiled_size.width.min(content_bounds.width),
        step,
        native,
    );
    let height = round_to_step(
        max_untiled_size.height.min(content_bounds.height),
        step,
        native,
    );
    if width > max_texture_size || height > max_texture_size {
        return default_tile_size;
    }
    ContentIntSize::new(width, height)
}
