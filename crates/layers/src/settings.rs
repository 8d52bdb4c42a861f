use std::fmt;

use geometry::ContentIntSize;

/// Largest ratio between the ideal and the raster page scale tolerated while
/// a pinch or double-tap zoom is in progress.
pub const MAX_SCALE_RATIO_DURING_PINCH: f32 = 16.0;

/// Candidate scales within this relative distance of an existing tiling reuse
/// that tiling instead of creating a new one.
pub const SNAP_TO_EXISTING_TILING_RATIO: f32 = 0.2;

/// When `ManageTilings` may add a low resolution tiling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LowResTilingPolicy {
    /// Only while the layer is neither zooming nor animating.
    #[default]
    WhenStatic,
    /// Never create one. Existing low-res tilings still keep their tag.
    Never,
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayerTreeSettings {
    pub default_tile_size: ContentIntSize,
    pub max_untiled_layer_size: ContentIntSize,
    pub minimum_contents_scale: f32,
    pub low_res_contents_scale_factor: f32,
    pub max_tiles_for_interest_area: usize,
    pub low_res_tiling_policy: LowResTilingPolicy,
    pub can_use_lcd_text: bool,
    pub use_native_buffer_textures: bool,
    pub pixel_distance_to_record: i32,
    pub show_debug_borders: bool,
    pub draw_checkerboard_for_missing_tiles: bool,
}

impl Default for LayerTreeSettings {
    fn default() -> Self {
        Self {
            default_tile_size: ContentIntSize::new(256, 256),
            max_untiled_layer_size: ContentIntSize::new(512, 512),
            minimum_contents_scale: 0.0625,
            low_res_contents_scale_factor: 0.125,
            max_tiles_for_interest_area: 128,
            low_res_tiling_policy: LowResTilingPolicy::WhenStatic,
            can_use_lcd_text: true,
            use_native_buffer_textures: false,
            pixel_distance_to_record: 8000,
            show_debug_borders: false,
            draw_checkerboard_for_missing_tiles: false,
        }
    }
}

impl LayerTreeSettings {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.default_tile_size.is_empty() {
            return Err(SettingsError::EmptyDefaultTileSize);
        }
        if self.max_untiled_layer_size.is_empty() {
            return Err(SettingsError::EmptyMaxUntiledLayerSize);
        }
        let min_scale = self.minimum_contents_scale;
        if !min_scale.is_finite() || min_scale <= 0.0 {
            return Err(SettingsError::NonPositiveMinimumContentsScale(min_scale));
        }
        let factor = self.low_res_contents_scale_factor;
        if !(factor > 0.0 && factor <= 1.0) {
            return Err(SettingsError::LowResFactorOutOfRange(factor));
        }
        if self.max_tiles_for_interest_area == 0 {
            return Err(SettingsError::EmptyInterestArea);
        }
        if self.pixel_distance_to_record < 0 {
            return Err(SettingsError::NegativeRecordDistance(self.pixel_distance_to_record));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RendererCapabilities {
    pub max_texture_size: i32,
    pub avoid_pow2_textures: bool,
}

impl Default for RendererCapabilities {
    fn default() -> Self {
        Self {
            max_texture_size: 4096,
            avoid_pow2_textures: false,
        }
    }
}

impl RendererCapabilities {
    pub fn validate(&self) -> Result<(), SettingsError> {
        if self.max_texture_size <= 0 {
            return Err(SettingsError::NonPositiveMaxTextureSize(self.max_texture_size));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub enum SettingsError {
    EmptyDefaultTileSize,
    EmptyMaxUntiledLayerSize,
    NonPositiveMinimumContentsScale(f32),
    LowResFactorOutOfRange(f32),
    EmptyInterestArea,
    NegativeRecordDistance(i32),
    NonPositiveMaxTextureSize(i32),
}

impl fmt::Display for SettingsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SettingsError::EmptyDefaultTileSize => {
                write!(formatter, "default tile size must be non-empty")
            }
            SettingsError::EmptyMaxUntiledLayerSize => {
                write!(formatter, "max untiled layer size must be non-empty")
            }
            SettingsError::NonPositiveMinimumContentsScale(scale) => {
                write!(formatter, "minimum contents scale must be positive, got {scale}")
            }
            SettingsError::LowResFactorOutOfRange(factor) => {
                write!(formatter, "low-res contents scale factor must be in (0, 1], got {factor}")
            }
            SettingsError::EmptyInterestArea => {
                write!(formatter, "max tiles for interest area must be at least one")
            }
            SettingsError::NegativeRecordDistance(distance) => {
                write!(formatter, "pixel distance to record must not be negative, got {distance}")
            }
            SettingsError::NonPositiveMaxTextureSize(size) => {
                write!(formatter, "max texture size must be positive, got {size}")
            }
        }
    }
}

impl std::error::Error for SettingsError {}
