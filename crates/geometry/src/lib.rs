//! Typed pixel spaces and integer rect helpers shared by the tiling crates.
//!
//! Layer space is the unscaled coordinate space of a layer's bounds. Content
//! space is layer space multiplied by some contents scale (every tiling has its
//! own). Screen space is the device viewport.

use std::fmt;

use euclid::num::Zero;
use euclid::{Box2D, Point2D, Size2D, Transform2D, point2};

mod region;

pub use region::{Region, subtract_rect};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct LayerPixel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ContentPixel;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct ScreenPixel;

pub type LayerIntRect = Box2D<i32, LayerPixel>;
pub type LayerIntSize = Size2D<i32, LayerPixel>;
pub type LayerRect = Box2D<f32, LayerPixel>;
pub type ContentIntRect = Box2D<i32, ContentPixel>;
pub type ContentIntSize = Size2D<i32, ContentPixel>;
pub type ContentRect = Box2D<f32, ContentPixel>;
pub type ScreenRect = Box2D<f32, ScreenPixel>;
pub type ScreenIntSize = Size2D<i32, ScreenPixel>;
pub type LayerToScreenTransform = Transform2D<f32, LayerPixel, ScreenPixel>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const TRANSPARENT: Color = Color::rgba(0, 0, 0, 0);
    pub const WHITE: Color = Color::rgba(255, 255, 255, 255);

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn is_opaque(self) -> bool {
        self.a == 255
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GeometryError {
    InvalidScale,
    NonInvertibleTransform,
}

impl fmt::Display for GeometryError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            GeometryError::InvalidScale => {
                write!(formatter, "scale must be finite and greater than zero")
            }
            GeometryError::NonInvertibleTransform => {
                write!(formatter, "screen space transform is not invertible")
            }
        }
    }
}

impl std::error::Error for GeometryError {}

pub fn check_scale(scale: f32) -> Result<f32, GeometryError> {
    if !scale.is_finite() || scale <= 0.0 {
        return Err(GeometryError::InvalidScale);
    }
    Ok(scale)
}

/// Ratio between two positive scales, always >= 1.
pub fn positive_ratio(scale_a: f32, scale_b: f32) -> f32 {
    assert!(
        scale_a > 0.0 && scale_b > 0.0,
        "positive_ratio requires positive scales, got {scale_a} and {scale_b}"
    );
    if scale_a > scale_b {
        scale_a / scale_b
    } else {
        scale_b / scale_a
    }
}

pub fn int_rect_from_size<U>(size: Size2D<i32, U>) -> Box2D<i32, U> {
    Box2D::new(point2(0, 0), point2(size.width.max(0), size.height.max(0)))
}

pub fn int_rect<U>(x: i32, y: i32, width: i32, height: i32) -> Box2D<i32, U> {
    Box2D::new(point2(x, y), point2(x + width, y + height))
}

pub fn scale_to_enclosing_rect<Src, Dst>(rect: Box2D<i32, Src>, scale: f32) -> Box2D<i32, Dst> {
    if rect.is_empty() {
        return Box2D::zero();
    }
    Box2D::new(
        point2(
            (rect.min.x as f32 * scale).floor() as i32,
            (rect.min.y as f32 * scale).floor() as i32,
        ),
        point2(
            (rect.max.x as f32 * scale).ceil() as i32,
            (rect.max.y as f32 * scale).ceil() as i32,
        ),
    )
}

pub fn scale_rect<Src, Dst>(rect: Box2D<f32, Src>, scale: f32) -> Box2D<f32, Dst> {
    Box2D::new(
        point2(rect.min.x * scale, rect.min.y * scale),
        point2(rect.max.x * scale, rect.max.y * scale),
    )
}

pub fn scale_to_ceiled_size<Src, Dst>(size: Size2D<i32, Src>, scale: f32) -> Size2D<i32, Dst> {
    Size2D::new(
        (size.width as f32 * scale).ceil() as i32,
        (size.height as f32 * scale).ceil() as i32,
    )
}

pub fn to_float_rect<U>(rect: Box2D<i32, U>) -> Box2D<f32, U> {
    Box2D::new(
        point2(rect.min.x as f32, rect.min.y as f32),
        point2(rect.max.x as f32, rect.max.y as f32),
    )
}

pub fn enclosing_int_rect<U>(rect: Box2D<f32, U>) -> Box2D<i32, U> {
    if rect.is_empty() {
        return Box2D::zero();
    }
    Box2D::new(
        point2(rect.min.x.floor() as i32, rect.min.y.floor() as i32),
        point2(rect.max.x.ceil() as i32, rect.max.y.ceil() as i32),
    )
}

pub fn intersect_or_empty<T, U>(rect: Box2D<T, U>, other: Box2D<T, U>) -> Box2D<T, U>
where
    T: Copy + PartialOrd + Zero,
{
    rect.intersection(&other).unwrap_or_else(Box2D::zero)
}

pub fn round_up(value: i32, step: i32) -> i32 {
    assert!(step > 0, "round_up step must be positive");
    let remainder = value.rem_euclid(step);
    if remainder == 0 {
        value
    } else {
        value + (step - remainder)
    }
}

pub fn map_rect<Src, Dst>(transform: &Transform2D<f32, Src, Dst>, rect: Box2D<f32, Src>) -> Box2D<f32, Dst> {
    let corners: [Point2D<f32, Src>; 4] = [
        rect.min,
        point2(rect.max.x, rect.min.y),
        point2(rect.min.x, rect.max.y),
        rect.max,
    ];
    let mut min_x = f32::INFINITY;
    let mut min_y = f32::INFINITY;
    let mut max_x = f32::NEG_INFINITY;
    let mut max_y = f32::NEG_INFINITY;
    for corner in corners {
        let mapped = transform.transform_point(corner);
        min_x = min_x.min(mapped.x);
        min_y = min_y.min(mapped.y);
        max_x = max_x.max(mapped.x);
        max_y = max_y.max(mapped.y);
    }
    Box2D::new(point2(min_x, min_y), point2(max_x, max_y))
}

pub fn project_rect_to_layer(
    layer_to_screen: &LayerToScreenTransform,
    screen_rect: ScreenRect,
) -> Result<LayerRect, GeometryError> {
    let screen_to_layer = layer_to_screen
        .inverse()
        .ok_or(GeometryError::NonInvertibleTransform)?;
    Ok(map_rect(&screen_to_layer, screen_rect))
}

/// Sum of the horizontal and vertical gaps between two rects; zero when they
/// touch or overlap.
pub fn manhattan_distance<U>(a: Box2D<f32, U>, b: Box2D<f32, U>) -> f32 {
    let x = (a.min.x - b.max.x).max(b.min.x - a.max.x).max(0.0);
    let y = (a.min.y - b.max.y).max(b.min.y - a.max.y).max(0.0);
    x + y
}

/// Expands `starting_rect` by the same amount on every side until its area
/// (after clamping to `bounds`) would exceed `target_area`.
pub fn expand_rect_equally_to_area_bounded_by<U>(
    starting_rect: Box2D<i32, U>,
    target_area: i64,
    bounds: Box2D<i32, U>,
) -> Box2D<i32, U> {
    if starting_rect.is_empty() || bounds.is_empty() {
        return Box2D::zero();
    }
    let clamped_start = intersect_or_empty(starting_rect, bounds);
    if rect_area(clamped_start) >= target_area {
        return clamped_start;
    }

    let expanded = |delta: i32| -> Box2D<i32, U> {
        let grown = Box2D::new(
            point2(
                starting_rect.min.x.saturating_sub(delta),
                starting_rect.min.y.saturating_sub(delta),
            ),
            point2(
                starting_rect.max.x.saturating_add(delta),
                starting_rect.max.y.saturating_add(delta),
            ),
        );
        intersect_or_empty(grown, bounds)
    };

    let reach = (bounds.width() as i64 + bounds.height() as i64)
        .saturating_add(starting_rect.width() as i64 + starting_rect.height() as i64)
        .min(i32::MAX as i64) as i32;
    let mut low = 0;
    let mut high = reach;
    while low < high {
        let mid = low + (high - low + 1) / 2;
        if rect_area(expanded(mid)) <= target_area {
            low = mid;
        } else {
            high = mid - 1;
        }
    }
    expanded(low)
}

pub fn rect_area<U>(rect: Box2D<i32, U>) -> i64 {
    if rect.is_empty() {
        return 0;
    }
    rect.width() as i64 * rect.height() as i64
}
