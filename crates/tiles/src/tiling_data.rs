use euclid::{Box2D, point2};
use geometry::{ContentIntRect, ContentIntSize, int_rect_from_size, intersect_or_empty};

/// Grid math for one tiling: how a content rect splits into fixed-size tiles.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TilingData {
    tile_size: ContentIntSize,
    tiling_size: ContentIntSize,
    num_tiles_x: i32,
    num_tiles_y: i32,
}

impl TilingData {
    pub fn new(tile_size: ContentIntSize, tiling_size: ContentIntSize) -> Self {
        assert!(
            tile_size.width > 0 && tile_size.height > 0,
            "tile size must be positive, got {}x{}",
            tile_size.width,
            tile_size.height
        );
        let mut data = Self {
            tile_size,
            tiling_size: ContentIntSize::new(0, 0),
            num_tiles_x: 0,
            num_tiles_y: 0,
        };
        data.set_tiling_size(tiling_size);
        data
    }

    pub fn tile_size(&self) -> ContentIntSize {
        self.tile_size
    }

    pub fn tiling_size(&self) -> ContentIntSize {
        self.tiling_size
    }

    pub fn tiling_rect(&self) -> ContentIntRect {
        int_rect_from_size(self.tiling_size)
    }

    pub fn num_tiles_x(&self) -> i32 {
        self.num_tiles_x
    }

    pub fn num_tiles_y(&self) -> i32 {
        self.num_tiles_y
    }

    pub fn set_tiling_size(&mut self, tiling_size: ContentIntSize) {
        self.tiling_size = ContentIntSize::new(tiling_size.width.max(0), tiling_size.height.max(0));
        self.num_tiles_x = tile_count(self.tiling_size.width, self.tile_size.width);
        self.num_tiles_y = tile_count(self.tiling_size.height, self.tile_size.height);
    }

    pub fn set_tile_size(&mut self, tile_size: ContentIntSize) {
        *self = Self::new(tile_size, self.tiling_size);
    }

    pub fn tile_bounds(&self, i: i32, j: i32) -> ContentIntRect {
        assert!(
            i >= 0 && j >= 0 && i < self.num_tiles_x && j < self.num_tiles_y,
            "tile index ({i}, {j}) outside {}x{} grid",
            self.num_tiles_x,
            self.num_tiles_y
        );
        let min = point2(i * self.tile_size.width, j * self.tile_size.height);
        let max = point2(
            (min.x + self.tile_size.width).min(self.tiling_size.width),
            (min.y + self.tile_size.height).min(self.tiling_size.height),
        );
        Box2D::new(min, max)
    }

    /// Clamped to the valid column range.
    pub fn tile_x_index_from_src_coord(&self, x: i32) -> i32 {
        if self.num_tiles_x == 0 {
            return 0;
        }
        (x / self.tile_size.width).clamp(0, self.num_tiles_x - 1)
    }

    pub fn tile_y_index_from_src_coord(&self, y: i32) -> i32 {
        if self.num_tiles_y == 0 {
            return 0;
        }
        (y / self.tile_size.height).clamp(0, self.num_tiles_y - 1)
    }

    /// Inclusive `(left, top, right, bottom)` index range of tiles touching
    /// `rect`, or `None` when it misses the tiling.
    pub fn index_range(&self, rect: ContentIntRect) -> Option<(i32, i32, i32, i32)> {
        let clipped = intersect_or_empty(rect, self.tiling_rect());
        if clipped.is_empty() {
            return None;
        }
        Some((
            self.tile_x_index_from_src_coord(clipped.min.x),
            self.tile_y_index_from_src_coord(clipped.min.y),
            self.tile_x_index_from_src_coord(clipped.max.x - 1),
            self.tile_y_index_from_src_coord(clipped.max.y - 1),
        ))
    }

    pub fn indices_in(&self, rect: ContentIntRect) -> impl Iterator<Item = (i32, i32)> {
        let range = self.index_range(rect);
        range.into_iter().flat_map(|(left, top, right, bottom)| {
            (top..=bottom).flat_map(move |j| (left..=right).map(move |i| (i, j)))
        })
    }
}

fn tile_count(length: i32, tile_length: i32) -> i32 {
    if length <= 0 {
        0
    } else {
        (length + tile_length - 1) / tile_length
    }
}
