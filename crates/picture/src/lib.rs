//! Recorded layer content.
//!
//! A [`Picture`] is an immutable snapshot of which cells of a layer have a
//! vector recording. Snapshots are shared between the pending and active copy
//! of a layer through `Arc`; new content always arrives as a new snapshot
//! produced by the main-thread [`PictureRecorder`].

use std::fmt;
use std::sync::Arc;

use bitvec::prelude::{BitVec, Lsb0};
use euclid::{Box2D, point2};
use geometry::{
    ContentIntRect, LayerIntRect, LayerIntSize, LayerPixel, Region, int_rect_from_size,
    intersect_or_empty, scale_to_enclosing_rect,
};

mod source;

pub use source::{LayerCommit, PictureLayerSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct LayerId(pub u64);

impl fmt::Display for LayerId {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "layer#{}", self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PictureError {
    ZeroCellSize,
    NegativeBounds,
    CellCountOverflow,
}

impl fmt::Display for PictureError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PictureError::ZeroCellSize => {
                write!(formatter, "picture cell size must be at least 1x1")
            }
            PictureError::NegativeBounds => {
                write!(formatter, "picture bounds must not be negative")
            }
            PictureError::CellCountOverflow => {
                write!(formatter, "picture cell count overflows usize")
            }
        }
    }
}

impl std::error::Error for PictureError {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PictureGrid {
    layer_bounds: LayerIntSize,
    cell_size: LayerIntSize,
    cells_x: i32,
    cells_y: i32,
}

impl PictureGrid {
    pub fn new(layer_bounds: LayerIntSize, cell_size: LayerIntSize) -> Result<Self, PictureError> {
        if cell_size.width <= 0 || cell_size.height <= 0 {
            return Err(PictureError::ZeroCellSize);
        }
        if layer_bounds.width < 0 || layer_bounds.height < 0 {
            return Err(PictureError::NegativeBounds);
        }
        let cells_x = div_ceil(layer_bounds.width, cell_size.width);
        let cells_y = div_ceil(layer_bounds.height, cell_size.height);
        (cells_x as usize)
            .checked_mul(cells_y as usize)
            .ok_or(PictureError::CellCountOverflow)?;
        Ok(Self {
            layer_bounds,
            cell_size,
            cells_x,
            cells_y,
        })
    }

    pub fn layer_bounds(&self) -> LayerIntSize {
        self.layer_bounds
    }

    pub fn cell_size(&self) -> LayerIntSize {
        self.cell_size
    }

    pub fn cells_x(&self) -> i32 {
        self.cells_x
    }

    pub fn cells_y(&self) -> i32 {
        self.cells_y
    }

    pub fn cell_count(&self) -> usize {
        self.cells_x as usize * self.cells_y as usize
    }

    pub fn cell_index(&self, x: i32, y: i32) -> Option<usize> {
        if x < 0 || y < 0 || x >= self.cells_x || y >= self.cells_y {
            return None;
        }
        Some(y as usize * self.cells_x as usize + x as usize)
    }

    pub fn cell_bounds(&self, x: i32, y: i32) -> LayerIntRect {
        assert!(
            self.cell_index(x, y).is_some(),
            "cell ({x}, {y}) is outside the {}x{} picture grid",
            self.cells_x,
            self.cells_y
        );
        let min = point2(x * self.cell_size.width, y * self.cell_size.height);
        let max = point2(
            (min.x + self.cell_size.width).min(self.layer_bounds.width),
            (min.y + self.cell_size.height).min(self.layer_bounds.height),
        );
        Box2D::new(min, max)
    }

    pub fn iter_cells(&self) -> impl Iterator<Item = (i32, i32)> + '_ {
        (0..self.cells_y).flat_map(move |y| (0..self.cells_x).map(move |x| (x, y)))
    }
}

fn div_ceil(value: i32, step: i32) -> i32 {
    if value <= 0 {
        0
    } else {
        (value + step - 1) / step
    }
}

#[derive(Debug, Clone)]
pub struct Picture {
    grid: PictureGrid,
    recorded_cells: BitVec<usize, Lsb0>,
    recorded_region: Region<LayerPixel>,
    min_contents_scale: f32,
    uses_lcd_text: bool,
}

impl Picture {
    /// A picture with no recordings, handed to a pending layer after its
    /// previous snapshot moved to the active tree.
    pub fn empty(uses_lcd_text: bool) -> Arc<Self> {
        let grid = PictureGrid {
            layer_bounds: LayerIntSize::new(0, 0),
            cell_size: LayerIntSize::new(1, 1),
            cells_x: 0,
            cells_y: 0,
        };
        Arc::new(Self {
            grid,
            recorded_cells: BitVec::new(),
            recorded_region: Region::new(),
            min_contents_scale: 0.0,
            uses_lcd_text,
        })
    }

    pub(crate) fn from_cells(
        grid: PictureGrid,
        recorded_cells: BitVec<usize, Lsb0>,
        min_contents_scale: f32,
        uses_lcd_text: bool,
    ) -> Self {
        assert_eq!(
            recorded_cells.len(),
            grid.cell_count(),
            "recorded cell bits must match the picture grid"
        );
        let mut recorded_region = Region::new();
        for index in recorded_cells.iter_ones() {
            let x = (index % grid.cells_x as usize) as i32;
            let y = (index / grid.cells_x as usize) as i32;
            recorded_region.union_rect(grid.cell_bounds(x, y));
        }
        Self {
            grid,
            recorded_cells,
            recorded_region,
            min_contents_scale,
            uses_lcd_text,
        }
    }

    pub fn fully_recorded(
        layer_bounds: LayerIntSize,
        cell_size: LayerIntSize,
        min_contents_scale: f32,
        uses_lcd_text: bool,
    ) -> Result<Arc<Self>, PictureError> {
        let grid = PictureGrid::new(layer_bounds, cell_size)?;
        let cells = BitVec::repeat(true, grid.cell_count());
        Ok(Arc::new(Self::from_cells(
            grid,
            cells,
            min_contents_scale,
            uses_lcd_text,
        )))
    }

    pub fn with_recorded_cells(
        layer_bounds: LayerIntSize,
        cell_size: LayerIntSize,
        min_contents_scale: f32,
        uses_lcd_text: bool,
        cells: impl IntoIterator<Item = (i32, i32)>,
    ) -> Result<Arc<Self>, PictureError> {
        let grid = PictureGrid::new(layer_bounds, cell_size)?;
        let mut bits = BitVec::repeat(false, grid.cell_count());
        for (x, y) in cells {
            let index = grid.cell_index(x, y).unwrap_or_else(|| {
                panic!("recorded cell ({x}, {y}) is outside the picture grid")
            });
            bits.set(index, true);
        }
        Ok(Arc::new(Self::from_cells(
            grid,
            bits,
            min_contents_scale,
            uses_lcd_text,
        )))
    }

    /// Copy of this picture with a different LCD text setting. The original
    /// stays untouched for whichever tree still reads it.
    pub fn with_lcd_text(&self, uses_lcd_text: bool) -> Arc<Self> {
        let mut copy = self.clone();
        copy.uses_lcd_text = uses_lcd_text;
        Arc::new(copy)
    }

    pub fn grid(&self) -> &PictureGrid {
        &self.grid
    }

    pub fn layer_bounds(&self) -> LayerIntSize {
        self.grid.layer_bounds
    }

    pub fn num_cells_x(&self) -> i32 {
        self.grid.cells_x
    }

    pub fn num_cells_y(&self) -> i32 {
        self.grid.cells_y
    }

    pub fn cell_bounds(&self, x: i32, y: i32) -> LayerIntRect {
        self.grid.cell_bounds(x, y)
    }

    pub fn has_recording_at(&self, x: i32, y: i32) -> bool {
        self.grid
            .cell_index(x, y)
            .and_then(|index| self.recorded_cells.get(index).map(|bit| *bit))
            .unwrap_or(false)
    }

    pub fn recorded_region(&self) -> &Region<LayerPixel> {
        &self.recorded_region
    }

    pub fn is_empty(&self) -> bool {
        self.recorded_region.is_empty()
    }

    pub fn min_contents_scale(&self) -> f32 {
        self.min_contents_scale
    }

    pub fn uses_lcd_text(&self) -> bool {
        self.uses_lcd_text
    }

    /// Whether `content_rect` at `contents_scale` maps onto recorded content
    /// only.
    pub fn can_raster(&self, contents_scale: f32, content_rect: ContentIntRect) -> bool {
        if self.grid.layer_bounds.is_empty() || content_rect.is_empty() {
            return false;
        }
        if contents_scale < self.min_contents_scale || contents_scale <= 0.0 {
            return false;
        }
        let layer_rect: LayerIntRect = scale_to_enclosing_rect(content_rect, 1.0 / contents_scale);
        let layer_rect = intersect_or_empty(layer_rect, int_rect_from_size(self.grid.layer_bounds));
        !layer_rect.is_empty() && self.recorded_region.contains_rect(layer_rect)
    }
}

#[derive(Debug, Clone)]
pub struct PictureRecorder {
    grid: PictureGrid,
    recorded_cells: BitVec<usize, Lsb0>,
    min_contents_scale: f32,
    pixel_distance_to_record: i32,
}

impl PictureRecorder {
    pub fn new(
        cell_size: LayerIntSize,
        min_contents_scale: f32,
        pixel_distance_to_record: i32,
    ) -> Result<Self, PictureError> {
        let grid = PictureGrid::new(LayerIntSize::new(0, 0), cell_size)?;
        Ok(Self {
            grid,
            recorded_cells: BitVec::new(),
            min_contents_scale,
            pixel_distance_to_record: pixel_distance_to_record.max(0),
        })
    }

    pub fn layer_bounds(&self) -> LayerIntSize {
        self.grid.layer_bounds
    }

    pub fn is_recorded(&self, x: i32, y: i32) -> bool {
        self.grid
            .cell_index(x, y)
            .is_some_and(|index| self.recorded_cells[index])
    }

    pub fn resize(&mut self, layer_bounds: LayerIntSize) -> Result<(), PictureError> {
        if layer_bounds == self.grid.layer_bounds {
            return Ok(());
        }
        let old_grid = self.grid;
        let new_grid = PictureGrid::new(layer_bounds, old_grid.cell_size)?;
        let mut cells = BitVec::repeat(false, new_grid.cell_count());
        for (x, y) in new_grid.iter_cells() {
            let Some(old_index) = old_grid.cell_index(x, y) else {
                continue;
            };
            if !self.recorded_cells[old_index] {
                continue;
            }
            if old_grid.cell_bounds(x, y) == new_grid.cell_bounds(x, y) {
                let index = new_grid
                    .cell_index(x, y)
                    .unwrap_or_else(|| panic!("cell ({x}, {y}) vanished from resized grid"));
                cells.set(index, true);
            }
        }
        self.grid = new_grid;
        self.recorded_cells = cells;
        Ok(())
    }

    /// Records every cell near `visible_layer_rect` and drops the rest.
    /// Invalidated cells inside the interest area are re-recorded.
    pub fn update(
        &mut self,
        invalidation: &Region<LayerPixel>,
        visible_layer_rect: LayerIntRect,
        uses_lcd_text: bool,
    ) -> Arc<Picture> {
        let distance = self.pixel_distance_to_record;
        let inflated = Box2D::new(
            point2(
                visible_layer_rect.min.x.saturating_sub(distance),
                visible_layer_rect.min.y.saturating_sub(distance),
            ),
            point2(
                visible_layer_rect.max.x.saturating_add(distance),
                visible_layer_rect.max.y.saturating_add(distance),
            ),
        );
        let interest = if visible_layer_rect.is_empty() {
            LayerIntRect::zero()
        } else {
            intersect_or_empty(inflated, int_rect_from_size(self.grid.layer_bounds))
        };

        let mut recorded = 0usize;
        let mut dropped = 0usize;
        let mut rerecorded = 0usize;
        for (x, y) in self.grid.iter_cells() {
            let bounds = self.grid.cell_bounds(x, y);
            let index = self
                .grid
                .cell_index(x, y)
                .unwrap_or_else(|| panic!("cell ({x}, {y}) outside of its own grid"));
            let had = self.recorded_cells[index];
            if bounds.intersects(&interest) {
                if !had {
                    recorded += 1;
                } else if invalidation.intersects_rect(bounds) {
                    rerecorded += 1;
                }
                self.recorded_cells.set(index, true);
            } else if had {
                dropped += 1;
                self.recorded_cells.set(index, false);
            }
        }
        log::debug!(
            "[picture] update: {recorded} recorded, {rerecorded} re-recorded, {dropped} dropped"
        );

        Arc::new(Picture::from_cells(
            self.grid,
            self.recorded_cells.clone(),
            self.min_contents_scale,
            uses_lcd_text,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use geometry::int_rect;

    fn size(width: i32, height: i32) -> LayerIntSize {
        LayerIntSize::new(width, height)
    }

    #[test]
    fn grid_clips_edge_cells_to_bounds() {
        let grid = PictureGrid::new(size(300, 100), size(256, 256)).unwrap();
        assert_eq!(grid.cells_x(), 2);
        assert_eq!(grid.cells_y(), 1);
        assert_eq!(grid.cell_bounds(1, 0), int_rect(256, 0, 44, 100));
    }

    #[test]
    fn zero_cell_size_is_rejected() {
        assert_eq!(
            PictureGrid::new(size(10, 10), size(0, 4)),
            Err(PictureError::ZeroCellSize)
        );
    }

    #[test]
    fn recording_lookup_outside_grid_is_false() {
        let picture = Picture::fully_recorded(size(100, 100), size(50, 50), 0.0, true).unwrap();
        assert!(picture.has_recording_at(1, 1));
        assert!(!picture.has_recording_at(2, 0));
        assert!(!picture.has_recording_at(-1, 0));
    }

    #[test]
    fn can_raster_requires_full_recording_and_minimum_scale() {
        let picture =
            Picture::with_recorded_cells(size(200, 100), size(100, 100), 0.25, false, [(0, 0)])
                .unwrap();
        assert!(picture.can_raster(1.0, int_rect(0, 0, 100, 100)));
        assert!(picture.can_raster(2.0, int_rect(0, 0, 200, 200)));
        assert!(!picture.can_raster(1.0, int_rect(50, 0, 100, 100)));
        assert!(!picture.can_raster(0.125, int_rect(0, 0, 10, 10)));
    }

    #[test]
    fn lcd_copy_leaves_original_untouched() {
        let picture = Picture::fully_recorded(size(10, 10), size(10, 10), 0.0, true).unwrap();
        let without_lcd = picture.with_lcd_text(false);
        assert!(picture.uses_lcd_text());
        assert!(!without_lcd.uses_lcd_text());
        assert_eq!(without_lcd.recorded_region(), picture.recorded_region());
    }

    #[test]
    fn recorder_drops_cells_far_from_visible_rect() {
        let mut recorder = PictureRecorder::new(size(100, 100), 0.0, 50).unwrap();
        recorder.resize(size(1000, 100)).unwrap();
        let picture = recorder.update(&Region::new(), int_rect(0, 0, 100, 100), true);
        assert!(picture.has_recording_at(0, 0));
        assert!(picture.has_recording_at(1, 0));
        assert!(!picture.has_recording_at(2, 0));

        let scrolled = recorder.update(&Region::new(), int_rect(600, 0, 100, 100), true);
        assert!(!scrolled.has_recording_at(0, 0));
        assert!(scrolled.has_recording_at(6, 0));
        assert!(picture.has_recording_at(0, 0), "old snapshot must not change");
    }

    #[test]
    fn resize_keeps_unchanged_cells_only() {
        let mut recorder = PictureRecorder::new(size(100, 100), 0.0, 0).unwrap();
        recorder.resize(size(250, 100)).unwrap();
        let _ = recorder.update(&Region::new(), int_rect(0, 0, 250, 100), true);
        assert!(recorder.is_recorded(2, 0));

        recorder.resize(size(300, 100)).unwrap();
        assert!(recorder.is_recorded(0, 0));
        assert!(recorder.is_recorded(1, 0));
        assert!(!recorder.is_recorded(2, 0), "edge cell grew and must be re-recorded");
    }
}
