//! Coverage iteration: splitting a destination rect into non-overlapping
//! geometry cells, each backed by at most one tile.
//!
//! Destination space is content space at `dest_scale`, usually the layer's
//! own contents scale. A tiling at another scale is mapped into it by
//! `tiling_scale / dest_scale`.

use euclid::{Box2D, point2};
use geometry::{
    ContentIntRect, ContentIntSize, ContentPixel, ContentRect, Region, intersect_or_empty,
    positive_ratio, scale_rect, scale_to_enclosing_rect, to_float_rect,
};
use smallvec::SmallVec;

use crate::tile::TileRef;
use crate::tiling::Tiling;
use crate::tiling_set::TilingSet;

/// One geometry cell of a coverage walk.
#[derive(Debug, Clone)]
pub struct CoverageCell {
    pub geometry_rect: ContentIntRect,
    pub tile: Option<TileRef>,
    pub full_tile_geometry_rect: ContentIntRect,
    pub texture_rect: ContentRect,
    pub texture_size: ContentIntSize,
    /// Contents scale of the tiling that produced the cell, 0 for
    /// uncovered cells.
    pub contents_scale: f32,
}

impl CoverageCell {
    fn uncovered(geometry_rect: ContentIntRect) -> Self {
        Self {
            geometry_rect,
            tile: None,
            full_tile_geometry_rect: geometry_rect,
            texture_rect: ContentRect::zero(),
            texture_size: ContentIntSize::new(0, 0),
            contents_scale: 0.0,
        }
    }

    pub fn is_ready_to_draw(&self) -> bool {
        self.tile
            .as_ref()
            .is_some_and(|tile| tile.borrow().is_ready_to_draw())
    }
}

#[derive(Debug)]
pub struct TilingCoverage<'a> {
    tiling: &'a Tiling,
    dest_rect: ContentIntRect,
    dest_to_content_scale: f32,
    left: i32,
    top: i32,
    right: i32,
    bottom: i32,
    tile_i: i32,
    tile_j: i32,
    last_geometry_rect: Option<ContentIntRect>,
}

impl<'a> TilingCoverage<'a> {
    pub(crate) fn new(tiling: &'a Tiling, dest_scale: f32, dest_rect: ContentIntRect) -> Self {
        let dest_to_content_scale = if dest_scale > 0.0 {
            tiling.contents_scale() / dest_scale
        } else {
            0.0
        };
        let mut coverage = Self {
            tiling,
            dest_rect,
            dest_to_content_scale,
            left: 0,
            top: 0,
            right: -1,
            bottom: -1,
            tile_i: 0,
            tile_j: 0,
            last_geometry_rect: None,
        };
        if dest_rect.is_empty() || dest_to_content_scale <= 0.0 {
            return coverage;
        }
        let content_rect: ContentIntRect = scale_to_enclosing_rect(dest_rect, dest_to_content_scale);
        let Some((left, top, right, bottom)) = tiling.tiling_data().index_range(content_rect) else {
            return coverage;
        };
        coverage.left = left;
        coverage.top = top;
        coverage.right = right;
        coverage.bottom = bottom;
        coverage.tile_i = left - 1;
        coverage.tile_j = top;
        coverage
    }

    fn advance(&mut self) -> Option<CoverageCell> {
        if self.tile_j > self.bottom {
            return None;
        }
        let mut new_row = false;
        self.tile_i += 1;
        if self.tile_i > self.right {
            self.tile_i = self.left;
            self.tile_j += 1;
            new_row = true;
            if self.tile_j > self.bottom {
                return None;
            }
        }

        let content_rect = self.tiling.tiling_data().tile_bounds(self.tile_i, self.tile_j);
        let full_tile_geometry_rect: ContentIntRect =
            scale_to_enclosing_rect(content_rect, 1.0 / self.dest_to_content_scale);
        let mut geometry_rect = intersect_or_empty(full_tile_geometry_rect, self.dest_rect);

        if let Some(last) = self.last_geometry_rect {
            // Enclosing rects of neighbouring tiles may overlap by a pixel.
            let (min_left, min_top) = if new_row {
                (self.dest_rect.min.x, last.max.y)
            } else {
                (last.max.x, last.min.y)
            };
            let inset_left = (min_left - geometry_rect.min.x).max(0);
            let inset_top = (min_top - geometry_rect.min.y).max(0);
            geometry_rect = Box2D::new(
                point2(geometry_rect.min.x + inset_left, geometry_rect.min.y + inset_top),
                geometry_rect.max,
            );
        }
        self.last_geometry_rect = Some(geometry_rect);

        let texture_rect = scale_rect::<ContentPixel, ContentPixel>(
            to_float_rect(geometry_rect),
            self.dest_to_content_scale,
        )
        .translate(-content_rect.min.to_f32().to_vector());
        Some(CoverageCell {
            geometry_rect,
            tile: self.tiling.tile_at(self.tile_i, self.tile_j).cloned(),
            full_tile_geometry_rect,
            texture_rect,
            texture_size: self.tiling.tiling_data().tile_size(),
            contents_scale: self.tiling.contents_scale(),
        })
    }
}

impl Iterator for TilingCoverage<'_> {
    type Item = CoverageCell;

    fn next(&mut self) -> Option<CoverageCell> {
        loop {
            let cell = self.advance()?;
            if !cell.geometry_rect.is_empty() {
                return Some(cell);
            }
        }
    }
}

/// Order in which tilings are consulted for `ideal_contents_scale`: closest
/// ratio first, higher scale on ties.
pub fn tiling_preference_order(tilings: &TilingSet, ideal_contents_scale: f32) -> SmallVec<[usize; 8]> {
    let mut order: SmallVec<[usize; 8]> = (0..tilings.num_tilings()).collect();
    if ideal_contents_scale <= 0.0 {
        return order;
    }
    order.sort_by(|&a, &b| {
        let scale_a = tilings.tiling_at(a).contents_scale();
        let scale_b = tilings.tiling_at(b).contents_scale();
        positive_ratio(scale_a, ideal_contents_scale)
            .total_cmp(&positive_ratio(scale_b, ideal_contents_scale))
            .then(scale_b.total_cmp(&scale_a))
    });
    order
}

/// Walks a whole tiling set: every cell resolves to the best ready tile in
/// preference order, and whatever no tiling can draw comes out last as
/// uncovered cells.
#[derive(Debug)]
pub struct TilingSetCoverage<'a> {
    set: &'a TilingSet,
    contents_scale: f32,
    order: SmallVec<[usize; 8]>,
    next_tiling: usize,
    current_tiling: Option<usize>,
    tiling_coverage: Option<TilingCoverage<'a>>,
    pending_rects: Vec<ContentIntRect>,
    missing_region: Region<ContentPixel>,
    finished: bool,
}

impl<'a> TilingSetCoverage<'a> {
    pub(crate) fn new(
        set: &'a TilingSet,
        contents_scale: f32,
        content_rect: ContentIntRect,
        ideal_contents_scale: f32,
    ) -> Self {
        let mut missing_region = Region::new();
        missing_region.union_rect(content_rect);
        Self {
            set,
            contents_scale,
            order: tiling_preference_order(set, ideal_contents_scale),
            next_tiling: 0,
            current_tiling: None,
            tiling_coverage: None,
            pending_rects: Vec::new(),
            missing_region,
            finished: content_rect.is_empty() || contents_scale <= 0.0,
        }
    }

    pub fn current_tiling(&self) -> Option<usize> {
        self.current_tiling
    }

    fn start_next_pass(&mut self) {
        let mut rects: Vec<ContentIntRect> = self.missing_region.iter().collect();
        self.missing_region.clear();
        // Pop from the back in top-left first order.
        rects.sort_by_key(|rect| std::cmp::Reverse((rect.min.y, rect.min.x)));
        self.pending_rects = rects;
        self.current_tiling = self.order.get(self.next_tiling).copied();
        self.next_tiling += 1;
    }
}

impl Iterator for TilingSetCoverage<'_> {
    type Item = CoverageCell;

    fn next(&mut self) -> Option<CoverageCell> {
        if self.finished {
            return None;
        }
        loop {
            if let Some(coverage) = self.tiling_coverage.as_mut() {
                for cell in coverage.by_ref() {
                    if cell.is_ready_to_draw() {
                        return Some(cell);
                    }
                    self.missing_region.union_rect(cell.geometry_rect);
                }
                self.tiling_coverage = None;
            }

            if self.pending_rects.is_empty() {
                if self.missing_region.is_empty() {
                    self.finished = true;
                    return None;
                }
                self.start_next_pass();
            }

            let Some(rect) = self.pending_rects.pop() else {
                continue;
            };
            match self.current_tiling {
                Some(index) => {
                    let tiling = self.set.tiling_at(index);
                    self.tiling_coverage = Some(TilingCoverage::new(tiling, self.contents_scale, rect));
                }
                None => return Some(CoverageCell::uncovered(rect)),
            }
        }
    }
}
