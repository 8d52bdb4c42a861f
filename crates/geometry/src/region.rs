use euclid::{Box2D, point2};
use smallvec::SmallVec;

use crate::{intersect_or_empty, rect_area};

/// Exact integer region stored as disjoint, non-empty rects.
#[derive(Debug, Clone, PartialEq)]
pub struct Region<U> {
    rects: Vec<Box2D<i32, U>>,
}

impl<U> Default for Region<U> {
    fn default() -> Self {
        Self::new()
    }
}

impl<U> From<Box2D<i32, U>> for Region<U> {
    fn from(rect: Box2D<i32, U>) -> Self {
        let mut region = Self::new();
        region.union_rect(rect);
        region
    }
}

impl<U> Region<U> {
    pub fn new() -> Self {
        Self { rects: Vec::new() }
    }

    pub fn is_empty(&self) -> bool {
        self.rects.is_empty()
    }

    pub fn clear(&mut self) {
        self.rects.clear();
    }

    pub fn rects(&self) -> &[Box2D<i32, U>] {
        &self.rects
    }

    pub fn iter(&self) -> impl Iterator<Item = Box2D<i32, U>> + '_ {
        self.rects.iter().copied()
    }

    pub fn area(&self) -> i64 {
        self.rects.iter().map(|rect| rect_area(*rect)).sum()
    }

    pub fn bounds(&self) -> Box2D<i32, U> {
        let mut rects = self.rects.iter();
        let Some(first) = rects.next() else {
            return Box2D::zero();
        };
        rects.fold(*first, |acc, rect| {
            Box2D::new(
                point2(acc.min.x.min(rect.min.x), acc.min.y.min(rect.min.y)),
                point2(acc.max.x.max(rect.max.x), acc.max.y.max(rect.max.y)),
            )
        })
    }

    pub fn union_rect(&mut self, rect: Box2D<i32, U>) {
        if rect.is_empty() {
            return;
        }
        let mut pieces: SmallVec<[Box2D<i32, U>; 4]> = SmallVec::new();
        pieces.push(rect);
        for existing in &self.rects {
            if pieces.is_empty() {
                return;
            }
            let mut remaining = SmallVec::new();
            for piece in pieces {
                remaining.extend(subtract_rect(piece, *existing));
            }
            pieces = remaining;
        }
        self.rects.extend(pieces);
    }

    pub fn union(&mut self, other: &Region<U>) {
        for rect in &other.rects {
            self.union_rect(*rect);
        }
    }

    pub fn subtract_rect(&mut self, rect: Box2D<i32, U>) {
        if rect.is_empty() || self.rects.is_empty() {
            return;
        }
        let mut remaining = Vec::with_capacity(self.rects.len());
        for existing in self.rects.drain(..) {
            remaining.extend(subtract_rect(existing, rect));
        }
        self.rects = remaining;
    }

    pub fn subtract(&mut self, other: &Region<U>) {
        for rect in &other.rects {
            self.subtract_rect(*rect);
        }
    }

    pub fn intersect_rect(&mut self, rect: Box2D<i32, U>) {
        self.rects = self
            .rects
            .iter()
            .map(|existing| intersect_or_empty(*existing, rect))
            .filter(|clipped| !clipped.is_empty())
            .collect();
    }

    /// True when the region and `rect` share a non-empty area.
    pub fn intersects_rect(&self, rect: Box2D<i32, U>) -> bool {
        !rect.is_empty() && self.rects.iter().any(|existing| existing.intersects(&rect))
    }

    pub fn contains_rect(&self, rect: Box2D<i32, U>) -> bool {
        if rect.is_empty() {
            return true;
        }
        let mut uncovered = Region::from(rect);
        uncovered.subtract(self);
        uncovered.is_empty()
    }
}

/// Splits `rect` minus `hole` into at most four disjoint rects.
pub fn subtract_rect<U>(rect: Box2D<i32, U>, hole: Box2D<i32, U>) -> SmallVec<[Box2D<i32, U>; 4]> {
    let mut out = SmallVec::new();
    let overlap = intersect_or_empty(rect, hole);
    if overlap.is_empty() {
        if !rect.is_empty() {
            out.push(rect);
        }
        return out;
    }

    let top = Box2D::new(rect.min, point2(rect.max.x, overlap.min.y));
    let bottom = Box2D::new(point2(rect.min.x, overlap.max.y), rect.max);
    let left = Box2D::new(
        point2(rect.min.x, overlap.min.y),
        point2(overlap.min.x, overlap.max.y),
    );
    let right = Box2D::new(
        point2(overlap.max.x, overlap.min.y),
        point2(rect.max.x, overlap.max.y),
    );
    for piece in [top, left, right, bottom] {
        if !piece.is_empty() {
            out.push(piece);
        }
    }
    out
}
