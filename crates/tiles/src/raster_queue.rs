use std::cmp::Ordering;
use std::collections::HashSet;
use std::rc::Rc;

use crate::priority::{TileBin, TilePriority, TreePriority, WhichTree};
use crate::tile::{TileId, TileRef};
use crate::tiling_set::TilingSet;

#[derive(Debug, Clone)]
pub struct QueuedTile {
    pub tile: TileRef,
    pub bin: TileBin,
    pub priority: TilePriority,
    pub required_for_activation: bool,
}

#[derive(Debug, Default)]
pub struct RasterQueue {
    tree_priority: TreePriority,
    seen: HashSet<TileId>,
    entries: Vec<QueuedTile>,
    sorted: bool,
}

impl RasterQueue {
    pub fn new(tree_priority: TreePriority) -> Self {
        Self {
            tree_priority,
            ..Self::default()
        }
    }

    pub fn tree_priority(&self) -> TreePriority {
        self.tree_priority
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.seen.clear();
        self.entries.clear();
        self.sorted = false;
    }

    /// Adds every tile of `set`. Tiles shared between twins are queued once.
    pub fn add_tiling_set(&mut self, set: &TilingSet) {
        for tiling in set.iter() {
            for tile in tiling.tiles() {
                self.add_tile(tile);
            }
        }
    }

    pub fn add_tile(&mut self, tile: &TileRef) {
        let borrowed = tile.borrow();
        if !self.seen.insert(borrowed.id()) {
            return;
        }
        let priority = self.tree_priority.priority_for(
            &borrowed.priority(WhichTree::Active),
            &borrowed.priority(WhichTree::Pending),
        );
        let required_for_activation = borrowed.is_required_for_activation();
        self.entries.push(QueuedTile {
            tile: Rc::clone(tile),
            bin: TileBin::from_priority(&priority, required_for_activation),
            priority,
            required_for_activation,
        });
        self.sorted = false;
    }

    fn sort(&mut self) {
        if self.sorted {
            return;
        }
        self.entries.sort_by(compare_queued);
        self.sorted = true;
    }

    pub fn entries(&mut self) -> &[QueuedTile] {
        self.sort();
        &self.entries
    }

    /// Tiles still waiting for raster, most urgent first. `Never` tiles are
    /// left out.
    pub fn tiles_to_raster(&mut self) -> Vec<TileRef> {
        self.sort();
        self.entries
            .iter()
            .filter(|entry| entry.bin != TileBin::Never)
            .filter(|entry| !entry.tile.borrow().is_ready_to_draw())
            .map(|entry| Rc::clone(&entry.tile))
            .collect()
    }

    pub fn bin_of(&self, id: TileId) -> Option<TileBin> {
        self.entries
            .iter()
            .find(|entry| entry.tile.borrow().id() == id)
            .map(|entry| entry.bin)
    }

    pub fn num_required_for_activation(&self) -> usize {
        self.entries
            .iter()
            .filter(|entry| entry.required_for_activation)
            .count()
    }

    /// Readiness is read live so a rasterizer finishing tiles after the
    /// queue was built is observed.
    pub fn all_required_for_activation_ready(&self) -> bool {
        self.entries
            .iter()
            .filter(|entry| entry.required_for_activation)
            .all(|entry| entry.tile.borrow().is_ready_to_draw())
    }
}

fn compare_queued(a: &QueuedTile, b: &QueuedTile) -> Ordering {
    a.bin
        .cmp(&b.bin)
        .then_with(|| b.required_for_activation.cmp(&a.required_for_activation))
        .then_with(|| a.priority.resolution.rank().cmp(&b.priority.resolution.rank()))
        .then_with(|| {
            a.priority
                .time_to_visible_in_seconds
                .total_cmp(&b.priority.time_to_visible_in_seconds)
        })
        .then_with(|| {
            a.priority
                .distance_to_visible_in_pixels
                .total_cmp(&b.priority.distance_to_visible_in_pixels)
        })
        .then_with(|| a.tile.borrow().id().cmp(&b.tile.borrow().id()))
}
