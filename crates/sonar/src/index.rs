//! The built index and its two query algorithms.
//!
//! Storage is flat: one box and one index value per slot. Leaf slots
//! `[0, num_items)` hold item boxes in Hilbert order with the original item
//! id in `indices`; every later slot is an internal node holding its group's
//! aggregate box with the storage offset of its first child in `indices`.
//! The root is the last slot. Queries are pure reads; a changed world builds
//! a new index next tick instead of mutating this one.

use serde::{Deserialize, Serialize};

use crate::coord::Coord;
use crate::heap::MinHeap;
use crate::Aabb;

/// Immutable packed spatial index over 2D boxes.
///
/// Built by [`crate::IndexBuilder`]; answers rectangle-overlap and
/// k-nearest-neighbor queries against the item ids assigned at add time.
#[derive(Debug, Clone, PartialEq)]
pub struct SpatialIndex<S: Coord> {
    pub(crate) num_items: usize,
    pub(crate) node_size: usize,
    pub(crate) level_bounds: Vec<usize>,
    pub(crate) boxes: Vec<S>,
    pub(crate) indices: Vec<u32>,
}

/// Frontier entry for the nearest-neighbor search: either an internal node
/// still to expand or an item whose distance is already final.
#[derive(Debug, Clone, Copy)]
enum HeapEntry {
    Node(usize),
    Item(u32),
}

/// Point query with result-count and radius limits.
///
/// Both limits default to unbounded; chain the `with_*` methods to set them.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct NeighborQuery<S: Coord> {
    /// Query point x coordinate.
    pub x: S,
    /// Query point y coordinate.
    pub y: S,
    /// Stop after this many results.
    pub max_results: usize,
    /// Ignore items farther than this (Euclidean distance).
    pub max_distance: Option<S>,
}

impl<S: Coord> NeighborQuery<S> {
    /// Unbounded nearest-neighbor query around `(x, y)`.
    #[must_use]
    pub fn new(x: S, y: S) -> Self {
        Self {
            x,
            y,
            max_results: usize::MAX,
            max_distance: None,
        }
    }

    /// Cap the number of returned items.
    #[must_use]
    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results;
        self
    }

    /// Only return items within `max_distance` of the query point.
    #[must_use]
    pub fn with_max_distance(mut self, max_distance: S) -> Self {
        self.max_distance = Some(max_distance);
        self
    }
}

impl NeighborQuery<f32> {
    /// Unbounded query around a `glam` point.
    #[must_use]
    pub fn from_vec2(point: glam::Vec2) -> Self {
        Self::new(point.x, point.y)
    }
}

impl NeighborQuery<f64> {
    /// Unbounded query around a `glam` point.
    #[must_use]
    pub fn from_dvec2(point: glam::DVec2) -> Self {
        Self::new(point.x, point.y)
    }
}

impl<S: Coord> SpatialIndex<S> {
    /// Number of indexed items.
    #[must_use]
    pub fn len(&self) -> usize {
        self.num_items
    }

    /// A built index always holds at least one item.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        false
    }

    /// Branching factor the index was built with.
    #[must_use]
    pub fn node_size(&self) -> usize {
        self.node_size
    }

    /// Number of tree levels, leaves included.
    #[must_use]
    pub fn num_levels(&self) -> usize {
        self.level_bounds.len()
    }

    /// Bounding box over every indexed item.
    #[must_use]
    pub fn extent(&self) -> Aabb<S> {
        self.slot_box(self.root_slot())
    }

    /// Ids of all items whose box intersects `query`, in unspecified order.
    #[must_use]
    pub fn search(&self, query: Aabb<S>) -> Vec<u32> {
        self.search_filtered(query, |_| true)
    }

    /// [`SpatialIndex::search`] restricted to items the predicate accepts.
    ///
    /// The predicate sees original item ids and runs once per intersecting
    /// leaf.
    pub fn search_filtered<F>(&self, query: Aabb<S>, mut predicate: F) -> Vec<u32>
    where
        F: FnMut(u32) -> bool,
    {
        tracing::trace!(query = ?query, "range search");
        let mut results = Vec::new();
        let mut stack: Vec<usize> = Vec::new();
        let mut group = self.root_slot();

        loop {
            let group_end = (group + self.node_size).min(self.upper_bound(group));
            let is_leaf_group = group < self.num_items;

            for slot in group..group_end {
                if !query.intersects(&self.slot_box(slot)) {
                    continue;
                }
                let stored = self.indices[slot];
                if is_leaf_group {
                    if predicate(stored) {
                        results.push(stored);
                    }
                } else {
                    stack.push(stored as usize);
                }
            }

            match stack.pop() {
                Some(next) => group = next,
                None => break,
            }
        }

        results
    }

    /// Items closest to the query point, ascending by distance.
    ///
    /// Distance to a box is zero when the point is inside it, otherwise the
    /// distance to its nearest edge or corner. Ties break arbitrarily.
    #[must_use]
    pub fn neighbors(&self, query: &NeighborQuery<S>) -> Vec<u32> {
        self.neighbors_filtered(query, |_| true)
    }

    /// [`SpatialIndex::neighbors`] restricted to items the predicate
    /// accepts.
    ///
    /// Rejected items are pruned before they enter the frontier, so a
    /// predicate never costs extra heap traffic.
    pub fn neighbors_filtered<F>(&self, query: &NeighborQuery<S>, mut predicate: F) -> Vec<u32>
    where
        F: FnMut(u32) -> bool,
    {
        tracing::trace!(x = ?query.x, y = ?query.y, "neighbor search");
        if query.max_results == 0 {
            return Vec::new();
        }

        let px = query.x.to_f64();
        let py = query.y.to_f64();
        let max_dist_sq = query.max_distance.map_or(f64::INFINITY, |d| {
            let d = d.to_f64();
            d * d
        });

        let mut results = Vec::new();
        let mut frontier: MinHeap<HeapEntry> = MinHeap::new();
        let mut group = self.root_slot();

        // Each queued distance is a true lower bound on everything inside
        // the entry, so a popped item is definitively the next closest.
        'search: loop {
            let group_end = (group + self.node_size).min(self.upper_bound(group));
            let is_leaf_group = group < self.num_items;

            for slot in group..group_end {
                let b = self.slot_box(slot);
                let dx = axis_distance(px, b.min_x.to_f64(), b.max_x.to_f64());
                let dy = axis_distance(py, b.min_y.to_f64(), b.max_y.to_f64());
                let dist_sq = dx * dx + dy * dy;
                if dist_sq > max_dist_sq {
                    continue;
                }
                let stored = self.indices[slot];
                if is_leaf_group {
                    if predicate(stored) {
                        frontier.push(HeapEntry::Item(stored), dist_sq);
                    }
                } else {
                    frontier.push(HeapEntry::Node(stored as usize), dist_sq);
                }
            }

            loop {
                match frontier.pop() {
                    Some(HeapEntry::Item(id)) => {
                        results.push(id);
                        if results.len() >= query.max_results {
                            break 'search;
                        }
                    }
                    Some(HeapEntry::Node(next)) => {
                        group = next;
                        continue 'search;
                    }
                    None => break 'search,
                }
            }
        }

        results
    }

    /// Storage offset of the root node.
    fn root_slot(&self) -> usize {
        self.total_slots() - 1
    }

    pub(crate) fn total_slots(&self) -> usize {
        self.indices.len()
    }

    /// End offset of the level containing `slot`.
    fn upper_bound(&self, slot: usize) -> usize {
        for &bound in &self.level_bounds {
            if bound > slot {
                return bound;
            }
        }
        self.total_slots()
    }

    pub(crate) fn slot_box(&self, slot: usize) -> Aabb<S> {
        let at = slot * 4;
        Aabb::new(
            self.boxes[at],
            self.boxes[at + 1],
            self.boxes[at + 2],
            self.boxes[at + 3],
        )
    }
}

/// Distance from `p` to the interval `[min, max]` along one axis.
fn axis_distance(p: f64, min: f64, max: f64) -> f64 {
    if p < min {
        min - p
    } else if p > max {
        p - max
    } else {
        0.0
    }
}
