//! Bulk loader for the packed index.
//!
//! The builder is handed the exact item count up front, collects one box per
//! item, and finalizes in a single pass: Hilbert-sort the leaves, then
//! aggregate parent boxes level by level into the same flat buffers. The
//! finished index is a separate immutable type; there is no way to query a
//! half-built tree or to add to a finished one.

use rayon::prelude::*;

use crate::coord::Coord;
use crate::error::IndexError;
use crate::hilbert::hilbert_index;
use crate::index::SpatialIndex;
use crate::sort::sort_leaves;
use crate::Aabb;

/// Branching factor used when none is given.
pub const DEFAULT_NODE_SIZE: u16 = 16;

/// Hilbert keys are computed in parallel from this many items up.
const PARALLEL_KEY_CUTOFF: usize = 4096;

/// Side length of the normalized grid the curve key is computed on.
const KEY_GRID_MAX: f64 = 65535.0;

/// Accumulates item boxes and finalizes them into a [`SpatialIndex`].
#[derive(Debug, Clone)]
pub struct IndexBuilder<S: Coord> {
    num_items: usize,
    node_size: usize,
    level_bounds: Vec<usize>,
    boxes: Vec<S>,
    indices: Vec<u32>,
    /// Next leaf slot; doubles as the count of items added so far.
    cursor: usize,
    /// Running extent over every added box.
    extent: Aabb<S>,
}

impl<S: Coord> IndexBuilder<S> {
    /// Create a builder for exactly `num_items` boxes with the default
    /// branching factor.
    ///
    /// # Errors
    ///
    /// [`IndexError::InvalidArgument`] when `num_items` is zero.
    pub fn new(num_items: u32) -> Result<Self, IndexError> {
        Self::with_node_size(num_items, DEFAULT_NODE_SIZE)
    }

    /// Create a builder for exactly `num_items` boxes.
    ///
    /// `node_size` is clamped to `[2, 65535]`. Both packed buffers are
    /// allocated to their final size here; `finish` never reallocates.
    ///
    /// # Errors
    ///
    /// [`IndexError::InvalidArgument`] when `num_items` is zero.
    pub fn with_node_size(num_items: u32, node_size: u16) -> Result<Self, IndexError> {
        if num_items == 0 {
            return Err(IndexError::InvalidArgument);
        }
        let num_items = num_items as usize;
        let node_size = usize::from(node_size.max(2));

        let level_bounds = compute_level_bounds(num_items, node_size);
        let total_slots = *level_bounds.last().unwrap_or(&num_items);

        Ok(Self {
            num_items,
            node_size,
            level_bounds,
            boxes: vec![S::ZERO; total_slots * 4],
            indices: vec![0; total_slots],
            cursor: 0,
            extent: Aabb::empty_extent(),
        })
    }

    /// Declared item count.
    #[must_use]
    pub fn capacity(&self) -> usize {
        self.num_items
    }

    /// Items added so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.cursor
    }

    /// Whether no items have been added yet.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursor == 0
    }

    /// Append one item box and return its id.
    ///
    /// Ids are sequential in call order, starting at zero; query results
    /// refer back to this numbering.
    ///
    /// # Errors
    ///
    /// [`IndexError::CapacityExceeded`] when called more than `num_items`
    /// times.
    pub fn add(&mut self, item: Aabb<S>) -> Result<u32, IndexError> {
        if self.cursor >= self.num_items {
            return Err(IndexError::CapacityExceeded {
                capacity: self.num_items,
            });
        }
        let slot = self.cursor;
        self.write_box(slot, item);
        self.indices[slot] = slot as u32;
        self.extent = self.extent.union(item);
        self.cursor += 1;
        Ok(slot as u32)
    }

    /// Sort, aggregate, and seal the index.
    ///
    /// With `num_items <= node_size` the tree is a single level under a root
    /// that is just the overall extent; no sorting happens. Otherwise leaves
    /// are ordered by the Hilbert key of their center normalized into the
    /// overall extent, then each level is grouped `node_size` at a time into
    /// parent slots holding the group's aggregate box and the storage offset
    /// of its first child.
    ///
    /// # Errors
    ///
    /// [`IndexError::CountMismatch`] when fewer than `num_items` boxes were
    /// added.
    pub fn finish(mut self) -> Result<SpatialIndex<S>, IndexError> {
        if self.cursor < self.num_items {
            return Err(IndexError::CountMismatch {
                expected: self.num_items,
                added: self.cursor,
            });
        }

        if self.num_items <= self.node_size {
            // Single level: the root aggregate is the overall extent and its
            // first child is leaf slot 0.
            let root = self.num_items;
            self.write_box(root, self.extent);
            self.indices[root] = 0;
        } else {
            let mut keys = self.leaf_keys();
            sort_leaves(
                &mut keys,
                &mut self.boxes[..self.num_items * 4],
                &mut self.indices[..self.num_items],
            );
            self.build_parent_levels();
        }

        tracing::debug!(
            items = self.num_items,
            node_size = self.node_size,
            levels = self.level_bounds.len(),
            slots = self.level_bounds.last().copied().unwrap_or(0),
            "spatial index built"
        );

        Ok(SpatialIndex {
            num_items: self.num_items,
            node_size: self.node_size,
            level_bounds: self.level_bounds,
            boxes: self.boxes,
            indices: self.indices,
        })
    }

    /// Hilbert key per leaf, from box centers normalized into the extent.
    fn leaf_keys(&self) -> Vec<u32> {
        let min_x = self.extent.min_x.to_f64();
        let min_y = self.extent.min_y.to_f64();
        // A zero-width or zero-height extent normalizes against 1 so the
        // division below stays finite.
        let width = self.extent.max_x.to_f64() - min_x;
        let height = self.extent.max_y.to_f64() - min_y;
        let scale_x = KEY_GRID_MAX / if width > 0.0 { width } else { 1.0 };
        let scale_y = KEY_GRID_MAX / if height > 0.0 { height } else { 1.0 };

        let key_of = |slot: usize| {
            let b = self.read_box(slot);
            let (cx, cy) = b.center();
            let gx = ((cx - min_x) * scale_x).clamp(0.0, KEY_GRID_MAX) as u16;
            let gy = ((cy - min_y) * scale_y).clamp(0.0, KEY_GRID_MAX) as u16;
            hilbert_index(gx, gy)
        };

        if self.num_items >= PARALLEL_KEY_CUTOFF {
            (0..self.num_items).into_par_iter().map(key_of).collect()
        } else {
            (0..self.num_items).map(key_of).collect()
        }
    }

    /// Walk each level in groups of `node_size`, appending one parent slot
    /// per group with the aggregate box and the first child's offset.
    fn build_parent_levels(&mut self) {
        let mut write = self.num_items;
        let mut pos = 0;
        for level in 0..self.level_bounds.len() - 1 {
            let level_end = self.level_bounds[level];
            while pos < level_end {
                let first_child = pos;
                let mut aggregate = Aabb::empty_extent();
                let mut children = 0;
                while children < self.node_size && pos < level_end {
                    aggregate = aggregate.union(self.read_box(pos));
                    pos += 1;
                    children += 1;
                }
                self.write_box(write, aggregate);
                self.indices[write] = first_child as u32;
                write += 1;
            }
        }
        debug_assert_eq!(write, *self.level_bounds.last().unwrap_or(&0));
    }

    fn read_box(&self, slot: usize) -> Aabb<S> {
        let at = slot * 4;
        Aabb::new(
            self.boxes[at],
            self.boxes[at + 1],
            self.boxes[at + 2],
            self.boxes[at + 3],
        )
    }

    fn write_box(&mut self, slot: usize, item: Aabb<S>) {
        let at = slot * 4;
        self.boxes[at] = item.min_x;
        self.boxes[at + 1] = item.min_y;
        self.boxes[at + 2] = item.max_x;
        self.boxes[at + 3] = item.max_y;
    }
}

/// Ascending end offsets of each tree level's slot storage.
///
/// Starts at the leaf level (`num_items` slots) and repeatedly divides by
/// `node_size`, rounding up, until a level of one node, the root. The last
/// bound is the total slot count.
pub(crate) fn compute_level_bounds(num_items: usize, node_size: usize) -> Vec<usize> {
    let mut bounds = vec![num_items];
    let mut count = num_items;
    let mut total = num_items;
    loop {
        count = count.div_ceil(node_size);
        total += count;
        bounds.push(total);
        if count == 1 {
            break;
        }
    }
    bounds
}
