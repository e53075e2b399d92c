//! # Sonar
//!
//! Static packed spatial index for per-tick proximity queries.
//!
//! Game simulations here ask the same questions every tick: what is near
//! this point, what overlaps this rectangle, what are the k closest items.
//! Entities move every tick, so yesterday's index is stale and a fresh one
//! is bulk-loaded at tick start and dropped at tick end. Sonar implements
//! that lifecycle as an implicitly balanced spatial tree in flat packed
//! arrays: leaves are ordered along a Hilbert curve, then parent bounding
//! boxes are aggregated bottom-up so both query algorithms can prune whole
//! subtrees.
//!
//! - **Build once**: [`IndexBuilder`] accepts a known number of boxes and
//!   finalizes into an immutable [`SpatialIndex`].
//! - **Query many**: [`SpatialIndex::search`] returns everything overlapping
//!   a rectangle; [`SpatialIndex::neighbors`] returns the k closest items,
//!   optionally within a radius.
//! - **Per tick**: one index per queried entity class, cached for the tick
//!   in a caller-owned [`TickCache`].
//!
//! ## Quick Start
//!
//! ```rust
//! use sonar::{Aabb, IndexBuilder, NeighborQuery};
//!
//! let mut builder = IndexBuilder::<f64>::new(3).unwrap();
//! builder.add(Aabb::new(0.0, 0.0, 1.0, 1.0)).unwrap();
//! builder.add(Aabb::new(10.0, 10.0, 11.0, 11.0)).unwrap();
//! builder.add(Aabb::point(5.0, 5.0)).unwrap();
//! let index = builder.finish().unwrap();
//!
//! let hits = index.search(Aabb::new(0.0, 0.0, 6.0, 6.0));
//! assert_eq!(hits.len(), 2);
//!
//! let nearest = index.neighbors(&NeighborQuery::new(5.0, 5.0).with_max_results(1));
//! assert_eq!(nearest, vec![2]);
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]
#![warn(clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod builder;
pub mod cache;
pub mod codec;
pub mod coord;
pub mod error;
pub mod heap;
mod hilbert;
pub mod index;
mod sort;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use builder::IndexBuilder;
pub use cache::TickCache;
pub use coord::Coord;
pub use error::IndexError;
pub use heap::MinHeap;
pub use index::{NeighborQuery, SpatialIndex};

use serde::{Deserialize, Serialize};

/// Axis-aligned bounding box over a coordinate scalar.
///
/// Degenerate boxes (`min == max` on both axes) represent point items.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Aabb<S: Coord> {
    /// Minimum x coordinate
    pub min_x: S,
    /// Minimum y coordinate
    pub min_y: S,
    /// Maximum x coordinate
    pub max_x: S,
    /// Maximum y coordinate
    pub max_y: S,
}

impl<S: Coord> Aabb<S> {
    /// Create a box from its corner coordinates.
    #[must_use]
    pub fn new(min_x: S, min_y: S, max_x: S, max_y: S) -> Self {
        Self {
            min_x,
            min_y,
            max_x,
            max_y,
        }
    }

    /// Create a degenerate box representing a point.
    #[must_use]
    pub fn point(x: S, y: S) -> Self {
        Self::new(x, y, x, y)
    }

    /// The inverted box that is the identity for [`Aabb::union`].
    ///
    /// Used as the seed when accumulating an extent over a set of boxes.
    #[must_use]
    pub fn empty_extent() -> Self {
        Self::new(S::INFINITY, S::INFINITY, S::NEG_INFINITY, S::NEG_INFINITY)
    }

    /// Smallest box covering both `self` and `other`.
    #[must_use]
    pub fn union(self, other: Self) -> Self {
        Self::new(
            self.min_x.coord_min(other.min_x),
            self.min_y.coord_min(other.min_y),
            self.max_x.coord_max(other.max_x),
            self.max_y.coord_max(other.max_y),
        )
    }

    /// Separating-axis overlap test; boxes sharing only an edge still touch.
    #[must_use]
    pub fn intersects(&self, other: &Self) -> bool {
        !(other.max_x < self.min_x
            || other.max_y < self.min_y
            || other.min_x > self.max_x
            || other.min_y > self.max_y)
    }

    /// Center of the box, widened to `f64`.
    #[must_use]
    pub fn center(&self) -> (f64, f64) {
        (
            (self.min_x.to_f64() + self.max_x.to_f64()) / 2.0,
            (self.min_y.to_f64() + self.max_y.to_f64()) / 2.0,
        )
    }
}

impl Aabb<f32> {
    /// Create a box from `glam` corner vectors.
    #[must_use]
    pub fn from_vec2(min: glam::Vec2, max: glam::Vec2) -> Self {
        Self::new(min.x, min.y, max.x, max.y)
    }

    /// Minimum corner as a `glam` vector.
    #[must_use]
    pub fn min_vec2(&self) -> glam::Vec2 {
        glam::Vec2::new(self.min_x, self.min_y)
    }

    /// Maximum corner as a `glam` vector.
    #[must_use]
    pub fn max_vec2(&self) -> glam::Vec2 {
        glam::Vec2::new(self.max_x, self.max_y)
    }
}

impl Aabb<f64> {
    /// Create a box from `glam` corner vectors.
    #[must_use]
    pub fn from_dvec2(min: glam::DVec2, max: glam::DVec2) -> Self {
        Self::new(min.x, min.y, max.x, max.y)
    }

    /// Minimum corner as a `glam` vector.
    #[must_use]
    pub fn min_dvec2(&self) -> glam::DVec2 {
        glam::DVec2::new(self.min_x, self.min_y)
    }

    /// Maximum corner as a `glam` vector.
    #[must_use]
    pub fn max_dvec2(&self) -> glam::DVec2 {
        glam::DVec2::new(self.max_x, self.max_y)
    }
}
