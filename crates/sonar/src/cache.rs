//! Per-tick index cache.
//!
//! A simulation tick builds one index per queried entity class (units,
//! sectors, missiles) and several systems query it before the tick ends.
//! The cache is plain data owned by the tick context and passed where
//! needed; it holds nothing across ticks unless the owner chooses not to
//! call [`TickCache::clear`].

use std::collections::HashMap;

use crate::coord::Coord;
use crate::error::IndexError;
use crate::index::SpatialIndex;

/// Built indexes for the current tick, keyed by entity class name.
#[derive(Debug, Clone)]
pub struct TickCache<S: Coord> {
    indexes: HashMap<String, SpatialIndex<S>>,
}

impl<S: Coord> TickCache<S> {
    /// Create an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self {
            indexes: HashMap::new(),
        }
    }

    /// Store the index built for `class` this tick.
    ///
    /// Returns the displaced index when the class was already present.
    pub fn insert(
        &mut self,
        class: impl Into<String>,
        index: SpatialIndex<S>,
    ) -> Option<SpatialIndex<S>> {
        self.indexes.insert(class.into(), index)
    }

    /// The index built for `class` this tick.
    ///
    /// # Errors
    ///
    /// [`IndexError::NotIndexed`] when no index was built for `class`.
    pub fn get(&self, class: &str) -> Result<&SpatialIndex<S>, IndexError> {
        self.indexes.get(class).ok_or_else(|| IndexError::NotIndexed {
            class: class.to_owned(),
        })
    }

    /// Whether an index was built for `class` this tick.
    #[must_use]
    pub fn contains(&self, class: &str) -> bool {
        self.indexes.contains_key(class)
    }

    /// Remove and return the index for `class`.
    pub fn remove(&mut self, class: &str) -> Option<SpatialIndex<S>> {
        self.indexes.remove(class)
    }

    /// Drop every index; called at tick end before entities move again.
    pub fn clear(&mut self) {
        self.indexes.clear();
    }

    /// Number of classes indexed this tick.
    #[must_use]
    pub fn len(&self) -> usize {
        self.indexes.len()
    }

    /// Whether no class has been indexed this tick.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.indexes.is_empty()
    }

    /// Names of the classes indexed this tick, in arbitrary order.
    pub fn classes(&self) -> impl Iterator<Item = &str> {
        self.indexes.keys().map(String::as_str)
    }
}

impl<S: Coord> Default for TickCache<S> {
    fn default() -> Self {
        Self::new()
    }
}
