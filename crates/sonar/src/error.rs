//! Error taxonomy for index construction, lookup, and loading.
//!
//! Every variant is a synchronous caller-side protocol violation, not an
//! environmental failure; there is nothing to retry. Callers either
//! propagate or fail fast.

use thiserror::Error;

/// Errors produced by the spatial index.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum IndexError {
    /// Builder constructed with an unusable argument.
    #[error("index must hold at least one item")]
    InvalidArgument,

    /// More boxes added than the builder was declared for.
    #[error("index capacity of {capacity} items exceeded")]
    CapacityExceeded {
        /// Declared item count of the builder.
        capacity: usize,
    },

    /// Finalization attempted before every declared item was added.
    #[error("index declared {expected} items but only {added} were added")]
    CountMismatch {
        /// Declared item count.
        expected: usize,
        /// Items actually added.
        added: usize,
    },

    /// Tick cache lookup for an entity class with no built index this tick.
    #[error("no index built for entity class `{class}` this tick")]
    NotIndexed {
        /// Entity class name used for the lookup.
        class: String,
    },

    /// Persisted buffer failed validation on load.
    #[error("malformed index buffer: {reason}")]
    FormatError {
        /// What the loader rejected.
        reason: String,
    },
}

impl IndexError {
    pub(crate) fn format(reason: impl Into<String>) -> Self {
        Self::FormatError {
            reason: reason.into(),
        }
    }
}
