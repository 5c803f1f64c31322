// src/error.rs
//! Error handling for the culling stage.
//!
//! The kernel itself is unconditional and reports nothing; only the safe
//! wrappers around it construct errors. Variants are cheap enum
//! discriminants and carry no allocations.

use thiserror::Error;

/// Errors produced by the safe entry points of the crate.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum CullError {
    /// The destination cannot hold every candidate the pass could admit.
    /// Checked once up front, never per candidate.
    #[error("destination holds {capacity} points but the pass may claim up to {required}")]
    DestinationTooSmall { required: usize, capacity: usize },

    /// More points submitted than the GPU culler was created for.
    #[error("{len} points exceed the GPU culler capacity of {capacity}")]
    CapacityExceeded { len: usize, capacity: usize },
}

impl CullError {
    #[inline]
    pub fn is_destination_too_small(&self) -> bool {
        matches!(self, Self::DestinationTooSmall { .. })
    }

    #[inline]
    pub fn is_capacity_exceeded(&self) -> bool {
        matches!(self, Self::CapacityExceeded { .. })
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, CullError>;
