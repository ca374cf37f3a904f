//! Lineage core data models.
//!
//! This crate defines the records shared by the generation tracker, the
//! blueprint store and the improvement loop.

#![warn(missing_docs)]

// Identities
mod id;

// Generations
mod generation;
mod metric;

// Blueprints
mod blueprint;

// Improvement cycle
mod phase;
mod error;

// Re-exports
pub use id::{CycleId, GenerationIndex, ParseIdError, VersionId};

pub use generation::{GenerationSnapshot, GenerationState, GenerationStatus};
pub use metric::MetricValue;
pub use blueprint::{BlueprintContent, BlueprintVersion};
pub use phase::Phase;
pub use error::{Error, Result};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
