//! Blueprint versioning - immutable configuration documents and their diffs.

#![warn(missing_docs)]

mod diff;
mod store;

pub use diff::{BlueprintDiff, DiffEntry, DiffKind, DiffSummary};
pub use store::BlueprintStore;
