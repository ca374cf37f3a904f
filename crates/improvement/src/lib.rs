//! Lineage Improvement - the phase-driven improvement loop.
//!
//! A cycle runs TEST → ANALYZE → APPLY → ADVANCE → VALIDATE against a
//! [`GenerationTracker`](lineage_tracker::GenerationTracker) and a
//! [`BlueprintStore`](lineage_blueprint::BlueprintStore), delegating the
//! actual work of each phase to [`PhaseHooks`].

#![warn(missing_docs)]

mod engine;
mod hooks;
mod pipeline;

pub use engine::{CycleReport, ImprovementLoop, LoopConfig};
pub use hooks::{
    AnalyzeOutcome, ApplyOutcome, CycleInput, DefaultHooks, Findings, MetricReadings, PhaseHooks,
    TestOutcome, ValidateOutcome,
};
pub use pipeline::{create_default_pipeline, Pipeline};
