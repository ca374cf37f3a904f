//! Generation tracking
//!
//! Ordered generation history, metric and artifact logging, and trend
//! queries.

#![warn(missing_docs)]

pub mod tracker;
pub mod trend;

pub use tracker::{FinalizeListener, GenerationTracker};
pub use trend::{MetricTrend, TrendSummary};
