//! Metric trends across generations.

use std::iter::FusedIterator;

use lineage_core::{GenerationIndex, GenerationSnapshot};
use serde::{Deserialize, Serialize};

/// Lazy sequence of `(generation, value)` points for one metric.
///
/// Yields the last numeric reading of each generation that recorded the
/// metric, in index order. Generations without a numeric reading are
/// skipped. Clone the iterator to walk the trend again.
#[derive(Debug, Clone)]
pub struct MetricTrend<'a> {
    snapshots: std::slice::Iter<'a, GenerationSnapshot>,
    name: String,
}

impl<'a> MetricTrend<'a> {
    pub(crate) fn new(snapshots: &'a [GenerationSnapshot], name: impl Into<String>) -> Self {
        Self {
            snapshots: snapshots.iter(),
            name: name.into(),
        }
    }

    /// Metric this trend follows.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Summarize the remaining points.
    pub fn summary(self) -> Option<TrendSummary> {
        TrendSummary::from_points(self)
    }
}

impl Iterator for MetricTrend<'_> {
    type Item = (GenerationIndex, f64);

    fn next(&mut self) -> Option<Self::Item> {
        let name = &self.name;
        self.snapshots
            .find_map(|snap| snap.last_numeric(name).map(|value| (snap.index, value)))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, self.snapshots.size_hint().1)
    }
}

impl DoubleEndedIterator for MetricTrend<'_> {
    fn next_back(&mut self) -> Option<Self::Item> {
        let name = &self.name;
        self.snapshots
            .by_ref()
            .rev()
            .find_map(|snap| snap.last_numeric(name).map(|value| (snap.index, value)))
    }
}

impl FusedIterator for MetricTrend<'_> {}

/// Aggregate view of a metric trend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrendSummary {
    /// Number of generations in the trend
    pub points: usize,
    /// First point
    pub first: (GenerationIndex, f64),
    /// Last point
    pub last: (GenerationIndex, f64),
    /// Smallest value
    pub min: f64,
    /// Largest value
    pub max: f64,
    /// Arithmetic mean
    pub mean: f64,
}

impl TrendSummary {
    /// Build a summary, or `None` when there are no points.
    pub fn from_points(points: impl IntoIterator<Item = (GenerationIndex, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let first = iter.next()?;

        let mut summary = Self {
            points: 1,
            first,
            last: first,
            min: first.1,
            max: first.1,
            mean: 0.0,
        };
        let mut total = first.1;

        for point in iter {
            summary.points += 1;
            summary.last = point;
            summary.min = summary.min.min(point.1);
            summary.max = summary.max.max(point.1);
            total += point.1;
        }

        summary.mean = total / summary.points as f64;
        Some(summary)
    }

    /// Net change from the first to the last point.
    pub fn delta(&self) -> f64 {
        self.last.1 - self.first.1
    }
}
