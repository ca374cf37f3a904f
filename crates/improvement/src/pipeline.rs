//! A component's tracker, blueprint store and improvement loop bundled together.

use lineage_blueprint::{BlueprintDiff, BlueprintStore};
use lineage_core::{Error, GenerationIndex, GenerationSnapshot, Result, VersionId};
use lineage_tracker::{GenerationTracker, MetricTrend};
use tracing::info;

use crate::engine::{CycleReport, ImprovementLoop, LoopConfig};
use crate::hooks::{CycleInput, DefaultHooks, PhaseHooks};

/// Everything needed to improve one component over many generations.
pub struct Pipeline<H: PhaseHooks> {
    tracker: GenerationTracker,
    blueprints: BlueprintStore,
    improvement: ImprovementLoop<H>,
}

/// Pipeline for `name` with fresh history and hooks that succeed without
/// doing any work.
pub fn create_default_pipeline(name: impl Into<String>) -> Pipeline<DefaultHooks> {
    Pipeline::new(name, DefaultHooks)
}

impl<H: PhaseHooks> Pipeline<H> {
    /// Create a pipeline with empty history.
    pub fn new(name: impl Into<String>, hooks: H) -> Self {
        let name = name.into();
        Self {
            tracker: GenerationTracker::new(name.clone()),
            blueprints: BlueprintStore::new(name),
            improvement: ImprovementLoop::new(hooks),
        }
    }

    /// Resume from restored history. Both parts must belong to the same component.
    pub fn from_parts(
        tracker: GenerationTracker,
        blueprints: BlueprintStore,
        hooks: H,
    ) -> Result<Self> {
        if tracker.component() != blueprints.component() {
            return Err(Error::InvalidState(format!(
                "tracker for {} cannot share a pipeline with blueprints for {}",
                tracker.component(),
                blueprints.component()
            )));
        }

        Ok(Self {
            tracker,
            blueprints,
            improvement: ImprovementLoop::new(hooks),
        })
    }

    /// Set the loop configuration.
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.improvement = self.improvement.with_config(config);
        self
    }

    /// Component label.
    pub fn component(&self) -> &str {
        self.tracker.component()
    }

    /// Run a single improvement cycle.
    pub fn run_full_cycle(&mut self, input: &CycleInput) -> Result<CycleReport> {
        self.improvement
            .run_cycle(&mut self.tracker, &mut self.blueprints, input)
    }

    /// Run up to `count` cycles with the same input.
    ///
    /// Stops early when `max_cycles` is reached, or after a failing cycle
    /// when `stop_on_failure` is set.
    pub fn run_cycles(&mut self, input: &CycleInput, count: usize) -> Result<Vec<CycleReport>> {
        let mut reports = Vec::new();

        for _ in 0..count {
            if let Some(max) = self.improvement.config().max_cycles {
                if self.improvement.cycles() >= max {
                    info!("Reached max cycles ({}) for {}", max, self.component());
                    break;
                }
            }

            let report = self.run_full_cycle(input)?;
            let failed = report.is_failure();
            reports.push(report);

            if failed && self.improvement.config().stop_on_failure {
                info!("Stopping {} after failed cycle", self.component());
                break;
            }
        }

        Ok(reports)
    }

    /// Every generation, oldest first.
    pub fn get_history(&self) -> &[GenerationSnapshot] {
        self.tracker.get_history()
    }

    /// Look up one generation.
    pub fn get_generation(&self, index: GenerationIndex) -> Result<&GenerationSnapshot> {
        self.tracker.get_generation(index)
    }

    /// Trend of a metric across generations.
    pub fn get_metric_trend(&self, name: &str) -> MetricTrend<'_> {
        self.tracker.get_metric_trend(name)
    }

    /// Difference between two blueprint versions.
    pub fn diff(&self, from: VersionId, to: VersionId) -> Result<BlueprintDiff> {
        self.blueprints.diff(from, to)
    }

    /// The generation tracker.
    pub fn tracker(&self) -> &GenerationTracker {
        &self.tracker
    }

    /// Mutable access to the tracker.
    pub fn tracker_mut(&mut self) -> &mut GenerationTracker {
        &mut self.tracker
    }

    /// The blueprint store.
    pub fn blueprints(&self) -> &BlueprintStore {
        &self.blueprints
    }

    /// Mutable access to the blueprint store.
    pub fn blueprints_mut(&mut self) -> &mut BlueprintStore {
        &mut self.blueprints
    }

    /// The improvement loop.
    pub fn improvement(&self) -> &ImprovementLoop<H> {
        &self.improvement
    }

    /// Mutable access to the improvement loop.
    pub fn improvement_mut(&mut self) -> &mut ImprovementLoop<H> {
        &mut self.improvement
    }

    /// Split the pipeline back into its parts.
    pub fn into_parts(self) -> (GenerationTracker, BlueprintStore, H) {
        (self.tracker, self.blueprints, self.improvement.into_hooks())
    }
}
