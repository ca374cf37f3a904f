//! Phase hooks - the caller-supplied work behind each phase.

use std::collections::BTreeMap;

use lineage_core::{BlueprintContent, GenerationIndex, MetricValue};
use serde::{Deserialize, Serialize};

/// Opaque input handed to the TEST hook.
pub type CycleInput = serde_json::Value;

/// Opaque findings produced by ANALYZE and consumed by APPLY.
pub type Findings = serde_json::Value;

/// Metric readings reported by the TEST hook.
pub type MetricReadings = BTreeMap<String, MetricValue>;

/// What the TEST hook reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TestOutcome {
    /// Readings to log on the open generation
    pub metrics: MetricReadings,

    /// `(kind, reference)` pairs to link to the open generation
    pub artifacts: Vec<(String, String)>,

    /// Whether the tests passed
    pub ok: bool,
}

impl TestOutcome {
    /// A passing outcome with no readings.
    pub fn passed() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    /// A failing outcome with no readings.
    pub fn failed() -> Self {
        Self::default()
    }

    /// Add a reading.
    pub fn with_metric(mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Self {
        self.metrics.insert(name.into(), value.into());
        self
    }

    /// Add an artifact reference.
    pub fn with_artifact(mut self, kind: impl Into<String>, reference: impl Into<String>) -> Self {
        self.artifacts.push((kind.into(), reference.into()));
        self
    }
}

/// What the ANALYZE hook reports.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnalyzeOutcome {
    /// Findings carried forward to APPLY
    pub findings: Findings,

    /// Whether analysis succeeded
    pub ok: bool,
}

impl AnalyzeOutcome {
    /// Successful analysis.
    pub fn ok(findings: Findings) -> Self {
        Self { findings, ok: true }
    }
}

/// What the APPLY hook reports.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ApplyOutcome {
    /// Configuration to commit, or `None` when nothing changed
    pub new_config: Option<BlueprintContent>,

    /// Human-readable change descriptions, used as generation notes
    pub changes: Vec<String>,

    /// Whether the changes were applied
    pub ok: bool,
}

impl ApplyOutcome {
    /// Applied successfully without touching configuration.
    pub fn unchanged() -> Self {
        Self {
            ok: true,
            ..Default::default()
        }
    }

    /// Applied successfully with a new configuration.
    pub fn with_config(config: BlueprintContent) -> Self {
        Self {
            new_config: Some(config),
            ok: true,
            changes: Vec::new(),
        }
    }

    /// Add a change description.
    pub fn with_change(mut self, change: impl Into<String>) -> Self {
        self.changes.push(change.into());
        self
    }
}

/// What the VALIDATE hook reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidateOutcome {
    /// Whether the regression check passed
    pub passed: bool,
}

/// The four external hooks driven by the improvement loop.
///
/// Each call is synchronous. Returning `Err` means the hook raised; the loop
/// aborts the cycle at that phase. Timeouts are the caller's concern.
pub trait PhaseHooks {
    /// Run tests and gather telemetry.
    fn test(&mut self, input: &CycleInput) -> anyhow::Result<TestOutcome>;

    /// Turn this cycle's readings into findings.
    fn analyze(&mut self, metrics: &MetricReadings) -> anyhow::Result<AnalyzeOutcome>;

    /// Apply changes suggested by the findings.
    fn apply(&mut self, findings: &Findings) -> anyhow::Result<ApplyOutcome>;

    /// Regression-check a just-finalized generation.
    fn validate(&mut self, generation: GenerationIndex) -> anyhow::Result<ValidateOutcome>;
}

impl<H: PhaseHooks + ?Sized> PhaseHooks for Box<H> {
    fn test(&mut self, input: &CycleInput) -> anyhow::Result<TestOutcome> {
        (**self).test(input)
    }

    fn analyze(&mut self, metrics: &MetricReadings) -> anyhow::Result<AnalyzeOutcome> {
        (**self).analyze(metrics)
    }

    fn apply(&mut self, findings: &Findings) -> anyhow::Result<ApplyOutcome> {
        (**self).apply(findings)
    }

    fn validate(&mut self, generation: GenerationIndex) -> anyhow::Result<ValidateOutcome> {
        (**self).validate(generation)
    }
}

/// Hooks that report success without doing any work.
#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultHooks;

impl PhaseHooks for DefaultHooks {
    fn test(&mut self, _input: &CycleInput) -> anyhow::Result<TestOutcome> {
        Ok(TestOutcome::passed())
    }

    fn analyze(&mut self, _metrics: &MetricReadings) -> anyhow::Result<AnalyzeOutcome> {
        Ok(AnalyzeOutcome::ok(Findings::Null))
    }

    fn apply(&mut self, _findings: &Findings) -> anyhow::Result<ApplyOutcome> {
        Ok(ApplyOutcome::unchanged())
    }

    fn validate(&mut self, _generation: GenerationIndex) -> anyhow::Result<ValidateOutcome> {
        Ok(ValidateOutcome { passed: true })
    }
}
