//! The improvement loop - drives one tracker through the five phases.

use lineage_blueprint::{BlueprintDiff, BlueprintStore};
use lineage_core::{
    CycleId, Error, GenerationIndex, GenerationStatus, Phase, Result, VersionId,
};
use lineage_tracker::GenerationTracker;
use tracing::{debug, info, warn};

use crate::hooks::{CycleInput, Findings, PhaseHooks};

/// Configuration for the improvement loop.
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Cap on cycles over the loop's lifetime (None = unbounded)
    pub max_cycles: Option<usize>,
    /// Stop a multi-cycle run after a FAILED generation or an aborted cycle
    pub stop_on_failure: bool,
    /// Run VALIDATE for generations finalized as PARTIAL
    pub validate_partial: bool,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_cycles: None,
            stop_on_failure: false,
            validate_partial: true,
        }
    }
}

/// Result of a single improvement cycle.
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Correlates log lines of one cycle
    pub cycle_id: CycleId,
    /// Generation the cycle worked on
    pub generation_index: Option<GenerationIndex>,
    /// Status stamped by ADVANCE; `None` if the cycle stopped earlier
    pub status: Option<GenerationStatus>,
    /// Findings produced by ANALYZE
    pub findings: Option<Findings>,
    /// VALIDATE verdict; `None` if VALIDATE did not run to completion
    pub validation_result: Option<bool>,
    /// Phases that ran to completion, in order
    pub completed_phases: Vec<Phase>,
    /// Blueprint committed by APPLY
    pub blueprint_version: Option<VersionId>,
    /// Difference between the previous blueprint and the one APPLY committed
    pub blueprint_diff: Option<BlueprintDiff>,
    /// First hook failure, reported or raised
    pub failure: Option<Error>,
    /// Phase at which the cycle was cut short
    pub aborted_at: Option<Phase>,
}

impl CycleReport {
    fn new() -> Self {
        Self {
            cycle_id: CycleId::new(),
            generation_index: None,
            status: None,
            findings: None,
            validation_result: None,
            completed_phases: Vec::new(),
            blueprint_version: None,
            blueprint_diff: None,
            failure: None,
            aborted_at: None,
        }
    }

    /// Whether every scheduled phase ran.
    pub fn is_complete(&self) -> bool {
        self.aborted_at.is_none()
    }

    /// Whether the cycle ended in a failed generation or was aborted.
    pub fn is_failure(&self) -> bool {
        self.aborted_at.is_some() || self.status == Some(GenerationStatus::Failed)
    }
}

/// Drives the fixed phase sequence:
/// ```text
/// TEST → ANALYZE → APPLY → ADVANCE → VALIDATE
/// ```
///
/// The loop owns its hooks and transient per-cycle state. The tracker and
/// blueprint store are borrowed for the duration of a cycle.
pub struct ImprovementLoop<H: PhaseHooks> {
    hooks: H,
    config: LoopConfig,
    phase: Phase,
    completed: Vec<Phase>,
    cycles_run: usize,
}

impl<H: PhaseHooks> ImprovementLoop<H> {
    /// Create a loop around a set of hooks.
    pub fn new(hooks: H) -> Self {
        Self {
            hooks,
            config: LoopConfig::default(),
            phase: Phase::Test,
            completed: Vec::new(),
            cycles_run: 0,
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    /// Run one cycle against `tracker` and `store`.
    ///
    /// Hook failures end up in the report. `Err` is returned only for
    /// tracker or store misuse.
    pub fn run_cycle(
        &mut self,
        tracker: &mut GenerationTracker,
        store: &mut BlueprintStore,
        input: &CycleInput,
    ) -> Result<CycleReport> {
        self.phase = Phase::Test;
        self.completed.clear();

        let mut report = CycleReport::new();
        info!(
            "Starting improvement cycle {} ({}) for {}",
            self.cycles_run + 1,
            report.cycle_id,
            tracker.component()
        );

        // 1. TEST
        self.enter(Phase::Test);
        let tested = match self.hooks.test(input) {
            Ok(outcome) => outcome,
            Err(e) => return Ok(self.abort(report, Phase::Test, e.to_string())),
        };
        if let Some((name, value)) = tested.metrics.iter().find(|(_, v)| !v.is_finite()) {
            let message = format!("metric {} is not a finite number: {}", name, value);
            return Ok(self.abort(report, Phase::Test, message));
        }
        let index = ensure_open(tracker)?;
        report.generation_index = Some(index);
        for (name, value) in &tested.metrics {
            tracker.log_metric(name.as_str(), value.clone())?;
        }
        for (kind, reference) in &tested.artifacts {
            tracker.log_artifact(kind.as_str(), reference.as_str())?;
        }
        self.complete(&mut report, Phase::Test);

        let mut status = GenerationStatus::Success;
        let mut notes = Vec::new();

        if !tested.ok {
            warn!("Test phase reported failure for generation {}, skipping ANALYZE and APPLY", index);
            report.failure = Some(Error::hook(Phase::Test, "test hook reported failure"));
            status = GenerationStatus::Failed;
            notes.push("test phase reported failure".to_string());
        } else {
            // 2. ANALYZE
            self.enter(Phase::Analyze);
            let analysis = match self.hooks.analyze(&tested.metrics) {
                Ok(outcome) => outcome,
                Err(e) => return Ok(self.abort(report, Phase::Analyze, e.to_string())),
            };
            report.findings = Some(analysis.findings.clone());
            if !analysis.ok {
                return Ok(self.abort(report, Phase::Analyze, "analyze hook reported failure"));
            }
            self.complete(&mut report, Phase::Analyze);

            // 3. APPLY
            self.enter(Phase::Apply);
            let applied = match self.hooks.apply(&analysis.findings) {
                Ok(outcome) => outcome,
                Err(e) => return Ok(self.abort(report, Phase::Apply, e.to_string())),
            };
            if applied.ok {
                if let Some(config) = applied.new_config {
                    let previous = store.latest_id();
                    let committed = store.commit(config).version_id;
                    report.blueprint_version = Some(committed);
                    if let Some(previous) = previous {
                        report.blueprint_diff = Some(store.diff(previous, committed)?);
                    }
                } else {
                    debug!("Apply phase left the blueprint unchanged");
                }
                notes.extend(applied.changes);
            } else {
                warn!("Apply phase reported failure for generation {}", index);
                report.failure = Some(Error::hook(Phase::Apply, "apply hook reported failure"));
                status = GenerationStatus::Partial;
                notes.push("apply phase reported failure".to_string());
            }
            self.complete(&mut report, Phase::Apply);
        }

        // 4. ADVANCE
        self.enter(Phase::Advance);
        ensure_open(tracker)?;
        let finalized = tracker
            .finalize_generation(status, notes.join("\n"), store.latest_id())?
            .index;
        report.generation_index = Some(finalized);
        report.status = Some(status);
        self.complete(&mut report, Phase::Advance);

        // 5. VALIDATE
        let validate = match status {
            GenerationStatus::Success => true,
            GenerationStatus::Partial => self.config.validate_partial,
            GenerationStatus::Failed => false,
        };
        if validate {
            self.enter(Phase::Validate);
            match self.hooks.validate(finalized) {
                Ok(outcome) => report.validation_result = Some(outcome.passed),
                Err(e) => return Ok(self.abort(report, Phase::Validate, e.to_string())),
            }
            self.complete(&mut report, Phase::Validate);
        } else {
            debug!("Skipping VALIDATE for {} generation {}", status, finalized);
        }

        self.cycles_run += 1;
        self.phase = Phase::Test;
        info!(
            "Cycle {} complete: generation {} {} (validated: {:?})",
            report.cycle_id, finalized, status, report.validation_result
        );
        Ok(report)
    }

    /// Phase the loop is in, or stopped at after an aborted cycle.
    pub fn current_phase(&self) -> Phase {
        self.phase
    }

    /// Phases completed so far in the current cycle.
    pub fn completed_phases(&self) -> &[Phase] {
        &self.completed
    }

    /// Cycles that ran to completion.
    pub fn cycles(&self) -> usize {
        self.cycles_run
    }

    /// Configuration in use.
    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    /// The hooks.
    pub fn hooks(&self) -> &H {
        &self.hooks
    }

    /// Mutable access to the hooks.
    pub fn hooks_mut(&mut self) -> &mut H {
        &mut self.hooks
    }

    /// Consume the loop, returning its hooks.
    pub fn into_hooks(self) -> H {
        self.hooks
    }

    fn enter(&mut self, phase: Phase) {
        debug!("Entering phase {}", phase);
        self.phase = phase;
    }

    fn complete(&mut self, report: &mut CycleReport, phase: Phase) {
        self.completed.push(phase);
        report.completed_phases.push(phase);
    }

    fn abort(&mut self, mut report: CycleReport, phase: Phase, message: impl Into<String>) -> CycleReport {
        let failure = Error::hook(phase, message);
        warn!("Cycle {} aborted: {}", report.cycle_id, failure);
        report.failure = Some(failure);
        report.aborted_at = Some(phase);
        report
    }
}

fn ensure_open(tracker: &mut GenerationTracker) -> Result<GenerationIndex> {
    match tracker.current_generation() {
        Some(index) => {
            debug!("Reusing open generation {}", index);
            Ok(index)
        }
        None => Ok(tracker.start_next_generation()?.index),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hooks::{AnalyzeOutcome, ApplyOutcome, MetricReadings, TestOutcome, ValidateOutcome};
    use serde_json::json;

    /// Hooks driven by per-test settings, recording the phases they saw.
    #[derive(Default)]
    struct ScriptedHooks {
        calls: Vec<Phase>,
        test_ok: Option<bool>,
        test_raises: bool,
        extra_reading: Option<f64>,
        analyze_ok: Option<bool>,
        apply_ok: Option<bool>,
        apply_raises: bool,
        new_config: Option<serde_json::Value>,
        validate_passes: Option<bool>,
        validate_raises: bool,
        seen_metrics: Option<MetricReadings>,
        seen_findings: Option<Findings>,
        validated: Vec<GenerationIndex>,
    }

    impl PhaseHooks for ScriptedHooks {
        fn test(&mut self, input: &CycleInput) -> anyhow::Result<TestOutcome> {
            self.calls.push(Phase::Test);
            if self.test_raises {
                anyhow::bail!("suite crashed");
            }
            let round = input.get("round").and_then(|v| v.as_u64()).unwrap_or(0);
            let mut outcome = TestOutcome {
                ok: self.test_ok.unwrap_or(true),
                ..TestOutcome::default()
            }
            .with_metric("coverage", 0.70 + round as f64 * 0.05)
            .with_metric("avg_latency_ms", 200 - round as i64 * 20)
            .with_artifact("test_report", format!("reports/round-{}.xml", round));
            if let Some(reading) = self.extra_reading {
                outcome = outcome.with_metric("ratio", reading);
            }
            Ok(outcome)
        }

        fn analyze(&mut self, metrics: &MetricReadings) -> anyhow::Result<AnalyzeOutcome> {
            self.calls.push(Phase::Analyze);
            self.seen_metrics = Some(metrics.clone());
            Ok(AnalyzeOutcome {
                findings: json!({"recommendations": ["optimize_processing"]}),
                ok: self.analyze_ok.unwrap_or(true),
            })
        }

        fn apply(&mut self, findings: &Findings) -> anyhow::Result<ApplyOutcome> {
            self.calls.push(Phase::Apply);
            self.seen_findings = Some(findings.clone());
            if self.apply_raises {
                anyhow::bail!("patch did not apply");
            }
            Ok(ApplyOutcome {
                new_config: self.new_config.clone().and_then(|v| v.as_object().cloned()),
                changes: vec!["Refactored loop for O(n) complexity".to_string()],
                ok: self.apply_ok.unwrap_or(true),
            })
        }

        fn validate(&mut self, generation: GenerationIndex) -> anyhow::Result<ValidateOutcome> {
            self.calls.push(Phase::Validate);
            self.validated.push(generation);
            if self.validate_raises {
                anyhow::bail!("regression suite unavailable");
            }
            Ok(ValidateOutcome {
                passed: self.validate_passes.unwrap_or(true),
            })
        }
    }

    fn setup(hooks: ScriptedHooks) -> (ImprovementLoop<ScriptedHooks>, GenerationTracker, BlueprintStore) {
        (
            ImprovementLoop::new(hooks),
            GenerationTracker::new("TestComponent"),
            BlueprintStore::new("TestComponent"),
        )
    }

    #[test]
    fn test_full_cycle_runs_every_phase_in_order() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            new_config: Some(json!({"pipeline": {"process": "vectorized"}})),
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &json!({"round": 1})).unwrap();

        assert_eq!(
            lp.hooks().calls,
            [Phase::Test, Phase::Analyze, Phase::Apply, Phase::Validate]
        );
        assert_eq!(report.completed_phases, Phase::ALL);
        assert!(report.is_complete());
        assert!(report.failure.is_none());
        assert_eq!(report.generation_index, Some(GenerationIndex::FIRST));
        assert_eq!(report.status, Some(GenerationStatus::Success));
        assert_eq!(report.validation_result, Some(true));
        assert_eq!(report.findings, Some(json!({"recommendations": ["optimize_processing"]})));
        assert_eq!(report.blueprint_version, Some(VersionId::FIRST));
        assert!(report.blueprint_diff.is_none());

        assert_eq!(lp.current_phase(), Phase::Test);
        assert_eq!(lp.cycles(), 1);

        let snap = tracker.get_generation(GenerationIndex::FIRST).unwrap();
        assert!(!snap.is_open());
        assert_eq!(snap.last_numeric("avg_latency_ms"), Some(180.0));
        assert_eq!(snap.artifacts_of("test_report"), ["reports/round-1.xml"]);
        assert_eq!(snap.notes, "Refactored loop for O(n) complexity");
        assert_eq!(snap.blueprint_version, Some(VersionId::FIRST));
    }

    #[test]
    fn test_analyze_sees_test_metrics_and_apply_sees_findings() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks::default());
        lp.run_cycle(&mut tracker, &mut store, &json!({"round": 2})).unwrap();

        let metrics = lp.hooks().seen_metrics.clone().unwrap();
        assert_eq!(metrics.len(), 2);
        assert_eq!(metrics.get("avg_latency_ms").and_then(|v| v.as_number()), Some(160.0));
        assert_eq!(
            lp.hooks().seen_findings,
            Some(json!({"recommendations": ["optimize_processing"]}))
        );
    }

    #[test]
    fn test_failed_tests_finalize_failed_and_skip_later_hooks() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            test_ok: Some(false),
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(lp.hooks().calls, [Phase::Test]);
        assert_eq!(report.completed_phases, [Phase::Test, Phase::Advance]);
        assert_eq!(report.status, Some(GenerationStatus::Failed));
        assert!(report.validation_result.is_none());
        assert!(report.findings.is_none());
        assert!(report.is_complete());
        assert!(report.is_failure());
        assert!(matches!(
            report.failure,
            Some(Error::HookFailure { phase: Phase::Test, .. })
        ));

        let snap = tracker.get_generation(GenerationIndex::FIRST).unwrap();
        assert_eq!(snap.status, Some(GenerationStatus::Failed));
        assert!(snap.metric("coverage").is_some());
        assert!(store.is_empty());
    }

    #[test]
    fn test_raised_test_hook_aborts_without_opening_generation() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            test_raises: true,
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(report.aborted_at, Some(Phase::Test));
        assert!(report.completed_phases.is_empty());
        assert!(report.generation_index.is_none());
        assert!(tracker.is_empty());
        assert_eq!(lp.current_phase(), Phase::Test);
        assert_eq!(lp.cycles(), 0);
    }

    #[test]
    fn test_non_finite_reading_aborts_before_opening_generation() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            extra_reading: Some(f64::NAN),
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(report.aborted_at, Some(Phase::Test));
        assert!(matches!(
            report.failure,
            Some(Error::HookFailure { phase: Phase::Test, .. })
        ));
        assert!(tracker.is_empty());
        assert_eq!(lp.hooks().calls, [Phase::Test]);
    }

    #[test]
    fn test_failed_analysis_aborts_and_leaves_generation_open() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            analyze_ok: Some(false),
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(lp.hooks().calls, [Phase::Test, Phase::Analyze]);
        assert_eq!(report.aborted_at, Some(Phase::Analyze));
        assert_eq!(lp.current_phase(), Phase::Analyze);
        assert_eq!(lp.completed_phases(), [Phase::Test]);
        assert!(report.status.is_none());
        assert_eq!(tracker.current_generation(), Some(GenerationIndex::FIRST));
    }

    #[test]
    fn test_retry_reuses_open_generation() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            apply_raises: true,
            ..Default::default()
        });

        let first = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();
        assert_eq!(first.aborted_at, Some(Phase::Apply));
        assert_eq!(tracker.current_generation(), Some(GenerationIndex::FIRST));

        lp.hooks_mut().apply_raises = false;
        let second = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert!(second.is_complete());
        assert_eq!(second.generation_index, Some(GenerationIndex::FIRST));
        assert_eq!(tracker.len(), 1);
        // Both attempts logged into the same generation.
        let snap = tracker.get_generation(GenerationIndex::FIRST).unwrap();
        assert_eq!(snap.metric("coverage").map(<[_]>::len), Some(2));
    }

    #[test]
    fn test_failed_apply_finalizes_partial_without_commit() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            apply_ok: Some(false),
            new_config: Some(json!({"ignored": true})),
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(report.status, Some(GenerationStatus::Partial));
        assert!(store.is_empty());
        assert!(report.blueprint_version.is_none());
        assert_eq!(report.validation_result, Some(true));
        assert!(matches!(
            report.failure,
            Some(Error::HookFailure { phase: Phase::Apply, .. })
        ));
    }

    #[test]
    fn test_partial_generation_validation_is_configurable() {
        let (lp, mut tracker, mut store) = setup(ScriptedHooks {
            apply_ok: Some(false),
            ..Default::default()
        });
        let mut lp = lp.with_config(LoopConfig {
            validate_partial: false,
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();
        assert!(report.validation_result.is_none());
        assert!(!lp.hooks().calls.contains(&Phase::Validate));
    }

    #[test]
    fn test_validation_result_stays_out_of_tracker() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            validate_passes: Some(false),
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(report.validation_result, Some(false));
        assert_eq!(lp.hooks().validated, [GenerationIndex::FIRST]);
        let snap = tracker.get_generation(GenerationIndex::FIRST).unwrap();
        assert!(snap.metric("regression_passed").is_none());
        assert!(tracker.current().is_none());
    }

    #[test]
    fn test_raised_validate_hook_keeps_finalized_generation() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            validate_raises: true,
            ..Default::default()
        });

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(report.aborted_at, Some(Phase::Validate));
        assert_eq!(report.status, Some(GenerationStatus::Success));
        assert!(report.validation_result.is_none());
        assert!(tracker.current().is_none());
    }

    #[test]
    fn test_second_commit_reports_diff() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks {
            new_config: Some(json!({"name": "DataProcessor", "cache": false})),
            ..Default::default()
        });
        lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        lp.hooks_mut().new_config = Some(json!({"name": "DataProcessor", "cache": true}));
        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();

        assert_eq!(report.blueprint_version, Some(VersionId::new(2)));
        let diff = report.blueprint_diff.unwrap();
        assert_eq!(diff.from, VersionId::FIRST);
        assert_eq!(diff.summary().changed, 1);
        assert_eq!(
            tracker.get_generation(GenerationIndex::new(2).unwrap()).unwrap().blueprint_version,
            Some(VersionId::new(2))
        );
    }

    #[test]
    fn test_generation_without_new_config_keeps_latest_blueprint() {
        let (mut lp, mut tracker, mut store) = setup(ScriptedHooks::default());
        store.commit(json!({"seed": 1}).as_object().cloned().unwrap());

        let report = lp.run_cycle(&mut tracker, &mut store, &CycleInput::Null).unwrap();
        assert!(report.blueprint_version.is_none());
        assert_eq!(
            tracker.get_generation(GenerationIndex::FIRST).unwrap().blueprint_version,
            Some(VersionId::FIRST)
        );
    }
}
