//! Generation model - one labeled checkpoint in a component's evolution.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::id::{GenerationIndex, VersionId};
use crate::metric::MetricValue;
use crate::Time;

/// One completed or in-progress generation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationSnapshot {
    /// Position in history, starting at 1
    pub index: GenerationIndex,

    /// Component this generation belongs to
    pub component: String,

    /// Lifecycle state
    pub state: GenerationState,

    /// Outcome stamped at finalization
    pub status: Option<GenerationStatus>,

    /// Every recorded value, per metric name, in recording order
    pub metrics: BTreeMap<String, Vec<MetricValue>>,

    /// Artifact references, per artifact kind, in recording order
    pub artifacts: BTreeMap<String, Vec<String>>,

    /// Free-text notes set at finalization
    pub notes: String,

    /// Blueprint version active when the generation was finalized
    pub blueprint_version: Option<VersionId>,

    /// Previous generation, if any
    pub parent: Option<GenerationIndex>,

    /// When the generation was opened
    pub started_at: Time,

    /// When the generation was finalized
    pub finalized_at: Option<Time>,
}

/// Lifecycle state of a generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationState {
    /// Accepting metrics and artifacts
    Open,
    /// Immutable
    Finalized,
}

/// Outcome recorded when a generation is finalized.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GenerationStatus {
    /// Every phase succeeded
    Success,
    /// Tests reported failure
    Failed,
    /// Changes could not be fully applied
    Partial,
}

impl std::fmt::Display for GenerationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GenerationStatus::Success => "SUCCESS",
            GenerationStatus::Failed => "FAILED",
            GenerationStatus::Partial => "PARTIAL",
        })
    }
}

impl std::str::FromStr for GenerationStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "success" => Ok(GenerationStatus::Success),
            "failed" => Ok(GenerationStatus::Failed),
            "partial" => Ok(GenerationStatus::Partial),
            other => Err(format!("unknown generation status '{}'", other)),
        }
    }
}

impl GenerationSnapshot {
    /// Open a new generation.
    pub fn open(
        component: impl Into<String>,
        index: GenerationIndex,
        parent: Option<GenerationIndex>,
    ) -> Self {
        Self {
            index,
            component: component.into(),
            state: GenerationState::Open,
            status: None,
            metrics: BTreeMap::new(),
            artifacts: BTreeMap::new(),
            notes: String::new(),
            blueprint_version: None,
            parent,
            started_at: chrono::Utc::now(),
            finalized_at: None,
        }
    }

    /// Whether the generation still accepts metrics and artifacts.
    pub fn is_open(&self) -> bool {
        self.state == GenerationState::Open
    }

    /// Append a metric reading.
    ///
    /// Numbers must be finite; NaN and infinities have no JSON form.
    pub fn record_metric(&mut self, name: impl Into<String>, value: MetricValue) -> Result<()> {
        self.ensure_open("log a metric on")?;
        let name = name.into();
        if !value.is_finite() {
            return Err(Error::InvalidState(format!(
                "metric {} of generation {} is not finite: {}",
                name, self.index, value
            )));
        }
        self.metrics.entry(name).or_default().push(value);
        Ok(())
    }

    /// Append an artifact reference.
    pub fn record_artifact(
        &mut self,
        kind: impl Into<String>,
        reference: impl Into<String>,
    ) -> Result<()> {
        self.ensure_open("log an artifact on")?;
        self.artifacts.entry(kind.into()).or_default().push(reference.into());
        Ok(())
    }

    /// Freeze the generation. Fails if it is already finalized.
    pub fn finalize(
        &mut self,
        status: GenerationStatus,
        notes: impl Into<String>,
        blueprint_version: Option<VersionId>,
    ) -> Result<()> {
        self.ensure_open("finalize")?;
        self.state = GenerationState::Finalized;
        self.status = Some(status);
        self.notes = notes.into();
        self.blueprint_version = blueprint_version;
        self.finalized_at = Some(chrono::Utc::now());
        Ok(())
    }

    /// All readings recorded under `name`.
    pub fn metric(&self, name: &str) -> Option<&[MetricValue]> {
        self.metrics.get(name).map(Vec::as_slice)
    }

    /// The last reading recorded under `name`.
    pub fn last_value(&self, name: &str) -> Option<&MetricValue> {
        self.metrics.get(name).and_then(|values| values.last())
    }

    /// The last numeric reading recorded under `name`.
    pub fn last_numeric(&self, name: &str) -> Option<f64> {
        self.metrics
            .get(name)?
            .iter()
            .rev()
            .find_map(MetricValue::as_number)
    }

    /// Artifact references recorded under `kind`.
    pub fn artifacts_of(&self, kind: &str) -> &[String] {
        self.artifacts.get(kind).map(Vec::as_slice).unwrap_or(&[])
    }

    fn ensure_open(&self, action: &str) -> Result<()> {
        if self.is_open() {
            Ok(())
        } else {
            Err(Error::InvalidState(format!(
                "cannot {} generation {}: already finalized",
                action, self.index
            )))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_snapshot() -> GenerationSnapshot {
        GenerationSnapshot::open("parser", GenerationIndex::FIRST, None)
    }

    #[test]
    fn test_metrics_keep_every_reading() {
        let mut snap = open_snapshot();
        snap.record_metric("coverage", 0.1.into()).unwrap();
        snap.record_metric("coverage", 0.3.into()).unwrap();

        assert_eq!(snap.metric("coverage").map(<[_]>::len), Some(2));
        assert_eq!(snap.last_numeric("coverage"), Some(0.3));
    }

    #[test]
    fn test_last_numeric_skips_text() {
        let mut snap = open_snapshot();
        snap.record_metric("latency", 120.into()).unwrap();
        snap.record_metric("latency", "timeout".into()).unwrap();

        assert_eq!(snap.last_value("latency"), Some(&MetricValue::from("timeout")));
        assert_eq!(snap.last_numeric("latency"), Some(120.0));
    }

    #[test]
    fn test_finalized_snapshot_rejects_mutation() {
        let mut snap = open_snapshot();
        snap.record_artifact("build_log", "logs/build-1.txt").unwrap();
        snap.finalize(GenerationStatus::Success, "first cut", Some(VersionId::FIRST))
            .unwrap();

        assert!(!snap.is_open());
        assert!(snap.finalized_at.is_some());
        assert!(matches!(
            snap.record_metric("coverage", 1.0.into()),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            snap.record_artifact("build_log", "again"),
            Err(Error::InvalidState(_))
        ));
        assert!(matches!(
            snap.finalize(GenerationStatus::Failed, "twice", None),
            Err(Error::InvalidState(_))
        ));
        assert_eq!(snap.status, Some(GenerationStatus::Success));
        assert_eq!(snap.artifacts_of("build_log"), ["logs/build-1.txt"]);
    }

    #[test]
    fn test_non_finite_numbers_are_rejected() {
        let mut snap = open_snapshot();
        for value in [f64::NAN, f64::INFINITY, f64::NEG_INFINITY] {
            assert!(matches!(
                snap.record_metric("ratio", value.into()),
                Err(Error::InvalidState(_))
            ));
        }
        assert!(snap.metric("ratio").is_none());

        snap.record_metric("ratio", 0.5.into()).unwrap();
        assert_eq!(snap.last_numeric("ratio"), Some(0.5));
    }

    #[test]
    fn test_status_parse() {
        assert_eq!("partial".parse::<GenerationStatus>().unwrap(), GenerationStatus::Partial);
        assert_eq!("FAILED".parse::<GenerationStatus>().unwrap(), GenerationStatus::Failed);
        assert!("stable".parse::<GenerationStatus>().is_err());
    }
}
