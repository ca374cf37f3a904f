//! Persisted form of a component's history.

use lineage_blueprint::BlueprintStore;
use lineage_core::{BlueprintVersion, Error, GenerationSnapshot, Time};
use lineage_tracker::GenerationTracker;
use serde::{Deserialize, Serialize};

use crate::Result;

/// Everything needed to resume a component: its generations and its
/// committed blueprints.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentRecord {
    /// Component label
    pub component: String,

    /// Generation history, oldest first
    pub generations: Vec<GenerationSnapshot>,

    /// Committed blueprint versions, oldest first
    pub blueprints: Vec<BlueprintVersion>,

    /// When the record was captured
    pub saved_at: Time,
}

impl ComponentRecord {
    /// Capture the current state of a tracker and its blueprint store.
    pub fn capture(tracker: &GenerationTracker, blueprints: &BlueprintStore) -> Result<Self> {
        if tracker.component() != blueprints.component() {
            return Err(Error::InvalidState(format!(
                "tracker for {} does not match blueprints for {}",
                tracker.component(),
                blueprints.component()
            ))
            .into());
        }

        Ok(Self {
            component: tracker.component().to_string(),
            generations: tracker.get_history().to_vec(),
            blueprints: blueprints.versions().to_vec(),
            saved_at: chrono::Utc::now(),
        })
    }

    /// Rebuild the tracker and blueprint store, checking history invariants.
    pub fn restore(self) -> Result<(GenerationTracker, BlueprintStore)> {
        let tracker = GenerationTracker::from_history(self.component.clone(), self.generations)?;
        let blueprints = BlueprintStore::from_versions(self.component, self.blueprints)?;
        Ok((tracker, blueprints))
    }
}
