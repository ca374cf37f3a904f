//! Generation tracking service.

use lineage_core::{
    Error, GenerationIndex, GenerationSnapshot, GenerationStatus, MetricValue, Result, VersionId,
};
use tracing::{debug, info};

use crate::{MetricTrend, TrendSummary};

/// Callback invoked with each generation right after it is finalized.
pub type FinalizeListener = Box<dyn FnMut(&GenerationSnapshot) + Send>;

/// Owns the ordered history of a component's generations.
///
/// History is append-only: a generation is opened, receives metrics and
/// artifacts, and is finalized exactly once. At most one generation is open,
/// and it is always the last one.
pub struct GenerationTracker {
    component: String,
    history: Vec<GenerationSnapshot>,
    listeners: Vec<FinalizeListener>,
}

impl GenerationTracker {
    /// Create a tracker with an empty history.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            history: Vec::new(),
            listeners: Vec::new(),
        }
    }

    /// Rebuild a tracker from a persisted history.
    ///
    /// Indices must run `1..=N` without gaps, each generation's parent must be
    /// the one before it, and every snapshot must belong to `component`. Only
    /// the last generation may still be open. An open generation carries no
    /// outcome; a finalized one has a status and a finalization time.
    pub fn from_history(
        component: impl Into<String>,
        history: Vec<GenerationSnapshot>,
    ) -> Result<Self> {
        let component = component.into();
        for (pos, snap) in history.iter().enumerate() {
            check_restored(&component, pos, pos + 1 == history.len(), snap)?;
        }

        Ok(Self {
            component,
            history,
            listeners: Vec::new(),
        })
    }

    /// Register a callback run after every finalization.
    pub fn with_listener(mut self, listener: FinalizeListener) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Register a callback run after every finalization.
    pub fn add_listener(&mut self, listener: FinalizeListener) {
        self.listeners.push(listener);
    }

    /// Component label.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Open the next generation.
    ///
    /// Fails while another generation is still open.
    pub fn start_next_generation(&mut self) -> Result<&GenerationSnapshot> {
        if let Some(open) = self.current() {
            return Err(Error::InvalidState(format!(
                "generation {} of {} is still open",
                open.index, self.component
            )));
        }

        let parent = self.history.last().map(|s| s.index);
        let index = parent.map(GenerationIndex::next).unwrap_or(GenerationIndex::FIRST);

        info!("Starting generation {} for {}", index, self.component);
        self.history
            .push(GenerationSnapshot::open(self.component.clone(), index, parent));
        Ok(&self.history[self.history.len() - 1])
    }

    /// Append a metric reading to the open generation.
    pub fn log_metric(&mut self, name: impl Into<String>, value: impl Into<MetricValue>) -> Result<()> {
        let name = name.into();
        let value = value.into();
        let snap = self.open_generation_mut("log a metric")?;
        debug!("Generation {}: metric {} = {}", snap.index, name, value);
        snap.record_metric(name, value)
    }

    /// Append an artifact reference to the open generation.
    pub fn log_artifact(
        &mut self,
        kind: impl Into<String>,
        reference: impl Into<String>,
    ) -> Result<()> {
        let kind = kind.into();
        let reference = reference.into();
        let snap = self.open_generation_mut("log an artifact")?;
        debug!("Generation {}: artifact {} -> {}", snap.index, kind, reference);
        snap.record_artifact(kind, reference)
    }

    /// Freeze the open generation.
    ///
    /// `blueprint_version` is the blueprint committed at the time of the call.
    /// Fails without touching history when no generation is open.
    pub fn finalize_generation(
        &mut self,
        status: GenerationStatus,
        notes: impl Into<String>,
        blueprint_version: Option<VersionId>,
    ) -> Result<&GenerationSnapshot> {
        let component = &self.component;
        let snap = match self.history.last_mut() {
            Some(snap) if snap.is_open() => snap,
            _ => {
                return Err(Error::InvalidState(format!(
                    "no open generation of {} to finalize",
                    component
                )))
            }
        };

        snap.finalize(status, notes, blueprint_version)?;
        info!(
            "Finalized generation {} for {} as {} ({} metrics)",
            snap.index,
            component,
            status,
            snap.metrics.len()
        );

        for listener in &mut self.listeners {
            listener(&*snap);
        }
        Ok(snap)
    }

    /// The open generation, if any.
    pub fn current(&self) -> Option<&GenerationSnapshot> {
        self.history.last().filter(|s| s.is_open())
    }

    /// Index of the open generation, if any.
    pub fn current_generation(&self) -> Option<GenerationIndex> {
        self.current().map(|s| s.index)
    }

    /// Most recently finalized generation.
    pub fn latest_finalized(&self) -> Option<&GenerationSnapshot> {
        self.history.iter().rev().find(|s| !s.is_open())
    }

    /// Full ordered history, open generation included.
    pub fn get_history(&self) -> &[GenerationSnapshot] {
        &self.history
    }

    /// Look up a generation by index.
    pub fn get_generation(&self, index: GenerationIndex) -> Result<&GenerationSnapshot> {
        usize::try_from(index.get() - 1)
            .ok()
            .and_then(|pos| self.history.get(pos))
            .ok_or_else(|| {
                Error::NotFound(format!("generation {} of {}", index, self.component))
            })
    }

    /// Last numeric value of `name` per generation, in index order.
    pub fn get_metric_trend(&self, name: &str) -> MetricTrend<'_> {
        MetricTrend::new(&self.history, name)
    }

    /// Every recorded value of `name`, numeric or not, in recording order.
    pub fn metric_values<'a>(
        &'a self,
        name: &'a str,
    ) -> impl Iterator<Item = (GenerationIndex, &'a MetricValue)> + 'a {
        self.history.iter().flat_map(move |snap| {
            snap.metric(name)
                .unwrap_or(&[])
                .iter()
                .map(move |value| (snap.index, value))
        })
    }

    /// Aggregate view of a metric's trend.
    pub fn trend_summary(&self, name: &str) -> Option<TrendSummary> {
        self.get_metric_trend(name).summary()
    }

    /// Number of generations, open one included.
    pub fn len(&self) -> usize {
        self.history.len()
    }

    /// Whether no generation was ever started.
    pub fn is_empty(&self) -> bool {
        self.history.is_empty()
    }

    fn open_generation_mut(&mut self, action: &str) -> Result<&mut GenerationSnapshot> {
        match self.history.last_mut() {
            Some(snap) if snap.is_open() => Ok(snap),
            _ => Err(Error::InvalidState(format!(
                "cannot {} for {}: no open generation",
                action, self.component
            ))),
        }
    }
}

fn check_restored(
    component: &str,
    pos: usize,
    is_last: bool,
    snap: &GenerationSnapshot,
) -> Result<()> {
    let corrupt = |reason: String| Err(Error::CorruptHistory(reason));

    let expected = pos as u64 + 1;
    if snap.index.get() != expected {
        return corrupt(format!(
            "expected generation {} at position {}, found {}",
            expected, pos, snap.index
        ));
    }
    if snap.component != component {
        return corrupt(format!(
            "generation {} belongs to {}, not {}",
            snap.index, snap.component, component
        ));
    }
    let expected_parent = (pos > 0).then_some(pos as u64);
    if snap.parent.map(GenerationIndex::get) != expected_parent {
        return corrupt(format!(
            "generation {} has parent {:?}, expected {:?}",
            snap.index,
            snap.parent.map(GenerationIndex::get),
            expected_parent
        ));
    }

    if snap.is_open() {
        if !is_last {
            return corrupt(format!(
                "generation {} is open but is not the latest",
                snap.index
            ));
        }
        if snap.status.is_some() || snap.finalized_at.is_some() || snap.blueprint_version.is_some() {
            return corrupt(format!(
                "open generation {} carries finalization data",
                snap.index
            ));
        }
    } else if snap.status.is_none() || snap.finalized_at.is_none() {
        return corrupt(format!(
            "finalized generation {} has no status or finalization time",
            snap.index
        ));
    }
    Ok(())
}

impl std::fmt::Debug for GenerationTracker {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GenerationTracker")
            .field("component", &self.component)
            .field("history", &self.history)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}
