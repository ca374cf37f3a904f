//! Append-only store of blueprint versions.

use lineage_core::{BlueprintContent, BlueprintVersion, Error, Result, VersionId};
use tracing::{debug, info};

use crate::BlueprintDiff;

/// Versions immutable configuration documents for one component.
///
/// Versions are never edited or removed, so any two of them can be diffed
/// at any time.
#[derive(Debug, Clone)]
pub struct BlueprintStore {
    component: String,
    versions: Vec<BlueprintVersion>,
}

impl BlueprintStore {
    /// Create an empty store.
    pub fn new(component: impl Into<String>) -> Self {
        Self {
            component: component.into(),
            versions: Vec::new(),
        }
    }

    /// Rebuild a store from previously committed versions.
    ///
    /// Version ids start at `v1` or later and must be strictly increasing.
    pub fn from_versions(
        component: impl Into<String>,
        versions: Vec<BlueprintVersion>,
    ) -> Result<Self> {
        if let Some(first) = versions.first().filter(|v| v.version_id < VersionId::FIRST) {
            return Err(Error::CorruptHistory(format!(
                "blueprint version {} precedes {}",
                first.version_id,
                VersionId::FIRST
            )));
        }
        for pair in versions.windows(2) {
            if pair[1].version_id <= pair[0].version_id {
                return Err(Error::CorruptHistory(format!(
                    "blueprint version {} follows {}",
                    pair[1].version_id, pair[0].version_id
                )));
            }
        }

        Ok(Self {
            component: component.into(),
            versions,
        })
    }

    /// Component label.
    pub fn component(&self) -> &str {
        &self.component
    }

    /// Commit a new document and return the created version.
    pub fn commit(&mut self, content: BlueprintContent) -> &BlueprintVersion {
        let version_id = self
            .versions
            .last()
            .map(|v| v.version_id.next())
            .unwrap_or(VersionId::FIRST);

        info!(
            "Committed blueprint {} for {} ({} keys)",
            version_id,
            self.component,
            content.len()
        );

        self.versions.push(BlueprintVersion {
            version_id,
            content,
            created_at: chrono::Utc::now(),
        });
        &self.versions[self.versions.len() - 1]
    }

    /// Look up a committed version.
    pub fn get(&self, version_id: VersionId) -> Result<&BlueprintVersion> {
        self.versions
            .binary_search_by_key(&version_id, |v| v.version_id)
            .map(|pos| &self.versions[pos])
            .map_err(|_| {
                Error::NotFound(format!(
                    "blueprint {} of {}",
                    version_id, self.component
                ))
            })
    }

    /// Most recently committed version, or `None` before the first commit.
    pub fn latest(&self) -> Option<&BlueprintVersion> {
        self.versions.last()
    }

    /// Id of the most recently committed version.
    pub fn latest_id(&self) -> Option<VersionId> {
        self.latest().map(|v| v.version_id)
    }

    /// Every committed version, oldest first.
    pub fn versions(&self) -> &[BlueprintVersion] {
        &self.versions
    }

    /// Number of committed versions.
    pub fn len(&self) -> usize {
        self.versions.len()
    }

    /// Whether nothing has been committed yet.
    pub fn is_empty(&self) -> bool {
        self.versions.is_empty()
    }

    /// Structural difference from `from` to `to`.
    pub fn diff(&self, from: VersionId, to: VersionId) -> Result<BlueprintDiff> {
        let old = self.get(from)?;
        let new = self.get(to)?;
        let diff = BlueprintDiff::compute(from, to, &old.content, &new.content);
        debug!(
            "Diffed blueprint {} -> {} for {}: {}",
            from,
            to,
            self.component,
            diff.summary()
        );
        Ok(diff)
    }

    /// Re-commit the content of an older version as the newest version.
    pub fn rollback(&mut self, version_id: VersionId) -> Result<&BlueprintVersion> {
        let content = self.get(version_id)?.content.clone();
        info!("Rolling back {} to blueprint {}", self.component, version_id);
        Ok(self.commit(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::DiffKind;
    use serde_json::{json, Value};

    fn doc(value: Value) -> BlueprintContent {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_commit_assigns_increasing_ids() {
        let mut store = BlueprintStore::new("DataProcessor");
        assert!(store.latest().is_none());

        let v1 = store.commit(doc(json!({"name": "DataProcessor"}))).version_id;
        let v2 = store.commit(doc(json!({"name": "DataProcessor", "version": "2.0"}))).version_id;

        assert_eq!(v1, VersionId::FIRST);
        assert_eq!(v2, VersionId::new(2));
        assert_eq!(store.latest_id(), Some(v2));
        assert_eq!(store.len(), 2);
    }

    #[test]
    fn test_get_missing_version() {
        let mut store = BlueprintStore::new("DataProcessor");
        store.commit(doc(json!({"a": 1})));
        assert!(matches!(store.get(VersionId::new(9)), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_diff_requires_committed_versions() {
        let mut store = BlueprintStore::new("DataProcessor");
        let v1 = store.commit(doc(json!({"a": 1}))).version_id;

        assert!(matches!(store.diff(v1, VersionId::new(2)), Err(Error::NotFound(_))));
        assert!(matches!(store.diff(VersionId::new(0), v1), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_diff_against_itself_is_all_unchanged() {
        let mut store = BlueprintStore::new("DataProcessor");
        let content = doc(json!({
            "name": "DataProcessor",
            "pipeline": {"ingest": "file_reader", "output": "console_writer"},
            "steps": [1, 2, 3]
        }));
        let v1 = store.commit(content.clone()).version_id;

        assert_eq!(store.get(v1).map(|v| &v.content), Ok(&content));

        let diff = store.diff(v1, v1).unwrap();
        assert!(diff.is_identical());
        assert!(diff
            .entries
            .iter()
            .all(|e| matches!(e.kind, DiffKind::Unchanged { .. })));
        assert_eq!(diff.entries.len(), 4);
    }

    #[test]
    fn test_rollback_appends_copy() {
        let mut store = BlueprintStore::new("DataProcessor");
        let v1 = store.commit(doc(json!({"mode": "safe"}))).version_id;
        store.commit(doc(json!({"mode": "fast"})));

        let v3 = store.rollback(v1).unwrap().version_id;
        assert_eq!(v3, VersionId::new(3));
        assert!(store.diff(v1, v3).unwrap().is_identical());
        assert_eq!(store.len(), 3);
    }

    #[test]
    fn test_from_versions_rejects_unordered_ids() {
        let mut store = BlueprintStore::new("DataProcessor");
        store.commit(doc(json!({"a": 1})));
        store.commit(doc(json!({"a": 2})));

        let mut versions = store.versions().to_vec();
        versions.reverse();
        assert!(matches!(
            BlueprintStore::from_versions("DataProcessor", versions),
            Err(Error::CorruptHistory(_))
        ));

        let mut restored =
            BlueprintStore::from_versions("DataProcessor", store.versions().to_vec()).unwrap();
        assert_eq!(restored.latest_id(), Some(VersionId::new(2)));
        assert_eq!(restored.commit(doc(json!({"a": 3}))).version_id, VersionId::new(3));
    }

    #[test]
    fn test_from_versions_rejects_zero_id() {
        let mut store = BlueprintStore::new("DataProcessor");
        store.commit(doc(json!({"a": 1})));

        let mut versions = store.versions().to_vec();
        versions[0].version_id = VersionId::new(0);
        assert!(matches!(
            BlueprintStore::from_versions("DataProcessor", versions),
            Err(Error::CorruptHistory(_))
        ));
    }
}
