//! Structural diff between two committed blueprint versions.

use lineage_core::{BlueprintContent, VersionId};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// How one key differs between two versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum DiffKind {
    /// Present only in the newer version
    Added {
        /// Value in the newer version
        value: Value,
    },
    /// Present only in the older version
    Removed {
        /// Value in the older version
        value: Value,
    },
    /// Present in both with different values
    Changed {
        /// Value in the older version
        old: Value,
        /// Value in the newer version
        new: Value,
    },
    /// Present in both with equal values
    Unchanged {
        /// Value shared by both versions
        value: Value,
    },
}

/// One reported key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiffEntry {
    /// Key path from the document root; nested mappings add segments
    pub path: Vec<String>,

    /// What happened to the key
    pub kind: DiffKind,
}

impl DiffEntry {
    /// Dotted form of the path.
    pub fn key(&self) -> String {
        self.path.join(".")
    }

    /// Whether the key differs between the two versions.
    pub fn is_change(&self) -> bool {
        !matches!(self.kind, DiffKind::Unchanged { .. })
    }
}

impl std::fmt::Display for DiffEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let key = self.key();
        match &self.kind {
            DiffKind::Added { value } => write!(f, "+ {}: {}", key, value),
            DiffKind::Removed { value } => write!(f, "- {}: {}", key, value),
            DiffKind::Changed { old, new } => write!(f, "~ {}: {} -> {}", key, old, new),
            DiffKind::Unchanged { value } => write!(f, "  {}: {}", key, value),
        }
    }
}

/// Per-kind entry counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct DiffSummary {
    /// Added keys
    pub added: usize,
    /// Removed keys
    pub removed: usize,
    /// Changed keys
    pub changed: usize,
    /// Unchanged keys
    pub unchanged: usize,
}

impl std::fmt::Display for DiffSummary {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} added, {} removed, {} changed, {} unchanged",
            self.added, self.removed, self.changed, self.unchanged
        )
    }
}

/// Difference between two committed versions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BlueprintDiff {
    /// Older side
    pub from: VersionId,

    /// Newer side
    pub to: VersionId,

    /// Entries, ordered by first appearance in `from`, then keys only in `to`
    pub entries: Vec<DiffEntry>,
}

impl BlueprintDiff {
    pub(crate) fn compute(
        from: VersionId,
        to: VersionId,
        old: &BlueprintContent,
        new: &BlueprintContent,
    ) -> Self {
        let mut entries = Vec::new();
        diff_maps(old, new, &mut Vec::new(), &mut entries);
        Self { from, to, entries }
    }

    /// Entries that are not UNCHANGED.
    pub fn changes(&self) -> impl Iterator<Item = &DiffEntry> {
        self.entries.iter().filter(|e| e.is_change())
    }

    /// Whether both versions hold the same document.
    pub fn is_identical(&self) -> bool {
        self.changes().next().is_none()
    }

    /// Find the entry for a dotted key.
    ///
    /// Keys that themselves contain `.` are ambiguous in dotted form
    /// (`{"a.b": 1}` and `{"a": {"b": 1}}` both read `a.b`); the first match
    /// wins. Use [`entry_at`](Self::entry_at) to match exact path segments.
    pub fn entry(&self, key: &str) -> Option<&DiffEntry> {
        self.entries.iter().find(|e| e.key() == key)
    }

    /// Find the entry whose path matches `path` segment by segment.
    pub fn entry_at(&self, path: &[&str]) -> Option<&DiffEntry> {
        self.entries
            .iter()
            .find(|e| e.path.len() == path.len() && e.path.iter().zip(path).all(|(a, b)| a == b))
    }

    /// Count entries per kind.
    pub fn summary(&self) -> DiffSummary {
        let mut summary = DiffSummary::default();
        for entry in &self.entries {
            match entry.kind {
                DiffKind::Added { .. } => summary.added += 1,
                DiffKind::Removed { .. } => summary.removed += 1,
                DiffKind::Changed { .. } => summary.changed += 1,
                DiffKind::Unchanged { .. } => summary.unchanged += 1,
            }
        }
        summary
    }
}

impl std::fmt::Display for BlueprintDiff {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "--- {}", self.from)?;
        writeln!(f, "+++ {}", self.to)?;
        for entry in &self.entries {
            writeln!(f, "{}", entry)?;
        }
        Ok(())
    }
}

fn diff_maps(
    old: &BlueprintContent,
    new: &BlueprintContent,
    path: &mut Vec<String>,
    out: &mut Vec<DiffEntry>,
) {
    for (key, old_value) in old {
        path.push(key.clone());
        match (old_value, new.get(key)) {
            (_, None) => out.push(entry(path, DiffKind::Removed { value: old_value.clone() })),
            // Two empty mappings have no keys to recurse into; report the key itself.
            (Value::Object(old_map), Some(Value::Object(new_map)))
                if !(old_map.is_empty() && new_map.is_empty()) =>
            {
                diff_maps(old_map, new_map, path, out)
            }
            (_, Some(new_value)) if new_value == old_value => {
                out.push(entry(path, DiffKind::Unchanged { value: old_value.clone() }))
            }
            (_, Some(new_value)) => out.push(entry(
                path,
                DiffKind::Changed {
                    old: old_value.clone(),
                    new: new_value.clone(),
                },
            )),
        }
        path.pop();
    }

    for (key, new_value) in new {
        if old.contains_key(key) {
            continue;
        }
        path.push(key.clone());
        out.push(entry(path, DiffKind::Added { value: new_value.clone() }));
        path.pop();
    }
}

fn entry(path: &[String], kind: DiffKind) -> DiffEntry {
    DiffEntry {
        path: path.to_vec(),
        kind,
    }
}
