//! Blueprint model - versioned declarative configuration.

use serde::{Deserialize, Serialize};

use crate::id::VersionId;
use crate::Time;

/// Declarative configuration document. Key order is preserved.
pub type BlueprintContent = serde_json::Map<String, serde_json::Value>;

/// An immutable, committed configuration document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BlueprintVersion {
    /// Strictly increasing identifier
    pub version_id: VersionId,

    /// The document
    pub content: BlueprintContent,

    /// When the version was committed. Ordering only.
    pub created_at: Time,
}

impl BlueprintVersion {
    /// Look up a top-level key.
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.content.get(key)
    }
}

// Commit time never takes part in equality.
impl PartialEq for BlueprintVersion {
    fn eq(&self, other: &Self) -> bool {
        self.version_id == other.version_id && self.content == other.content
    }
}
