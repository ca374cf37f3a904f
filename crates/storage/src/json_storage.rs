//! JSON file storage implementation.
//!
//! Stores one JSON document per component under `components/` and keeps a
//! small per-component meta marker (save count + updated_at) under `meta/`.

use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info};

use super::{ComponentRecord, Result, Storage, StorageError};

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
}

impl JsonStorage {
    /// Create storage rooted at `root`, creating the data and meta
    /// directories if needed.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("components")).await?;
        fs::create_dir_all(root.join("meta").join("components")).await?;

        debug!("Opened JSON storage at {}", root.display());
        Ok(Self { root })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// How many times a component has been saved (0 if never).
    pub async fn save_count(&self, component: &str) -> Result<u64> {
        let meta: Option<serde_json::Value> = read_json(&self.meta_path(component)).await?;
        Ok(meta
            .and_then(|m| m.get("version").and_then(|v| v.as_u64()))
            .unwrap_or(0))
    }

    fn component_path(&self, component: &str) -> PathBuf {
        self.root
            .join("components")
            .join(format!("{}.json", encode_name(component)))
    }

    fn meta_path(&self, component: &str) -> PathBuf {
        self.root
            .join("meta")
            .join("components")
            .join(format!("{}.meta.json", encode_name(component)))
    }

    /// Read and increment the per-component save count, return the new count.
    async fn bump_version(&self, component: &str) -> Result<u64> {
        let version = self.save_count(component).await? + 1;
        let meta = serde_json::json!({"version": version, "updated_at": chrono::Utc::now()});
        fs::write(
            self.meta_path(component),
            serde_json::to_string_pretty(&meta)?.as_bytes(),
        )
        .await?;
        Ok(version)
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_component(&mut self, record: &ComponentRecord) -> Result<()> {
        let path = self.component_path(&record.component);
        let json = serde_json::to_string_pretty(record)?;
        fs::write(&path, json.as_bytes()).await?;

        let version = self.bump_version(&record.component).await?;
        info!(
            "Saved {} ({} generations, {} blueprints, save #{})",
            record.component,
            record.generations.len(),
            record.blueprints.len(),
            version
        );
        Ok(())
    }

    async fn load_component(&self, component: &str) -> Result<Option<ComponentRecord>> {
        let record: Option<ComponentRecord> = read_json(&self.component_path(component)).await?;
        if let Some(record) = &record {
            if record.component != component {
                return Err(StorageError::Other(format!(
                    "file for {} holds component {}",
                    component, record.component
                )));
            }
        }
        Ok(record)
    }

    async fn list_components(&self) -> Result<Vec<String>> {
        let mut names = Vec::new();
        let mut rd = fs::read_dir(self.root.join("components")).await?;
        while let Some(entry) = rd.next_entry().await? {
            let path = entry.path();
            if path.extension().and_then(|s| s.to_str()) != Some("json") {
                continue;
            }
            if let Some(name) = path.file_stem().and_then(|s| s.to_str()).and_then(decode_name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn delete_component(&mut self, component: &str) -> Result<()> {
        match fs::remove_file(self.component_path(component)).await {
            Ok(()) => {}
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(StorageError::NotFound(component.to_string()));
            }
            Err(e) => return Err(e.into()),
        }

        match fs::remove_file(self.meta_path(component)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => return Err(e.into()),
            _ => {}
        }

        info!("Deleted {}", component);
        Ok(())
    }
}

async fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

/// File-safe, reversible encoding of a component name.
///
/// ASCII alphanumerics, `-` and `_` are kept; every other byte becomes `%XX`.
fn encode_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for byte in name.bytes() {
        if byte.is_ascii_alphanumeric() || byte == b'-' || byte == b'_' {
            out.push(byte as char);
        } else {
            out.push_str(&format!("%{:02X}", byte));
        }
    }
    out
}

fn decode_name(encoded: &str) -> Option<String> {
    let mut bytes = Vec::with_capacity(encoded.len());
    let mut rest = encoded.as_bytes();
    while let Some((&byte, tail)) = rest.split_first() {
        if byte == b'%' {
            let hex = std::str::from_utf8(tail.get(..2)?).ok()?;
            bytes.push(u8::from_str_radix(hex, 16).ok()?);
            rest = &tail[2..];
        } else {
            bytes.push(byte);
            rest = tail;
        }
    }
    String::from_utf8(bytes).ok()
}
