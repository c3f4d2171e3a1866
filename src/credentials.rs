use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
struct StoredCredential {
    api_key: String,
}

/// Single persisted slot for the provider API key.
#[derive(Debug, Clone)]
pub struct CredentialStore {
    path: PathBuf,
    cached: Option<String>,
}

impl CredentialStore {
    /// Opens the slot and reads any previously saved key.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let cached = read_slot(&path)?;
        debug!(path = %path.display(), present = cached.is_some(), "credential slot loaded");
        Ok(Self { path, cached })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// The saved key, if non-blank.
    pub fn api_key(&self) -> Option<&str> {
        self.cached
            .as_deref()
            .map(str::trim)
            .filter(|k| !k.is_empty())
    }

    /// Overwrites the slot with the given value.
    pub fn save(&mut self, key: &str) -> Result<()> {
        let body = serde_json::to_string(&StoredCredential {
            api_key: key.to_string(),
        })?;
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
        std::fs::write(&self.path, body)
            .with_context(|| format!("failed to write credential slot {}", self.path.display()))?;
        self.cached = Some(key.to_string());
        Ok(())
    }

    /// Removes the slot entirely.
    pub fn clear(&mut self) -> Result<()> {
        match std::fs::remove_file(&self.path) {
            Ok(()) => {}
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => {}
            Err(err) => {
                return Err(err).with_context(|| {
                    format!("failed to remove credential slot {}", self.path.display())
                });
            }
        }
        self.cached = None;
        Ok(())
    }
}

fn read_slot(path: &Path) -> Result<Option<String>> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(err) if err.kind() == std::io::ErrorKind::NotFound => return Ok(None),
        Err(err) => {
            return Err(err)
                .with_context(|| format!("failed to read credential slot {}", path.display()));
        }
    };
    let stored: StoredCredential = serde_json::from_str(&raw)
        .with_context(|| format!("malformed credential slot {}", path.display()))?;
    Ok(Some(stored.api_key))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_reload_and_clear() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("key.json");

        let mut store = CredentialStore::open(&path).unwrap();
        assert_eq!(store.api_key(), None);

        store.save("  abc123 ").unwrap();
        let reopened = CredentialStore::open(&path).unwrap();
        assert_eq!(reopened.api_key(), Some("abc123"));

        store.save("").unwrap();
        assert_eq!(CredentialStore::open(&path).unwrap().api_key(), None);

        store.clear().unwrap();
        assert!(!path.exists());
        store.clear().unwrap();
    }
}
