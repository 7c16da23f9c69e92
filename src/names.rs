//! Persisted user-assigned display names (UDN → name)
//!
//! A small JSON key-value file, loaded at startup and rewritten on every
//! change. Independent of the discovery core: losing it costs nothing but
//! the overrides.

use anyhow::{Context, Result};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use crate::models::Device;

pub struct FriendlyNameStore {
    path: PathBuf,
    names: Mutex<HashMap<String, String>>,
}

impl FriendlyNameStore {
    /// Default store location under the platform data dir.
    pub fn default_path() -> PathBuf {
        dirs::data_dir()
            .unwrap_or_else(std::env::temp_dir)
            .join("plughub")
            .join("friendly_names.json")
    }

    /// Open the store at `path`, loading any existing names. A missing or
    /// unreadable file starts empty rather than failing startup.
    pub fn open(path: PathBuf) -> Self {
        let names = match load_names(&path) {
            Ok(names) => {
                tracing::info!("Loaded {} friendly device names", names.len());
                names
            }
            Err(e) => {
                tracing::error!("Failed to load friendly names: {}", e);
                HashMap::new()
            }
        };
        Self {
            path,
            names: Mutex::new(names),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.names.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn get(&self, udn: &str) -> Option<String> {
        self.lock().get(udn).cloned()
    }

    /// Set or clear the override for `udn`; empty names clear. Returns
    /// true if a name is now stored.
    pub fn set(&self, udn: &str, name: Option<&str>) -> Result<bool> {
        let stored = {
            let mut names = self.lock();
            match name.map(str::trim).filter(|n| !n.is_empty()) {
                Some(name) => {
                    names.insert(udn.to_string(), name.to_string());
                    true
                }
                None => {
                    names.remove(udn);
                    false
                }
            }
        };
        self.save()?;
        Ok(stored)
    }

    pub fn remove(&self, udn: &str) -> Result<bool> {
        let removed = self.lock().remove(udn).is_some();
        if removed {
            self.save()?;
        }
        Ok(removed)
    }

    /// Drop overrides for all `udns` at once (used by forget-all).
    pub fn remove_many(&self, udns: &[String]) -> Result<()> {
        {
            let mut names = self.lock();
            for udn in udns {
                names.remove(udn);
            }
        }
        self.save()
    }

    /// Display name: the stored override, else the device's own name.
    pub fn display_name(&self, device: &Device) -> String {
        self.get(&device.udn).unwrap_or_else(|| device.name.clone())
    }

    fn save(&self) -> Result<()> {
        let snapshot = self.lock().clone();
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("creating {}", parent.display()))?;
        }
        let json = serde_json::to_string_pretty(&snapshot)?;
        std::fs::write(&self.path, json)
            .with_context(|| format!("writing {}", self.path.display()))?;
        tracing::debug!("Saved {} friendly device names", snapshot.len());
        Ok(())
    }
}

fn load_names(path: &Path) -> Result<HashMap<String, String>> {
    if !path.exists() {
        return Ok(HashMap::new());
    }
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parsing {}", path.display()))
}
