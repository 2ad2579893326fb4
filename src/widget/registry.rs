//! Persisted module registry
//!
//! Embedders publish reusable model modules here; the registry is a
//! single JSON file under the per-user config directory mapping module
//! name to its code, title, metadata and kernel. Registration is
//! write-once per name and a malformed file is reported with the path,
//! never silently reset.

use crate::error::{Result, SysVisError};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

const REGISTRY_DIR: &str = "sysvis-rs";
const REGISTRY_FILE: &str = "modules.json";

/// Descriptive metadata for a registered module
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModuleMeta {
    pub version: String,
    pub readme: String,
    pub env_name: String,
}

/// One registered module
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModuleEntry {
    pub code: String,
    pub title: String,
    pub meta: ModuleMeta,
    pub kernel: String,
}

/// The on-disk module registry
#[derive(Debug)]
pub struct ModuleRegistry {
    path: PathBuf,
    modules: BTreeMap<String, ModuleEntry>,
}

impl ModuleRegistry {
    /// Default registry location under the per-user config directory
    pub fn default_path() -> Result<PathBuf> {
        let base = dirs_next::config_dir().ok_or_else(|| {
            SysVisError::Registry("no per-user config directory available".to_string())
        })?;
        Ok(base.join(REGISTRY_DIR).join(REGISTRY_FILE))
    }

    /// Open a registry file, starting empty when it does not exist yet
    pub fn open(path: &Path) -> Result<ModuleRegistry> {
        let modules = if path.is_file() {
            let contents = std::fs::read_to_string(path)?;
            serde_json::from_str(&contents).map_err(|e| {
                SysVisError::Registry(format!(
                    "malformed registry file {}: {e}",
                    path.display()
                ))
            })?
        } else {
            BTreeMap::new()
        };
        Ok(ModuleRegistry {
            path: path.to_path_buf(),
            modules,
        })
    }

    /// Register a module under a unique name
    pub fn register(&mut self, name: impl Into<String>, entry: ModuleEntry) -> Result<()> {
        let name = name.into();
        if self.modules.contains_key(&name) {
            return Err(SysVisError::Registry(format!(
                "module '{name}' is already registered"
            )));
        }
        debug!("Registering module '{name}'");
        self.modules.insert(name, entry);
        Ok(())
    }

    /// Remove a module, returning its entry
    pub fn remove(&mut self, name: &str) -> Result<ModuleEntry> {
        self.modules
            .remove(name)
            .ok_or_else(|| SysVisError::Registry(format!("module '{name}' is not registered")))
    }

    pub fn get(&self, name: &str) -> Option<&ModuleEntry> {
        self.modules.get(name)
    }

    pub fn names(&self) -> Vec<&str> {
        self.modules.keys().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.modules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.modules.is_empty()
    }

    /// Persist the registry, creating parent directories as needed
    pub fn save(&self) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(&self.modules)?;
        std::fs::write(&self.path, contents)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(title: &str) -> ModuleEntry {
        ModuleEntry {
            code: "let model = build();".to_string(),
            title: title.to_string(),
            meta: ModuleMeta {
                version: "0.1.0".to_string(),
                readme: "demo".to_string(),
                env_name: "base".to_string(),
            },
            kernel: "rust".to_string(),
        }
    }

    #[test]
    fn test_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.json");
        let mut registry = ModuleRegistry::open(&path).unwrap();
        registry.register("turbofan", entry("Turbofan demo")).unwrap();
        registry.save().unwrap();

        let reopened = ModuleRegistry::open(&path).unwrap();
        assert_eq!(reopened.names(), vec!["turbofan"]);
        assert_eq!(reopened.get("turbofan").unwrap().title, "Turbofan demo");
    }

    #[test]
    fn test_duplicate_name_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.json");
        let mut registry = ModuleRegistry::open(&path).unwrap();
        registry.register("turbofan", entry("first")).unwrap();
        let err = registry.register("turbofan", entry("second")).unwrap_err();
        assert!(err.to_string().contains("already registered"));
        assert_eq!(registry.get("turbofan").unwrap().title, "first");
    }

    #[test]
    fn test_malformed_file_names_path() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.json");
        std::fs::write(&path, "not json").unwrap();
        let err = ModuleRegistry::open(&path).unwrap_err();
        assert!(err.to_string().contains("modules.json"));
    }

    #[test]
    fn test_remove() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("modules.json");
        let mut registry = ModuleRegistry::open(&path).unwrap();
        registry.register("demo", entry("demo")).unwrap();
        registry.remove("demo").unwrap();
        assert!(registry.is_empty());
        assert!(registry.remove("demo").is_err());
    }
}
