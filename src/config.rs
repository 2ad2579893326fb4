//! Explorer configuration
//!
//! Settings that control how a [`SysExplorer`](crate::widget::SysExplorer)
//! behaves. Embedders construct these directly or load them from a TOML
//! file. Auto-run is an explicit per-widget value here; there is no
//! process-wide toggle.

use crate::error::{Result, SysVisError};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Whether the explorer drives a live model or browses a static tree
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ExplorerMode {
    /// Live model: runs, mutation and serialization are available
    #[default]
    Run,
    /// Static tree: discovery only, no execution
    Edit,
}

/// Configuration for one explorer instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExplorerConfig {
    pub mode: ExplorerMode,
    /// Allow variable edits from the UI
    pub enable_edit: bool,
    /// Run the model immediately after the initial snapshot is pushed
    pub auto_run: bool,
    /// Directory where chart templates are written; current dir when empty
    pub save_dir: String,
}

impl Default for ExplorerConfig {
    fn default() -> Self {
        Self {
            mode: ExplorerMode::Run,
            enable_edit: true,
            auto_run: false,
            save_dir: String::new(),
        }
    }
}

impl ExplorerConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        toml::from_str(&contents)
            .map_err(|e| SysVisError::Config(format!("Failed to parse {}: {e}", path.display())))
    }

    /// Save configuration to a TOML file
    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| SysVisError::Config(format!("Failed to serialize config: {e}")))?;
        std::fs::write(path, contents)?;
        Ok(())
    }
}
