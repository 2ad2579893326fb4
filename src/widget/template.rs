//! Chart template handling
//!
//! Templates are JSON documents describing a saved chart layout; the
//! `modelJson` key is mandatory. Saving uses collision-free paths so an
//! existing template is never overwritten silently.

use crate::error::{Result, SysVisError};
use crate::utils::nonexistent_path;
use serde_json::Value as Json;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Key every template document must carry
pub const MODEL_JSON_KEY: &str = "modelJson";

/// A loaded chart template
#[derive(Debug, Clone)]
pub struct ChartTemplate {
    pub data: Json,
    pub path: PathBuf,
    /// File stem, used to detect save-under-new-name requests
    pub stem: String,
}

impl ChartTemplate {
    /// Load and validate a template file
    pub fn load(path: &Path) -> Result<ChartTemplate> {
        if !path.is_file() {
            return Err(SysVisError::Config(format!(
                "No such template file: {}",
                path.display()
            )));
        }
        let contents = std::fs::read_to_string(path)?;
        let data: Json = serde_json::from_str(&contents)?;
        if data.get(MODEL_JSON_KEY).is_none() {
            return Err(SysVisError::Config(format!(
                "Template {} has no '{MODEL_JSON_KEY}' key",
                path.display()
            )));
        }
        let stem = path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_default();
        Ok(ChartTemplate {
            data,
            path: path.to_path_buf(),
            stem,
        })
    }
}

/// Write template data under `dir`, never clobbering an existing file
///
/// A trailing `.json` on `json_name` is ignored; the returned path is
/// the one actually written.
pub fn save_json(dir: &Path, json_name: &str, data: &Json) -> Result<PathBuf> {
    let stem = json_name.strip_suffix(".json").unwrap_or(json_name);
    let path = nonexistent_path(&dir.join(format!("{stem}.json")));
    let contents = serde_json::to_string_pretty(data)?;
    std::fs::write(&path, contents)?;
    debug!("Saved chart template to {}", path.display());
    Ok(path)
}
