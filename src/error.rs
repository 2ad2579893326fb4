//! Error handling for SysVis-RS
//!
//! This module defines custom error types and a Result alias for use
//! throughout the crate.

use thiserror::Error;

/// Main error type for SysVis-RS operations
#[derive(Error, Debug)]
pub enum SysVisError {
    /// A dotted path did not resolve to a node or variable
    #[error("Resolution error: no object at path '{path}'")]
    Resolution { path: String },

    /// The model graph or a payload had an unexpected shape
    #[error("Structure error: {0}")]
    Structure(String),

    /// Errors related to value serialization
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// A model run failed
    #[error("Execution error: {0}")]
    Execution(String),

    /// Errors related to configuration loading/saving
    #[error("Configuration error: {0}")]
    Config(String),

    /// Errors related to the persisted module registry
    #[error("Registry error: {0}")]
    Registry(String),

    /// A widget component was registered twice under the same name
    #[error("Component '{name}' is already registered")]
    DuplicateComponent { name: String },

    /// A run was requested while another run is in progress
    #[error("A run is already in progress")]
    Busy,

    /// A write was attempted on a read-only data source
    #[error("Read-only data source: {0}")]
    ReadOnly(String),

    /// The simulation behind the weak handle has been dropped
    #[error("The simulation model is no longer alive")]
    ModelDropped,

    /// IO errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic errors with context
    #[error("{context}: {source}")]
    WithContext {
        context: String,
        #[source]
        source: Box<SysVisError>,
    },
}

impl SysVisError {
    /// Add context to an error
    pub fn with_context(self, context: impl Into<String>) -> Self {
        SysVisError::WithContext {
            context: context.into(),
            source: Box::new(self),
        }
    }

    /// Create a resolution error for a dotted path
    pub fn resolution(path: impl Into<String>) -> Self {
        SysVisError::Resolution { path: path.into() }
    }
}

/// Result type alias for SysVis-RS operations
pub type Result<T> = std::result::Result<T, SysVisError>;

/// Extension trait for adding context to Results
pub trait ResultExt<T> {
    /// Add context to an error result
    fn context(self, context: impl Into<String>) -> Result<T>;

    /// Add context lazily to an error result
    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String;
}

impl<T> ResultExt<T> for Result<T> {
    fn context(self, context: impl Into<String>) -> Result<T> {
        self.map_err(|e| e.with_context(context))
    }

    fn with_context<F>(self, f: F) -> Result<T>
    where
        F: FnOnce() -> String,
    {
        self.map_err(|e| e.with_context(f()))
    }
}
