//! Error types for composition rendering

use std::path::PathBuf;
use thiserror::Error;

/// A warning generated during composition rendering
#[derive(Debug, Clone, PartialEq)]
pub struct Warning {
    /// Layer file the warning is about, if any
    pub source: Option<PathBuf>,
    pub message: String,
}

impl Warning {
    pub fn new(message: impl Into<String>) -> Self {
        Self { source: None, message: message.into() }
    }

    /// Warning tied to a specific layer file.
    pub fn for_source(source: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self { source: Some(source.into()), message: message.into() }
    }
}

impl std::fmt::Display for Warning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.source {
            Some(path) => write!(f, "{}: {}", path.display(), self.message),
            None => f.write_str(&self.message),
        }
    }
}

/// Error when rendering a composition in strict mode.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum CompositionError {
    /// A layer file could not be opened or decoded
    #[error("Layer '{}' could not be loaded: {reason}", .path.display())]
    AssetCorrupt { path: PathBuf, reason: String },
    /// Canvas dimensions must be positive
    #[error("Canvas size {width}x{height} is invalid")]
    InvalidCanvas { width: u32, height: u32 },
}
