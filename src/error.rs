//! Conversion failure kinds.
//!
//! None of these abort the process. They travel as data inside a failed
//! [`crate::engine::ConversionResult`] so a batch can keep going after one
//! bad file.

use serde::Serialize;
use std::path::PathBuf;
use thiserror::Error;

#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ConvertError {
    /// Input path does not exist.
    #[error("Input file not found: {}", path.display())]
    NotFound { path: PathBuf },

    /// Extension is not a key of the format policy table.
    #[error("Unsupported file format: .{ext}")]
    UnsupportedFormat { ext: String },

    /// Resolution exhausted every tier without a usable engine.
    #[error("No available engine for .{ext} files")]
    NoEngineAvailable { ext: String },

    /// The delegated engine reported failure; the message is the engine's own.
    #[error("{message}")]
    EngineFailure { engine: String, message: String },
}

impl ConvertError {
    pub fn engine_failure(engine: &str, message: impl Into<String>) -> Self {
        Self::EngineFailure {
            engine: engine.to_string(),
            message: message.into(),
        }
    }
}
