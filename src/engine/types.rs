use crate::error::ConvertError;
use serde::Serialize;
use std::path::{Path, PathBuf};

/// Outcome of one conversion. Either the written file (plus non-fatal
/// warnings) or an error, never both.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum ConversionResult {
    Success {
        output_path: PathBuf,
        warnings: Vec<String>,
    },
    Failure {
        error: ConvertError,
    },
}

impl ConversionResult {
    pub fn success(output_path: impl Into<PathBuf>) -> Self {
        Self::Success {
            output_path: output_path.into(),
            warnings: Vec::new(),
        }
    }

    pub fn success_with_warnings(output_path: impl Into<PathBuf>, warnings: Vec<String>) -> Self {
        Self::Success {
            output_path: output_path.into(),
            warnings,
        }
    }

    pub fn failure(error: ConvertError) -> Self {
        Self::Failure { error }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn output_path(&self) -> Option<&Path> {
        match self {
            Self::Success { output_path, .. } => Some(output_path),
            Self::Failure { .. } => None,
        }
    }

    pub fn warnings(&self) -> &[String] {
        match self {
            Self::Success { warnings, .. } => warnings,
            Self::Failure { .. } => &[],
        }
    }

    pub fn error(&self) -> Option<&ConvertError> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { error } => Some(error),
        }
    }
}

/// What the presentation layer may see about an engine.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EngineInfo {
    pub id: String,
    pub display_name: String,
    pub version: Option<String>,
    pub available: bool,
}
