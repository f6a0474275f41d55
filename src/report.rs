use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Summary of one finished batch, in input order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchReport {
    pub started: String,
    pub finished: String,
    pub success_count: usize,
    pub fail_count: usize,
    pub files: Vec<FileReport>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileReport {
    pub input: PathBuf,
    pub success: bool,
    /// Output path on success, error text on failure.
    pub message: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}
