use super::{ConversionResult, Engine, process};
use crate::config::MarkItDownCfg;
use crate::error::ConvertError;
use crate::policy::extension_of;
use anyhow::Context;
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::warn;

const SUPPORTED: &[&str] = &[
    "docx", "pdf", "pptx", "xlsx", "xls", "html", "htm", "csv", "json", "xml", "epub", "jpg",
    "jpeg", "png", "gif", "webp", "wav", "mp3", "zip",
];

const IMAGE_WARNING: &str = "Note: MarkItDown may not extract embedded images. \
     Consider using Pandoc for better image handling.";

/// Wraps the `markitdown` command-line tool.
pub struct MarkItDownEngine {
    exe: PathBuf,
    timeout: Option<Duration>,
    version: OnceLock<String>,
}

impl MarkItDownEngine {
    pub fn new(cfg: &MarkItDownCfg) -> Self {
        Self {
            exe: process::expand_tilde(&cfg.exe),
            timeout: process::timeout_from_secs(cfg.timeout_seconds),
            version: OnceLock::new(),
        }
    }

    fn run(&self, input: &Path, output: &Path) -> anyhow::Result<String> {
        if let Some(parent) = output.parent() {
            crate::util::ensure_dir(parent)?;
        }
        process::run_tool_checked(
            self.exe.as_os_str(),
            [input.as_os_str(), OsStr::new("-o"), output.as_os_str()],
            self.timeout,
        )
        .with_context(|| format!("markitdown on {}", input.display()))?;

        std::fs::read_to_string(output)
            .with_context(|| format!("reading markitdown output: {}", output.display()))
    }
}

impl Engine for MarkItDownEngine {
    fn id(&self) -> &str {
        "markitdown"
    }

    fn display_name(&self) -> &str {
        "MarkItDown"
    }

    fn supported_formats(&self) -> &[&str] {
        SUPPORTED
    }

    fn is_available(&self) -> bool {
        match process::tool_version(self.exe.as_os_str()) {
            Some(v) => {
                let _ = self.version.set(v);
                true
            }
            None => false,
        }
    }

    fn version(&self) -> Option<String> {
        if let Some(v) = self.version.get() {
            return Some(v.clone());
        }
        let v = process::tool_version(self.exe.as_os_str())?;
        Some(self.version.get_or_init(|| v).clone())
    }

    fn convert(&self, input: &Path, output: &Path) -> ConversionResult {
        if !self.is_available() {
            return ConversionResult::failure(ConvertError::engine_failure(
                self.id(),
                "MarkItDown is not available",
            ));
        }

        let markdown = match self.run(input, output) {
            Ok(md) => md,
            Err(err) => {
                warn!("markitdown failed for {}: {err:#}", input.display());
                return ConversionResult::failure(ConvertError::engine_failure(
                    self.id(),
                    format!("MarkItDown conversion failed: {err:#}"),
                ));
            }
        };

        let mut warnings = Vec::new();
        if image_loss_likely(&extension_of(input), &markdown) {
            warnings.push(IMAGE_WARNING.to_string());
        }
        ConversionResult::success_with_warnings(output, warnings)
    }
}

fn image_loss_likely(ext: &str, markdown: &str) -> bool {
    matches!(ext, "docx" | "pptx") && markdown.contains("![")
}
