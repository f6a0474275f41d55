use super::{ConversionResult, Engine, process};
use crate::config::PandocCfg;
use crate::error::ConvertError;
use anyhow::Context;
use std::ffi::OsString;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::Duration;
use tracing::{debug, warn};

const SUPPORTED: &[&str] = &[
    "docx", "doc", "pdf", "html", "htm", "rtf", "odt", "epub", "pptx", "xlsx", "tex", "latex",
    "rst", "org",
];

/// Wraps the `pandoc` executable, emitting GitHub-flavored Markdown.
pub struct PandocEngine {
    exe: PathBuf,
    timeout: Option<Duration>,
    extra_args: Vec<String>,
    version: OnceLock<String>,
}

impl PandocEngine {
    pub fn new(cfg: &PandocCfg) -> Self {
        Self {
            exe: process::expand_tilde(&cfg.exe),
            timeout: process::timeout_from_secs(cfg.timeout_seconds),
            extra_args: cfg.extra_args.clone(),
            version: OnceLock::new(),
        }
    }

    fn cached_version(&self) -> Option<String> {
        if let Some(v) = self.version.get() {
            return Some(v.clone());
        }
        let v = process::tool_version(self.exe.as_os_str())?;
        Some(self.version.get_or_init(|| v).clone())
    }

    fn run(&self, input: &Path, output: &Path, media_dir: &Path) -> anyhow::Result<()> {
        if let Some(parent) = output.parent() {
            crate::util::ensure_dir(parent)?;
        }

        let mut media_arg = OsString::from("--extract-media=");
        media_arg.push(media_dir);

        let mut args: Vec<OsString> = vec![
            input.as_os_str().to_owned(),
            "-t".into(),
            "gfm".into(),
            "-o".into(),
            output.as_os_str().to_owned(),
            "--wrap=none".into(),
            media_arg,
        ];
        args.extend(self.extra_args.iter().map(OsString::from));

        process::run_tool_checked(self.exe.as_os_str(), &args, self.timeout)
            .with_context(|| format!("pandoc on {}", input.display()))?;
        Ok(())
    }
}

impl Engine for PandocEngine {
    fn id(&self) -> &str {
        "pandoc"
    }

    fn display_name(&self) -> &str {
        "Pandoc"
    }

    fn supported_formats(&self) -> &[&str] {
        SUPPORTED
    }

    fn is_available(&self) -> bool {
        // Re-run every time so an install mid-session is noticed.
        match process::tool_version(self.exe.as_os_str()) {
            Some(v) => {
                let _ = self.version.set(v);
                true
            }
            None => false,
        }
    }

    fn version(&self) -> Option<String> {
        self.cached_version()
    }

    fn convert(&self, input: &Path, output: &Path) -> ConversionResult {
        if !self.is_available() {
            return ConversionResult::failure(ConvertError::engine_failure(
                self.id(),
                "Pandoc is not available",
            ));
        }

        let stem = output
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "output".to_string());
        let media_dir = output
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join(format!("{stem}_media"));

        if let Err(err) = self.run(input, output, &media_dir) {
            warn!("pandoc failed for {}: {err:#}", input.display());
            return ConversionResult::failure(ConvertError::engine_failure(
                self.id(),
                format!("Pandoc conversion failed: {err:#}"),
            ));
        }

        let mut warnings = Vec::new();
        let media_written = std::fs::read_dir(&media_dir)
            .map(|mut entries| entries.next().is_some())
            .unwrap_or(false);
        if media_written {
            debug!("pandoc extracted media into {}", media_dir.display());
            warnings.push(format!("Media files extracted to: {}", media_dir.display()));
        }

        ConversionResult::success_with_warnings(output, warnings)
    }
}
