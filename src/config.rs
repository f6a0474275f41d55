use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// Application configuration, read from TOML. User-editable preferences live
/// in [`crate::prefs`] instead.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub logging: Logging,
    #[serde(default)]
    pub paths: Paths,
    #[serde(default)]
    pub engines: Engines,
    #[serde(default)]
    pub batch: Batch,
}

impl Config {
    pub fn load(path: &Path) -> Result<Self> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("reading config: {}", path.display()))?;
        let cfg: Config = toml::from_str(&raw).with_context(|| "parsing TOML")?;
        Ok(cfg)
    }

    /// Explicit path if given, else the configured one, else
    /// `<config dir>/mdconvert/settings.json`.
    pub fn preferences_path(&self) -> Option<PathBuf> {
        if !self.paths.preferences_file.is_empty() {
            return Some(crate::engine::process::expand_tilde(
                &self.paths.preferences_file,
            ));
        }
        dirs::config_dir().map(|d| d.join(crate::APP_NAME).join("settings.json"))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Logging {
    pub level: String,
    pub json: bool,
    pub write_to_file: bool,
    pub file_path: String,
}
impl Default for Logging {
    fn default() -> Self {
        Self {
            level: "info".into(),
            json: false,
            write_to_file: false,
            file_path: "".into(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Paths {
    /// Empty means the platform config directory.
    pub preferences_file: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Engines {
    pub pandoc: PandocCfg,
    pub markitdown: MarkItDownCfg,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PandocCfg {
    pub exe: String,
    pub timeout_seconds: u64,
    pub extra_args: Vec<String>,
}
impl Default for PandocCfg {
    fn default() -> Self {
        Self {
            exe: "pandoc".into(),
            timeout_seconds: 0,
            extra_args: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct MarkItDownCfg {
    pub exe: String,
    pub timeout_seconds: u64,
}
impl Default for MarkItDownCfg {
    fn default() -> Self {
        Self {
            exe: "markitdown".into(),
            timeout_seconds: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Batch {
    /// Floor on total batch wall time so progress stays visible.
    pub min_duration_ms: u64,
}
impl Default for Batch {
    fn default() -> Self {
        Self {
            min_duration_ms: 2000,
        }
    }
}
