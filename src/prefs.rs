//! User preferences and their JSON persistence.
//!
//! The store is loaded once at startup and every setter rewrites the whole
//! file immediately. A file that fails to parse, or carries fields this
//! version does not know, is discarded in favor of defaults.

use crate::policy::normalize_extension;
use crate::util::ensure_dir;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::{Arc, RwLock};
use tracing::{debug, info, warn};

/// Preferences shared between the foreground and the batch worker.
pub type SharedPreferences = Arc<RwLock<PreferenceStore>>;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum OutputMode {
    /// Next to the input file.
    #[default]
    #[serde(rename = "same")]
    SameFolder,
    /// Into `output_folder`, when one is set.
    #[serde(rename = "folder")]
    FixedFolder,
    /// The caller supplies a path for every file.
    #[serde(rename = "ask")]
    AskEachTime,
}

impl OutputMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            OutputMode::SameFolder => "same",
            OutputMode::FixedFolder => "folder",
            OutputMode::AskEachTime => "ask",
        }
    }
}

impl fmt::Display for OutputMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OutputMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "same" => Ok(OutputMode::SameFolder),
            "folder" => Ok(OutputMode::FixedFolder),
            "ask" => Ok(OutputMode::AskEachTime),
            other => anyhow::bail!("unknown output mode: {other} (expected same|folder|ask)"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase", deny_unknown_fields)]
pub struct Preferences {
    pub output_mode: OutputMode,
    pub output_folder: Option<PathBuf>,
    /// Normalized extension -> engine id. Only pinned extensions appear.
    pub engine_overrides: BTreeMap<String, String>,
    pub window_width: i32,
    pub window_height: i32,
    pub window_x: Option<i32>,
    pub window_y: Option<i32>,
}

impl Default for Preferences {
    fn default() -> Self {
        Self {
            output_mode: OutputMode::SameFolder,
            output_folder: None,
            engine_overrides: BTreeMap::new(),
            window_width: 700,
            window_height: 500,
            window_x: None,
            window_y: None,
        }
    }
}

impl Preferences {
    pub fn engine_override(&self, ext: &str) -> Option<&str> {
        self.engine_overrides
            .get(&normalize_extension(ext))
            .map(String::as_str)
    }
}

/// Only a JSON object is a valid record; serde would otherwise also fill
/// the struct positionally from an array.
fn parse_preferences(raw: &str) -> Result<Preferences> {
    let value: serde_json::Value = serde_json::from_str(raw).with_context(|| "parsing JSON")?;
    if !value.is_object() {
        anyhow::bail!("top-level value is not an object");
    }
    Preferences::deserialize(value).with_context(|| "decoding preferences")
}

/// Owns the in-memory [`Preferences`] and where they persist. A store
/// without a path keeps everything in memory.
#[derive(Debug, Clone, Default)]
pub struct PreferenceStore {
    path: Option<PathBuf>,
    prefs: Preferences,
}

impl PreferenceStore {
    /// Loads from `path`, falling back to defaults when the file is missing
    /// or unreadable.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let prefs = Self::load(&path);
        Self {
            path: Some(path),
            prefs,
        }
    }

    pub fn in_memory(prefs: Preferences) -> Self {
        Self { path: None, prefs }
    }

    pub fn into_shared(self) -> SharedPreferences {
        Arc::new(RwLock::new(self))
    }

    pub fn load(path: &Path) -> Preferences {
        let raw = match std::fs::read_to_string(path) {
            Ok(raw) => raw,
            Err(err) => {
                debug!("no preferences at {} ({err}); using defaults", path.display());
                return Preferences::default();
            }
        };
        match parse_preferences(&raw) {
            Ok(prefs) => prefs,
            Err(err) => {
                warn!(
                    "discarding unreadable preferences {}: {err:#}",
                    path.display()
                );
                Preferences::default()
            }
        }
    }

    /// Rewrites the full file through a sibling temp file and a rename.
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if let Some(parent) = path.parent() {
            ensure_dir(parent)?;
        }
        let body = serde_json::to_string_pretty(&self.prefs)?;
        let tmp = path.with_extension("json.tmp");
        std::fs::write(&tmp, body)
            .with_context(|| format!("writing preferences: {}", tmp.display()))?;
        std::fs::rename(&tmp, path)
            .with_context(|| format!("replacing preferences: {}", path.display()))?;
        debug!("saved preferences to {}", path.display());
        Ok(())
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    pub fn preferences(&self) -> &Preferences {
        &self.prefs
    }

    pub fn engine_override(&self, ext: &str) -> Option<&str> {
        self.prefs.engine_override(ext)
    }

    pub fn set_engine_override(&mut self, ext: &str, engine_id: &str) -> Result<()> {
        let ext = normalize_extension(ext);
        info!("pinning .{ext} to engine {engine_id}");
        self.prefs
            .engine_overrides
            .insert(ext, engine_id.to_string());
        self.save()
    }

    /// No-op, and no write, when `ext` has no override.
    pub fn reset_engine_override(&mut self, ext: &str) -> Result<()> {
        let ext = normalize_extension(ext);
        if self.prefs.engine_overrides.remove(&ext).is_some() {
            info!("cleared engine override for .{ext}");
            self.save()?;
        }
        Ok(())
    }

    pub fn reset_all_engine_overrides(&mut self) -> Result<()> {
        self.prefs.engine_overrides.clear();
        self.save()
    }

    pub fn set_output_mode(&mut self, mode: OutputMode) -> Result<()> {
        self.prefs.output_mode = mode;
        self.save()
    }

    pub fn set_output_folder(&mut self, folder: Option<PathBuf>) -> Result<()> {
        self.prefs.output_folder = folder;
        self.save()
    }

    pub fn set_window_geometry(
        &mut self,
        width: i32,
        height: i32,
        x: Option<i32>,
        y: Option<i32>,
    ) -> Result<()> {
        self.prefs.window_width = width;
        self.prefs.window_height = height;
        self.prefs.window_x = x;
        self.prefs.window_y = y;
        self.save()
    }
}
