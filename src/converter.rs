use crate::{
    engine::{ConversionResult, Engine, EngineInfo, EngineRegistry},
    error::ConvertError,
    policy::{self, extension_of},
    prefs::{OutputMode, Preferences, SharedPreferences},
};
use anyhow::{Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError};
use tracing::{debug, info};

/// Entry point for conversions: validates input, picks an engine, works out
/// where the Markdown goes and hands off to the engine.
pub struct Converter {
    registry: EngineRegistry,
    prefs: SharedPreferences,
}

/// Engine choices offered for one file.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct EngineChoice {
    pub id: String,
    pub display_name: String,
}

impl Converter {
    pub fn new(registry: EngineRegistry, prefs: SharedPreferences) -> Self {
        Self { registry, prefs }
    }

    pub fn preferences(&self) -> &SharedPreferences {
        &self.prefs
    }

    /// Converts `input` to Markdown. `output` is used verbatim when given;
    /// `forced_engine` wins only if it is usable for the format.
    pub fn convert(
        &self,
        input: &Path,
        output: Option<&Path>,
        forced_engine: Option<&str>,
    ) -> ConversionResult {
        if !input.exists() {
            return ConversionResult::failure(ConvertError::NotFound {
                path: input.to_path_buf(),
            });
        }

        let ext = extension_of(input);
        if !policy::is_supported(&ext) {
            return ConversionResult::failure(ConvertError::UnsupportedFormat { ext });
        }

        let prefs = self.snapshot();
        let output = match output {
            Some(p) => p.to_path_buf(),
            None => output_path_for(input, &prefs),
        };

        let Some(engine) = self.select_engine(&ext, forced_engine, &prefs) else {
            return ConversionResult::failure(ConvertError::NoEngineAvailable { ext });
        };

        info!(
            "converting {} -> {} with {}",
            input.display(),
            output.display(),
            engine.id()
        );
        engine.convert(input, &output)
    }

    /// Forced engine, then the stored override, then the registry's
    /// default/fallback/any chain. Unusable candidates are skipped silently.
    fn select_engine(
        &self,
        ext: &str,
        forced: Option<&str>,
        prefs: &Preferences,
    ) -> Option<Arc<dyn Engine>> {
        if let Some(id) = forced {
            match self.registry.usable(id, ext) {
                Some(engine) => return Some(engine),
                None => debug!("forced engine {id} not usable for .{ext}; falling through"),
            }
        }

        if let Some(id) = prefs.engine_override(ext) {
            match self.registry.usable(id, ext) {
                Some(engine) => return Some(engine),
                None => debug!("override engine {id} not usable for .{ext}; falling through"),
            }
        }

        self.registry.best_engine_for(ext)
    }

    pub fn available_engines(&self) -> Vec<EngineInfo> {
        self.registry.all().iter().map(|e| e.info()).collect()
    }

    pub fn engines_for(&self, path: &Path) -> Vec<EngineChoice> {
        self.engines_for_extension(&extension_of(path))
    }

    /// Available engines that declare `ext`, in registration order.
    pub fn engines_for_extension(&self, ext: &str) -> Vec<EngineChoice> {
        self.registry
            .engines_supporting(ext)
            .iter()
            .map(|e| EngineChoice {
                id: e.id().to_string(),
                display_name: e.display_name().to_string(),
            })
            .collect()
    }

    /// Pins `ext` to `engine_id` after checking the format is supported and
    /// the engine is registered and declares it. Availability is not
    /// required; an unusable override is skipped at selection time.
    pub fn pin_engine(&self, ext: &str, engine_id: &str) -> Result<()> {
        let ext = policy::normalize_extension(ext);
        if !policy::is_supported(&ext) {
            return Err(ConvertError::UnsupportedFormat { ext }.into());
        }
        let engine = self
            .registry
            .get(engine_id)
            .ok_or_else(|| anyhow!("unknown engine: {engine_id}"))?;
        if !engine.supports_format(&ext) {
            bail!("engine {engine_id} does not handle .{ext}");
        }
        self.prefs
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .set_engine_override(&ext, engine_id)
    }

    /// Default output path for `input` under the current preferences.
    pub fn default_output_path(&self, input: &Path) -> PathBuf {
        output_path_for(input, &self.snapshot())
    }

    fn snapshot(&self) -> Preferences {
        self.prefs
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .preferences()
            .clone()
    }
}

/// `<stem>.md` next to the input, or inside the fixed folder when that mode
/// has a folder set. `ask` mode never resolves here; callers pass a path.
pub fn output_path_for(input: &Path, prefs: &Preferences) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default();
    let name = format!("{stem}.md");

    match (&prefs.output_mode, &prefs.output_folder) {
        (OutputMode::FixedFolder, Some(folder)) => folder.join(name),
        _ => input.parent().unwrap_or_else(|| Path::new("")).join(name),
    }
}
