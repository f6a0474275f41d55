#![allow(dead_code)]

use mdconvert::{
    converter::Converter,
    engine::{ConversionResult, Engine, EngineRegistry},
    error::ConvertError,
    prefs::{PreferenceStore, Preferences},
};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// Scriptable engine: availability can be flipped at runtime and every
/// call is recorded.
pub struct FakeEngine {
    id: &'static str,
    formats: Vec<&'static str>,
    available: AtomicBool,
    succeed: bool,
    panics: bool,
    pub calls: AtomicUsize,
    pub seen: Mutex<Vec<(PathBuf, PathBuf)>>,
}

impl FakeEngine {
    pub fn new(id: &'static str, formats: &[&'static str]) -> Self {
        Self {
            id,
            formats: formats.to_vec(),
            available: AtomicBool::new(true),
            succeed: true,
            panics: false,
            calls: AtomicUsize::new(0),
            seen: Mutex::new(Vec::new()),
        }
    }

    pub fn unavailable(self) -> Self {
        self.available.store(false, Ordering::SeqCst);
        self
    }

    pub fn failing(mut self) -> Self {
        self.succeed = false;
        self
    }

    /// `convert` panics, standing in for a buggy plugin.
    pub fn panicking(mut self) -> Self {
        self.panics = true;
        self
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    pub fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn last_output(&self) -> Option<PathBuf> {
        self.seen.lock().unwrap().last().map(|(_, out)| out.clone())
    }
}

impl Engine for FakeEngine {
    fn id(&self) -> &str {
        self.id
    }

    fn display_name(&self) -> &str {
        "Fake"
    }

    fn supported_formats(&self) -> &[&str] {
        &self.formats
    }

    fn is_available(&self) -> bool {
        self.available.load(Ordering::SeqCst)
    }

    fn version(&self) -> Option<String> {
        Some("1.0".into())
    }

    fn convert(&self, input: &Path, output: &Path) -> ConversionResult {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.seen
            .lock()
            .unwrap()
            .push((input.to_path_buf(), output.to_path_buf()));
        if self.panics {
            panic!("{} blew up on {}", self.id, input.display());
        }
        if self.succeed {
            ConversionResult::success(output)
        } else {
            ConversionResult::failure(ConvertError::engine_failure(self.id, "fake failure"))
        }
    }
}

pub fn registry_of(engines: &[Arc<FakeEngine>]) -> EngineRegistry {
    let mut registry = EngineRegistry::new();
    for e in engines {
        registry.register(e.clone());
    }
    registry
}

pub fn converter_with(engines: &[Arc<FakeEngine>], prefs: Preferences) -> Converter {
    Converter::new(
        registry_of(engines),
        PreferenceStore::in_memory(prefs).into_shared(),
    )
}

/// Creates an empty file named `name` inside `dir`.
pub fn touch(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, b"content").unwrap();
    path
}
