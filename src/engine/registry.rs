use super::{Engine, markitdown::MarkItDownEngine, pandoc::PandocEngine};
use crate::config::Config;
use crate::policy::{self, normalize_extension};
use std::sync::Arc;
use tracing::debug;

/// Registered engines in registration order. Availability is never cached
/// here; every query asks the engines again.
#[derive(Default, Clone)]
pub struct EngineRegistry {
    engines: Vec<Arc<dyn Engine>>,
}

impl EngineRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry holding the built-in Pandoc and MarkItDown engines.
    pub fn with_default_engines(cfg: &Config) -> Self {
        let mut registry = Self::new();
        registry.register(Arc::new(PandocEngine::new(&cfg.engines.pandoc)));
        registry.register(Arc::new(MarkItDownEngine::new(&cfg.engines.markitdown)));
        registry
    }

    /// Inserts `engine`, replacing in place any engine with the same id.
    pub fn register(&mut self, engine: Arc<dyn Engine>) {
        match self.engines.iter().position(|e| e.id() == engine.id()) {
            Some(idx) => {
                debug!("replacing engine {}", engine.id());
                self.engines[idx] = engine;
            }
            None => {
                debug!("registering engine {}", engine.id());
                self.engines.push(engine);
            }
        }
    }

    pub fn get(&self, id: &str) -> Option<Arc<dyn Engine>> {
        self.engines.iter().find(|e| e.id() == id).cloned()
    }

    pub fn all(&self) -> Vec<Arc<dyn Engine>> {
        self.engines.clone()
    }

    pub fn available_engines(&self) -> Vec<Arc<dyn Engine>> {
        self.engines
            .iter()
            .filter(|e| e.is_available())
            .cloned()
            .collect()
    }

    /// Policy default, then policy fallback, then the first available engine
    /// that claims the format. Each candidate must be registered, available
    /// and declare support.
    pub fn best_engine_for(&self, ext: &str) -> Option<Arc<dyn Engine>> {
        let ext = normalize_extension(ext);

        if let Some(id) = policy::default_engine_for(&ext) {
            if let Some(engine) = self.usable(id, &ext) {
                debug!("{ext}: using default engine {id}");
                return Some(engine);
            }
        }

        if let Some(id) = policy::fallback_engine_for(&ext) {
            if let Some(engine) = self.usable(id, &ext) {
                debug!("{ext}: using fallback engine {id}");
                return Some(engine);
            }
        }

        let any = self
            .engines
            .iter()
            .find(|e| e.supports_format(&ext) && e.is_available())
            .cloned();
        if let Some(engine) = &any {
            debug!("{ext}: using first capable engine {}", engine.id());
        }
        any
    }

    pub fn engines_supporting(&self, ext: &str) -> Vec<Arc<dyn Engine>> {
        let ext = normalize_extension(ext);
        self.engines
            .iter()
            .filter(|e| e.supports_format(&ext) && e.is_available())
            .cloned()
            .collect()
    }

    /// `id` if it is registered, available and declares `ext`.
    pub fn usable(&self, id: &str, ext: &str) -> Option<Arc<dyn Engine>> {
        self.get(id)
            .filter(|e| e.supports_format(ext) && e.is_available())
    }
}
