pub mod markitdown;
pub mod pandoc;
pub mod process;
pub mod registry;
pub mod types;

use crate::policy::normalize_extension;
use std::path::Path;

pub use registry::EngineRegistry;
pub use types::{ConversionResult, EngineInfo};

/// A converter backend. Implementations wrap an external tool; the registry
/// and converter only ever talk to them through this trait.
pub trait Engine: Send + Sync {
    /// Stable short name, unique within a registry.
    fn id(&self) -> &str;
    fn display_name(&self) -> &str;
    /// Normalized extensions (lowercase, no dot) this engine claims.
    fn supported_formats(&self) -> &[&str];
    /// May run the external tool on every call.
    fn is_available(&self) -> bool;
    fn version(&self) -> Option<String>;
    fn convert(&self, input: &Path, output: &Path) -> ConversionResult;

    fn supports_format(&self, ext: &str) -> bool {
        let ext = normalize_extension(ext);
        self.supported_formats().iter().any(|f| *f == ext)
    }

    fn info(&self) -> EngineInfo {
        EngineInfo {
            id: self.id().to_string(),
            display_name: self.display_name().to_string(),
            version: self.version(),
            available: self.is_available(),
        }
    }
}
