use serde::Serialize;

/// Default and optional fallback engine for one extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EnginePolicy {
    pub default_engine: &'static str,
    pub fallback_engine: Option<&'static str>,
}

impl EnginePolicy {
    const fn new(default_engine: &'static str, fallback_engine: Option<&'static str>) -> Self {
        Self {
            default_engine,
            fallback_engine,
        }
    }
}

// The key set of this table is the set of supported extensions.
const POLICY_TABLE: &[(&str, EnginePolicy)] = &[
    // office
    ("docx", EnginePolicy::new("pandoc", Some("markitdown"))),
    ("doc", EnginePolicy::new("pandoc", None)),
    ("xlsx", EnginePolicy::new("markitdown", Some("pandoc"))),
    ("xls", EnginePolicy::new("markitdown", None)),
    ("pptx", EnginePolicy::new("markitdown", Some("pandoc"))),
    ("ppt", EnginePolicy::new("markitdown", None)),
    ("pdf", EnginePolicy::new("pandoc", Some("markitdown"))),
    // rich text
    ("rtf", EnginePolicy::new("pandoc", None)),
    ("odt", EnginePolicy::new("pandoc", None)),
    // web
    ("html", EnginePolicy::new("pandoc", Some("markitdown"))),
    ("htm", EnginePolicy::new("pandoc", Some("markitdown"))),
    ("epub", EnginePolicy::new("pandoc", Some("markitdown"))),
    // data
    ("csv", EnginePolicy::new("markitdown", None)),
    ("json", EnginePolicy::new("markitdown", None)),
    ("xml", EnginePolicy::new("markitdown", None)),
];

const FORMAT_DISPLAY_NAMES: &[(&str, &str)] = &[
    ("docx", "Word Document"),
    ("doc", "Word Document (Legacy)"),
    ("xlsx", "Excel Spreadsheet"),
    ("xls", "Excel Spreadsheet (Legacy)"),
    ("pptx", "PowerPoint Presentation"),
    ("ppt", "PowerPoint (Legacy)"),
    ("pdf", "PDF Document"),
    ("rtf", "Rich Text Format"),
    ("odt", "OpenDocument Text"),
    ("html", "HTML Document"),
    ("htm", "HTML Document"),
    ("epub", "EPUB eBook"),
    ("csv", "CSV Data"),
    ("json", "JSON Data"),
    ("xml", "XML Data"),
];

const ENGINE_DISPLAY_NAMES: &[(&str, &str)] = &[("pandoc", "Pandoc"), ("markitdown", "MarkItDown")];

/// Lowercases and strips every leading dot: `"..DOCX"` becomes `"docx"`.
pub fn normalize_extension(ext: &str) -> String {
    ext.trim_start_matches('.').to_lowercase()
}

/// Normalized extension of a path, or an empty string when it has none.
pub fn extension_of(path: &std::path::Path) -> String {
    path.extension()
        .and_then(|s| s.to_str())
        .map(normalize_extension)
        .unwrap_or_default()
}

pub fn policy_for(ext: &str) -> Option<EnginePolicy> {
    let ext = normalize_extension(ext);
    POLICY_TABLE
        .iter()
        .find(|(key, _)| *key == ext)
        .map(|(_, policy)| *policy)
}

pub fn default_engine_for(ext: &str) -> Option<&'static str> {
    policy_for(ext).map(|p| p.default_engine)
}

pub fn fallback_engine_for(ext: &str) -> Option<&'static str> {
    policy_for(ext).and_then(|p| p.fallback_engine)
}

pub fn is_supported(ext: &str) -> bool {
    policy_for(ext).is_some()
}

/// Sorted list of every extension the policy table covers.
pub fn supported_extensions() -> Vec<&'static str> {
    let mut exts: Vec<&'static str> = POLICY_TABLE.iter().map(|(key, _)| *key).collect();
    exts.sort_unstable();
    exts
}

pub fn format_display_name(ext: &str) -> Option<&'static str> {
    let ext = normalize_extension(ext);
    FORMAT_DISPLAY_NAMES
        .iter()
        .find(|(key, _)| *key == ext)
        .map(|(_, name)| *name)
}

pub fn engine_display_name(id: &str) -> Option<&'static str> {
    ENGINE_DISPLAY_NAMES
        .iter()
        .find(|(key, _)| *key == id)
        .map(|(_, name)| *name)
}
