use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use unicode_normalization::UnicodeNormalization;

// ---------------------------------------------------------------------------
// Directory and name constants
// ---------------------------------------------------------------------------

pub const UPLOAD_DIR_NAME: &str = "ifc_processing";
pub const OUTPUT_DIR_NAME: &str = "ifc_output";

/// Used when sanitizing leaves nothing of the client-supplied filename.
pub const FALLBACK_FILENAME: &str = "upload.ifc";

pub const MODIFIED_SUFFIX: &str = "_modified";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn default_upload_dir() -> PathBuf {
    std::env::temp_dir().join(UPLOAD_DIR_NAME)
}

pub fn default_output_dir() -> PathBuf {
    std::env::temp_dir().join(OUTPUT_DIR_NAME)
}

fn unsafe_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^A-Za-z0-9_.-]").unwrap())
}

/// Reduce a client-supplied filename to something safe to join onto a
/// server directory.
///
/// Path separators become whitespace, whitespace runs collapse to `_`,
/// anything outside `[A-Za-z0-9_.-]` is dropped, and leading/trailing dots
/// and underscores are trimmed. The name is NFKD-decomposed first, so
/// accented letters keep their ASCII base (`María` → `Maria`); whatever is
/// still non-ASCII is dropped. Returns [`FALLBACK_FILENAME`] when nothing
/// survives.
pub fn secure_filename(name: &str) -> String {
    let spaced: String = name
        .nfkd()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();
    let joined = spaced.split_whitespace().collect::<Vec<_>>().join("_");
    let cleaned = unsafe_chars().replace_all(&joined, "");
    let trimmed = cleaned.trim_matches(|c| c == '.' || c == '_');
    if trimmed.is_empty() {
        FALLBACK_FILENAME.to_string()
    } else {
        trimmed.to_string()
    }
}

/// `model.ifc` → `model_modified.ifc`; `model` → `model_modified`.
pub fn modified_filename(name: &str) -> String {
    let path = Path::new(name);
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or(name);
    match path.extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{stem}{MODIFIED_SUFFIX}.{ext}"),
        None => format!("{stem}{MODIFIED_SUFFIX}"),
    }
}

/// Filename for a staged upload. The unique prefix keeps concurrent uploads
/// of the same file apart.
pub fn staged_filename(unique: &str, sanitized: &str) -> String {
    format!("{unique}_{sanitized}")
}
