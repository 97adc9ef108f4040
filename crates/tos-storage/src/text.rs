//! Text detection by key extension.

const TEXT_EXTENSIONS: &[&str] = &[
    ".txt",
    ".log",
    ".json",
    ".xml",
    ".yml",
    ".yaml",
    ".md",
    ".csv",
    ".ini",
    ".conf",
    ".py",
    ".js",
    ".html",
    ".css",
    ".sh",
    ".bash",
    ".cfg",
    ".properties",
];

/// Whether an object is returned as text rather than base64.
///
/// Case-insensitive suffix match on the key; content is never sniffed.
pub fn is_text_file(key: &str) -> bool {
    let key = key.to_lowercase();
    TEXT_EXTENSIONS.iter().any(|ext| key.ends_with(ext))
}
