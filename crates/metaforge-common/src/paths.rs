//! Path utilities for looking at file names.
//!
//! The classifier falls back to the extension when no token matched, so the
//! helpers here work on plain strings as well as on [`Path`]s.

use std::path::Path;

/// Extensions of files that only point at a stream (no local media).
const STREAM_EXTENSIONS: &[&str] = &["strm"];

/// Lowercased extension of a file name, without the leading dot.
///
/// # Examples
///
/// ```
/// use metaforge_common::paths::extension_lowercase;
///
/// assert_eq!(extension_lowercase("Movie.2010.MKV").as_deref(), Some("mkv"));
/// assert_eq!(extension_lowercase("no_extension"), None);
/// ```
#[must_use]
pub fn extension_lowercase(name: &str) -> Option<String> {
    Path::new(name)
        .extension()
        .and_then(|ext| ext.to_str())
        .filter(|ext| !ext.is_empty())
        .map(|ext| ext.to_lowercase())
}

/// Check if a name has a stream-pointer extension.
///
/// # Examples
///
/// ```
/// use metaforge_common::paths::is_stream_file;
///
/// assert!(is_stream_file("Inception.strm"));
/// assert!(!is_stream_file("Inception.mkv"));
/// ```
#[must_use]
pub fn is_stream_file(name: &str) -> bool {
    extension_lowercase(name)
        .map(|ext| STREAM_EXTENSIONS.contains(&ext.as_str()))
        .unwrap_or(false)
}
