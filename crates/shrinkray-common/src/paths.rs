//! Path utilities for output naming and input detection.

use std::path::{Path, PathBuf};

use crate::types::Container;

/// File extensions offered by the input picker.
const MEDIA_EXTENSIONS: &[&str] = &[
    "mp4", "mov", "avi", "mkv", "webm", "m4v", "mp3", "wav", "jpg", "png",
];

/// Default suffix appended to the input stem when naming the output.
pub const DEFAULT_OUTPUT_SUFFIX: &str = "_compressed";

/// Derive the output path for a transcode, next to the input.
///
/// The input's extension is replaced by the container extension and
/// `suffix` is appended to the stem.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shrinkray_common::Container;
/// use shrinkray_common::paths::compressed_output_path;
///
/// let out = compressed_output_path(Path::new("/videos/trip.mov"), Container::Webm, "_compressed");
/// assert_eq!(out, Path::new("/videos/trip_compressed.webm"));
/// ```
pub fn compressed_output_path(input: &Path, container: Container, suffix: &str) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "output".to_string());

    input.with_file_name(format!("{stem}{suffix}{}", container.extension()))
}

/// Check if a path has one of the recognised media extensions.
///
/// # Examples
///
/// ```
/// use std::path::Path;
/// use shrinkray_common::paths::is_media_file;
///
/// assert!(is_media_file(Path::new("clip.MP4")));
/// assert!(!is_media_file(Path::new("notes.txt")));
/// ```
pub fn is_media_file(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| MEDIA_EXTENSIONS.contains(&ext.to_lowercase().as_str()))
        .unwrap_or(false)
}
