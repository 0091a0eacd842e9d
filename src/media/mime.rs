use std::path::{Path, PathBuf};

/// Kinds of file the library cares about.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum MediaKind {
    /// A playable video, indexed as a record.
    Video,
    /// A sidecar image written next to a video by the thumbnailer.
    Thumbnail,
}

/// Video extensions in lookup order for sidecar resolution.
pub const VIDEO_EXTENSIONS: &[&str] = &["mp4", "m4v", "webm", "mkv", "mov", "ogv"];

/// Sidecar thumbnail extensions, in the order they are tried.
pub const THUMBNAIL_EXTENSIONS: &[&str] = &["jpg", "jpeg", "png", "webp"];

/// Classify a file path by its extension into a (MediaKind, MIME type) pair.
///
/// Returns `None` for unrecognized extensions. Extensions are matched
/// case-insensitively.
pub fn classify(path: &Path) -> Option<(MediaKind, &'static str)> {
    let ext = path.extension()?.to_str()?.to_ascii_lowercase();

    let result = match ext.as_str() {
        "mp4" => (MediaKind::Video, "video/mp4"),
        "m4v" => (MediaKind::Video, "video/mp4"),
        "webm" => (MediaKind::Video, "video/webm"),
        "mkv" => (MediaKind::Video, "video/x-matroska"),
        "mov" => (MediaKind::Video, "video/quicktime"),
        "ogv" => (MediaKind::Video, "video/ogg"),

        "jpg" => (MediaKind::Thumbnail, "image/jpeg"),
        "jpeg" => (MediaKind::Thumbnail, "image/jpeg"),
        "png" => (MediaKind::Thumbnail, "image/png"),
        "webp" => (MediaKind::Thumbnail, "image/webp"),

        _ => return None,
    };

    Some(result)
}

pub fn is_video(path: &Path) -> bool {
    matches!(classify(path), Some((MediaKind::Video, _)))
}

/// Candidate sidecar thumbnail paths for a video, in preference order.
pub fn thumbnail_candidates(video: &Path) -> Vec<PathBuf> {
    THUMBNAIL_EXTENSIONS
        .iter()
        .map(|ext| video.with_extension(ext))
        .collect()
}

/// Videos that could own the sidecar thumbnail at `thumbnail`.
/// Only candidates that currently exist on disk are returned.
pub fn videos_for_thumbnail(thumbnail: &Path) -> Vec<PathBuf> {
    VIDEO_EXTENSIONS
        .iter()
        .map(|ext| thumbnail.with_extension(ext))
        .filter(|p| p.is_file())
        .collect()
}
