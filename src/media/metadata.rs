use std::io::BufReader;
use std::path::{Path, PathBuf};

use crate::media::id::{self, IdError};
use crate::media::library::{MediaMeta, MediaRecord, RootRegistration, Thumbnail};
use crate::media::mime::{self, MediaKind};

#[derive(Debug, thiserror::Error)]
pub enum RecordError {
    #[error("{} is not a video file", .0.display())]
    NotVideo(PathBuf),
    #[error("{} is not under any registered root", .0.display())]
    OutsideRoots(PathBuf),
    #[error("{}: {source}", path.display())]
    Id {
        path: PathBuf,
        #[source]
        source: IdError,
    },
    #[error("cannot stat {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Turn a file stem into a display title: separators become spaces and each
/// word is capitalised. `my_trip-2020.final` -> `My Trip 2020 Final`.
pub fn humanize_title(stem: &str) -> String {
    stem.split(|c: char| c == '_' || c == '-' || c == '.' || c.is_whitespace())
        .filter(|w| !w.is_empty())
        .map(|word| {
            let mut chars = word.chars();
            match chars.next() {
                Some(first) => first.to_uppercase().chain(chars).collect::<String>(),
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Load the first sidecar thumbnail that exists next to `video`.
pub fn read_thumbnail(video: &Path) -> Option<Thumbnail> {
    for candidate in mime::thumbnail_candidates(video) {
        let Some((MediaKind::Thumbnail, mime)) = mime::classify(&candidate) else {
            continue;
        };
        match std::fs::read(&candidate) {
            Ok(bytes) => {
                return Some(Thumbnail {
                    bytes: bytes.into(),
                    mime,
                })
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => continue,
            Err(e) => {
                tracing::warn!("Cannot read thumbnail {}: {}", candidate.display(), e);
            }
        }
    }
    None
}

/// Best-effort container metadata. Only MP4/M4V headers are parsed; any
/// failure yields empty metadata rather than an error.
pub fn extract_meta(path: &Path, mime: &'static str) -> MediaMeta {
    match mime {
        "video/mp4" => extract_mp4_meta(path).unwrap_or_else(|| {
            tracing::debug!("No MP4 header metadata for {}", path.display());
            MediaMeta::default()
        }),
        _ => MediaMeta::default(),
    }
}

fn extract_mp4_meta(path: &Path) -> Option<MediaMeta> {
    use mp4::TrackType;

    let file = std::fs::File::open(path).ok()?;
    let file_len = file.metadata().ok()?.len();
    let reader = BufReader::new(file);

    let mp4 = mp4::Mp4Reader::read_header(reader, file_len).ok()?;

    let duration = Some(mp4.duration()).filter(|d| !d.is_zero());

    let resolution = mp4
        .tracks()
        .values()
        .find(|t| matches!(t.track_type(), Ok(TrackType::Video)))
        .and_then(|t| {
            let (w, h) = (t.width(), t.height());
            (w > 0 && h > 0).then(|| format!("{}x{}", w, h))
        });

    Some(MediaMeta {
        duration,
        resolution,
    })
}

/// Build the record for one video file under `root`.
///
/// Fails when the file is not a video, lies outside the root, cannot be
/// stat'ed, or has a path that cannot form a URL-safe id. Thumbnail and
/// header problems never fail the record.
pub fn build_record(root: &RootRegistration, path: &Path) -> Result<MediaRecord, RecordError> {
    let Some((MediaKind::Video, mime)) = mime::classify(path) else {
        return Err(RecordError::NotVideo(path.to_path_buf()));
    };
    let relative = path
        .strip_prefix(&root.dir)
        .map_err(|_| RecordError::OutsideRoots(path.to_path_buf()))?;
    let id = id::id_for(&root.prefix, relative).map_err(|source| RecordError::Id {
        path: path.to_path_buf(),
        source,
    })?;

    let io_err = |source: std::io::Error| RecordError::Io {
        path: path.to_path_buf(),
        source,
    };
    let stat = std::fs::metadata(path).map_err(io_err)?;
    if !stat.is_file() {
        return Err(RecordError::NotVideo(path.to_path_buf()));
    }
    let modified = stat.modified().map_err(io_err)?;

    let title = path
        .file_stem()
        .map(|s| humanize_title(&s.to_string_lossy()))
        .unwrap_or_default();

    Ok(MediaRecord {
        id,
        prefix: root.prefix.clone(),
        title,
        path: path.to_path_buf(),
        size: stat.len(),
        mime,
        modified,
        thumbnail: read_thumbnail(path),
        meta: extract_meta(path, mime),
    })
}
