use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Instant;
use walkdir::WalkDir;

use crate::media::library::{MediaRecord, RootRegistration};
use crate::media::metadata::{build_record, RecordError};
use crate::media::mime::is_video;

/// Statistics collected while scanning one root.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScanStats {
    pub indexed: usize,
    pub skipped: usize,
    pub elapsed_secs: f64,
}

/// Walk `root` and build a record for every video beneath it.
///
/// Symlinks are followed. Directories listed in `nested` belong to other
/// roots and are not descended into. Unreadable entries, files with unsafe
/// names and duplicate ids are logged and skipped; nothing here is fatal.
pub fn scan_root(root: &RootRegistration, nested: &[PathBuf]) -> (Vec<MediaRecord>, ScanStats) {
    let start = Instant::now();
    let mut records = Vec::new();
    let mut seen = HashSet::new();
    let mut stats = ScanStats::default();

    for path in video_files(&root.dir, nested) {
        match build_record(root, &path) {
            Ok(record) => {
                if !seen.insert(record.id.clone()) {
                    tracing::warn!(
                        "Skipping {}: id {:?} already taken by another file",
                        path.display(),
                        record.id
                    );
                    stats.skipped += 1;
                    continue;
                }
                tracing::debug!("indexed {} -> {}", record.id, record.path.display());
                records.push(record);
            }
            Err(RecordError::NotVideo(_)) => {}
            Err(e) => {
                tracing::warn!("Skipping file: {}", e);
                stats.skipped += 1;
            }
        }
    }

    stats.indexed = records.len();
    stats.elapsed_secs = start.elapsed().as_secs_f64();
    (records, stats)
}

/// Every video file under `dir`, skipping the `nested` subtrees.
/// Missing or unreadable paths log a warning and yield nothing.
pub fn video_files(dir: &Path, nested: &[PathBuf]) -> Vec<PathBuf> {
    if !dir.exists() {
        tracing::warn!("Scan path does not exist, skipping: {}", dir.display());
        return Vec::new();
    }

    let mut files = Vec::new();
    let walker = WalkDir::new(dir)
        .follow_links(true)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| !nested.iter().any(|n| e.path() == n.as_path()));
    for entry in walker {
        match entry {
            Err(e) => {
                tracing::warn!("Cannot access entry: {}", e);
            }
            Ok(entry) if entry.file_type().is_file() && is_video(entry.path()) => {
                files.push(entry.into_path());
            }
            Ok(_) => {}
        }
    }
    files
}
