use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use crate::media::id::{self, IdError};
use crate::media::metadata::{self, RecordError};
use crate::media::scanner::{self, ScanStats};

/// Metadata read from the container header. Every field is optional; a file
/// whose header cannot be parsed is still indexed.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MediaMeta {
    pub duration: Option<Duration>,
    /// Pixel dimensions as "WxH".
    pub resolution: Option<String>,
}

/// Sidecar image bytes, loaded once when the record is built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Thumbnail {
    pub bytes: Arc<[u8]>,
    pub mime: &'static str,
}

/// A single discovered video.
///
/// View counts are deliberately absent: they live in the view store only.
#[derive(Debug, Clone)]
pub struct MediaRecord {
    /// Root prefix joined with the relative path, `.mp4` dropped.
    pub id: String,
    /// Prefix of the root this record was discovered under.
    pub prefix: String,
    /// Humanized file stem.
    pub title: String,
    /// Absolute path under the (canonical) root directory.
    pub path: PathBuf,
    pub size: u64,
    pub mime: &'static str,
    /// File modification time when the record was built.
    pub modified: SystemTime,
    pub thumbnail: Option<Thumbnail>,
    pub meta: MediaMeta,
}

impl MediaRecord {
    /// The id this video had before its root was given a prefix.
    pub fn legacy_id(&self) -> &str {
        if self.prefix.is_empty() {
            return &self.id;
        }
        self.id
            .strip_prefix(self.prefix.as_str())
            .and_then(|rest| rest.strip_prefix('/'))
            .unwrap_or(&self.id)
    }

    /// Modification time in whole seconds since the Unix epoch (0 if earlier).
    pub fn timestamp(&self) -> u64 {
        self.modified
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0)
    }
}

/// A configured (directory, prefix) pair. Immutable once registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RootRegistration {
    /// Canonical absolute directory.
    pub dir: PathBuf,
    pub prefix: String,
}

#[derive(Debug, thiserror::Error)]
pub enum LibraryError {
    #[error("prefix {0:?} is already registered")]
    DuplicatePrefix(String),
    #[error("directory {} is already registered", .0.display())]
    DuplicateDirectory(PathBuf),
    #[error("{} is not a directory", .0.display())]
    NotADirectory(PathBuf),
    #[error("prefix {prefix:?} overlaps registered prefix {existing:?}")]
    OverlappingPrefix { prefix: String, existing: String },
    #[error("id {id:?} already belongs to {}", existing.display())]
    IdTaken { id: String, existing: PathBuf },
    #[error("no root registered with prefix {0:?}")]
    UnknownRoot(String),
    #[error(transparent)]
    Id(#[from] IdError),
    #[error("cannot access {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

#[derive(Debug, Default)]
struct Index {
    roots: Vec<RootRegistration>,
    records: HashMap<String, Arc<MediaRecord>>,
}

/// In-memory id → record index shared by request handlers and the watcher.
///
/// Readers take the read lock only long enough to clone an `Arc`. Structural
/// writers (`scan`, `upsert`, `remove`) are serialized by a separate writer
/// mutex so directory walks and file reads never happen under the read/write
/// lock; the lock is only held to swap finished data in.
#[derive(Debug, Default)]
pub struct Library {
    index: RwLock<Index>,
    writer: Mutex<()>,
}

impl Library {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Index> {
        self.index.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Index> {
        self.index.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn serialize_writers(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Register a root directory under `prefix`. The directory is
    /// canonicalized first, so two spellings of one directory collide.
    pub fn add_root(&self, dir: &Path, prefix: &str) -> Result<RootRegistration, LibraryError> {
        id::validate_prefix(prefix)?;
        let canonical = std::fs::canonicalize(dir).map_err(|source| LibraryError::Io {
            path: dir.to_path_buf(),
            source,
        })?;
        if !canonical.is_dir() {
            return Err(LibraryError::NotADirectory(canonical));
        }

        let _writer = self.serialize_writers();
        let mut index = self.write();
        if index.roots.iter().any(|r| r.prefix == prefix) {
            return Err(LibraryError::DuplicatePrefix(prefix.to_string()));
        }
        if index.roots.iter().any(|r| r.dir == canonical) {
            return Err(LibraryError::DuplicateDirectory(canonical));
        }
        // Two roots may never be able to produce the same id.
        if let Some(other) = index
            .roots
            .iter()
            .find(|r| id::prefixes_overlap(&r.prefix, prefix))
        {
            return Err(LibraryError::OverlappingPrefix {
                prefix: prefix.to_string(),
                existing: other.prefix.clone(),
            });
        }
        let root = RootRegistration {
            dir: canonical,
            prefix: prefix.to_string(),
        };
        tracing::info!("Registered root {} as {:?}", root.dir.display(), root.prefix);
        index.roots.push(root.clone());
        Ok(root)
    }

    pub fn roots(&self) -> Vec<RootRegistration> {
        self.read().roots.clone()
    }

    pub fn root(&self, prefix: &str) -> Option<RootRegistration> {
        self.read().roots.iter().find(|r| r.prefix == prefix).cloned()
    }

    /// The root that owns `path`. When roots nest, the deepest one wins.
    pub fn root_for_path(&self, path: &Path) -> Option<RootRegistration> {
        self.read()
            .roots
            .iter()
            .filter(|r| path.starts_with(&r.dir))
            .max_by_key(|r| r.dir.components().count())
            .cloned()
    }

    /// Id a file at `path` would be indexed under, without touching disk.
    pub fn id_for_path(&self, path: &Path) -> Option<String> {
        let root = self.root_for_path(path)?;
        let relative = path.strip_prefix(&root.dir).ok()?;
        id::id_for(&root.prefix, relative).ok()
    }

    /// Build a record for a single file. Runs without any library lock held.
    pub fn record_for_path(&self, path: &Path) -> Result<MediaRecord, RecordError> {
        let root = self
            .root_for_path(path)
            .ok_or_else(|| RecordError::OutsideRoots(path.to_path_buf()))?;
        metadata::build_record(&root, path)
    }

    /// Walk the root registered as `prefix` and atomically replace every
    /// record under that prefix with the freshly scanned set.
    pub fn scan(&self, prefix: &str) -> Result<ScanStats, LibraryError> {
        let root = self
            .root(prefix)
            .ok_or_else(|| LibraryError::UnknownRoot(prefix.to_string()))?;

        let _writer = self.serialize_writers();
        // Roots nested inside this one are indexed under their own prefix.
        let nested: Vec<PathBuf> = self
            .roots()
            .into_iter()
            .filter(|r| r.dir != root.dir && r.dir.starts_with(&root.dir))
            .map(|r| r.dir)
            .collect();
        let (records, stats) = scanner::scan_root(&root, &nested);

        let mut index = self.write();
        index.records.retain(|_, r| r.prefix != root.prefix);
        for record in records {
            index.records.insert(record.id.clone(), Arc::new(record));
        }
        drop(index);

        tracing::info!(
            "Indexed {} videos under {:?} ({} skipped) in {:.1}s",
            stats.indexed,
            root.prefix,
            stats.skipped,
            stats.elapsed_secs
        );
        Ok(stats)
    }

    /// Insert or replace one record by id. Returns the previous record.
    ///
    /// A record held by a different file that still exists is never
    /// replaced: `x.MP4` and `x.mp4` share an id, and the first one indexed
    /// keeps it.
    pub fn upsert(&self, record: MediaRecord) -> Result<Option<Arc<MediaRecord>>, LibraryError> {
        let _writer = self.serialize_writers();
        if let Some(existing) = self.get(&record.id) {
            if existing.path != record.path && existing.path.exists() {
                return Err(LibraryError::IdTaken {
                    id: record.id,
                    existing: existing.path.clone(),
                });
            }
        }
        tracing::debug!("upsert {} -> {}", record.id, record.path.display());
        Ok(self.write().records.insert(record.id.clone(), Arc::new(record)))
    }

    /// Remove one record. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &str) -> Option<Arc<MediaRecord>> {
        let _writer = self.serialize_writers();
        let removed = self.write().records.remove(id);
        if removed.is_some() {
            tracing::debug!("removed {}", id);
        }
        removed
    }

    /// Remove every record whose file is `path` or lies beneath it.
    /// Returns the ids removed, sorted.
    pub fn remove_under(&self, path: &Path) -> Vec<String> {
        let _writer = self.serialize_writers();
        let mut index = self.write();
        let mut removed: Vec<String> = index
            .records
            .values()
            .filter(|r| r.path.starts_with(path))
            .map(|r| r.id.clone())
            .collect();
        for id in &removed {
            index.records.remove(id);
        }
        drop(index);
        removed.sort();
        if !removed.is_empty() {
            tracing::debug!("removed {} record(s) under {}", removed.len(), path.display());
        }
        removed
    }

    pub fn get(&self, id: &str) -> Option<Arc<MediaRecord>> {
        self.read().records.get(id).cloned()
    }

    /// Every record, ordered by id.
    pub fn snapshot(&self) -> Vec<Arc<MediaRecord>> {
        let mut records: Vec<Arc<MediaRecord>> = self.read().records.values().cloned().collect();
        records.sort_by(|a, b| a.id.cmp(&b.id));
        records
    }

    pub fn len(&self) -> usize {
        self.read().records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
