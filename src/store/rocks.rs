use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use rocksdb::{IteratorMode, Options, WriteBatch, WriteOptions, DB};

use super::{log_migration, plan_migration, Migration, StoreError, ViewStore};

/// View store backed by RocksDB: one key per video id, the value a
/// bincode-encoded `u64`.
///
/// Every write is synced to the WAL before it returns, so an acknowledged
/// increment survives a crash. Read-modify-write sequences run under a
/// single writer mutex, which keeps increments on one key linearizable;
/// plain reads go straight to the database.
pub struct RocksStore {
    path: PathBuf,
    db: DB,
    writer: Mutex<()>,
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

fn synced() -> WriteOptions {
    let mut opts = WriteOptions::default();
    opts.set_sync(true);
    opts
}

fn decode(value: &[u8]) -> Result<u64, StoreError> {
    Ok(bincode::deserialize(value)?)
}

impl RocksStore {
    /// Open (or create) the database directory at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        let mut db_options = Options::default();
        db_options.create_if_missing(true);
        let db = DB::open(&db_options, &path)?;
        tracing::info!("Opened view store {}", path.display());
        Ok(Self {
            path,
            db,
            writer: Mutex::new(()),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Number of stored counters. Walks the whole keyspace.
    pub fn len(&self) -> usize {
        self.db
            .iterator(IteratorMode::Start)
            .filter(|item| item.is_ok())
            .count()
    }

    pub fn is_empty(&self) -> bool {
        self.db.iterator(IteratorMode::Start).next().is_none()
    }

    fn serialize_writers(&self) -> MutexGuard<'_, ()> {
        self.writer.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn read(&self, id: &str) -> Result<Option<u64>, StoreError> {
        match self.db.get(id.as_bytes())? {
            Some(value) => decode(&value).map(Some),
            None => Ok(None),
        }
    }
}

impl ViewStore for RocksStore {
    fn get_views(&self, id: &str) -> Result<u64, StoreError> {
        Ok(self.read(id)?.unwrap_or(0))
    }

    fn inc_views(&self, id: &str) -> Result<u64, StoreError> {
        let _writer = self.serialize_writers();
        let value = self.read(id)?.unwrap_or(0).saturating_add(1);
        self.db
            .put_opt(id.as_bytes(), bincode::serialize(&value)?, &synced())?;
        Ok(value)
    }

    fn migrate(&self, old_id: &str, new_id: &str) -> Result<Migration, StoreError> {
        let _writer = self.serialize_writers();
        let outcome = plan_migration(old_id, self.read(old_id)?, new_id, self.read(new_id)?);
        if let Migration::Moved(value) = outcome {
            // One batch, so a crash never leaves the counter under both keys
            // or under neither.
            let mut batch = WriteBatch::default();
            batch.delete(old_id.as_bytes());
            batch.put(new_id.as_bytes(), bincode::serialize(&value)?);
            self.db.write_opt(batch, &synced())?;
        }
        log_migration(old_id, new_id, outcome);
        Ok(outcome)
    }

    fn delete(&self, id: &str) -> Result<bool, StoreError> {
        let _writer = self.serialize_writers();
        if self.db.get(id.as_bytes())?.is_none() {
            return Ok(false);
        }
        self.db.delete_opt(id.as_bytes(), &synced())?;
        Ok(true)
    }
}
