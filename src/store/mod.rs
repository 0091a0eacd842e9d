//! Durable per-video view counters.
//!
//! [`ViewStore`] is the seam HTTP handlers and the playlist talk to;
//! [`RocksStore`] is the crash-safe RocksDB implementation and
//! [`MemoryStore`] a volatile one for embedding and tests.

mod memory;
mod rocks;

pub use self::memory::MemoryStore;
pub use self::rocks::RocksStore;

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("view store I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("view store database error: {0}")]
    Db(#[from] rocksdb::Error),
    #[error("view store value encoding failed: {0}")]
    Encode(#[from] bincode::Error),
}

/// What a call to [`ViewStore::migrate`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Migration {
    /// The counter moved from the old key to the new one.
    Moved(u64),
    /// Only the new key has a counter; an earlier call already moved it.
    AlreadyMigrated,
    /// Neither key has a counter.
    NothingToMigrate,
    /// Both keys have counters. Both are left untouched and reads keep
    /// using the new key.
    Conflict { old: u64, new: u64 },
}

pub trait ViewStore: Send + Sync {
    /// Current count for `id`; 0 when it was never incremented.
    fn get_views(&self, id: &str) -> Result<u64, StoreError>;

    /// Add one view and return the new count. The increment is durable
    /// before this returns.
    fn inc_views(&self, id: &str) -> Result<u64, StoreError>;

    /// Move the counter stored under `old_id` to `new_id`. Idempotent.
    fn migrate(&self, old_id: &str, new_id: &str) -> Result<Migration, StoreError>;

    /// Drop the counter for a deleted video. Returns whether one existed.
    fn delete(&self, id: &str) -> Result<bool, StoreError>;

    /// Degraded read for display: storage errors are logged and shown as 0.
    fn views_or_zero(&self, id: &str) -> u64 {
        self.get_views(id).unwrap_or_else(|e| {
            tracing::warn!("Cannot read views for {}: {}", id, e);
            0
        })
    }
}

/// Decide what migrating `old_id` to `new_id` means given the counters
/// currently stored under each. Shared by every store so the idempotence
/// rules cannot drift apart.
pub(crate) fn plan_migration(
    old_id: &str,
    old: Option<u64>,
    new_id: &str,
    new: Option<u64>,
) -> Migration {
    if old_id == new_id {
        return match new {
            Some(_) => Migration::AlreadyMigrated,
            None => Migration::NothingToMigrate,
        };
    }
    match (old, new) {
        (Some(old), None) => Migration::Moved(old),
        (Some(old), Some(new)) => Migration::Conflict { old, new },
        (None, Some(_)) => Migration::AlreadyMigrated,
        (None, None) => Migration::NothingToMigrate,
    }
}

pub(crate) fn log_migration(old_id: &str, new_id: &str, outcome: Migration) {
    match outcome {
        Migration::Moved(views) => {
            tracing::info!("Migrated {} views from {:?} to {:?}", views, old_id, new_id)
        }
        Migration::Conflict { old, new } => tracing::warn!(
            "Not migrating views: both {:?} ({}) and {:?} ({}) have counters",
            old_id,
            old,
            new_id,
            new
        ),
        Migration::AlreadyMigrated | Migration::NothingToMigrate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_key_never_moves() {
        assert_eq!(plan_migration("a", Some(3), "a", Some(3)), Migration::AlreadyMigrated);
        assert_eq!(plan_migration("a", None, "a", None), Migration::NothingToMigrate);
    }

    #[test]
    fn both_present_is_conflict() {
        assert_eq!(
            plan_migration("a", Some(1), "p/a", Some(2)),
            Migration::Conflict { old: 1, new: 2 }
        );
    }
}
