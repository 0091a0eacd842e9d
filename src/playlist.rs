use std::cmp::Ordering;
use std::sync::Arc;

use crate::media::library::{Library, MediaRecord};
use crate::store::ViewStore;

/// Default and maximum page sizes for [`paginate`].
pub const DEFAULT_PAGE_SIZE: usize = 10;
pub const MAX_PAGE_SIZE: usize = 100;

/// Playlist ordering. Anything unrecognised means newest first.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Timestamp,
    Views,
}

impl SortKey {
    /// Parse an untrusted query value. Unknown or missing keys fall back to
    /// [`SortKey::Timestamp`]; this is a policy, not an error.
    pub fn parse_lossy(raw: Option<&str>) -> Self {
        match raw.map(|s| s.trim().to_ascii_lowercase()).as_deref() {
            Some("views") => SortKey::Views,
            _ => SortKey::Timestamp,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            SortKey::Timestamp => "timestamp",
            SortKey::Views => "views",
        }
    }
}

/// One playlist row: a record snapshot and its view count at assembly time.
#[derive(Debug, Clone)]
pub struct PlaylistEntry {
    pub record: Arc<MediaRecord>,
    pub views: u64,
}

/// Order entries by `key`, descending, ties broken by ascending id.
pub fn sort_entries(entries: &mut [PlaylistEntry], key: SortKey) {
    entries.sort_by(|a, b| {
        let primary = match key {
            SortKey::Timestamp => b.record.modified.cmp(&a.record.modified),
            SortKey::Views => b.views.cmp(&a.views),
        };
        match primary {
            Ordering::Equal => a.record.id.cmp(&b.record.id),
            other => other,
        }
    });
}

/// Window of `entries` starting at `offset`, at most `limit` long
/// (capped at [`MAX_PAGE_SIZE`]).
pub fn paginate(entries: Vec<PlaylistEntry>, offset: usize, limit: usize) -> Vec<PlaylistEntry> {
    entries
        .into_iter()
        .skip(offset)
        .take(limit.min(MAX_PAGE_SIZE))
        .collect()
}

/// Assembles view-enriched, ordered snapshots of the library per request.
/// Holds no cache; every call reads the index and the store afresh.
#[derive(Clone)]
pub struct Playlist {
    library: Arc<Library>,
    store: Arc<dyn ViewStore>,
}

impl std::fmt::Debug for Playlist {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Playlist")
            .field("videos", &self.library.len())
            .finish_non_exhaustive()
    }
}

impl Playlist {
    pub fn new(library: Arc<Library>, store: Arc<dyn ViewStore>) -> Self {
        Self { library, store }
    }

    pub fn build(&self, key: SortKey) -> Vec<PlaylistEntry> {
        let mut entries: Vec<PlaylistEntry> = self
            .library
            .snapshot()
            .into_iter()
            .map(|record| {
                let views = self.store.views_or_zero(&record.id);
                PlaylistEntry { record, views }
            })
            .collect();
        sort_entries(&mut entries, key);
        entries
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_lossy_accepts_known_keys_only() {
        assert_eq!(SortKey::parse_lossy(Some("views")), SortKey::Views);
        assert_eq!(SortKey::parse_lossy(Some(" VIEWS ")), SortKey::Views);
        assert_eq!(SortKey::parse_lossy(Some("timestamp")), SortKey::Timestamp);
        assert_eq!(SortKey::parse_lossy(Some("bogus")), SortKey::Timestamp);
        assert_eq!(SortKey::parse_lossy(None), SortKey::Timestamp);
    }
}
