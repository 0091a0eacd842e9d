//! Keeps the library index in step with the filesystem.
//!
//! One `notify` watcher covers every registered root. Raw events are bridged
//! into a tokio channel and drained by a single task, which applies them one
//! at a time through the same `Library` API request handlers use.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

use crate::media::library::Library;
use crate::media::metadata::RecordError;
use crate::media::mime::{self, MediaKind};
use crate::media::scanner;

/// An index-level change derived from a raw filesystem event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FsChange {
    /// A file or directory appeared or was written.
    Upsert(PathBuf),
    /// A file or directory went away.
    Remove(PathBuf),
    /// Applied as a removal of `from` followed by an upsert of `to`.
    Rename { from: PathBuf, to: PathBuf },
}

#[derive(Debug, thiserror::Error)]
pub enum WatchError {
    #[error("cannot start filesystem watcher: {0}")]
    Notify(#[from] notify::Error),
}

fn by_existence(path: PathBuf) -> FsChange {
    if path.exists() {
        FsChange::Upsert(path)
    } else {
        FsChange::Remove(path)
    }
}

/// Translate a raw notification into index changes. Access events carry no
/// change; events whose meaning is ambiguous are resolved against the disk.
pub fn translate(event: Event) -> Vec<FsChange> {
    let Event { kind, paths, .. } = event;
    match kind {
        EventKind::Access(_) => Vec::new(),
        EventKind::Create(_) => paths.into_iter().map(FsChange::Upsert).collect(),
        EventKind::Remove(_) => paths.into_iter().map(FsChange::Remove).collect(),
        EventKind::Modify(ModifyKind::Name(RenameMode::Both)) if paths.len() == 2 => {
            match <[PathBuf; 2]>::try_from(paths) {
                Ok([from, to]) => vec![FsChange::Rename { from, to }],
                Err(paths) => paths.into_iter().map(by_existence).collect(),
            }
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::From)) => {
            paths.into_iter().map(FsChange::Remove).collect()
        }
        EventKind::Modify(ModifyKind::Name(RenameMode::To)) => {
            paths.into_iter().map(FsChange::Upsert).collect()
        }
        EventKind::Modify(ModifyKind::Name(_)) | EventKind::Any | EventKind::Other => {
            paths.into_iter().map(by_existence).collect()
        }
        EventKind::Modify(_) => paths.into_iter().map(FsChange::Upsert).collect(),
    }
}

/// Apply one change to the index. Blocking: reads files and walks
/// directories, so call it off the async executor.
///
/// Failures (a file gone between event and read, an unsafe name) are
/// logged and dropped; there is no caller to report them to.
pub fn apply_change(library: &Library, change: FsChange) {
    match change {
        FsChange::Upsert(path) => upsert_path(library, &path),
        FsChange::Remove(path) => remove_path(library, &path),
        FsChange::Rename { from, to } => {
            remove_path(library, &from);
            upsert_path(library, &to);
        }
    }
}

/// [`apply_change`] on the blocking pool.
pub async fn apply_change_async(library: Arc<Library>, change: FsChange) {
    if let Err(e) = tokio::task::spawn_blocking(move || apply_change(&library, change)).await {
        tracing::warn!("Index update task failed: {}", e);
    }
}

fn upsert_path(library: &Library, path: &Path) {
    if path.is_dir() {
        for file in scanner::video_files(path, &[]) {
            upsert_video(library, &file);
        }
        return;
    }
    match mime::classify(path) {
        Some((MediaKind::Video, _)) => upsert_video(library, path),
        Some((MediaKind::Thumbnail, _)) => {
            for video in mime::videos_for_thumbnail(path) {
                upsert_video(library, &video);
            }
        }
        None => {}
    }
}

fn upsert_video(library: &Library, path: &Path) {
    match library.record_for_path(path) {
        Ok(record) => {
            if let Err(e) = library.upsert(record) {
                tracing::warn!("Not indexing {}: {}", path.display(), e);
            }
        }
        Err(RecordError::OutsideRoots(_)) => {
            tracing::debug!("Ignoring {} outside registered roots", path.display());
        }
        Err(e) => tracing::warn!("Dropping change for {}: {}", path.display(), e),
    }
}

fn remove_path(library: &Library, path: &Path) {
    library.remove_under(path);
    // A sidecar going away changes its video's record, not the index shape.
    if let Some((MediaKind::Thumbnail, _)) = mime::classify(path) {
        for video in mime::videos_for_thumbnail(path) {
            upsert_video(library, &video);
        }
    }
}

/// Keeps the watcher and its draining task alive.
pub struct WatcherHandle {
    watcher: RecommendedWatcher,
    task: JoinHandle<()>,
}

impl std::fmt::Debug for WatcherHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WatcherHandle")
            .field("finished", &self.task.is_finished())
            .finish_non_exhaustive()
    }
}

impl WatcherHandle {
    /// Stop receiving notifications and wait for queued changes to drain.
    pub async fn shutdown(self) {
        drop(self.watcher);
        if let Err(e) = self.task.await {
            tracing::warn!("Watcher task ended abnormally: {}", e);
        }
    }
}

/// Watch every root registered in `library` until the handle is shut down.
/// Must be called from within a tokio runtime.
pub fn spawn(library: Arc<Library>) -> Result<WatcherHandle, WatchError> {
    let (tx, mut rx) = mpsc::unbounded_channel::<Event>();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<Event>| match res {
        Ok(event) => {
            if tx.send(event).is_err() {
                tracing::debug!("Watcher channel closed, dropping event");
            }
        }
        Err(e) => tracing::warn!("Filesystem watch error: {}", e),
    })?;

    for root in library.roots() {
        match watcher.watch(&root.dir, RecursiveMode::Recursive) {
            Ok(()) => tracing::info!("Watching {} for changes", root.dir.display()),
            Err(e) => tracing::warn!("Cannot watch {}: {}", root.dir.display(), e),
        }
    }

    let task = tokio::spawn(async move {
        while let Some(event) = rx.recv().await {
            tracing::debug!("fs event {:?} {:?}", event.kind, event.paths);
            for change in translate(event) {
                apply_change_async(Arc::clone(&library), change).await;
            }
        }
        tracing::debug!("Filesystem watcher stopped");
    });

    Ok(WatcherHandle { watcher, task })
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{CreateKind, DataChange, RemoveKind};

    fn event(kind: EventKind, paths: &[&str]) -> Event {
        let mut event = Event::new(kind);
        for p in paths {
            event = event.add_path(PathBuf::from(p));
        }
        event
    }

    #[test]
    fn create_and_write_become_upserts() {
        let created = translate(event(EventKind::Create(CreateKind::File), &["/r/a.mp4"]));
        assert_eq!(created, vec![FsChange::Upsert("/r/a.mp4".into())]);
        let written = translate(event(
            EventKind::Modify(ModifyKind::Data(DataChange::Content)),
            &["/r/a.mp4"],
        ));
        assert_eq!(written, vec![FsChange::Upsert("/r/a.mp4".into())]);
    }

    #[test]
    fn remove_becomes_removal() {
        let removed = translate(event(EventKind::Remove(RemoveKind::File), &["/r/a.mp4"]));
        assert_eq!(removed, vec![FsChange::Remove("/r/a.mp4".into())]);
    }

    #[test]
    fn paired_rename_keeps_both_paths() {
        let renamed = translate(event(
            EventKind::Modify(ModifyKind::Name(RenameMode::Both)),
            &["/r/a.mp4", "/r/b.mp4"],
        ));
        assert_eq!(
            renamed,
            vec![FsChange::Rename {
                from: "/r/a.mp4".into(),
                to: "/r/b.mp4".into()
            }]
        );
    }

    #[test]
    fn access_is_ignored() {
        let accessed = translate(event(
            EventKind::Access(notify::event::AccessKind::Any),
            &["/r/a.mp4"],
        ));
        assert!(accessed.is_empty());
    }
}
