use std::sync::Arc;

use crate::media::library::Library;
use crate::playlist::Playlist;
use crate::store::ViewStore;

/// Shared application state injected into all route handlers via axum::extract::State.
/// The library synchronizes itself; handlers never hold its lock across an await.
#[derive(Clone)]
pub struct AppState {
    pub library: Arc<Library>,
    pub store: Arc<dyn ViewStore>,
}

impl AppState {
    pub fn new(library: Arc<Library>, store: Arc<dyn ViewStore>) -> Self {
        Self { library, store }
    }

    pub fn playlist(&self) -> Playlist {
        Playlist::new(Arc::clone(&self.library), Arc::clone(&self.store))
    }
}
