//! Self-hosted video library. Media roots are indexed and kept live by a
//! filesystem watcher, views are counted durably, and playlists and playback
//! are served over HTTP.

pub mod cli;
pub mod config;
pub mod http;
pub mod media;
pub mod playlist;
pub mod store;
pub mod watcher;
