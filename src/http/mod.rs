pub mod api;
pub mod media;
pub mod state;

use axum::{routing::get, Router};
use tower_http::trace::TraceLayer;
use crate::http::state::AppState;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/v/list", get(api::list_videos))
        .route("/v/{*id}", get(api::video_info))
        .route("/t/{*id}", get(api::thumbnail))
        .route("/media/{*id}", get(media::serve_media_get).head(media::serve_media_head))
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}
