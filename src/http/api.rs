use axum::{
    extract::{Path, Query, State},
    http::{header, StatusCode},
    response::{IntoResponse, Json, Response},
};
use serde::{Deserialize, Serialize};

use crate::http::media::lookup_record;
use crate::http::state::AppState;
use crate::media::library::MediaRecord;
use crate::playlist::{paginate, SortKey, DEFAULT_PAGE_SIZE};

#[derive(Debug, Default, Deserialize)]
pub struct ListParams {
    pub sort: Option<String>,
    pub offset: Option<usize>,
    pub limit: Option<usize>,
}

/// JSON shape of one video. Thumbnail bytes and the on-disk path stay private.
#[derive(Debug, Serialize)]
pub struct VideoView {
    pub id: String,
    pub title: String,
    pub url: String,
    pub thumbnail_url: Option<String>,
    pub timestamp: u64,
    pub size: u64,
    pub duration_secs: Option<f64>,
    pub resolution: Option<String>,
    pub views: u64,
}

impl VideoView {
    pub fn new(record: &MediaRecord, views: u64) -> Self {
        Self {
            id: record.id.clone(),
            title: record.title.clone(),
            url: format!("/media/{}", record.id),
            thumbnail_url: record.thumbnail.as_ref().map(|_| format!("/t/{}", record.id)),
            timestamp: record.timestamp(),
            size: record.size,
            duration_secs: record.meta.duration.map(|d| d.as_secs_f64()),
            resolution: record.meta.resolution.clone(),
            views,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ListResponse {
    pub sort: &'static str,
    pub offset: usize,
    pub count: usize,
    pub total: usize,
    pub videos: Vec<VideoView>,
}

/// GET /v/list: the playlist, ordered by `sort` and paginated.
pub async fn list_videos(
    State(state): State<AppState>,
    Query(params): Query<ListParams>,
) -> Json<ListResponse> {
    let sort = SortKey::parse_lossy(params.sort.as_deref());
    let offset = params.offset.unwrap_or(0);
    let limit = params.limit.unwrap_or(DEFAULT_PAGE_SIZE);

    // Reading counters can wait on a writer's fsync.
    let playlist = state.playlist();
    let entries = tokio::task::spawn_blocking(move || playlist.build(sort))
        .await
        .unwrap_or_else(|e| {
            tracing::warn!("Playlist assembly failed: {}", e);
            Vec::new()
        });
    let total = entries.len();
    let videos: Vec<VideoView> = paginate(entries, offset, limit)
        .iter()
        .map(|e| VideoView::new(&e.record, e.views))
        .collect();

    Json(ListResponse {
        sort: sort.as_str(),
        offset,
        count: videos.len(),
        total,
        videos,
    })
}

/// GET /v/{id}: one video with its live view count.
pub async fn video_info(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    let Some(record) = lookup_record(&state, &id) else {
        return (StatusCode::NOT_FOUND, "Video not found").into_response();
    };
    let store = state.store.clone();
    let key = record.id.clone();
    let views = tokio::task::spawn_blocking(move || store.views_or_zero(&key))
        .await
        .unwrap_or(0);
    Json(VideoView::new(&record, views)).into_response()
}

/// GET /t/{id}: the sidecar thumbnail loaded at index time.
pub async fn thumbnail(State(state): State<AppState>, Path(id): Path<String>) -> Response {
    match lookup_record(&state, &id).and_then(|r| r.thumbnail.clone()) {
        Some(thumb) => (
            [(header::CONTENT_TYPE, thumb.mime)],
            thumb.bytes.to_vec(),
        )
            .into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}
