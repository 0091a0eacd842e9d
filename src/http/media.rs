use std::ops::RangeInclusive;
use std::sync::Arc;

use axum::{
    body::Body,
    extract::{Path, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
};
use http_range_header::parse_range_header;
use tokio::io::{AsyncReadExt, AsyncSeekExt};
use tokio_util::io::ReaderStream;

use crate::http::state::AppState;
use crate::media::id::normalize_id;
use crate::media::library::MediaRecord;
use crate::store::StoreError;

/// Look up a record by the id in the request path (`.mp4` optional).
/// The library lock is released before this returns.
pub(crate) fn lookup_record(state: &AppState, raw_id: &str) -> Option<Arc<MediaRecord>> {
    state.library.get(normalize_id(raw_id))
}

/// Headers present on every media response (GET + HEAD).
fn media_headers(record: &MediaRecord) -> HeaderMap {
    let mut headers = HeaderMap::new();
    headers.insert(
        axum::http::header::CONTENT_TYPE,
        HeaderValue::from_static(record.mime),
    );
    headers.insert(
        axum::http::header::CONTENT_LENGTH,
        HeaderValue::from(record.size),
    );
    headers.insert(
        axum::http::header::ACCEPT_RANGES,
        HeaderValue::from_static("bytes"),
    );
    headers
}

fn unsatisfiable(record: &MediaRecord) -> Response {
    (
        StatusCode::RANGE_NOT_SATISFIABLE,
        [("content-range", format!("bytes */{}", record.size))],
    )
        .into_response()
}

/// Resolve a Range header value against the file size. Multi-range requests
/// are served with their first range only.
fn resolve_range(record: &MediaRecord, range_str: &str) -> Result<RangeInclusive<u64>, Response> {
    let parsed = parse_range_header(range_str).map_err(|_| unsatisfiable(record))?;
    let ranges = parsed.validate(record.size).map_err(|_| unsatisfiable(record))?;
    ranges.into_iter().next().ok_or_else(|| unsatisfiable(record))
}

/// Count one playback: move any counter left under the pre-prefix id, then
/// increment. Store failures lose this view but never fail the response.
///
/// A legacy id that is the live id of another video is that video's
/// counter, so it is left alone.
async fn record_playback(state: &AppState, record: &MediaRecord) {
    let store = Arc::clone(&state.store);
    let id = record.id.clone();
    let legacy = Some(record.legacy_id())
        .filter(|legacy| *legacy != record.id && state.library.get(legacy).is_none())
        .map(str::to_string);
    let counted = tokio::task::spawn_blocking(move || -> Result<u64, StoreError> {
        if let Some(legacy) = legacy {
            store.migrate(&legacy, &id)?;
        }
        store.inc_views(&id)
    })
    .await;
    match counted {
        Ok(Ok(views)) => tracing::debug!("{} played, {} views", record.id, views),
        Ok(Err(e)) => tracing::warn!("View not recorded for {}: {}", record.id, e),
        Err(e) => tracing::warn!("View counting task failed for {}: {}", record.id, e),
    }
}

/// HEAD /media/{id}: headers only. Does not open the file and is not a view.
pub async fn serve_media_head(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Response {
    match lookup_record(&state, &id) {
        Some(record) => (StatusCode::OK, media_headers(&record)).into_response(),
        None => StatusCode::NOT_FOUND.into_response(),
    }
}

/// GET /media/{id}: stream the full file or the requested byte range.
///
/// Requests without a Range header, or whose range starts at byte 0, count
/// as a view; players seeking or resuming do not.
pub async fn serve_media_get(
    State(state): State<AppState>,
    Path(id): Path<String>,
    req_headers: HeaderMap,
) -> Response {
    let Some(record) = lookup_record(&state, &id) else {
        return StatusCode::NOT_FOUND.into_response();
    };

    let range = match req_headers.get(axum::http::header::RANGE) {
        Some(value) => {
            let Ok(range_str) = value.to_str() else {
                return unsatisfiable(&record);
            };
            match resolve_range(&record, range_str) {
                Ok(range) => Some(range),
                Err(response) => return response,
            }
        }
        None => None,
    };

    if range.as_ref().map_or(true, |r| *r.start() == 0) {
        record_playback(&state, &record).await;
    }

    match range {
        Some(range) => range_response(&record, range).await,
        None => full_response(&record).await,
    }
}

async fn full_response(record: &MediaRecord) -> Response {
    let file = match tokio::fs::File::open(&record.path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("Failed to open file {}: {}", record.path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    let body = Body::from_stream(ReaderStream::new(file));
    (StatusCode::OK, media_headers(record), body).into_response()
}

async fn range_response(record: &MediaRecord, range: RangeInclusive<u64>) -> Response {
    let (start, end) = (*range.start(), *range.end());
    let length = end - start + 1;

    let mut file = match tokio::fs::File::open(&record.path).await {
        Ok(f) => f,
        Err(e) => {
            tracing::error!("Range response: failed to open file {}: {}", record.path.display(), e);
            return StatusCode::INTERNAL_SERVER_ERROR.into_response();
        }
    };
    if let Err(e) = file.seek(std::io::SeekFrom::Start(start)).await {
        tracing::error!("Range response: failed to seek in file {}: {}", record.path.display(), e);
        return StatusCode::INTERNAL_SERVER_ERROR.into_response();
    }

    let mut headers = media_headers(record);
    let content_range = format!("bytes {}-{}/{}", start, end, record.size);
    if let Ok(value) = HeaderValue::from_str(&content_range) {
        headers.insert(axum::http::header::CONTENT_RANGE, value);
    }
    headers.insert(axum::http::header::CONTENT_LENGTH, HeaderValue::from(length));

    let body = Body::from_stream(ReaderStream::new(file.take(length)));
    (StatusCode::PARTIAL_CONTENT, headers, body).into_response()
}
