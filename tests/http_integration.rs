use std::fs::File;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, UNIX_EPOCH};

use axum::body::Body;
use axum::http::{Request, StatusCode};
use http_body_util::BodyExt;
use tower::ServiceExt;

use tube::http::{build_router, state::AppState};
use tube::media::library::Library;
use tube::store::{MemoryStore, ViewStore};

const CLIP_A: &[u8] = b"0123456789";
const CLIP_B: &[u8] = b"abcdefghijklmnopqrst";

struct Fixture {
    _tmp: tempfile::TempDir,
    store: Arc<MemoryStore>,
    app: axum::Router,
}

fn write_with_mtime(path: &Path, bytes: &[u8], mtime_secs: u64) {
    std::fs::write(path, bytes).unwrap();
    File::options()
        .write(true)
        .open(path)
        .unwrap()
        .set_modified(UNIX_EPOCH + Duration::from_secs(mtime_secs))
        .unwrap();
}

/// Root "clips" holding a.mp4 (older, with a thumbnail) and b.mp4 (newer).
fn fixture() -> Fixture {
    let tmp = tempfile::tempdir().unwrap();
    let dir = std::fs::canonicalize(tmp.path()).unwrap();
    write_with_mtime(&dir.join("a.mp4"), CLIP_A, 1_000);
    write_with_mtime(&dir.join("b.mp4"), CLIP_B, 2_000);
    std::fs::write(dir.join("a.jpg"), b"JPEGDATA").unwrap();

    let library = Library::new();
    library.add_root(&dir, "clips").unwrap();
    library.scan("clips").unwrap();

    let store = Arc::new(MemoryStore::new());
    let app = build_router(AppState::new(Arc::new(library), store.clone()));
    Fixture {
        _tmp: tmp,
        store,
        app,
    }
}

fn get(uri: &str) -> Request<Body> {
    Request::builder().uri(uri).body(Body::empty()).unwrap()
}

async fn body_bytes(response: axum::response::Response) -> Vec<u8> {
    response.into_body().collect().await.unwrap().to_bytes().to_vec()
}

async fn body_json(response: axum::response::Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

fn list_ids(json: &serde_json::Value) -> Vec<String> {
    json["videos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|v| v["id"].as_str().unwrap().to_string())
        .collect()
}

// ── GET /v/list ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn list_defaults_to_newest_first() {
    let f = fixture();
    let response = f.app.oneshot(get("/v/list")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["sort"], "timestamp");
    assert_eq!(json["total"], 2);
    assert_eq!(list_ids(&json), vec!["clips/b", "clips/a"]);
    assert_eq!(json["videos"][1]["url"], "/media/clips/a");
    assert_eq!(json["videos"][1]["thumbnail_url"], "/t/clips/a");
    assert!(json["videos"][0]["thumbnail_url"].is_null());
}

#[tokio::test]
async fn list_by_views() {
    let f = fixture();
    for _ in 0..3 {
        f.store.inc_views("clips/a").unwrap();
    }
    let json = body_json(f.app.oneshot(get("/v/list?sort=views")).await.unwrap()).await;
    assert_eq!(json["sort"], "views");
    assert_eq!(list_ids(&json), vec!["clips/a", "clips/b"]);
    assert_eq!(json["videos"][0]["views"], 3);
}

#[tokio::test]
async fn list_unknown_sort_falls_back() {
    let f = fixture();
    let json = body_json(f.app.oneshot(get("/v/list?sort=bogus")).await.unwrap()).await;
    assert_eq!(json["sort"], "timestamp");
    assert_eq!(list_ids(&json), vec!["clips/b", "clips/a"]);
}

#[tokio::test]
async fn list_paginates() {
    let f = fixture();
    let json = body_json(f.app.oneshot(get("/v/list?offset=1&limit=5")).await.unwrap()).await;
    assert_eq!(json["offset"], 1);
    assert_eq!(json["count"], 1);
    assert_eq!(json["total"], 2);
    assert_eq!(list_ids(&json), vec!["clips/a"]);
}

// ── GET /v/{id} and /t/{id} ──────────────────────────────────────────────────

#[tokio::test]
async fn info_returns_video() {
    let f = fixture();
    f.store.inc_views("clips/b").unwrap();
    let response = f.app.oneshot(get("/v/clips/b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    assert_eq!(json["id"], "clips/b");
    assert_eq!(json["title"], "B");
    assert_eq!(json["size"], CLIP_B.len());
    assert_eq!(json["timestamp"], 2_000);
    assert_eq!(json["views"], 1);
}

#[tokio::test]
async fn info_accepts_extension() {
    let f = fixture();
    let response = f.app.oneshot(get("/v/clips/a.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["id"], "clips/a");
}

#[tokio::test]
async fn info_unknown_id_404() {
    let f = fixture();
    let response = f.app.oneshot(get("/v/clips/nope")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn thumbnail_served_with_mime() {
    let f = fixture();
    let response = f.app.oneshot(get("/t/clips/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "image/jpeg");
    assert_eq!(body_bytes(response).await, b"JPEGDATA");
}

#[tokio::test]
async fn missing_thumbnail_404() {
    let f = fixture();
    let response = f.app.oneshot(get("/t/clips/b")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

// ── /media/{id} ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn media_get_streams_file_and_counts_view() {
    let f = fixture();
    let response = f.app.oneshot(get("/media/clips/a.mp4")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-type"], "video/mp4");
    assert_eq!(response.headers()["accept-ranges"], "bytes");
    assert_eq!(body_bytes(response).await, CLIP_A);
    assert_eq!(f.store.get_views("clips/a").unwrap(), 1);
}

#[tokio::test]
async fn media_range_from_start_counts_view() {
    let f = fixture();
    let request = Request::builder()
        .uri("/media/clips/a")
        .header("range", "bytes=0-3")
        .body(Body::empty())
        .unwrap();
    let response = f.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(response.headers()["content-range"], "bytes 0-3/10");
    assert_eq!(response.headers()["content-length"], "4");
    assert_eq!(body_bytes(response).await, b"0123");
    assert_eq!(f.store.get_views("clips/a").unwrap(), 1);
}

#[tokio::test]
async fn media_seek_does_not_count_view() {
    let f = fixture();
    let request = Request::builder()
        .uri("/media/clips/a")
        .header("range", "bytes=5-")
        .body(Body::empty())
        .unwrap();
    let response = f.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::PARTIAL_CONTENT);
    assert_eq!(body_bytes(response).await, b"56789");
    assert_eq!(f.store.get_views("clips/a").unwrap(), 0);
}

#[tokio::test]
async fn media_unsatisfiable_range_416() {
    let f = fixture();
    let request = Request::builder()
        .uri("/media/clips/a")
        .header("range", "bytes=50-60")
        .body(Body::empty())
        .unwrap();
    let response = f.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::RANGE_NOT_SATISFIABLE);
    assert_eq!(response.headers()["content-range"], "bytes */10");
    assert_eq!(f.store.get_views("clips/a").unwrap(), 0);
}

#[tokio::test]
async fn media_head_does_not_count_view() {
    let f = fixture();
    let request = Request::builder()
        .method("HEAD")
        .uri("/media/clips/b")
        .body(Body::empty())
        .unwrap();
    let response = f.app.oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(response.headers()["content-length"], "20");
    assert_eq!(f.store.get_views("clips/b").unwrap(), 0);
}

#[tokio::test]
async fn media_get_migrates_legacy_counter() {
    let f = fixture();
    f.store.inc_views("a").unwrap();
    f.store.inc_views("a").unwrap();

    let response = f.app.oneshot(get("/media/clips/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(f.store.get_views("a").unwrap(), 0);
    assert_eq!(f.store.get_views("clips/a").unwrap(), 3);
}

#[tokio::test]
async fn media_unknown_id_404() {
    let f = fixture();
    let response = f.app.oneshot(get("/media/clips/missing")).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(f.store.get_views("clips/missing").unwrap(), 0);
}

#[tokio::test]
async fn media_get_leaves_live_videos_counter_alone() {
    // "clips/sub/a" has legacy id "sub/a", which is the live id of the
    // video in the "sub" root.
    let tmp_clips = tempfile::tempdir().unwrap();
    let tmp_sub = tempfile::tempdir().unwrap();
    let clips = std::fs::canonicalize(tmp_clips.path()).unwrap();
    let sub = std::fs::canonicalize(tmp_sub.path()).unwrap();
    std::fs::create_dir_all(clips.join("sub")).unwrap();
    write_with_mtime(&clips.join("sub/a.mp4"), CLIP_A, 1_000);
    write_with_mtime(&sub.join("a.mp4"), CLIP_B, 2_000);

    let library = Library::new();
    library.add_root(&clips, "clips").unwrap();
    library.add_root(&sub, "sub").unwrap();
    library.scan("clips").unwrap();
    library.scan("sub").unwrap();

    let store = Arc::new(MemoryStore::new());
    for _ in 0..5 {
        store.inc_views("sub/a").unwrap();
    }
    let app = build_router(AppState::new(Arc::new(library), store.clone()));

    let response = app.oneshot(get("/media/clips/sub/a")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    assert_eq!(store.get_views("sub/a").unwrap(), 5);
    assert_eq!(store.get_views("clips/sub/a").unwrap(), 1);
}
