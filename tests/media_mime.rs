use std::path::Path;
use tube::media::mime::{classify, is_video, thumbnail_candidates, videos_for_thumbnail, MediaKind};

#[test]
fn test_mp4_classified_as_video() {
    let (kind, mime) = classify(Path::new("movie.mp4")).unwrap();
    assert_eq!(kind, MediaKind::Video);
    assert_eq!(mime, "video/mp4");
}

#[test]
fn test_webm_classified_as_video() {
    let (kind, mime) = classify(Path::new("clip.webm")).unwrap();
    assert_eq!(kind, MediaKind::Video);
    assert_eq!(mime, "video/webm");
}

#[test]
fn test_jpg_classified_as_thumbnail() {
    let (kind, mime) = classify(Path::new("movie.jpg")).unwrap();
    assert_eq!(kind, MediaKind::Thumbnail);
    assert_eq!(mime, "image/jpeg");
}

#[test]
fn test_audio_is_not_indexed() {
    assert!(classify(Path::new("song.mp3")).is_none());
}

#[test]
fn test_txt_returns_none() {
    assert!(classify(Path::new("readme.txt")).is_none());
}

#[test]
fn test_no_extension_returns_none() {
    assert!(classify(Path::new("Makefile")).is_none());
}

#[test]
fn test_is_video_rejects_images() {
    assert!(is_video(Path::new("a/b.MKV")));
    assert!(!is_video(Path::new("a/b.png")));
}

#[test]
fn test_thumbnail_candidates_in_preference_order() {
    let candidates = thumbnail_candidates(Path::new("/lib/trip.mp4"));
    assert_eq!(candidates[0], Path::new("/lib/trip.jpg"));
    assert_eq!(candidates.last().unwrap(), Path::new("/lib/trip.webp"));
}

#[test]
fn test_videos_for_thumbnail_only_existing() {
    let dir = tempfile::tempdir().unwrap();
    std::fs::write(dir.path().join("trip.webm"), b"x").unwrap();
    let owners = videos_for_thumbnail(&dir.path().join("trip.png"));
    assert_eq!(owners, vec![dir.path().join("trip.webm")]);
}
