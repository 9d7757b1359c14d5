use std::path::PathBuf;
use std::sync::Arc;

use chrono::{Duration, Utc};
use musefuse_core::auth::{MemoryTokenStore, SessionData};
use musefuse_core::{ApiClient, PhotoError, PhotoScope, PhotoService, SessionManager};
use pretty_assertions::assert_eq;
use serde_json::json;
use tempfile::TempDir;
use wiremock::matchers::{body_string_contains, header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

/// Service over a session restored from memory, logged in as `T1`
fn logged_in(server: &MockServer) -> (PhotoService, SessionManager) {
    let api = ApiClient::new(format!("{}/api/v1", server.uri())).expect("api client");
    let store = MemoryTokenStore::with_session(SessionData::new(
        "T1",
        Some(Utc::now() + Duration::hours(1)),
    ));
    let session = SessionManager::new(Arc::new(store), Arc::new(api.clone()));
    session.initialize();
    assert!(session.is_authenticated());
    (PhotoService::new(api, session.clone()), session)
}

fn photo(name: &str, owner: &str) -> serde_json::Value {
    json!({
        "filename": name,
        "url": format!("https://bucket/{name}"),
        "thumbnail_url": format!("https://bucket/thumbnails/{name}"),
        "upload_time": "2024-05-01T12:00:00",
        "owner": owner,
    })
}

#[tokio::test]
async fn list_sends_bearer_token() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/photos"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [photo("a.jpg", "alice"), photo("b.png", "bob")],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (photos, _) = logged_in(&server);
    let listed = photos.list(PhotoScope::All).await.unwrap();
    let names: Vec<_> = listed.iter().map(|p| p.filename.as_str()).collect();
    assert_eq!(names, vec!["a.jpg", "b.png"]);
    assert_eq!(listed[1].owner_display(), "bob");
}

#[tokio::test]
async fn mine_scope_hits_user_listing() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/photos/user"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "data": [photo("mine.jpg", "alice")],
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (photos, _) = logged_in(&server);
    let listed = photos.list(PhotoScope::Mine).await.unwrap();
    assert_eq!(listed.len(), 1);
    assert_eq!(listed[0].filename, "mine.jpg");
}

#[tokio::test]
async fn rejected_token_ends_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/photos"))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "error": true,
            "message": "Token has expired. Please log in again.",
        })))
        .mount(&server)
        .await;

    let (photos, session) = logged_in(&server);
    let mut sub = session.subscribe();
    assert_eq!(sub.recv().await, Some(true));

    let err = photos.list(PhotoScope::All).await.unwrap_err();
    assert!(matches!(err, PhotoError::SessionRejected));
    assert!(!session.is_authenticated());
    assert!(session.current_token().is_none());
    assert_eq!(sub.recv().await, Some(false));
}

#[tokio::test]
async fn server_error_keeps_session() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/v1/photos"))
        .respond_with(ResponseTemplate::new(500).set_body_string("boom"))
        .mount(&server)
        .await;

    let (photos, session) = logged_in(&server);
    let err = photos.list(PhotoScope::All).await.unwrap_err();
    assert!(matches!(err, PhotoError::Api(_)));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn logged_out_calls_make_no_request() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let (photos, session) = logged_in(&server);
    session.logout();

    let err = photos.list(PhotoScope::All).await.unwrap_err();
    assert!(matches!(err, PhotoError::NotLoggedIn));
    let err = photos.delete("a.jpg").await.unwrap_err();
    assert!(matches!(err, PhotoError::NotLoggedIn));
}

#[tokio::test]
async fn upload_sends_multipart_file_field() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .and(header("authorization", "Bearer T1"))
        .and(body_string_contains("name=\"file\""))
        .and(body_string_contains("filename=\"cat.png\""))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "message": "File uploaded successfully",
            "filename": "cat.png",
            "s3_url": "https://bucket/cat.png",
            "thumbnail_url": "https://bucket/thumbnails/cat.png",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let file = dir.path().join("cat.png");
    std::fs::write(&file, b"not really a png").unwrap();

    let (photos, _) = logged_in(&server);
    let receipt = photos.upload(&file).await.unwrap();
    assert_eq!(receipt.filename.as_deref(), Some("cat.png"));
    assert_eq!(
        receipt.thumbnail_url.as_deref(),
        Some("https://bucket/thumbnails/cat.png")
    );
}

#[tokio::test]
async fn upload_rejects_unsupported_file() {
    let server = MockServer::start().await;
    let (photos, _) = logged_in(&server);

    let err = photos.upload(&PathBuf::from("notes.txt")).await.unwrap_err();
    assert!(matches!(err, PhotoError::UnsupportedFile(_)));
}

#[tokio::test]
async fn upload_many_stops_at_first_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/v1/upload"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "filename": "ok.jpg",
        })))
        .mount(&server)
        .await;

    let dir = TempDir::new().unwrap();
    let first = dir.path().join("ok.jpg");
    std::fs::write(&first, b"jpeg").unwrap();
    let missing = dir.path().join("missing.jpg");
    let never = dir.path().join("never.jpg");
    std::fs::write(&never, b"jpeg").unwrap();

    let (photos, _) = logged_in(&server);
    let batch = photos
        .upload_many(vec![first, missing.clone(), never.clone()])
        .await;

    assert_eq!(batch.uploaded.len(), 1);
    let (failed, err) = batch.failed.expect("second upload fails");
    assert_eq!(failed, missing);
    assert!(matches!(err, PhotoError::Io { .. }));
    assert_eq!(batch.remaining, vec![never]);
}

#[tokio::test]
async fn delete_encodes_filename() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/photos/summer%20trip.jpg"))
        .and(header("authorization", "Bearer T1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "error": false,
            "message": "Photo deleted successfully",
        })))
        .expect(1)
        .mount(&server)
        .await;

    let (photos, _) = logged_in(&server);
    photos.delete("summer trip.jpg").await.unwrap();
}

#[tokio::test]
async fn delete_of_foreign_photo_is_reported() {
    let server = MockServer::start().await;
    Mock::given(method("DELETE"))
        .and(path("/api/v1/photos/b.jpg"))
        .respond_with(ResponseTemplate::new(403).set_body_json(json!({
            "error": true,
            "message": "You can only delete your own photos",
        })))
        .mount(&server)
        .await;

    let (photos, session) = logged_in(&server);
    let err = photos.delete("b.jpg").await.unwrap_err();
    assert!(matches!(err, PhotoError::Api(_)));
    assert!(session.is_authenticated());
}

#[tokio::test]
async fn page_slices_listing() {
    let server = MockServer::start().await;
    let data: Vec<_> = (1..=5)
        .map(|i| photo(&format!("p{i}.jpg"), "alice"))
        .collect();
    Mock::given(method("GET"))
        .and(path("/api/v1/photos"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(json!({"error": false, "data": data})),
        )
        .mount(&server)
        .await;

    let (photos, _) = logged_in(&server);
    let page = photos.page(PhotoScope::All, 2, 2).await.unwrap();
    let names: Vec<_> = page.items.iter().map(|p| p.filename.as_str()).collect();
    assert_eq!(names, vec!["p3.jpg", "p4.jpg"]);
    assert_eq!(page.total_pages, 3);
    assert!(page.has_next());
    assert!(page.has_previous());
}
