//! Drives the HTTP surface end to end against in-process storage.

use std::sync::Arc;

use anyhow::anyhow;
use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use bytes::Bytes;
use http_body_util::BodyExt;
use photo_gallery::{
    config::{CdnConfig, Timeouts},
    photo::{BackendKind, RawPhoto},
    routes::{GalleryRoutes, create_routes},
    service::GalleryService,
    storage::{CdnStorage, DeleteOutcome, MemoryStorage, PhotoUpload, StorageAdapter},
};
use serde_json::Value;
use tower::ServiceExt;

const BOUNDARY: &str = "gallery-test-boundary";
const PNG: &[u8] = &[0x89, 0x50, 0x4E, 0x47, 0x0D, 0x0A, 0x1A, 0x0A, 9, 9, 9, 9];

struct UnreachableStorage;

#[async_trait]
impl StorageAdapter for UnreachableStorage {
    fn kind(&self) -> BackendKind {
        BackendKind::Blob
    }

    async fn put(&self, _upload: PhotoUpload) -> anyhow::Result<RawPhoto> {
        Err(anyhow!("connection refused"))
    }

    async fn list(&self, _limit: usize) -> anyhow::Result<Vec<RawPhoto>> {
        Err(anyhow!("connection refused"))
    }

    async fn delete(&self, _backend_ref: &str) -> anyhow::Result<DeleteOutcome> {
        Err(anyhow!("connection refused"))
    }
}

struct TestApp {
    router: Router,
    cdn: Arc<MemoryStorage>,
    blob: Arc<MemoryStorage>,
}

fn test_app() -> TestApp {
    let cdn = Arc::new(MemoryStorage::new(
        BackendKind::Cdn,
        "https://res.cdn.test/demo",
        "photos",
    ));
    let blob = Arc::new(MemoryStorage::new(
        BackendKind::Blob,
        "https://store.blob.test",
        "photos/",
    ));
    let router = create_routes(GalleryRoutes {
        primary: Arc::new(GalleryService::new(cdn.clone(), 30)),
        blob: Arc::new(GalleryService::new(blob.clone(), 30)),
        max_upload_bytes: 1024 * 1024,
        media_dir: None,
    });
    TestApp { router, cdn, blob }
}

fn unreachable_app() -> Router {
    let service = Arc::new(GalleryService::new(Arc::new(UnreachableStorage), 30));
    create_routes(GalleryRoutes {
        primary: service.clone(),
        blob: service,
        max_upload_bytes: 1024 * 1024,
        media_dir: None,
    })
}

fn multipart_body(field: &str, file_name: &str, content_type: &str, bytes: &[u8]) -> Vec<u8> {
    let mut body = format!(
        "--{BOUNDARY}\r\nContent-Disposition: form-data; name=\"{field}\"; filename=\"{file_name}\"\r\nContent-Type: {content_type}\r\n\r\n"
    )
    .into_bytes();
    body.extend_from_slice(bytes);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

fn upload_request(path: &str, body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(path)
        .header(
            header::CONTENT_TYPE,
            format!("multipart/form-data; boundary={BOUNDARY}"),
        )
        .body(Body::from(body))
        .unwrap()
}

fn request(method: &str, path: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(path)
        .body(Body::empty())
        .unwrap()
}

async fn send(router: &Router, request: Request<Body>) -> (StatusCode, Bytes) {
    let response = router.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let body = response.into_body().collect().await.unwrap().to_bytes();
    (status, body)
}

async fn send_json(router: &Router, request: Request<Body>) -> (StatusCode, Value) {
    let (status, body) = send(router, request).await;
    let json = serde_json::from_slice(&body)
        .unwrap_or_else(|err| panic!("body is not json ({err}): {body:?}"));
    (status, json)
}

#[tokio::test]
async fn blob_upload_list_delete_round_trip() {
    let app = test_app();

    let (status, uploaded) = send_json(
        &app.router,
        upload_request("/api/upload-blob", multipart_body("file", "photo.png", "image/png", PNG)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let filename = uploaded["filename"].as_str().unwrap().to_string();
    let id = filename
        .trim_start_matches("photos/")
        .split('-')
        .next()
        .unwrap()
        .to_string();
    assert_eq!(uploaded["id"], id);
    assert_eq!(uploaded["original_name"], "photo.png");
    assert_eq!(uploaded["format"], "png");
    assert_eq!(uploaded["size"], PNG.len());
    assert_eq!(uploaded["width"], 0);
    assert_eq!(uploaded["thumbnail_url"], uploaded["url"]);
    assert_eq!(uploaded["backend_ref"], filename);

    let (status, listing) = send_json(&app.router, request("GET", "/api/photos-blob")).await;
    assert_eq!(status, StatusCode::OK);
    assert!(listing.get("error").is_none());
    assert_eq!(listing["photos"].as_array().unwrap().len(), 1);
    assert_eq!(listing["photos"][0]["id"], id);

    let (status, deleted) = send_json(
        &app.router,
        request("DELETE", &format!("/api/delete-blob?photoId={filename}")),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(deleted["message"], "Photo deleted successfully");
    assert!(app.blob.is_empty().await);
    assert!(app.cdn.is_empty().await);
}

#[tokio::test]
async fn cdn_upload_returns_transformed_variants() {
    let app = test_app();
    let (status, uploaded) = send_json(
        &app.router,
        upload_request("/api/upload", multipart_body("file", "beach.jpg", "image/jpeg", PNG)),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let url = uploaded["url"].as_str().unwrap();
    assert_eq!(
        uploaded["grid_url"],
        url.replacen("/upload/", "/upload/w_400,h_400,c_fill,g_auto,q_auto,f_auto/", 1)
    );
    assert_eq!(
        uploaded["large_url"],
        url.replacen("/upload/", "/upload/w_800,h_800,c_fill,g_auto,q_auto,f_auto/", 1)
    );
    assert_eq!(app.cdn.len().await, 1);
    assert!(app.blob.is_empty().await);
}

#[tokio::test]
async fn listing_is_newest_first() {
    let app = test_app();
    for (key, secs) in [
        ("photos/1000-a.jpg", 1_000),
        ("photos/3000-c.jpg", 3_000),
        ("photos/2000-b.jpg", 2_000),
    ] {
        app.blob
            .insert(
                RawPhoto {
                    url: Some(format!("https://store.blob.test/{key}")),
                    uploaded_at: chrono::DateTime::from_timestamp(secs, 0),
                    ..RawPhoto::new(key)
                },
            )
            .await;
    }
    let (status, listing) = send_json(&app.router, request("GET", "/api/photos-blob")).await;
    assert_eq!(status, StatusCode::OK);
    let ids: Vec<&str> = listing["photos"]
        .as_array()
        .unwrap()
        .iter()
        .map(|photo| photo["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, ["3000", "2000", "1000"]);
}

#[tokio::test]
async fn upload_without_file_field_is_rejected() {
    let app = test_app();
    let (status, body) = send_json(
        &app.router,
        upload_request("/api/upload", multipart_body("avatar", "a.png", "image/png", PNG)),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "No file uploaded");
    assert!(app.cdn.is_empty().await);
}

#[tokio::test]
async fn upload_of_non_image_is_rejected() {
    let app = test_app();
    let (status, body) = send_json(
        &app.router,
        upload_request(
            "/api/upload-blob",
            multipart_body("file", "notes.txt", "text/plain", b"hello"),
        ),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "File must be an image");
}

#[tokio::test]
async fn upload_that_is_not_multipart_is_rejected() {
    let app = test_app();
    let (status, body) = send_json(&app.router, request("POST", "/api/upload")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["error"].is_string());
}

#[tokio::test]
async fn delete_unknown_photo_is_not_found() {
    let app = test_app();
    app.blob
        .insert(
            RawPhoto {
                url: Some("https://store.blob.test/photos/1-a.jpg".to_string()),
                ..RawPhoto::new("photos/1-a.jpg")
            },
        )
        .await;
    let (status, body) = send_json(
        &app.router,
        request("DELETE", "/api/delete-blob?photoId=photos/missing.jpg"),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert!(body["error"].is_string());
    assert_eq!(app.blob.len().await, 1);
}

async fn cdn_destroy_stub(
    axum::Form(form): axum::Form<std::collections::HashMap<String, String>>,
) -> axum::Json<Value> {
    let result = if form.get("public_id").map(String::as_str) == Some("photos/abc") {
        "ok"
    } else {
        "not found"
    };
    axum::Json(serde_json::json!({ "result": result }))
}

/// Router whose primary backend is a CDN client talking to a local stub.
async fn cdn_stub_app() -> Router {
    let stub = Router::new().route(
        "/v1_1/demo/image/destroy",
        axum::routing::post(cdn_destroy_stub),
    );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move { axum::serve(listener, stub).await.unwrap() });

    let cdn = CdnStorage::new(
        CdnConfig {
            api_url: format!("http://{addr}"),
            cloud_name: "demo".to_string(),
            api_key: "1234".to_string(),
            api_secret: "secret".to_string(),
            folder: "photos".to_string(),
        },
        Timeouts::default(),
    );
    let blob = MemoryStorage::new(BackendKind::Blob, "https://store.blob.test", "photos/");
    create_routes(GalleryRoutes {
        primary: Arc::new(GalleryService::new(Arc::new(cdn), 30)),
        blob: Arc::new(GalleryService::new(Arc::new(blob), 30)),
        max_upload_bytes: 1024 * 1024,
        media_dir: None,
    })
}

#[tokio::test]
async fn cdn_delete_follows_destroy_result() {
    let router = cdn_stub_app().await;
    let (status, body) =
        send_json(&router, request("DELETE", "/api/delete?photoId=photos/abc")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Photo deleted successfully");

    let (status, body) =
        send_json(&router, request("DELETE", "/api/delete?photoId=photos/missing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Photo not found or already deleted");
}

#[tokio::test]
async fn delete_without_photo_id_is_bad_request() {
    let app = test_app();
    let (status, body) = send_json(&app.router, request("DELETE", "/api/delete")).await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["error"], "Photo ID is required");
}

#[tokio::test]
async fn unreachable_backend_lists_empty_with_error() {
    let router = unreachable_app();
    let (status, body) = send_json(&router, request("GET", "/api/photos")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Failed to fetch photos");
    assert_eq!(body["photos"], Value::Array(Vec::new()));
}

#[tokio::test]
async fn unreachable_backend_fails_upload_and_delete() {
    let router = unreachable_app();
    let (status, body) = send_json(
        &router,
        upload_request("/api/upload", multipart_body("file", "photo.png", "image/png", PNG)),
    )
    .await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Upload failed: connection refused");

    let (status, body) = send_json(&router, request("DELETE", "/api/delete?photoId=x")).await;
    assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(body["error"], "Delete failed: connection refused");
}

#[tokio::test]
async fn options_is_an_empty_ok() {
    let app = test_app();
    for path in ["/api/photos", "/api/upload-blob", "/api/delete"] {
        let (status, body) = send(&app.router, request("OPTIONS", path)).await;
        assert_eq!(status, StatusCode::OK, "{path}");
        assert!(body.is_empty(), "{path}");
    }
}

#[tokio::test]
async fn cors_preflight_allows_any_origin() {
    let app = test_app();
    let preflight = Request::builder()
        .method("OPTIONS")
        .uri("/api/delete")
        .header(header::ORIGIN, "https://gallery.example.com")
        .header(header::ACCESS_CONTROL_REQUEST_METHOD, "DELETE")
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(preflight).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers()[header::ACCESS_CONTROL_ALLOW_ORIGIN],
        "*"
    );
}

#[tokio::test]
async fn unsupported_methods_get_json_405() {
    let app = test_app();
    for (method, path) in [
        ("PUT", "/api/photos"),
        ("POST", "/api/delete-blob"),
        ("DELETE", "/api/upload"),
        ("PATCH", "/api/photos-blob"),
    ] {
        let (status, body) = send_json(&app.router, request(method, path)).await;
        assert_eq!(status, StatusCode::METHOD_NOT_ALLOWED, "{method} {path}");
        assert_eq!(body["error"], "Method not allowed");
    }
}

#[tokio::test]
async fn upload_endpoint_reports_backend() {
    let app = test_app();
    let (status, body) = send_json(&app.router, request("GET", "/api/upload")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Photo gallery API with Image CDN");

    let (_, body) = send_json(&app.router, request("GET", "/api/upload-blob")).await;
    assert_eq!(body["message"], "Photo gallery API with Blob Storage");

    let (status, body) = send_json(&app.router, request("GET", "/")).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["backends"], serde_json::json!(["cdn", "blob"]));
}

#[tokio::test]
async fn unknown_paths_are_json_404() {
    let app = test_app();
    let (status, body) = send_json(&app.router, request("GET", "/api/nothing")).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["error"], "Not found");
}
