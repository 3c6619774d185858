//! API integration tests for compression, download and error handling.
//!
//! Tests verify:
//! - Batch compression end to end (upload → ZIP of JPEGs)
//! - Validation errors and their wording
//! - Download headers, repeated downloads and expiry
//! - Upload sessions and the request body limit

use std::time::Duration;

use axum::http::StatusCode;
use tower::ServiceExt;

use pixpress::RouterConfig;

use super::test_utils::{
    body_bytes, body_json, bmp_bytes, entry_names, get, gif_bytes, gray_alpha_png_bytes,
    gray_png_bytes, is_valid_rgb_jpeg, png_bytes, read_zip, rgba_png_bytes, MultipartBody,
    TestApp,
};

/// POST a batch to /compress and return the download URL.
async fn compress_ok(app: &TestApp, body: MultipartBody) -> (String, u64) {
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["success"], true);
    (
        json["download_url"].as_str().unwrap().to_string(),
        json["file_count"].as_u64().unwrap(),
    )
}

// =============================================================================
// Compression
// =============================================================================

#[tokio::test]
async fn test_compress_three_pngs() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("a.png", &png_bytes(32, 24))
        .image("b.png", &png_bytes(16, 16))
        .image("c.png", &png_bytes(8, 40))
        .text("quality", "50");

    let (url, file_count) = compress_ok(&app, body).await;
    assert_eq!(file_count, 3);
    assert!(url.starts_with("/download/compressed_images_"));
    assert!(url.ends_with(".zip"));

    let response = app.router.clone().oneshot(get(&url)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("content-type").unwrap(),
        "application/zip"
    );
    assert_eq!(
        response.headers().get("content-disposition").unwrap(),
        "attachment; filename=\"compressed_images.zip\""
    );

    let zip = body_bytes(response).await;
    let entries = read_zip(&zip);
    assert_eq!(
        entry_names(&entries),
        vec!["a_compressed.jpg", "b_compressed.jpg", "c_compressed.jpg"]
    );
    for (name, data) in &entries {
        assert!(is_valid_rgb_jpeg(data), "{} is not a valid JPEG", name);
    }
}

#[tokio::test]
async fn test_compress_preserves_submission_order() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("zebra.png", &png_bytes(64, 64))
        .image("apple.png", &png_bytes(4, 4))
        .image("mango.bmp", &bmp_bytes(12, 12))
        .image("kiwi.gif", &gif_bytes(10, 10));

    let (url, _) = compress_ok(&app, body).await;
    let zip = body_bytes(app.router.clone().oneshot(get(&url)).await.unwrap()).await;

    assert_eq!(
        entry_names(&read_zip(&zip)),
        vec![
            "zebra_compressed.jpg",
            "apple_compressed.jpg",
            "mango_compressed.jpg",
            "kiwi_compressed.jpg"
        ]
    );
}

#[tokio::test]
async fn test_compress_normalizes_color_modes() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("rgba.png", &rgba_png_bytes(16, 16))
        .image("gray.png", &gray_png_bytes(16, 16))
        .image("gray_alpha.png", &gray_alpha_png_bytes(16, 16));

    let (url, file_count) = compress_ok(&app, body).await;
    assert_eq!(file_count, 3);

    let zip = body_bytes(app.router.clone().oneshot(get(&url)).await.unwrap()).await;
    for (name, data) in read_zip(&zip) {
        assert!(is_valid_rgb_jpeg(&data), "{} is not a three-channel JPEG", name);
    }
}

#[tokio::test]
async fn test_compress_duplicate_names() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("photo.png", &png_bytes(8, 8))
        .image("photo.png", &png_bytes(9, 9))
        .image("photo.jpg", &png_bytes(10, 10));

    let (url, file_count) = compress_ok(&app, body).await;
    assert_eq!(file_count, 3);

    let zip = body_bytes(app.router.clone().oneshot(get(&url)).await.unwrap()).await;
    assert_eq!(
        entry_names(&read_zip(&zip)),
        vec![
            "photo_compressed.jpg",
            "photo_compressed_2.jpg",
            "photo_compressed_3.jpg"
        ]
    );
}

#[tokio::test]
async fn test_compress_sanitizes_names() {
    let app = TestApp::new();

    let body = MultipartBody::new().image("../../My Holiday Pic.PNG", &png_bytes(8, 8));

    let (url, _) = compress_ok(&app, body).await;
    let zip = body_bytes(app.router.clone().oneshot(get(&url)).await.unwrap()).await;
    assert_eq!(
        entry_names(&read_zip(&zip)),
        vec!["My_Holiday_Pic_compressed.jpg"]
    );
}

#[tokio::test]
async fn test_quality_out_of_range_is_clamped() {
    let app = TestApp::new();

    for quality in ["0", "150", "-20", "100", "1"] {
        let body = MultipartBody::new()
            .image("x.png", &png_bytes(16, 16))
            .text("quality", quality);
        let (_, file_count) = compress_ok(&app, body).await;
        assert_eq!(file_count, 1, "quality {}", quality);
    }
}

#[tokio::test]
async fn test_quality_changes_output_size() {
    let app = TestApp::new();
    let source = png_bytes(128, 128);

    let mut sizes = Vec::new();
    for quality in ["5", "95"] {
        let body = MultipartBody::new()
            .image("x.png", &source)
            .text("quality", quality);
        let (url, _) = compress_ok(&app, body).await;
        let zip = body_bytes(app.router.clone().oneshot(get(&url)).await.unwrap()).await;
        sizes.push(read_zip(&zip)[0].1.len());
    }
    assert!(sizes[0] < sizes[1]);
}

// =============================================================================
// Validation Errors
// =============================================================================

#[tokio::test]
async fn test_compress_without_files() {
    let app = TestApp::new();

    let body = MultipartBody::new().text("quality", "80");
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "No files to compress");
    assert_eq!(json["status"], 400);
}

#[tokio::test]
async fn test_compress_with_empty_selection() {
    let app = TestApp::new();

    // What a browser sends for an empty file input
    let body = MultipartBody::new().image("", b"");
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No files to compress");
}

#[tokio::test]
async fn test_compress_not_multipart() {
    let app = TestApp::new();

    let request = axum::http::Request::builder()
        .method("POST")
        .uri("/compress")
        .header("content-type", "application/json")
        .body(axum::body::Body::from("{}"))
        .unwrap();
    let response = app.router.clone().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No files to compress");
}

#[tokio::test]
async fn test_compress_invalid_file_type() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("a.png", &png_bytes(8, 8))
        .file("files", "doc.pdf", b"%PDF-1.4")
        .image("b.png", &png_bytes(8, 8));

    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["error"], "Invalid file type: doc.pdf");
    assert_eq!(json["code"], "invalid_file_type");

    // Nothing was written
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_compress_undecodable_image() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("good.png", &png_bytes(8, 8))
        .image("broken.png", b"\x89PNG\r\n\x1a\nthis is not really a png");

    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "decode_error");
    assert!(json["error"].as_str().unwrap().contains("broken.png"));
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_compress_invalid_quality() {
    let app = TestApp::new();

    let body = MultipartBody::new()
        .image("a.png", &png_bytes(8, 8))
        .text("quality", "high");

    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "invalid_quality");
}

#[tokio::test]
async fn test_body_limit() {
    let app = TestApp::with_config(
        Duration::from_secs(60),
        RouterConfig::new()
            .with_tracing(false)
            .with_max_upload_bytes(1024),
    );

    let body = MultipartBody::new().image("big.png", &vec![0u8; 16 * 1024]);
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
    assert_eq!(body_json(response).await["status"], 413);
}

#[tokio::test]
async fn test_compress_storage_failure() {
    let app = TestApp::with_unwritable_storage();

    let body = MultipartBody::new().image("a.png", &png_bytes(8, 8));
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    let json = body_json(response).await;
    assert_eq!(json["code"], "storage_error");
    assert_eq!(json["status"], 500);
    assert!(app.service.store().is_empty().await);
    assert_eq!(app.stored_files(), vec!["blocked".to_string()]);
}

// =============================================================================
// Download
// =============================================================================

#[tokio::test]
async fn test_download_unknown_archive() {
    let app = TestApp::new();

    for uri in [
        "/download/compressed_images_6f1c1a2e-4a57-4a4f-9d43-1f7f7d7f0c11.zip",
        "/download/nonexistent.zip",
        "/download/..%2F..%2Fetc%2Fpasswd",
    ] {
        let response = app.router.clone().oneshot(get(uri)).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND, "{}", uri);
        assert_eq!(body_json(response).await["error"], "File not found");
    }
}

#[tokio::test]
async fn test_download_twice_then_expire() {
    let app = TestApp::with_config(
        Duration::from_millis(150),
        RouterConfig::new().with_tracing(false),
    );

    let body = MultipartBody::new().image("a.png", &png_bytes(8, 8));
    let (url, _) = compress_ok(&app, body).await;
    assert_eq!(app.stored_files().len(), 1);

    let first = app.router.clone().oneshot(get(&url)).await.unwrap();
    assert_eq!(first.status(), StatusCode::OK);
    let first = body_bytes(first).await;

    let second = app.router.clone().oneshot(get(&url)).await.unwrap();
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(body_bytes(second).await, first);

    tokio::time::sleep(Duration::from_millis(400)).await;

    let third = app.router.clone().oneshot(get(&url)).await.unwrap();
    assert_eq!(third.status(), StatusCode::NOT_FOUND);
    assert!(app.stored_files().is_empty());
}

#[tokio::test]
async fn test_archives_are_independent() {
    let app = TestApp::with_config(
        Duration::from_millis(100),
        RouterConfig::new().with_tracing(false),
    );

    let (first, _) = compress_ok(&app, MultipartBody::new().image("a.png", &png_bytes(8, 8))).await;
    let (second, _) =
        compress_ok(&app, MultipartBody::new().image("b.png", &png_bytes(8, 8))).await;
    assert_ne!(first, second);

    let response = app.router.clone().oneshot(get(&first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    tokio::time::sleep(Duration::from_millis(300)).await;

    let response = app.router.clone().oneshot(get(&first)).await.unwrap();
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    // Never downloaded, so still available
    let response = app.router.clone().oneshot(get(&second)).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Upload Sessions
// =============================================================================

#[tokio::test]
async fn test_upload_without_files_field() {
    let app = TestApp::new();

    let body = MultipartBody::new().text("quality", "70");
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No files uploaded");
}

#[tokio::test]
async fn test_upload_empty_selection() {
    let app = TestApp::new();

    let body = MultipartBody::new().image("", b"");
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["error"], "No files selected");
}

#[tokio::test]
async fn test_upload_invalid_file_type() {
    let app = TestApp::new();

    let body = MultipartBody::new().file("files", "notes.txt", b"hello");
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(
        body_json(response).await["error"],
        "Invalid file type: notes.txt"
    );
}

#[tokio::test]
async fn test_upload_then_compress_with_session() {
    let app = TestApp::new();
    let a = png_bytes(8, 8);
    let b = png_bytes(12, 12);

    let body = MultipartBody::new()
        .image("a.png", &a)
        .image("b.png", &b)
        .text("quality", "40");
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/upload"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["file_count"], 2);
    assert_eq!(json["quality"], 40);
    let session_id = json["session_id"].as_str().unwrap().to_string();

    let body = MultipartBody::new()
        .image("a.png", &a)
        .image("b.png", &b)
        .text("session_id", &session_id);
    let (_, file_count) = compress_ok(&app, body).await;
    assert_eq!(file_count, 2);

    // A session can only be used once
    let body = MultipartBody::new()
        .image("a.png", &a)
        .image("b.png", &b)
        .text("session_id", &session_id);
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "unknown_session");
}

#[tokio::test]
async fn test_session_file_count_mismatch() {
    let app = TestApp::new();

    let body = MultipartBody::new().image("a.png", &png_bytes(8, 8));
    let json = body_json(
        app.router
            .clone()
            .oneshot(body.into_request("/upload"))
            .await
            .unwrap(),
    )
    .await;
    let session_id = json["session_id"].as_str().unwrap().to_string();

    let body = MultipartBody::new()
        .image("a.png", &png_bytes(8, 8))
        .image("b.png", &png_bytes(8, 8))
        .text("session_id", &session_id);
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    assert_eq!(body_json(response).await["code"], "session_mismatch");

    // Retrying with the announced batch still works
    let body = MultipartBody::new()
        .image("a.png", &png_bytes(8, 8))
        .text("session_id", &session_id);
    let response = app
        .router
        .clone()
        .oneshot(body.into_request("/compress"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

// =============================================================================
// Auxiliary Endpoints
// =============================================================================

#[tokio::test]
async fn test_progress_endpoint() {
    let app = TestApp::new();

    let response = app
        .router
        .clone()
        .oneshot(get("/progress/anything"))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["progress"], 0);
}

#[tokio::test]
async fn test_health_endpoint() {
    let app = TestApp::new();

    let response = app.router.clone().oneshot(get("/health")).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_compress_requires_post() {
    let app = TestApp::new();

    let response = app.router.clone().oneshot(get("/compress")).await.unwrap();
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
