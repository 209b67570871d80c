mod helpers;

use axum::http::StatusCode;
use helpers::{jpeg, Script, ScriptedCensor, TestApp, PASSWORD};
use serde_json::Value;

#[tokio::test]
async fn test_gallery_lists_newest_first_grouped_by_day() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;
    let mut filenames = Vec::new();
    for name in ["one.jpg", "two.jpg"] {
        let body: Value = app.upload(jpeg(64, 64), name, Some(PASSWORD)).await.json();
        filenames.push(body["data"]["filename"].as_str().unwrap().to_string());
    }

    let response = app.server.get("/api/images").await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    let days = body["data"].as_array().unwrap();
    assert_eq!(days.len(), 1);

    let images = days[0]["images"].as_array().unwrap();
    assert_eq!(images.len(), 2);
    assert_eq!(images[0]["filename"], filenames[1].as_str());
    assert_eq!(images[0]["original_name"], "two.jpg");
    assert_eq!(images[0]["mime_type"], "image/jpeg");
    assert_eq!(images[0]["views"], 0);
    assert!(images[0].get("delete_password").is_none());
    assert_eq!(
        images[1]["url"],
        format!("/uploads/{}", filenames[0]).as_str()
    );
}

#[tokio::test]
async fn test_view_counts_and_redirects() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;
    let body: Value = app.upload(jpeg(64, 64), "a.jpg", Some(PASSWORD)).await.json();
    let filename = body["data"]["filename"].as_str().unwrap().to_string();

    let listing: Value = app.server.get("/api/images").await.json();
    let id = listing["data"][0]["images"][0]["id"].as_i64().unwrap();

    for _ in 0..2 {
        let response = app.server.get(&format!("/view/{}", id)).await;
        assert_eq!(response.status_code(), StatusCode::SEE_OTHER);
        let location = response.headers().get("location").unwrap().to_str().unwrap();
        assert_eq!(location, format!("/uploads/{}", filename));
    }

    let listing: Value = app.server.get("/api/images").await.json();
    assert_eq!(listing["data"][0]["images"][0]["views"], 2);
}

#[tokio::test]
async fn test_view_unknown_image_is_404() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;

    let response = app.server.get("/view/999").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    let body: Value = response.json();
    assert_eq!(body["code"], 404);
}

#[tokio::test]
async fn test_quarantine_is_not_routed() {
    let app = TestApp::local(ScriptedCensor::new(Script::Flag)).await;
    app.upload(jpeg(64, 64), "bad.jpg", Some(PASSWORD)).await;

    let response = app.server.get("/quarantine/.htaccess").await;
    assert_eq!(response.status_code(), StatusCode::NOT_FOUND);
    assert!(app.dir.path().join("storage/quarantine/.htaccess").exists());
}

#[tokio::test]
async fn test_health_and_openapi() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;

    let health: Value = app.server.get("/health").await.json();
    assert_eq!(health["status"], "healthy");
    assert_eq!(health["database"], "healthy");

    let doc: Value = app.server.get("/api-docs/openapi.json").await.json();
    assert!(doc["paths"]["/api/upload"].is_object());
}
