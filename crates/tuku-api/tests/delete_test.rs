mod helpers;

use axum::http::StatusCode;
use helpers::{jpeg, Script, ScriptedCensor, TestApp, PASSWORD};
use serde_json::{json, Value};
use tuku_storage::keys;

async fn upload_one(app: &TestApp) -> String {
    let body: Value = app
        .upload(jpeg(100, 100), "cat.jpg", Some(PASSWORD))
        .await
        .json();
    assert_eq!(body["code"], 200, "upload failed: {}", body);
    body["data"]["filename"].as_str().unwrap().to_string()
}

#[tokio::test]
async fn test_delete_with_correct_password_removes_row_and_file() {
    let app = TestApp::local(ScriptedCensor::new(Script::Pass)).await;
    let filename = upload_one(&app).await;
    let path = app.dir.path().join("storage/uploads").join(&filename);
    assert!(path.exists());

    let response = app
        .server
        .post("/api/delete")
        .json(&json!({ "filename": filename, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    let body: Value = response.json();
    assert_eq!(body, json!({ "code": 200, "message": "Deleted" }));

    assert!(app.images.is_empty());
    assert!(!path.exists());
    let served = app.server.get(&format!("/uploads/{}", filename)).await;
    assert_eq!(served.status_code(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_delete_with_wrong_password_keeps_everything() {
    let app = TestApp::local(ScriptedCensor::new(Script::Pass)).await;
    let filename = upload_one(&app).await;

    let response = app
        .server
        .post("/api/delete")
        .json(&json!({ "filename": filename, "password": "wrong" }))
        .await;
    assert_eq!(response.status_code(), StatusCode::BAD_REQUEST);
    let body: Value = response.json();
    assert_eq!(body["message"], "Incorrect delete password");

    assert_eq!(app.images.len(), 1);
    assert!(app.dir.path().join("storage/uploads").join(&filename).exists());
}

#[tokio::test]
async fn test_delete_accepts_form_body() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;
    let filename = upload_one(&app).await;

    let response = app
        .server
        .post("/api/delete")
        .form(&[("filename", filename.as_str()), ("password", PASSWORD)])
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(app.images.is_empty());
    assert!(app.memory_store().keys_in(keys::UPLOADS_AREA).is_empty());
}

#[tokio::test]
async fn test_delete_unknown_image() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;

    let body: Value = app
        .server
        .post("/api/delete")
        .json(&json!({ "filename": "nope.jpg", "password": PASSWORD }))
        .await
        .json();
    assert_eq!(body["code"], 400);
    assert_eq!(body["message"], "Image not found");
}

#[tokio::test]
async fn test_delete_missing_parameters() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;

    let body: Value = app
        .server
        .post("/api/delete")
        .json(&json!({ "filename": "a.jpg" }))
        .await
        .json();
    assert_eq!(body["code"], 400);
    assert_eq!(body["message"], "Missing required parameters");
}

#[tokio::test]
async fn test_unlink_failure_rolls_back_row() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;
    let filename = upload_one(&app).await;
    app.memory_store().set_fail_deletes(true);

    let response = app
        .server
        .post("/api/delete")
        .json(&json!({ "filename": filename, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::INTERNAL_SERVER_ERROR);

    assert_eq!(app.images.len(), 1);
    assert_eq!(app.memory_store().keys_in(keys::UPLOADS_AREA).len(), 1);
}

#[tokio::test]
async fn test_already_missing_file_still_deletes_row() {
    let app = TestApp::memory(ScriptedCensor::new(Script::Pass)).await;
    let filename = upload_one(&app).await;
    app.store.delete(&keys::upload_key(&filename)).await.unwrap();

    let response = app
        .server
        .post("/api/delete")
        .json(&json!({ "filename": filename, "password": PASSWORD }))
        .await;
    assert_eq!(response.status_code(), StatusCode::OK);
    assert!(app.images.is_empty());
}
