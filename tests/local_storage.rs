use actix_web::http::StatusCode;
use actix_web::{test, web, App};
use serde_json::{json, Value};
use std::fs;
use std::sync::Arc;
use tempfile::TempDir;

use csv_vault::api;
use csv_vault::app_state::AppState;
use csv_vault::config::{AppConfig, StorageBackend};
use csv_vault::service::request::UploadRequest;

fn local_state(dir: &TempDir) -> AppState {
    let mut config = AppConfig::default();
    config.storage.backend = StorageBackend::Local;
    config.storage.base_path = dir.path().to_string_lossy().into_owned();
    AppState::from_config(config).unwrap()
}

fn ledger(dir: &TempDir) -> Value {
    serde_json::from_str(&fs::read_to_string(dir.path().join("user_files.json")).unwrap()).unwrap()
}

#[actix_web::test]
async fn test_files_and_ledger_on_disk() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(local_state(&dir)))
            .configure(api::configure),
    )
    .await;

    let upload = test::TestRequest::post()
        .uri("/file/upload/")
        .insert_header(("Token", "abc"))
        .insert_header(("File-Name", "data.csv"))
        .set_payload("a,b\n1,2\n")
        .to_request();
    let receipt: Value = test::call_and_read_body_json(&app, upload).await;
    let name = receipt["random_name"].as_str().unwrap().to_string();

    assert_eq!(fs::read(dir.path().join(&name)).unwrap(), b"a,b\n1,2\n");
    let sidecar: Value =
        serde_json::from_str(&fs::read_to_string(dir.path().join(format!("{}.meta.json", name))).unwrap()).unwrap();
    assert_eq!(sidecar["owner_token"], "abc");
    assert_eq!(sidecar["original_name"], "data.csv");
    assert_eq!(ledger(&dir), json!({ "abc": [name.clone()] }));

    let remove = test::TestRequest::post()
        .uri("/file/remove/")
        .set_form([("token", "abc"), ("file_name", name.as_str())])
        .to_request();
    let resp = test::call_service(&app, remove).await;
    assert_eq!(resp.status(), StatusCode::OK);

    assert!(!dir.path().join(&name).exists());
    assert!(!dir.path().join(format!("{}.meta.json", name)).exists());
    assert_eq!(ledger(&dir), json!({}));
}

#[actix_web::test]
async fn test_lost_blob_is_not_found() {
    let dir = TempDir::new().unwrap();
    let app = test::init_service(
        App::new()
            .app_data(web::Data::new(local_state(&dir)))
            .configure(api::configure),
    )
    .await;

    let upload = test::TestRequest::post()
        .uri("/file/upload/")
        .insert_header(("Token", "abc"))
        .insert_header(("File-Name", "data.csv"))
        .set_payload("a\n1\n")
        .to_request();
    let receipt: Value = test::call_and_read_body_json(&app, upload).await;
    let name = receipt["random_name"].as_str().unwrap().to_string();
    fs::remove_file(dir.path().join(&name)).unwrap();

    let shape = test::TestRequest::post()
        .uri("/file_info/shape/")
        .set_form([("token", "abc"), ("file_name", name.as_str())])
        .to_request();
    let resp = test::call_service(&app, shape).await;
    assert_eq!(resp.status(), StatusCode::NOT_FOUND);
    let body: Value = test::read_body_json(resp).await;
    assert_eq!(body, json!({"error": "File does not exist"}));
}

#[actix_web::test]
async fn test_corrupt_ledger_is_a_server_error() {
    let dir = TempDir::new().unwrap();
    let state = local_state(&dir);
    fs::write(dir.path().join("user_files.json"), "not json").unwrap();
    let app = test::init_service(App::new().app_data(web::Data::new(state)).configure(api::configure)).await;

    let shape = test::TestRequest::post()
        .uri("/file_info/shape/")
        .set_form([("token", "abc"), ("file_name", "AAAAAAAAAAAA")])
        .to_request();
    let resp = test::call_service(&app, shape).await;
    assert_eq!(resp.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(fs::read_to_string(dir.path().join("user_files.json")).unwrap(), "not json");
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_uploads_keep_every_grant() {
    let dir = TempDir::new().unwrap();
    let service = Arc::clone(&local_state(&dir).file_service);

    let tasks: Vec<_> = (0..24)
        .map(|i| {
            let service = Arc::clone(&service);
            tokio::task::spawn_blocking(move || {
                let request = UploadRequest {
                    token: format!("token_{}", i % 6),
                    original_name: format!("file_{}.csv", i),
                    data: bytes::Bytes::from(format!("n\n{}\n", i)),
                };
                service.upload(&request).map(|receipt| receipt.random_name)
            })
        })
        .collect();

    let mut names = Vec::new();
    for task in tasks {
        names.push(task.await.unwrap().unwrap());
    }
    names.sort();
    names.dedup();
    assert_eq!(names.len(), 24);

    let doc = ledger(&dir);
    let doc = doc.as_object().unwrap();
    assert_eq!(doc.len(), 6);
    let total: usize = doc.values().map(|files| files.as_array().unwrap().len()).sum();
    assert_eq!(total, 24);
}
