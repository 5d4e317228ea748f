#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Request, Response, StatusCode},
};
use blob_drop::config::AppConfig;
use blob_drop::services::storage::{
    FileMetadata, InMemoryStorageService, ObjectDownload, ObjectSummary, StorageError,
    StorageResult, StorageService,
};
use blob_drop::{AppState, create_app};
use bytes::Bytes;
use http_body_util::BodyExt;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tower::ServiceExt;

pub const BOUNDARY: &str = "---------------------------123456789012345678901234567";

pub fn test_config() -> AppConfig {
    AppConfig::development()
}

pub fn memory_app() -> (Router, Arc<InMemoryStorageService>) {
    memory_app_with(test_config())
}

pub fn memory_app_with(config: AppConfig) -> (Router, Arc<InMemoryStorageService>) {
    let storage = Arc::new(InMemoryStorageService::new());
    let app = create_app(AppState::new(storage.clone(), config));
    (app, storage)
}

pub fn app_with_storage(storage: Arc<dyn StorageService>) -> Router {
    app_with_storage_config(storage, test_config())
}

pub fn app_with_storage_config(storage: Arc<dyn StorageService>, config: AppConfig) -> Router {
    create_app(AppState::new(storage, config))
}

/// Builds a `multipart/form-data` body with one file part named `field`.
pub fn multipart_file(field: &str, filename: &str, content: &[u8]) -> Vec<u8> {
    let mut body = Vec::new();
    body.extend_from_slice(
        format!(
            "--{BOUNDARY}\r\n\
            Content-Disposition: form-data; name=\"{field}\"; filename=\"{filename}\"\r\n\
            Content-Type: application/octet-stream\r\n\r\n"
        )
        .as_bytes(),
    );
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

/// Builds a `multipart/form-data` body holding a single text field.
pub fn multipart_text(field: &str, value: &str) -> Vec<u8> {
    format!(
        "--{BOUNDARY}\r\n\
        Content-Disposition: form-data; name=\"{field}\"\r\n\r\n\
        {value}\r\n\
        --{BOUNDARY}--\r\n"
    )
    .into_bytes()
}

pub fn upload_request(body: Vec<u8>) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri("/upload")
        .header(
            "Content-Type",
            format!("multipart/form-data; boundary={}", BOUNDARY),
        )
        .body(Body::from(body))
        .unwrap()
}

pub fn get(uri: &str) -> Request<Body> {
    Request::builder()
        .method("GET")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub fn delete(uri: &str) -> Request<Body> {
    Request::builder()
        .method("DELETE")
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

pub async fn send(app: &Router, request: Request<Body>) -> Response<Body> {
    app.clone().oneshot(request).await.unwrap()
}

pub async fn body_bytes(response: Response<Body>) -> Bytes {
    response.into_body().collect().await.unwrap().to_bytes()
}

pub async fn body_json(response: Response<Body>) -> Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

/// Uploads `content` as `filename` and returns the generated key.
pub async fn upload(app: &Router, filename: &str, content: &[u8]) -> String {
    let response = send(app, upload_request(multipart_file("file", filename, content))).await;
    assert_eq!(response.status(), StatusCode::OK);
    let json = body_json(response).await;
    json["blobName"].as_str().unwrap().to_string()
}

pub async fn listed_names(app: &Router) -> Vec<String> {
    let response = send(app, get("/files")).await;
    assert_eq!(response.status(), StatusCode::OK);
    body_json(response)
        .await
        .as_array()
        .unwrap()
        .iter()
        .map(|f| f["name"].as_str().unwrap().to_string())
        .collect()
}

/// Storage double whose every call fails with a fixed error kind.
pub struct FailingStorageService {
    kind: FailureKind,
}

#[derive(Clone, Copy)]
pub enum FailureKind {
    Unavailable,
    Backend,
}

impl FailingStorageService {
    pub fn new(kind: FailureKind) -> Self {
        Self { kind }
    }

    fn error(&self) -> StorageError {
        match self.kind {
            FailureKind::Unavailable => StorageError::Unavailable("connection refused".into()),
            FailureKind::Backend => StorageError::Backend("InternalError: we encountered an internal error".into()),
        }
    }
}

#[async_trait]
impl StorageService for FailingStorageService {
    async fn upload_file(&self, _key: &str, _data: Bytes, _ct: Option<&str>) -> StorageResult<()> {
        Err(self.error())
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        Err(self.error())
    }

    async fn get_object_metadata(&self, _key: &str) -> StorageResult<FileMetadata> {
        Err(self.error())
    }

    async fn get_object_stream(&self, _key: &str) -> StorageResult<ObjectDownload> {
        Err(self.error())
    }

    async fn delete_file(&self, _key: &str) -> StorageResult<()> {
        Err(self.error())
    }

    async fn file_exists(&self, _key: &str) -> StorageResult<bool> {
        Err(self.error())
    }

    fn backend_name(&self) -> &'static str {
        "failing"
    }
}

/// Wraps the in-memory store but lists objects without timestamps,
/// the way some S3-compatible gateways do.
pub struct UndatedListingStorage {
    pub inner: InMemoryStorageService,
}

#[async_trait]
impl StorageService for UndatedListingStorage {
    async fn upload_file(&self, key: &str, data: Bytes, ct: Option<&str>) -> StorageResult<()> {
        self.inner.upload_file(key, data, ct).await
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        let mut objects = self.inner.list_objects().await?;
        for object in &mut objects {
            object.last_modified = None;
        }
        // A listed key that is gone by the time its metadata is fetched
        objects.push(ObjectSummary {
            key: "0-vanished.txt".to_string(),
            last_modified: None,
        });
        Ok(objects)
    }

    async fn get_object_metadata(&self, key: &str) -> StorageResult<FileMetadata> {
        self.inner.get_object_metadata(key).await
    }

    async fn get_object_stream(&self, key: &str) -> StorageResult<ObjectDownload> {
        self.inner.get_object_stream(key).await
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        self.inner.delete_file(key).await
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        self.inner.file_exists(key).await
    }

    fn backend_name(&self) -> &'static str {
        "undated"
    }
}

/// Wraps the in-memory store and stalls every call by `delay`
pub struct SlowStorageService {
    pub inner: InMemoryStorageService,
    pub delay: Duration,
}

impl SlowStorageService {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: InMemoryStorageService::new(),
            delay,
        }
    }
}

#[async_trait]
impl StorageService for SlowStorageService {
    async fn upload_file(&self, key: &str, data: Bytes, ct: Option<&str>) -> StorageResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.upload_file(key, data, ct).await
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        tokio::time::sleep(self.delay).await;
        self.inner.list_objects().await
    }

    async fn get_object_metadata(&self, key: &str) -> StorageResult<FileMetadata> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_object_metadata(key).await
    }

    async fn get_object_stream(&self, key: &str) -> StorageResult<ObjectDownload> {
        tokio::time::sleep(self.delay).await;
        self.inner.get_object_stream(key).await
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        tokio::time::sleep(self.delay).await;
        self.inner.delete_file(key).await
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        tokio::time::sleep(self.delay).await;
        self.inner.file_exists(key).await
    }

    fn backend_name(&self) -> &'static str {
        "slow"
    }
}
