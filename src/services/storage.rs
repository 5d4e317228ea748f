use async_trait::async_trait;
use aws_sdk_s3::Client;
use aws_sdk_s3::error::{DisplayErrorContext, ProvideErrorMetadata, SdkError};
use aws_sdk_s3::primitives::ByteStream;
use bytes::Bytes;
use chrono::{DateTime, Utc};
use std::collections::BTreeMap;
use thiserror::Error;
use tokio::sync::RwLock;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Object not found: {0}")]
    NotFound(String),

    #[error("Object already exists: {0}")]
    AlreadyExists(String),

    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    #[error("Storage error: {0}")]
    Backend(String),
}

pub type StorageResult<T> = Result<T, StorageError>;

/// One entry of a container listing
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ObjectSummary {
    pub key: String,
    pub last_modified: Option<DateTime<Utc>>,
}

pub struct FileMetadata {
    pub last_modified: Option<DateTime<Utc>>,
}

/// An opened object body. The body is pulled lazily from the backend.
pub struct ObjectDownload {
    pub body: ByteStream,
    pub content_length: Option<i64>,
    pub content_type: Option<String>,
}

#[async_trait]
pub trait StorageService: Send + Sync {
    /// Writes `data` under a key that must not exist yet.
    /// An occupied key yields `StorageError::AlreadyExists`.
    async fn upload_file(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()>;

    /// Enumerates the whole container in backend order.
    async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>>;

    async fn get_object_metadata(&self, key: &str) -> StorageResult<FileMetadata>;

    async fn get_object_stream(&self, key: &str) -> StorageResult<ObjectDownload>;

    async fn delete_file(&self, key: &str) -> StorageResult<()>;

    async fn file_exists(&self, key: &str) -> StorageResult<bool>;

    fn backend_name(&self) -> &'static str;
}

fn to_chrono(d: &aws_sdk_s3::primitives::DateTime) -> DateTime<Utc> {
    DateTime::from_timestamp(d.secs(), d.subsec_nanos()).unwrap_or_default()
}

/// Maps an S3 error code onto a not-found condition.
/// `NoSuchKey` comes from GET, a bare `NotFound` from HEAD (no body).
pub(crate) fn is_not_found_code(code: Option<&str>) -> bool {
    matches!(code, Some("NoSuchKey") | Some("NotFound"))
}

/// Codes returned when an `If-None-Match: *` write hits an existing key.
pub(crate) fn is_conflict_code(code: Option<&str>) -> bool {
    matches!(
        code,
        Some("PreconditionFailed") | Some("ConditionalRequestConflict")
    )
}

fn classify_sdk_error<E, R>(key: &str, err: SdkError<E, R>) -> StorageError
where
    E: ProvideErrorMetadata + std::error::Error + Send + Sync + 'static,
    R: std::fmt::Debug + Send + Sync + 'static,
{
    let detail = DisplayErrorContext(&err).to_string();
    match &err {
        SdkError::TimeoutError(_) | SdkError::DispatchFailure(_) => {
            StorageError::Unavailable(detail)
        }
        SdkError::ServiceError(service) if is_not_found_code(service.err().code()) => {
            StorageError::NotFound(key.to_string())
        }
        SdkError::ServiceError(service) if is_conflict_code(service.err().code()) => {
            StorageError::AlreadyExists(key.to_string())
        }
        _ => StorageError::Backend(detail),
    }
}

pub struct S3StorageService {
    client: Client,
    bucket: String,
}

impl S3StorageService {
    pub fn new(client: Client, bucket: String) -> Self {
        Self { client, bucket }
    }
}

#[async_trait]
impl StorageService for S3StorageService {
    async fn upload_file(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .if_none_match("*")
            .set_content_type(content_type.map(str::to_string))
            .body(ByteStream::from(data))
            .send()
            .await
            .map_err(|e| classify_sdk_error(key, e))?;
        Ok(())
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        let mut objects = Vec::new();
        let mut continuation_token = None;

        loop {
            let res = self
                .client
                .list_objects_v2()
                .bucket(&self.bucket)
                .set_continuation_token(continuation_token)
                .send()
                .await
                .map_err(|e| classify_sdk_error(&self.bucket, e))?;

            if let Some(contents) = res.contents {
                for object in contents {
                    if let Some(key) = object.key {
                        objects.push(ObjectSummary {
                            key,
                            last_modified: object.last_modified.as_ref().map(to_chrono),
                        });
                    }
                }
            }

            if res.is_truncated.unwrap_or(false) {
                continuation_token = res.next_continuation_token;
            } else {
                break;
            }
        }

        Ok(objects)
    }

    async fn get_object_metadata(&self, key: &str) -> StorageResult<FileMetadata> {
        let res = self
            .client
            .head_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(key, e))?;

        Ok(FileMetadata {
            last_modified: res.last_modified.as_ref().map(to_chrono),
        })
    }

    async fn get_object_stream(&self, key: &str) -> StorageResult<ObjectDownload> {
        let res = self
            .client
            .get_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(key, e))?;

        Ok(ObjectDownload {
            body: res.body,
            content_length: res.content_length,
            content_type: res.content_type,
        })
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        self.client
            .delete_object()
            .bucket(&self.bucket)
            .key(key)
            .send()
            .await
            .map_err(|e| classify_sdk_error(key, e))?;
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        match self.get_object_metadata(key).await {
            Ok(_) => Ok(true),
            Err(StorageError::NotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }

    fn backend_name(&self) -> &'static str {
        "s3"
    }
}

struct MemoryObject {
    data: Bytes,
    content_type: Option<String>,
    last_modified: DateTime<Utc>,
}

/// Keeps every object in process memory, ordered by key like an S3 listing.
/// Deleting a missing key succeeds, as it does on S3.
#[derive(Default)]
pub struct InMemoryStorageService {
    objects: RwLock<BTreeMap<String, MemoryObject>>,
}

impl InMemoryStorageService {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StorageService for InMemoryStorageService {
    async fn upload_file(
        &self,
        key: &str,
        data: Bytes,
        content_type: Option<&str>,
    ) -> StorageResult<()> {
        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists(key.to_string()));
        }
        objects.insert(
            key.to_string(),
            MemoryObject {
                data,
                content_type: content_type.map(str::to_string),
                last_modified: Utc::now(),
            },
        );
        Ok(())
    }

    async fn list_objects(&self) -> StorageResult<Vec<ObjectSummary>> {
        let objects = self.objects.read().await;
        Ok(objects
            .iter()
            .map(|(key, object)| ObjectSummary {
                key: key.clone(),
                last_modified: Some(object.last_modified),
            })
            .collect())
    }

    async fn get_object_metadata(&self, key: &str) -> StorageResult<FileMetadata> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(FileMetadata {
            last_modified: Some(object.last_modified),
        })
    }

    async fn get_object_stream(&self, key: &str) -> StorageResult<ObjectDownload> {
        let objects = self.objects.read().await;
        let object = objects
            .get(key)
            .ok_or_else(|| StorageError::NotFound(key.to_string()))?;
        Ok(ObjectDownload {
            body: ByteStream::from(object.data.clone()),
            content_length: Some(object.data.len() as i64),
            content_type: object.content_type.clone(),
        })
    }

    async fn delete_file(&self, key: &str) -> StorageResult<()> {
        self.objects.write().await.remove(key);
        Ok(())
    }

    async fn file_exists(&self, key: &str) -> StorageResult<bool> {
        Ok(self.objects.read().await.contains_key(key))
    }

    fn backend_name(&self) -> &'static str {
        "memory"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_codes() {
        assert!(is_not_found_code(Some("NoSuchKey")));
        assert!(is_not_found_code(Some("NotFound")));
        assert!(!is_not_found_code(Some("NoSuchBucket")));
        assert!(!is_not_found_code(Some("AccessDenied")));
        assert!(!is_not_found_code(None));
    }

    #[test]
    fn test_conflict_codes() {
        assert!(is_conflict_code(Some("PreconditionFailed")));
        assert!(is_conflict_code(Some("ConditionalRequestConflict")));
        assert!(!is_conflict_code(Some("NoSuchKey")));
    }

    #[tokio::test]
    async fn test_memory_store_refuses_overwrite() {
        let store = InMemoryStorageService::new();
        store
            .upload_file("1-a.txt", Bytes::from_static(b"first"), None)
            .await
            .unwrap();
        assert!(matches!(
            store
                .upload_file("1-a.txt", Bytes::from_static(b"second"), None)
                .await,
            Err(StorageError::AlreadyExists(_))
        ));

        let download = store.get_object_stream("1-a.txt").await.unwrap();
        let data = download.body.collect().await.unwrap().into_bytes();
        assert_eq!(&data[..], b"first");
    }

    #[tokio::test]
    async fn test_memory_store_lists_in_key_order() {
        let store = InMemoryStorageService::new();
        store
            .upload_file("200-b.txt", Bytes::from_static(b"b"), None)
            .await
            .unwrap();
        store
            .upload_file("100-a.txt", Bytes::from_static(b"a"), None)
            .await
            .unwrap();

        let keys: Vec<String> = store
            .list_objects()
            .await
            .unwrap()
            .into_iter()
            .map(|o| o.key)
            .collect();
        assert_eq!(keys, vec!["100-a.txt", "200-b.txt"]);
    }

    #[tokio::test]
    async fn test_memory_store_stream_and_metadata() {
        let store = InMemoryStorageService::new();
        store
            .upload_file("1-data.bin", Bytes::from_static(b"\x00\x01\x02"), Some("application/x-test"))
            .await
            .unwrap();

        let meta = store.get_object_metadata("1-data.bin").await.unwrap();
        assert!(meta.last_modified.is_some());

        let download = store.get_object_stream("1-data.bin").await.unwrap();
        assert_eq!(download.content_length, Some(3));
        assert_eq!(download.content_type.as_deref(), Some("application/x-test"));
        let data = download.body.collect().await.unwrap().into_bytes();
        assert_eq!(&data[..], b"\x00\x01\x02");
    }

    #[tokio::test]
    async fn test_memory_store_missing_key() {
        let store = InMemoryStorageService::new();
        assert!(matches!(
            store.get_object_stream("ghost-123").await,
            Err(StorageError::NotFound(key)) if key == "ghost-123"
        ));
        assert!(!store.file_exists("ghost-123").await.unwrap());
        // Same as S3: deleting nothing is not an error.
        assert!(store.delete_file("ghost-123").await.is_ok());
    }
}
