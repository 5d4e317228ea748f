use crate::AppState;
use crate::api::error::{AppError, FailureCause};
use crate::services::storage::StorageError;
use crate::utils::validation::{attachment_disposition, object_key, sanitize_filename};
use axum::{
    Json,
    body::Body,
    extract::{
        Multipart, Path, State,
        multipart::{MultipartError, MultipartRejection},
    },
    http::{HeaderValue, StatusCode, header},
    response::{IntoResponse, Response},
};
use bytes::Bytes;
use chrono::{DateTime, SecondsFormat, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use std::future::Future;
use tokio_util::io::ReaderStream;
use tracing::{debug, info, warn};
use utoipa::ToSchema;

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    pub blob_name: String,
}

#[derive(Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct FileEntry {
    pub name: String,
    /// ISO-8601 UTC timestamp with millisecond precision, `null` when
    /// neither the listing nor the object's metadata carries one
    #[schema(nullable, example = "2024-05-01T12:00:00.000Z")]
    pub last_modified: Option<String>,
}

#[derive(Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub message: String,
}

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub error: String,
}

/// Multipart form accepted by `/upload` (documentation only)
#[derive(ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    #[schema(value_type = String, format = Binary)]
    file: Vec<u8>,
}

/// Upper bound on key collisions resolved for one upload
const MAX_KEY_ATTEMPTS: u32 = 16;

struct StagedUpload {
    filename: String,
    content_type: Option<String>,
    data: Bytes,
}

fn multipart_failure(e: MultipartError) -> AppError {
    if e.status() == StatusCode::PAYLOAD_TOO_LARGE {
        AppError::Upload(FailureCause::PayloadTooLarge(
            "Request body exceeds the maximum allowed limit".to_string(),
        ))
    } else {
        AppError::Upload(FailureCause::BadRequest(e.to_string()))
    }
}

/// Runs the storage side of an operation under the configured deadline
async fn within_deadline<T, F>(state: &AppState, work: F) -> Result<T, FailureCause>
where
    F: Future<Output = Result<T, FailureCause>>,
{
    match state.config.request_timeout() {
        Some(limit) => tokio::time::timeout(limit, work)
            .await
            .map_err(|_| FailureCause::Timeout(limit))?,
        None => work.await,
    }
}

/// Writes the staged file under a fresh key.
/// Same name within the same millisecond: move to the next millisecond.
async fn store_upload(state: &AppState, staged: &StagedUpload) -> Result<String, FailureCause> {
    let mut now = Utc::now();
    let mut attempts = 1;

    loop {
        let key = object_key(now, &staged.filename);
        match state
            .storage
            .upload_file(&key, staged.data.clone(), staged.content_type.as_deref())
            .await
        {
            Ok(()) => return Ok(key),
            Err(StorageError::AlreadyExists(_)) if attempts < MAX_KEY_ATTEMPTS => {
                debug!("Key {} taken, trying the next millisecond", key);
                attempts += 1;
                now += TimeDelta::milliseconds(1);
            }
            Err(e) => return Err(e.into()),
        }
    }
}

pub fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[utoipa::path(
    post,
    path = "/upload",
    request_body(content = UploadForm, content_type = "multipart/form-data", description = "File upload"),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No file part in the request", body = ErrorResponse),
        (status = 409, description = "No free key for this name", body = ErrorResponse),
        (status = 413, description = "File exceeds the size limit", body = ErrorResponse),
        (status = 502, description = "Storage backend rejected the write", body = ErrorResponse),
        (status = 504, description = "Storage did not answer in time", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn upload_file(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, AppError> {
    let mut multipart = multipart
        .map_err(|e| AppError::Upload(FailureCause::BadRequest(e.body_text())))?;

    let result: Result<Json<UploadResponse>, AppError> = async {
        let mut staged: Option<StagedUpload> = None;

        while let Some(field) = multipart.next_field().await.map_err(multipart_failure)? {
            if field.name() != Some("file") {
                debug!("Ignoring multipart field {:?}", field.name());
                continue;
            }

            // A `file` field without a filename is a plain text field
            let Some(original_filename) = field.file_name().map(str::to_string) else {
                continue;
            };

            if staged.is_some() {
                return Err(AppError::Upload(FailureCause::BadRequest(
                    "Only one file may be uploaded per request".to_string(),
                )));
            }

            let filename = sanitize_filename(&original_filename)
                .map_err(|e| AppError::Upload(FailureCause::BadRequest(e.to_string())))?;
            let content_type = field.content_type().map(str::to_string);
            let data = field.bytes().await.map_err(multipart_failure)?;

            staged = Some(StagedUpload {
                filename,
                content_type,
                data,
            });
        }

        let staged = staged.ok_or(AppError::Upload(FailureCause::BadRequest(
            "No file provided".to_string(),
        )))?;

        // The body is fully received here; only the write is under the deadline
        let key = within_deadline(&state, store_upload(&state, &staged))
            .await
            .map_err(AppError::Upload)?;

        info!("📦 Stored {} ({} bytes)", key, staged.data.len());

        Ok(Json(UploadResponse {
            message: "File uploaded successfully!".to_string(),
            blob_name: key,
        }))
    }
    .await;

    match result {
        Ok(res) => Ok(res),
        Err(e) => {
            // Drain the rest of the body so the client sees our response, not a reset
            warn!("Upload failed early: {}. Consuming remaining stream...", e);
            while let Ok(Some(mut field)) = multipart.next_field().await {
                while let Ok(Some(_)) = field.chunk().await {}
            }
            Err(e)
        }
    }
}

#[utoipa::path(
    get,
    path = "/files",
    responses(
        (status = 200, description = "Every stored file, in backend enumeration order", body = [FileEntry]),
        (status = 502, description = "Storage backend failed to enumerate", body = ErrorResponse),
        (status = 504, description = "Storage did not answer in time", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn list_files(State(state): State<AppState>) -> Result<Json<Vec<FileEntry>>, AppError> {
    let files = within_deadline(&state, collect_entries(&state))
        .await
        .map_err(AppError::List)?;

    Ok(Json(files))
}

async fn collect_entries(state: &AppState) -> Result<Vec<FileEntry>, FailureCause> {
    let objects = state.storage.list_objects().await?;

    let mut files = Vec::with_capacity(objects.len());
    for object in objects {
        let last_modified = match object.last_modified {
            Some(ts) => Some(ts),
            None => match state.storage.get_object_metadata(&object.key).await {
                Ok(meta) => meta.last_modified,
                // Deleted between the listing and the metadata fetch
                Err(StorageError::NotFound(_)) => continue,
                Err(e) => return Err(e.into()),
            },
        };

        files.push(FileEntry {
            name: object.key,
            last_modified: last_modified.map(format_timestamp),
        });
    }

    Ok(files)
}

#[utoipa::path(
    get,
    path = "/download/{key}",
    params(
        ("key" = String, Path, description = "Object key returned by upload")
    ),
    responses(
        (status = 200, description = "File content stream with an attachment Content-Disposition"),
        (status = 404, description = "No object under this key", body = ErrorResponse),
        (status = 502, description = "Storage backend failed to read", body = ErrorResponse),
        (status = 504, description = "Storage did not open the object in time", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn download_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Response, AppError> {
    // Only opening the object is bounded; the body streams as fast as the client reads
    let object = within_deadline(&state, async {
        Ok::<_, FailureCause>(state.storage.get_object_stream(&key).await?)
    })
    .await
    .map_err(AppError::Download)?;

    let content_type = object
        .content_type
        .filter(|ct| HeaderValue::from_str(ct).is_ok())
        .unwrap_or_else(|| mime::APPLICATION_OCTET_STREAM.to_string());

    let body = Body::from_stream(ReaderStream::new(object.body.into_async_read()));

    let mut response = (
        [
            (header::CONTENT_TYPE, content_type),
            (header::CONTENT_DISPOSITION, attachment_disposition(&key)),
        ],
        body,
    )
        .into_response();

    if let Some(len) = object.content_length.filter(|len| *len >= 0) {
        response
            .headers_mut()
            .insert(header::CONTENT_LENGTH, HeaderValue::from(len));
    }

    debug!("📤 Streaming {}", key);
    Ok(response)
}

#[utoipa::path(
    delete,
    path = "/delete/{key}",
    params(
        ("key" = String, Path, description = "Object key returned by upload")
    ),
    responses(
        (status = 200, description = "File deleted", body = MessageResponse),
        (status = 404, description = "No object under this key (strict delete only)", body = ErrorResponse),
        (status = 502, description = "Storage backend failed to delete", body = ErrorResponse),
        (status = 504, description = "Storage did not answer in time", body = ErrorResponse)
    ),
    tag = "files"
)]
pub async fn delete_file(
    State(state): State<AppState>,
    Path(key): Path<String>,
) -> Result<Json<MessageResponse>, AppError> {
    within_deadline(&state, async {
        if state.config.strict_delete && !state.storage.file_exists(&key).await? {
            return Err(FailureCause::from(StorageError::NotFound(key.clone())));
        }
        Ok::<_, FailureCause>(state.storage.delete_file(&key).await?)
    })
    .await
    .map_err(AppError::Delete)?;

    info!("🗑️  Deleted {}", key);

    Ok(Json(MessageResponse {
        message: "File deleted successfully!".to_string(),
    }))
}
