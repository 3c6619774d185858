//! HTTP request handlers for the pixpress API.
//!
//! # Endpoints
//!
//! - `POST /upload` - Validate a batch and open an upload session
//! - `POST /compress` - Compress a batch into a downloadable ZIP
//! - `GET /download/{filename}` - Fetch a compressed archive
//! - `GET /progress/{session_id}` - Progress stub
//! - `GET /health` - Health check endpoint

use std::sync::Arc;

use axum::{
    extract::{multipart::MultipartRejection, Multipart, Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, warn};

use crate::error::{CompressError, StorageError, TranscodeError, ValidationError};
use crate::pipeline::{CompressRequest, CompressService};
use crate::store::BlobStore;
use crate::upload::UploadItem;

/// File name offered to the browser for every download.
pub const DOWNLOAD_FILENAME: &str = "compressed_images.zip";

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the compress service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<B: BlobStore> {
    pub service: Arc<CompressService<B>>,
}

impl<B: BlobStore> AppState<B> {
    pub fn new(service: Arc<CompressService<B>>) -> Self {
        Self { service }
    }
}

impl<B: BlobStore> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Fields read from a `multipart/form-data` upload.
#[derive(Debug, Default)]
pub struct BatchForm {
    /// Every `files` part in submission order; `None` if the field is absent
    pub files: Option<Vec<UploadItem>>,

    /// Raw `quality` field
    pub quality: Option<String>,

    pub session_id: Option<String>,
}

impl BatchForm {
    /// Parse the quality field. Blank means "not given".
    pub fn quality(&self) -> Result<Option<i64>, ValidationError> {
        match self.quality.as_deref().map(str::trim) {
            None | Some("") => Ok(None),
            Some(raw) => raw
                .parse::<i64>()
                .map(Some)
                .map_err(|_| ValidationError::InvalidQuality {
                    value: raw.to_string(),
                }),
        }
    }

    fn session_id(&self) -> Option<String> {
        self.session_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
            .map(str::to_string)
    }
}

/// Read every field of a batch upload.
///
/// A request that is not multipart at all is treated as a form without
/// fields. Failures while reading the body (including the size limit) keep
/// the status axum assigns them.
pub async fn read_batch_form(
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<BatchForm, ValidationError> {
    let mut multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => {
            debug!(reason = %rejection.body_text(), "Request is not a multipart upload");
            return Ok(BatchForm::default());
        }
    };

    let multipart_error = |e: axum::extract::multipart::MultipartError| {
        ValidationError::Multipart {
            message: e.body_text(),
            status: e.status().as_u16(),
        }
    };

    let mut form = BatchForm::default();
    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "files" => {
                let filename = field.file_name().unwrap_or_default().to_string();
                let bytes = field.bytes().await.map_err(multipart_error)?;
                form.files
                    .get_or_insert_with(Vec::new)
                    .push(UploadItem::new(filename, bytes));
            }
            "quality" => form.quality = Some(field.text().await.map_err(multipart_error)?),
            "session_id" => form.session_id = Some(field.text().await.map_err(multipart_error)?),
            other => debug!(field = other, "Ignoring unknown form field"),
        }
    }
    Ok(form)
}

// =============================================================================
// Response Types
// =============================================================================

/// JSON error response returned for all error conditions.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Human-readable error message
    pub error: String,

    /// Error kind identifier (e.g., "invalid_file_type", "not_found")
    pub code: String,

    /// HTTP status code (included for convenience)
    pub status: u16,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>, code: impl Into<String>, status: StatusCode) -> Self {
        Self {
            error: message.into(),
            code: code.into(),
            status: status.as_u16(),
        }
    }
}

/// Response from `/upload`.
#[derive(Debug, Serialize, Deserialize)]
pub struct UploadResponse {
    pub session_id: String,
    pub file_count: usize,
    pub quality: i64,
}

/// Response from `/compress`.
#[derive(Debug, Serialize, Deserialize)]
pub struct CompressResponse {
    pub success: bool,

    /// Relative URL of the archive
    pub download_url: String,

    pub file_count: usize,
}

/// Response from `/progress/{session_id}`.
#[derive(Debug, Serialize, Deserialize)]
pub struct ProgressResponse {
    pub progress: u8,
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// A fully classified error, ready to be sent.
///
/// Logging happens when the response is built:
/// - 5xx errors are logged at ERROR level (server errors)
/// - 404s are logged at DEBUG level (common and expected)
/// - other 4xx errors are logged at WARN level (client errors)
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    fn new(status: StatusCode, code: &'static str, message: impl Into<String>) -> Self {
        Self {
            status,
            code,
            message: message.into(),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status;
        if status.is_server_error() {
            error!(
                error_type = self.code,
                status = status.as_u16(),
                "Server error: {}",
                self.message
            );
        } else if status == StatusCode::NOT_FOUND {
            debug!(
                error_type = self.code,
                status = status.as_u16(),
                "Resource not found: {}",
                self.message
            );
        } else {
            warn!(
                error_type = self.code,
                status = status.as_u16(),
                "Client error: {}",
                self.message
            );
        }

        let body = ErrorResponse::new(self.message, self.code, status);
        (status, Json(body)).into_response()
    }
}

impl From<ValidationError> for ApiError {
    fn from(err: ValidationError) -> Self {
        let code = match &err {
            ValidationError::MissingFiles => "missing_files",
            ValidationError::EmptyBatch => "empty_batch",
            ValidationError::InvalidFileType { .. } => "invalid_file_type",
            ValidationError::InvalidQuality { .. } => "invalid_quality",
            ValidationError::Multipart { status, .. } => {
                let status = StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_REQUEST);
                let code = if status == StatusCode::PAYLOAD_TOO_LARGE {
                    "payload_too_large"
                } else {
                    "malformed_upload"
                };
                return ApiError::new(status, code, err.to_string());
            }
            ValidationError::UnknownSession { .. } => "unknown_session",
            ValidationError::SessionMismatch { .. } => "session_mismatch",
        };
        ApiError::new(StatusCode::BAD_REQUEST, code, err.to_string())
    }
}

impl From<CompressError> for ApiError {
    fn from(err: CompressError) -> Self {
        match &err {
            CompressError::Validation(v) => v.clone().into(),
            CompressError::Transcode(TranscodeError::Decode { .. }) => {
                ApiError::new(StatusCode::BAD_REQUEST, "decode_error", err.to_string())
            }
            CompressError::Transcode(TranscodeError::Encode { .. }) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "encode_error",
                err.to_string(),
            ),
            CompressError::Archive(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "archive_error",
                err.to_string(),
            ),
            CompressError::Storage(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                err.to_string(),
            ),
            CompressError::Timeout { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "timeout",
                err.to_string(),
            ),
            CompressError::Worker(_) => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "worker_error",
                err.to_string(),
            ),
        }
    }
}

/// Wrapper for `/upload` errors to implement IntoResponse.
pub struct UploadError(pub ValidationError);

impl IntoResponse for UploadError {
    fn into_response(self) -> Response {
        ApiError::from(self.0).into_response()
    }
}

impl From<ValidationError> for UploadError {
    fn from(err: ValidationError) -> Self {
        UploadError(err)
    }
}

/// Wrapper for `/compress` errors to implement IntoResponse.
///
/// A missing or empty file list reads "No files to compress" here.
pub struct CompressHandlerError(pub CompressError);

impl IntoResponse for CompressHandlerError {
    fn into_response(self) -> Response {
        match self.0 {
            CompressError::Validation(ValidationError::MissingFiles)
            | CompressError::Validation(ValidationError::EmptyBatch) => ApiError::new(
                StatusCode::BAD_REQUEST,
                "empty_batch",
                "No files to compress",
            )
            .into_response(),
            other => ApiError::from(other).into_response(),
        }
    }
}

impl From<CompressError> for CompressHandlerError {
    fn from(err: CompressError) -> Self {
        CompressHandlerError(err)
    }
}

impl From<ValidationError> for CompressHandlerError {
    fn from(err: ValidationError) -> Self {
        CompressHandlerError(err.into())
    }
}

/// Wrapper for `/download` errors to implement IntoResponse.
pub struct DownloadError(pub StorageError);

impl IntoResponse for DownloadError {
    fn into_response(self) -> Response {
        match self.0 {
            StorageError::NotFound { handle } => {
                debug!(handle = %handle, "Download of unknown archive");
                ApiError::new(StatusCode::NOT_FOUND, "not_found", "File not found").into_response()
            }
            err @ StorageError::Io { .. } => ApiError::new(
                StatusCode::INTERNAL_SERVER_ERROR,
                "storage_error",
                err.to_string(),
            )
            .into_response(),
        }
    }
}

impl From<StorageError> for DownloadError {
    fn from(err: StorageError) -> Self {
        DownloadError(err)
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle batch validation.
///
/// # Endpoint
///
/// `POST /upload` (multipart: `files`, optional `quality`)
///
/// # Response
///
/// - `200 OK`: `{"session_id": "...", "file_count": 3, "quality": 80}`
/// - `400 Bad Request`: no `files` field, empty selection, invalid file type,
///   or non-integer quality
pub async fn upload_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<UploadResponse>, UploadError> {
    let form = read_batch_form(multipart).await?;
    let files = form.files.as_deref().ok_or(ValidationError::MissingFiles)?;
    let quality = form.quality()?;

    let session = state.service.preflight(files, quality).await?;

    Ok(Json(UploadResponse {
        session_id: session.id.to_string(),
        file_count: session.file_count,
        quality: session.quality,
    }))
}

/// Handle batch compression.
///
/// # Endpoint
///
/// `POST /compress` (multipart: `files`, optional `quality`, optional
/// `session_id`)
///
/// # Response
///
/// - `200 OK`:
///   ```json
///   {"success": true, "download_url": "/download/compressed_images_<uuid>.zip", "file_count": 3}
///   ```
/// - `400 Bad Request`: no files, invalid file type, bad quality,
///   undecodable image, unknown or mismatched session
/// - `413 Payload Too Large`: body over the upload limit
/// - `500 Internal Server Error`: encode, archive, storage or timeout failure
pub async fn compress_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Result<Json<CompressResponse>, CompressHandlerError> {
    let form = read_batch_form(multipart).await?;
    let quality = form.quality()?;
    let session_id = form.session_id();

    let items = form.files.unwrap_or_default();
    if items.is_empty() {
        return Err(ValidationError::EmptyBatch.into());
    }

    let request = CompressRequest {
        items,
        quality,
        session_id,
    };
    let outcome = state.service.compress(request).await?;

    Ok(Json(CompressResponse {
        success: true,
        download_url: outcome.handle.download_url(),
        file_count: outcome.file_count,
    }))
}

/// Serve a compressed archive.
///
/// # Endpoint
///
/// `GET /download/{filename}`
///
/// # Response
///
/// - `200 OK`: the ZIP, `Content-Type: application/zip`, offered as
///   `compressed_images.zip`
/// - `404 Not Found`: `{"error": "File not found", ...}`
///
/// The first successful download schedules the archive's deletion.
pub async fn download_handler<B: BlobStore>(
    State(state): State<AppState<B>>,
    Path(filename): Path<String>,
) -> Result<Response, DownloadError> {
    let data = state.service.store().retrieve(&filename).await?;

    let headers = [
        (header::CONTENT_TYPE, "application/zip".to_string()),
        (
            header::CONTENT_DISPOSITION,
            format!("attachment; filename=\"{}\"", DOWNLOAD_FILENAME),
        ),
        (header::CACHE_CONTROL, "no-store".to_string()),
    ];
    Ok((StatusCode::OK, headers, data).into_response())
}

/// Report batch progress.
///
/// # Endpoint
///
/// `GET /progress/{session_id}`
///
/// Compression is synchronous, so this always reports `{"progress": 0}`.
pub async fn progress_handler(Path(_session_id): Path<String>) -> Json<ProgressResponse> {
    Json(ProgressResponse { progress: 0 })
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
///
/// # Response
///
/// `200 OK` with JSON body:
/// ```json
/// {
///   "status": "healthy",
///   "version": "0.1.0"
/// }
/// ```
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}
