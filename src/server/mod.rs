//! HTTP server layer for pixpress.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │   POST /upload   POST /compress   GET /download/{filename}      │
//! │                                                                 │
//! │  ┌──────────────────────────┐  ┌─────────────────────────────┐  │
//! │  │        handlers          │  │          routes             │  │
//! │  │ (multipart, JSON errors) │  │ (CORS, body limit, tracing) │  │
//! │  └──────────────────────────┘  └─────────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod handlers;
pub mod routes;

pub use handlers::{
    compress_handler, download_handler, health_handler, progress_handler, read_batch_form,
    upload_handler, ApiError, AppState, BatchForm, CompressHandlerError, CompressResponse,
    DownloadError, ErrorResponse, HealthResponse, ProgressResponse, UploadError, UploadResponse,
    DOWNLOAD_FILENAME,
};
pub use routes::{create_router, RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
