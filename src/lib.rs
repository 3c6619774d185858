//! # pixpress
//!
//! A batch image compression service.
//!
//! Clients upload a set of raster images (JPEG, PNG, GIF, BMP) with a quality
//! level. Each image is recompressed as a JPEG, the results are bundled into
//! one ZIP archive, and the archive is served for download for a short time
//! before it is deleted.
//!
//! ## Features
//!
//! - **Parallel transcoding**: images in a batch are decoded and re-encoded on
//!   a dedicated worker pool, preserving submission order
//! - **Bounded decoding**: image dimensions and decoder memory are capped
//! - **Self-cleaning storage**: archives are removed shortly after download,
//!   or after a maximum age if nobody downloads them
//! - **Offline mode**: the same pipeline is available from the command line
//!
//! ## Architecture
//!
//! The library is organized into several modules:
//!
//! - [`upload`] - Upload items, file type validation and name sanitization
//! - [`transcode`] - Decode, color normalization and JPEG encoding
//! - [`archive`] - In-memory ZIP writer
//! - [`store`] - Archive storage with scheduled expiry
//! - [`pipeline`] - Compress service and upload sessions
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use pixpress::{create_router, ArtifactStore, CompressService, FsBlobStore, PipelineConfig,
//!     RouterConfig, StoreConfig};
//!
//! #[tokio::main]
//! async fn main() {
//!     let store_config = StoreConfig::new("temp_uploads");
//!     let blobs = FsBlobStore::new(&store_config.dir);
//!     let store = Arc::new(ArtifactStore::new(blobs, store_config));
//!     let _worker = store.clone().spawn_expiry_worker();
//!
//!     let service = CompressService::new(store, PipelineConfig::default()).unwrap();
//!     let router = create_router(Arc::new(service), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:5000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod archive;
pub mod config;
pub mod error;
pub mod pipeline;
pub mod server;
pub mod store;
pub mod transcode;
pub mod upload;

// Re-export commonly used types
pub use archive::{build_archive, ArchiveBuilder};
pub use config::{Cli, Command, CompressConfig, ServeConfig};
pub use error::{
    ArchiveError, CompressError, StorageError, TranscodeError, ValidationError,
};
pub use pipeline::{
    compress_offline, CompressOutcome, CompressRequest, CompressService, PackagedBatch,
    PipelineConfig, SessionRegistry, UploadSession,
};
pub use server::{create_router, AppState, ErrorResponse, RouterConfig};
pub use store::{
    ArchiveHandle, ArtifactState, ArtifactStore, BlobStore, FsBlobStore, StoreConfig,
};
pub use transcode::{
    clamp_quality, is_valid_quality, JpegTranscoder, NameAllocator, TranscodedItem,
    DEFAULT_JPEG_QUALITY, MAX_JPEG_QUALITY, MIN_JPEG_QUALITY,
};
pub use upload::{is_allowed_file, sanitize_filename, validate_batch, UploadItem};
