//! Batch compression pipeline.
//!
//! - [`CompressService`]: validate, transcode in parallel, zip, store
//! - [`SessionRegistry`]: upload sessions linking `/upload` to `/compress`

mod service;
mod session;

pub use service::{
    build_worker_pool, compress_offline, package_batch, CompressOutcome, CompressRequest,
    CompressService, PackagedBatch, PipelineConfig, DEFAULT_TRANSCODE_TIMEOUT,
};
pub use session::{SessionRegistry, UploadSession, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};
