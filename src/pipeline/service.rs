//! Compress service: the batch pipeline behind `/compress`.
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────────────┐
//! │                        CompressService                           │
//! │                                                                  │
//! │  compress()                                                      │
//! │    1. validate batch          (upload::validate_batch)           │
//! │    2. resolve session         (SessionRegistry)                  │
//! │    3. transcode + package ──► rayon pool (off the executor)      │
//! │         ├─ JpegTranscoder per item, in parallel                  │
//! │         ├─ NameAllocator in submission order                     │
//! │         └─ build_archive                                         │
//! │    4. persist                 (ArtifactStore)                    │
//! └──────────────────────────────────────────────────────────────────┘
//! ```

use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use rayon::prelude::*;
use rayon::{ThreadPool, ThreadPoolBuilder};
use tokio::sync::oneshot;
use tracing::{debug, error, info};

use crate::archive::build_archive;
use crate::error::{CompressError, ValidationError};
use crate::store::{ArchiveHandle, ArtifactStore, BlobStore};
use crate::transcode::{
    DecodeLimits, JpegTranscoder, NameAllocator, TranscodedItem, DEFAULT_JPEG_QUALITY,
};
use crate::upload::{validate_batch, UploadItem};

use super::session::{SessionRegistry, UploadSession, DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL};

/// Default upper bound on transcoding one batch.
pub const DEFAULT_TRANSCODE_TIMEOUT: Duration = Duration::from_secs(120);

// =============================================================================
// Configuration
// =============================================================================

/// Settings for the compress pipeline.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Transcode worker threads (0 = one per CPU)
    pub workers: usize,

    /// Quality used when a request names none
    pub default_quality: i64,

    /// Upper bound on the transcode phase of one batch
    pub transcode_timeout: Duration,

    /// Decoder resource limits
    pub limits: DecodeLimits,

    /// Maximum stored upload sessions
    pub max_sessions: usize,

    /// Upload session lifetime
    pub session_ttl: Duration,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            workers: 0,
            default_quality: DEFAULT_JPEG_QUALITY as i64,
            transcode_timeout: DEFAULT_TRANSCODE_TIMEOUT,
            limits: DecodeLimits::default(),
            max_sessions: DEFAULT_MAX_SESSIONS,
            session_ttl: DEFAULT_SESSION_TTL,
        }
    }
}

// =============================================================================
// Request / Outcome
// =============================================================================

/// One compress request.
#[derive(Debug, Clone, Default)]
pub struct CompressRequest {
    pub items: Vec<UploadItem>,

    /// Requested quality; falls back to the session's, then the default
    pub quality: Option<i64>,

    /// Session created by an earlier upload, if any
    pub session_id: Option<String>,
}

impl CompressRequest {
    pub fn new(items: Vec<UploadItem>) -> Self {
        Self {
            items,
            ..Default::default()
        }
    }

    pub fn with_quality(mut self, quality: i64) -> Self {
        self.quality = Some(quality);
        self
    }

    pub fn with_session(mut self, session_id: impl Into<String>) -> Self {
        self.session_id = Some(session_id.into());
        self
    }
}

/// A stored archive ready for download.
#[derive(Debug, Clone)]
pub struct CompressOutcome {
    pub handle: ArchiveHandle,

    /// Number of images in the archive
    pub file_count: usize,
}

/// An archive built in memory, with its entry names in order.
#[derive(Debug, Clone)]
pub struct PackagedBatch {
    pub archive: Bytes,
    pub entries: Vec<String>,
}

// =============================================================================
// Packaging
// =============================================================================

/// Transcode every item, name the outputs uniquely and zip them.
///
/// Items are transcoded in parallel on the current rayon pool; output order
/// is input order. When several items fail, the error of the first one in
/// submission order is returned.
pub fn package_batch(
    transcoder: &JpegTranscoder,
    items: &[UploadItem],
    quality: i64,
) -> Result<PackagedBatch, CompressError> {
    let results: Vec<_> = items
        .par_iter()
        .map(|item| transcoder.transcode(item, quality))
        .collect();

    let mut names = NameAllocator::new();
    let mut outputs = Vec::with_capacity(results.len());
    for result in results {
        let TranscodedItem { filename, data } = result?;
        outputs.push(TranscodedItem {
            filename: names.allocate(&filename),
            data,
        });
    }

    let archive = build_archive(&outputs)?;
    let entries = outputs.into_iter().map(|item| item.filename).collect();

    Ok(PackagedBatch { archive, entries })
}

/// Build the worker pool used for transcoding.
pub fn build_worker_pool(workers: usize) -> Result<ThreadPool, CompressError> {
    ThreadPoolBuilder::new()
        .num_threads(workers)
        .thread_name(|i| format!("pixpress-transcode-{}", i))
        .panic_handler(|_| error!("Transcode worker panicked"))
        .build()
        .map_err(|e| CompressError::Worker(e.to_string()))
}

// =============================================================================
// Compress Service
// =============================================================================

/// Runs upload preflight and batch compression.
///
/// # Type Parameters
///
/// * `B` - The blob backend of the artifact store
///
/// # Example
///
/// ```ignore
/// use pixpress::pipeline::{CompressRequest, CompressService, PipelineConfig};
///
/// let service = CompressService::new(store, PipelineConfig::default())?;
///
/// let request = CompressRequest::new(items).with_quality(50);
/// let outcome = service.compress(request).await?;
/// println!("{} files -> {}", outcome.file_count, outcome.handle.download_url());
/// ```
pub struct CompressService<B: BlobStore> {
    transcoder: JpegTranscoder,
    pool: Arc<ThreadPool>,
    store: Arc<ArtifactStore<B>>,
    sessions: SessionRegistry,
    default_quality: i64,
    transcode_timeout: Duration,
}

impl<B: BlobStore> CompressService<B> {
    /// Create a service writing archives into `store`.
    ///
    /// # Errors
    ///
    /// [`CompressError::Worker`] if the worker pool cannot be started.
    pub fn new(store: Arc<ArtifactStore<B>>, config: PipelineConfig) -> Result<Self, CompressError> {
        Ok(Self {
            transcoder: JpegTranscoder::with_limits(config.limits),
            pool: Arc::new(build_worker_pool(config.workers)?),
            store,
            sessions: SessionRegistry::new(config.max_sessions, config.session_ttl),
            default_quality: config.default_quality,
            transcode_timeout: config.transcode_timeout,
        })
    }

    pub fn store(&self) -> &Arc<ArtifactStore<B>> {
        &self.store
    }

    pub fn sessions(&self) -> &SessionRegistry {
        &self.sessions
    }

    pub fn default_quality(&self) -> i64 {
        self.default_quality
    }

    /// Validate an upload and open a session for it.
    pub async fn preflight(
        &self,
        items: &[UploadItem],
        quality: Option<i64>,
    ) -> Result<UploadSession, ValidationError> {
        validate_batch(items)?;

        let quality = quality.unwrap_or(self.default_quality);
        let session = self.sessions.create(items.len(), quality).await;

        info!(
            session_id = %session.id,
            file_count = session.file_count,
            quality,
            "Upload validated"
        );
        Ok(session)
    }

    /// Compress a batch into a stored archive.
    ///
    /// # Errors
    ///
    /// - [`CompressError::Validation`] for an empty batch, a disallowed file
    ///   type, or an unknown or mismatched session
    /// - [`CompressError::Transcode`] if an image cannot be decoded or encoded
    /// - [`CompressError::Timeout`] if transcoding exceeds the bound
    /// - [`CompressError::Archive`] / [`CompressError::Storage`] on packaging
    ///   or write failure
    pub async fn compress(&self, request: CompressRequest) -> Result<CompressOutcome, CompressError> {
        let CompressRequest {
            items,
            quality,
            session_id,
        } = request;

        validate_batch(&items)?;

        let session_quality = match session_id {
            Some(id) => Some(self.sessions.claim(&id, items.len()).await?.quality),
            None => None,
        };
        let quality = quality.or(session_quality).unwrap_or(self.default_quality);
        let file_count = items.len();

        let batch = self.package(items, quality).await?;
        let handle = self.store.persist(batch.archive).await?;

        info!(
            handle = %handle,
            file_count,
            quality,
            "Compressed batch"
        );
        Ok(CompressOutcome { handle, file_count })
    }

    /// Run [`package_batch`] on the worker pool under the timeout.
    async fn package(
        &self,
        items: Vec<UploadItem>,
        quality: i64,
    ) -> Result<PackagedBatch, CompressError> {
        let (tx, rx) = oneshot::channel();
        let transcoder = self.transcoder.clone();

        self.pool.spawn(move || {
            let result = package_batch(&transcoder, &items, quality);
            // Receiver is gone if the request was cancelled or timed out
            let _ = tx.send(result);
        });

        match tokio::time::timeout(self.transcode_timeout, rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(CompressError::Worker(
                "transcode worker exited without a result".to_string(),
            )),
            Err(_) => {
                debug!(timeout = ?self.transcode_timeout, "Transcode timed out");
                Err(CompressError::Timeout {
                    seconds: self.transcode_timeout.as_secs(),
                })
            }
        }
    }
}

/// Run the pipeline without a server or store, for the CLI.
pub fn compress_offline(
    items: &[UploadItem],
    quality: i64,
    config: &PipelineConfig,
) -> Result<PackagedBatch, CompressError> {
    validate_batch(items)?;

    let transcoder = JpegTranscoder::with_limits(config.limits);
    let pool = build_worker_pool(config.workers)?;
    pool.install(|| package_batch(&transcoder, items, quality))
}
