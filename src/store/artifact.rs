//! Artifact store: persisted archives with bounded lifetimes.
//!
//! # Lifecycle
//!
//! ```text
//!   persist ──► Created ──retrieve──► ScheduledForDeletion ──► Deleted
//!                  │                                             ▲
//!                  └──────────── max age elapsed ────────────────┘
//! ```
//!
//! Every artifact has one effective deadline: its creation time plus the
//! maximum age, or the first download plus the download retention window,
//! whichever is earlier. Deadlines live in a single [`ExpiryQueue`] serviced
//! by one background task; a periodic sweep over the index catches anything
//! the queue missed.

use std::collections::HashMap;
use std::sync::Arc;

use bytes::Bytes;
use tokio::sync::{Mutex, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tracing::{debug, info, warn};

use crate::error::StorageError;

use super::blob::BlobStore;
use super::expiry::ExpiryQueue;
use super::handle::ArchiveHandle;
use super::StoreConfig;

// =============================================================================
// Artifact Record
// =============================================================================

/// Lifecycle state of a live artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactState {
    /// Stored, never downloaded
    Created,

    /// Downloaded at least once; deletion is pending
    ScheduledForDeletion,
}

/// Index entry for one stored archive.
#[derive(Debug, Clone)]
pub struct ArtifactRecord {
    pub handle: ArchiveHandle,

    /// Archive size in bytes
    pub size: u64,

    pub created_at: Instant,

    /// Set by the first download
    pub delete_at: Option<Instant>,
}

impl ArtifactRecord {
    /// When this artifact must be gone.
    pub fn deadline(&self, config: &StoreConfig) -> Instant {
        let aged_out = self.created_at + config.max_artifact_age;
        match self.delete_at {
            Some(at) if at < aged_out => at,
            _ => aged_out,
        }
    }

    pub fn state(&self) -> ArtifactState {
        match self.delete_at {
            Some(_) => ArtifactState::ScheduledForDeletion,
            None => ArtifactState::Created,
        }
    }
}

struct StoreState {
    index: HashMap<ArchiveHandle, ArtifactRecord>,
    expiry: ExpiryQueue,
}

// =============================================================================
// Artifact Store
// =============================================================================

/// Stores archives and deletes them on schedule.
///
/// # Type Parameters
///
/// * `B` - The blob backend holding archive bytes
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use pixpress::store::{ArtifactStore, FsBlobStore, StoreConfig};
///
/// let config = StoreConfig::new("temp_uploads");
/// let store = Arc::new(ArtifactStore::new(FsBlobStore::new(&config.dir), config));
/// let _worker = store.clone().spawn_expiry_worker();
///
/// let handle = store.persist(zip_bytes).await?;
/// let bytes = store.retrieve(handle.as_str()).await?;
/// ```
pub struct ArtifactStore<B: BlobStore> {
    blobs: B,
    config: StoreConfig,
    state: Mutex<StoreState>,
    wake: Notify,
}

impl<B: BlobStore> ArtifactStore<B> {
    pub fn new(blobs: B, config: StoreConfig) -> Self {
        Self {
            blobs,
            config,
            state: Mutex::new(StoreState {
                index: HashMap::new(),
                expiry: ExpiryQueue::new(),
            }),
            wake: Notify::new(),
        }
    }

    pub fn config(&self) -> &StoreConfig {
        &self.config
    }

    pub fn blobs(&self) -> &B {
        &self.blobs
    }

    /// Persist an archive and return its handle.
    ///
    /// The handle is only returned once the bytes are fully written.
    ///
    /// # Errors
    ///
    /// [`StorageError::Io`] if the backend write fails.
    pub async fn persist(&self, data: Bytes) -> Result<ArchiveHandle, StorageError> {
        let handle = ArchiveHandle::generate();
        let size = data.len() as u64;

        self.blobs.put(handle.as_str(), data).await?;

        let created_at = Instant::now();
        {
            let mut state = self.state.lock().await;
            state
                .expiry
                .push(handle.clone(), created_at + self.config.max_artifact_age);
            state.index.insert(
                handle.clone(),
                ArtifactRecord {
                    handle: handle.clone(),
                    size,
                    created_at,
                    delete_at: None,
                },
            );
        }
        self.wake.notify_one();

        info!(handle = %handle, size, "Stored archive");
        Ok(handle)
    }

    /// Fetch a stored archive and schedule its deletion.
    ///
    /// Deletion is scheduled `download_retention` after retrieval starts. A
    /// second retrieval within that window succeeds and does not extend it.
    ///
    /// # Errors
    ///
    /// - [`StorageError::NotFound`] if the handle is malformed, unknown,
    ///   already deleted, or past its deadline
    /// - [`StorageError::Io`] if the backend read fails
    pub async fn retrieve(&self, handle: &str) -> Result<Bytes, StorageError> {
        let not_found = || StorageError::NotFound {
            handle: handle.to_string(),
        };
        let handle = ArchiveHandle::parse(handle).ok_or_else(not_found)?;
        let now = Instant::now();

        let expired = {
            let mut state = self.state.lock().await;
            let config = &self.config;

            let record = state.index.get_mut(&handle).ok_or_else(not_found)?;
            if record.deadline(config) <= now {
                state.index.remove(&handle);
                true
            } else {
                let delete_at = now + config.download_retention;
                let scheduled = match record.delete_at {
                    Some(existing) if existing <= delete_at => existing,
                    _ => {
                        record.delete_at = Some(delete_at);
                        delete_at
                    }
                };
                state.expiry.push(handle.clone(), scheduled);
                false
            }
        };

        if expired {
            self.remove_blob(&handle).await;
            return Err(not_found());
        }
        self.wake.notify_one();

        match self.blobs.get(handle.as_str()).await? {
            Some(data) => {
                debug!(handle = %handle, size = data.len(), "Serving archive");
                Ok(data)
            }
            None => {
                warn!(handle = %handle, "Indexed archive missing from storage");
                self.state.lock().await.index.remove(&handle);
                Err(not_found())
            }
        }
    }

    /// Delete an archive now. Failures are logged and absorbed.
    pub async fn delete(&self, handle: &ArchiveHandle) {
        self.state.lock().await.index.remove(handle);
        self.remove_blob(handle).await;
    }

    async fn remove_blob(&self, handle: &ArchiveHandle) {
        match self.blobs.delete(handle.as_str()).await {
            Ok(()) => info!(handle = %handle, "Deleted archive"),
            Err(e) => debug!(handle = %handle, error = %e, "Archive delete ignored"),
        }
    }

    /// Lifecycle state of a live artifact, `None` once deleted.
    pub async fn state_of(&self, handle: &ArchiveHandle) -> Option<ArtifactState> {
        self.state
            .lock()
            .await
            .index
            .get(handle)
            .map(ArtifactRecord::state)
    }

    /// Number of live artifacts.
    pub async fn len(&self) -> usize {
        self.state.lock().await.index.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Earliest pending deadline in the queue.
    pub async fn next_deadline(&self) -> Option<Instant> {
        self.state.lock().await.expiry.next_due()
    }

    /// Delete every artifact whose queued deadline has passed.
    ///
    /// Returns the number of artifacts deleted.
    pub async fn expire_due(&self) -> usize {
        let now = Instant::now();
        let doomed: Vec<ArchiveHandle> = {
            let mut state = self.state.lock().await;
            let due = state.expiry.pop_due(now);
            let mut doomed = Vec::new();
            for handle in due {
                // Stale entries (deadline moved or already deleted) are skipped
                let expired = state
                    .index
                    .get(&handle)
                    .is_some_and(|r| r.deadline(&self.config) <= now);
                if expired {
                    state.index.remove(&handle);
                    doomed.push(handle);
                }
            }
            doomed
        };

        for handle in &doomed {
            self.remove_blob(handle).await;
        }
        doomed.len()
    }

    /// Scan the whole index and delete anything past its deadline.
    ///
    /// Returns the number of artifacts deleted.
    pub async fn sweep(&self) -> usize {
        let now = Instant::now();
        let doomed: Vec<ArchiveHandle> = {
            let mut state = self.state.lock().await;
            let config = &self.config;
            let expired: Vec<ArchiveHandle> = state
                .index
                .values()
                .filter(|r| r.deadline(config) <= now)
                .map(|r| r.handle.clone())
                .collect();
            for handle in &expired {
                state.index.remove(handle);
            }
            expired
        };

        for handle in &doomed {
            self.remove_blob(handle).await;
        }
        if !doomed.is_empty() {
            debug!(count = doomed.len(), "Sweep removed expired archives");
        }
        doomed.len()
    }

    /// Remove archives (and interrupted writes) left behind by an earlier
    /// process. Only names this store could have produced are touched.
    ///
    /// Returns the number of objects deleted.
    pub async fn purge_orphans(&self) -> Result<usize, StorageError> {
        let keys = self.blobs.list().await?;
        let live: Vec<String> = {
            let state = self.state.lock().await;
            state.index.keys().map(|h| h.as_str().to_string()).collect()
        };

        let mut purged = 0;
        for key in keys {
            if live.contains(&key) || !is_own_object(&key) {
                continue;
            }
            match self.blobs.delete(&key).await {
                Ok(()) => purged += 1,
                Err(e) => debug!(key = %key, error = %e, "Orphan delete ignored"),
            }
        }

        if purged > 0 {
            info!(count = purged, "Purged orphaned archives");
        }
        Ok(purged)
    }

    /// Run the expiry loop until the runtime shuts down.
    ///
    /// Sleeps until the earliest queued deadline, wakes early when a new
    /// deadline is queued, and sweeps the index every `sweep_interval`.
    pub async fn run_expiry_worker(self: Arc<Self>) {
        let mut sweep = tokio::time::interval(self.config.sweep_interval);
        sweep.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            let next = self.next_deadline().await;
            let sleep = async {
                match next {
                    Some(due) => tokio::time::sleep_until(due).await,
                    None => std::future::pending::<()>().await,
                }
            };

            tokio::select! {
                _ = sleep => {
                    self.expire_due().await;
                }
                _ = self.wake.notified() => {}
                _ = sweep.tick() => {
                    self.sweep().await;
                }
            }
        }
    }

    /// Spawn [`run_expiry_worker`](Self::run_expiry_worker) on the current runtime.
    pub fn spawn_expiry_worker(self: Arc<Self>) -> JoinHandle<()>
    where
        B: 'static,
    {
        tokio::spawn(self.run_expiry_worker())
    }
}

/// Whether a storage key looks like an archive or a temp file of one.
fn is_own_object(key: &str) -> bool {
    if ArchiveHandle::parse(key).is_some() {
        return true;
    }
    key.strip_prefix('.')
        .and_then(|rest| rest.strip_suffix(".part"))
        .and_then(|rest| rest.rsplit_once('.'))
        .is_some_and(|(name, _)| ArchiveHandle::parse(name).is_some())
}
