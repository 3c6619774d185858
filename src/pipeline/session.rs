//! Upload sessions.
//!
//! `/upload` validates a batch and records how many files it announced and
//! at which quality. `/compress` may then reference that session; it is
//! consumed once a batch of the announced size claims it. A batch of the
//! wrong size leaves the session in place for a corrected retry. Sessions
//! are bounded in number (LRU eviction) and in age (TTL, checked on access).

use std::num::NonZeroUsize;
use std::time::Duration;

use lru::LruCache;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;
use uuid::Uuid;

use crate::error::ValidationError;

/// Default number of sessions kept before the oldest are evicted.
pub const DEFAULT_MAX_SESSIONS: usize = 10_000;

/// Default session lifetime.
pub const DEFAULT_SESSION_TTL: Duration = Duration::from_secs(600);

/// A validated upload awaiting compression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadSession {
    pub id: Uuid,

    /// Number of files in the validated batch
    pub file_count: usize,

    /// Quality requested at upload time (unclamped)
    pub quality: i64,

    pub created_at: Instant,
}

/// LRU-bounded session map with a time-to-live.
pub struct SessionRegistry {
    sessions: Mutex<LruCache<Uuid, UploadSession>>,
    ttl: Duration,
}

impl SessionRegistry {
    /// Create a registry holding at most `capacity` sessions.
    ///
    /// A capacity of zero is treated as one.
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            sessions: Mutex::new(LruCache::new(capacity)),
            ttl,
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    /// Record a new session.
    pub async fn create(&self, file_count: usize, quality: i64) -> UploadSession {
        let session = UploadSession {
            id: Uuid::new_v4(),
            file_count,
            quality,
            created_at: Instant::now(),
        };

        let mut sessions = self.sessions.lock().await;
        if let Some((evicted, _)) = sessions.push(session.id, session.clone()) {
            if evicted != session.id {
                debug!(session_id = %evicted, "Evicted upload session");
            }
        }
        session
    }

    /// Consume a live session for a batch of `file_count` files.
    ///
    /// An expired session is dropped. A session whose announced file count
    /// differs is left in place.
    ///
    /// # Errors
    ///
    /// - [`ValidationError::UnknownSession`] for malformed, unknown or
    ///   expired ids
    /// - [`ValidationError::SessionMismatch`] if the counts differ
    pub async fn claim(
        &self,
        id: &str,
        file_count: usize,
    ) -> Result<UploadSession, ValidationError> {
        let unknown = || ValidationError::UnknownSession { id: id.to_string() };
        let key = Uuid::parse_str(id.trim()).map_err(|_| unknown())?;

        let mut sessions = self.sessions.lock().await;
        let (created_at, announced) = match sessions.peek(&key) {
            Some(session) => (session.created_at, session.file_count),
            None => return Err(unknown()),
        };

        if created_at.elapsed() >= self.ttl {
            sessions.pop(&key);
            debug!(session_id = %key, "Upload session expired");
            return Err(unknown());
        }
        if announced != file_count {
            return Err(ValidationError::SessionMismatch {
                expected: announced,
                actual: file_count,
            });
        }

        sessions.pop(&key).ok_or_else(unknown)
    }

    /// Number of stored sessions, expired ones included.
    pub async fn len(&self) -> usize {
        self.sessions.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }
}

impl Default for SessionRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_MAX_SESSIONS, DEFAULT_SESSION_TTL)
    }
}
