use thiserror::Error;

/// Errors caused by the shape of a client request (HTTP 400)
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    /// The multipart body has no `files` field at all
    #[error("No files uploaded")]
    MissingFiles,

    /// The file list is empty, or the first entry has an empty name
    #[error("No files selected")]
    EmptyBatch,

    /// A file name does not carry an allowed image extension
    #[error("Invalid file type: {filename}")]
    InvalidFileType { filename: String },

    /// The quality field is not an integer
    #[error("Invalid quality: {value}")]
    InvalidQuality { value: String },

    /// The multipart body could not be read
    #[error("Malformed upload: {message}")]
    Multipart { message: String, status: u16 },

    /// The referenced upload session does not exist or has expired
    #[error("Unknown upload session: {id}")]
    UnknownSession { id: String },

    /// The batch does not match what was announced at upload time
    #[error("Upload session expected {expected} files, got {actual}")]
    SessionMismatch { expected: usize, actual: usize },
}

/// Errors while turning one uploaded image into a JPEG
#[derive(Debug, Clone, Error)]
pub enum TranscodeError {
    /// Bytes are not a parseable image, or exceed the decode limits
    #[error("Failed to decode {filename}: {message}")]
    Decode { filename: String, message: String },

    /// The JPEG encoder rejected the image
    #[error("Failed to encode {filename}: {message}")]
    Encode { filename: String, message: String },
}

/// Errors while assembling the ZIP archive
#[derive(Debug, Clone, Error)]
pub enum ArchiveError {
    /// Two entries share a name
    #[error("Duplicate archive entry: {name}")]
    DuplicateEntry { name: String },

    /// Archive exceeds classic ZIP limits (65535 entries, 4 GiB offsets)
    #[error("Archive too large: {reason}")]
    TooLarge { reason: String },

    /// Compression stream failure
    #[error("Archive I/O error: {0}")]
    Io(String),
}

impl From<std::io::Error> for ArchiveError {
    fn from(err: std::io::Error) -> Self {
        ArchiveError::Io(err.to_string())
    }
}

/// Errors from the artifact store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// No live artifact for this handle
    #[error("Artifact not found: {handle}")]
    NotFound { handle: String },

    /// Backing storage failed (disk full, permissions, ...)
    #[error("Storage error: {message}")]
    Io { message: String },
}

impl From<std::io::Error> for StorageError {
    fn from(err: std::io::Error) -> Self {
        StorageError::Io {
            message: err.to_string(),
        }
    }
}

/// Everything that can go wrong in one compress request
#[derive(Debug, Clone, Error)]
pub enum CompressError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Transcode(#[from] TranscodeError),

    #[error(transparent)]
    Archive(#[from] ArchiveError),

    #[error(transparent)]
    Storage(#[from] StorageError),

    /// Transcoding the batch took longer than the configured bound
    #[error("Transcoding timed out after {seconds}s")]
    Timeout { seconds: u64 },

    /// The blocking worker panicked or was cancelled
    #[error("Worker failure: {0}")]
    Worker(String),
}
