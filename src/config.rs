//! Configuration management for pixpress.
//!
//! This module provides a configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `PIXPRESS_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Commands
//!
//! - `pixpress serve` (or no subcommand) - run the HTTP server
//! - `pixpress compress --quality N --output out.zip FILE...` - compress
//!   local files without a server
//!
//! # Environment Variables
//!
//! - `PIXPRESS_HOST` - Server bind address (default: 0.0.0.0)
//! - `PIXPRESS_PORT` - Server port (default: 5000)
//! - `PIXPRESS_STORAGE_DIR` - Archive directory (default: temp_uploads)
//! - `PIXPRESS_DOWNLOAD_RETENTION` - Seconds an archive survives its first download (default: 60)
//! - `PIXPRESS_MAX_ARTIFACT_AGE` - Seconds before an undownloaded archive is removed (default: 3600)
//! - `PIXPRESS_SWEEP_INTERVAL` - Seconds between expiry sweeps (default: 60)
//! - `PIXPRESS_MAX_UPLOAD_BYTES` - Request body limit (default: 50 MiB)
//! - `PIXPRESS_DEFAULT_QUALITY` - Quality when a request gives none (default: 80)
//! - `PIXPRESS_WORKERS` - Transcode threads, 0 = one per CPU (default: 0)
//! - `PIXPRESS_CORS_ORIGINS` - Allowed CORS origins, comma-separated

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};

use crate::pipeline::{PipelineConfig, DEFAULT_MAX_SESSIONS};
use crate::server::{RouterConfig, DEFAULT_MAX_UPLOAD_BYTES};
use crate::store::{StoreConfig, DEFAULT_STORAGE_DIR};
use crate::transcode::{
    is_valid_quality, DecodeLimits, DEFAULT_JPEG_QUALITY, DEFAULT_MAX_DECODE_ALLOC,
    DEFAULT_MAX_DIMENSION,
};

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 5000;

/// Default seconds between first download and deletion.
pub const DEFAULT_DOWNLOAD_RETENTION_SECS: u64 = 60;

/// Default maximum archive lifetime in seconds (1 hour).
pub const DEFAULT_MAX_ARTIFACT_AGE_SECS: u64 = 3600;

/// Default expiry sweep period in seconds.
pub const DEFAULT_SWEEP_INTERVAL_SECS: u64 = 60;

/// Default upload session lifetime in seconds.
pub const DEFAULT_SESSION_TTL_SECS: u64 = 600;

/// Default bound on transcoding one batch, in seconds.
pub const DEFAULT_TRANSCODE_TIMEOUT_SECS: u64 = 120;

// =============================================================================
// CLI Arguments
// =============================================================================

/// pixpress - batch image compression service.
///
/// Recompresses uploaded images as JPEG, bundles them into a ZIP archive and
/// serves the archive for a short time.
#[derive(Parser, Debug, Clone)]
#[command(name = "pixpress")]
#[command(author, version, about, long_about = None)]
#[command(args_conflicts_with_subcommands = true)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Command>,

    /// Server options when no subcommand is given
    #[command(flatten)]
    pub serve: ServeConfig,
}

impl Cli {
    /// The command to run; `serve` when none was named.
    pub fn into_command(self) -> Command {
        self.command.unwrap_or(Command::Serve(self.serve))
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Run the HTTP server
    Serve(ServeConfig),

    /// Compress local image files into a ZIP archive
    Compress(CompressConfig),
}

// =============================================================================
// Serve Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct ServeConfig {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "PIXPRESS_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "PIXPRESS_PORT")]
    pub port: u16,

    /// Largest accepted request body in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_UPLOAD_BYTES, env = "PIXPRESS_MAX_UPLOAD_BYTES")]
    pub max_upload_bytes: usize,

    // =========================================================================
    // Storage Configuration
    // =========================================================================
    /// Directory holding compressed archives.
    #[arg(long, default_value = DEFAULT_STORAGE_DIR, env = "PIXPRESS_STORAGE_DIR")]
    pub storage_dir: PathBuf,

    /// Seconds an archive stays available after its first download.
    #[arg(long, default_value_t = DEFAULT_DOWNLOAD_RETENTION_SECS, env = "PIXPRESS_DOWNLOAD_RETENTION")]
    pub download_retention_secs: u64,

    /// Seconds before an archive nobody downloaded is removed.
    #[arg(long, default_value_t = DEFAULT_MAX_ARTIFACT_AGE_SECS, env = "PIXPRESS_MAX_ARTIFACT_AGE")]
    pub max_artifact_age_secs: u64,

    /// Seconds between full expiry sweeps.
    #[arg(long, default_value_t = DEFAULT_SWEEP_INTERVAL_SECS, env = "PIXPRESS_SWEEP_INTERVAL")]
    pub sweep_interval_secs: u64,

    // =========================================================================
    // Pipeline Configuration
    // =========================================================================
    /// Quality used when a request gives none (1-100).
    #[arg(long, default_value_t = DEFAULT_JPEG_QUALITY as i64, env = "PIXPRESS_DEFAULT_QUALITY")]
    pub default_quality: i64,

    /// Transcode worker threads (0 = one per CPU).
    #[arg(long, default_value_t = 0, env = "PIXPRESS_WORKERS")]
    pub workers: usize,

    /// Seconds allowed for transcoding one batch.
    #[arg(long, default_value_t = DEFAULT_TRANSCODE_TIMEOUT_SECS, env = "PIXPRESS_TRANSCODE_TIMEOUT")]
    pub transcode_timeout_secs: u64,

    /// Largest accepted image width or height in pixels.
    #[arg(long, default_value_t = DEFAULT_MAX_DIMENSION, env = "PIXPRESS_MAX_DIMENSION")]
    pub max_dimension: u32,

    /// Most memory one image decode may allocate, in bytes.
    #[arg(long, default_value_t = DEFAULT_MAX_DECODE_ALLOC, env = "PIXPRESS_MAX_DECODE_ALLOC")]
    pub max_decode_alloc: u64,

    // =========================================================================
    // Session Configuration
    // =========================================================================
    /// Seconds an upload session stays valid.
    #[arg(long, default_value_t = DEFAULT_SESSION_TTL_SECS, env = "PIXPRESS_SESSION_TTL")]
    pub session_ttl_secs: u64,

    /// Maximum number of upload sessions kept.
    #[arg(long, default_value_t = DEFAULT_MAX_SESSIONS, env = "PIXPRESS_MAX_SESSIONS")]
    pub max_sessions: usize,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "PIXPRESS_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

impl ServeConfig {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        if self.storage_dir.as_os_str().is_empty() {
            return Err("storage_dir must not be empty".to_string());
        }

        if !is_valid_quality(self.default_quality) {
            return Err("default_quality must be between 1 and 100".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("max_upload_bytes must be greater than 0".to_string());
        }
        if self.download_retention_secs == 0 {
            return Err("download_retention_secs must be greater than 0".to_string());
        }
        if self.max_artifact_age_secs < self.download_retention_secs {
            return Err(
                "max_artifact_age_secs must be at least download_retention_secs".to_string(),
            );
        }
        if self.sweep_interval_secs == 0 {
            return Err("sweep_interval_secs must be greater than 0".to_string());
        }
        if self.transcode_timeout_secs == 0 {
            return Err("transcode_timeout_secs must be greater than 0".to_string());
        }
        if self.max_dimension == 0 {
            return Err("max_dimension must be greater than 0".to_string());
        }
        if self.max_sessions == 0 {
            return Err("max_sessions must be greater than 0".to_string());
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Artifact store settings.
    pub fn store_config(&self) -> StoreConfig {
        StoreConfig::new(&self.storage_dir)
            .with_download_retention(Duration::from_secs(self.download_retention_secs))
            .with_max_artifact_age(Duration::from_secs(self.max_artifact_age_secs))
            .with_sweep_interval(Duration::from_secs(self.sweep_interval_secs))
    }

    /// Compress pipeline settings.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            default_quality: self.default_quality,
            transcode_timeout: Duration::from_secs(self.transcode_timeout_secs),
            limits: DecodeLimits {
                max_dimension: self.max_dimension,
                max_alloc: self.max_decode_alloc,
            },
            max_sessions: self.max_sessions,
            session_ttl: Duration::from_secs(self.session_ttl_secs),
        }
    }

    /// HTTP router settings.
    pub fn router_config(&self) -> RouterConfig {
        let mut router_config = RouterConfig::new()
            .with_max_upload_bytes(self.max_upload_bytes)
            .with_tracing(!self.no_tracing);

        if let Some(ref origins) = self.cors_origins {
            router_config = router_config.with_cors_origins(origins.clone());
        }

        router_config
    }
}

// =============================================================================
// Compress Configuration
// =============================================================================

#[derive(Args, Debug, Clone)]
pub struct CompressConfig {
    /// Image files to compress, in archive order.
    #[arg(required = true)]
    pub files: Vec<PathBuf>,

    /// JPEG quality (values outside 1-100 are clamped).
    #[arg(short, long, default_value_t = DEFAULT_JPEG_QUALITY as i64, allow_negative_numbers = true)]
    pub quality: i64,

    /// Output ZIP path.
    #[arg(short, long, default_value = "compressed_images.zip")]
    pub output: PathBuf,

    /// Transcode worker threads (0 = one per CPU).
    #[arg(long, default_value_t = 0)]
    pub workers: usize,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,
}

impl CompressConfig {
    /// Pipeline settings for an offline run.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            workers: self.workers,
            default_quality: self.quality,
            ..Default::default()
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
