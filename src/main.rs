//! pixpress - batch image compression service.
//!
//! This binary starts the HTTP server or runs one offline compression.

use std::path::Path;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use pixpress::{
    compress_offline,
    config::{Cli, Command, CompressConfig, ServeConfig},
    create_router, ArtifactStore, CompressService, FsBlobStore, UploadItem,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    match cli.into_command() {
        Command::Serve(config) => run_serve(config).await,
        Command::Compress(config) => run_compress(config).await,
    }
}

// =============================================================================
// Serve Command
// =============================================================================

async fn run_serve(config: ServeConfig) -> ExitCode {
    init_logging(config.verbose);

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    print_banner();

    let store_config = config.store_config();
    info!("Configuration:");
    info!("  Storage: {}", store_config.dir.display());
    info!(
        "  Retention: {}s after download, {}s max age, sweep every {}s",
        config.download_retention_secs, config.max_artifact_age_secs, config.sweep_interval_secs
    );
    info!(
        "  Uploads: {}MB max body, default quality {}",
        config.max_upload_bytes / (1024 * 1024),
        config.default_quality
    );
    if config.workers == 0 {
        info!("  Workers: one per CPU");
    } else {
        info!("  Workers: {}", config.workers);
    }

    let blobs = FsBlobStore::new(&store_config.dir);
    let store = Arc::new(ArtifactStore::new(blobs, store_config));

    match store.purge_orphans().await {
        Ok(0) => {}
        Ok(count) => info!("  Removed {} archive(s) left by a previous run", count),
        Err(e) => warn!("  Could not scan storage directory: {}", e),
    }

    let _expiry_worker = store.clone().spawn_expiry_worker();

    let service = match CompressService::new(store, config.pipeline_config()) {
        Ok(service) => Arc::new(service),
        Err(e) => {
            error!("Failed to start transcode workers: {}", e);
            return ExitCode::FAILURE;
        }
    };

    let router = create_router(service, config.router_config());

    let addr = config.bind_address();

    info!("");
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!(
        "    curl -F files=@photo.png -F quality=60 http://{}/compress",
        addr
    );
    info!("────────────────────────────────────────────────────────────────");
    info!("");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router)
        .with_graceful_shutdown(shutdown_signal())
        .await
    {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    info!("Server stopped");
    ExitCode::SUCCESS
}

/// Resolve when the process receives Ctrl-C.
async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        warn!("Failed to listen for shutdown signal: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown signal received");
}

/// Print the startup banner.
fn print_banner() {
    let version = env!("CARGO_PKG_VERSION");
    info!("");
    info!("██████╗ ██╗██╗  ██╗██████╗ ██████╗ ███████╗███████╗███████╗");
    info!("██╔══██╗██║╚██╗██╔╝██╔══██╗██╔══██╗██╔════╝██╔════╝██╔════╝");
    info!("██████╔╝██║ ╚███╔╝ ██████╔╝██████╔╝█████╗  ███████╗███████╗");
    info!("██╔═══╝ ██║ ██╔██╗ ██╔═══╝ ██╔══██╗██╔══╝  ╚════██║╚════██║");
    info!("██║     ██║██╔╝ ██╗██║     ██║  ██║███████╗███████║███████║");
    info!("╚═╝     ╚═╝╚═╝  ╚═╝╚═╝     ╚═╝  ╚═╝╚══════╝╚══════╝╚══════╝");
    info!("");
    info!("                        v{}", version);
}

/// Initialize the tracing/logging subsystem.
fn init_logging(verbose: bool) {
    let env_filter = if verbose {
        "pixpress=debug,tower_http=debug"
    } else {
        "pixpress=info,tower_http=info"
    };

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| env_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();
}

// =============================================================================
// Compress Command
// =============================================================================

async fn run_compress(config: CompressConfig) -> ExitCode {
    init_logging(config.verbose);

    let mut items = Vec::with_capacity(config.files.len());
    for path in &config.files {
        match tokio::fs::read(path).await {
            Ok(bytes) => items.push(UploadItem::new(display_name(path), bytes)),
            Err(e) => {
                error!("Failed to read {}: {}", path.display(), e);
                return ExitCode::FAILURE;
            }
        }
    }

    let pipeline = config.pipeline_config();
    let quality = config.quality;
    let batch =
        match tokio::task::spawn_blocking(move || compress_offline(&items, quality, &pipeline))
            .await
        {
            Ok(Ok(batch)) => batch,
            Ok(Err(e)) => {
                error!("Compression failed: {}", e);
                return ExitCode::FAILURE;
            }
            Err(e) => {
                error!("Compression worker failed: {}", e);
                return ExitCode::FAILURE;
            }
        };

    if let Err(e) = tokio::fs::write(&config.output, &batch.archive).await {
        error!("Failed to write {}: {}", config.output.display(), e);
        return ExitCode::FAILURE;
    }

    for entry in &batch.entries {
        info!("  {}", entry);
    }
    info!(
        "Wrote {} ({} file(s), {} bytes)",
        config.output.display(),
        batch.entries.len(),
        batch.archive.len()
    );

    ExitCode::SUCCESS
}

/// The name a local file would have had as an upload.
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default()
}
