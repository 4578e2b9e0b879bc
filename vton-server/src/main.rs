use std::sync::Arc;

use anyhow::Result;
use clap::Parser;
use tokio::net::TcpListener;
use tracing::info;
use tracing_subscriber::EnvFilter;
use vton_core::{DeviceMap, ResidencyManager, TryOnService};
use vton_server::{router, AppState, StubPipeline};

#[derive(Parser, Debug)]
#[command(author, version, about = "Virtual try-on inference server")]
struct Args {
    /// Keep pipeline weights on the CPU instead of an accelerator
    #[arg(long)]
    cpu: bool,

    /// Accelerator ordinal to place weights on
    #[arg(long, default_value_t = 0)]
    device_ordinal: usize,

    /// Concurrent generation passes admitted to the pipeline
    #[arg(long, default_value_t = 1)]
    generation_slots: usize,

    /// Largest accepted request body, in megabytes
    #[arg(long, default_value_t = 32)]
    max_upload_mb: usize,

    /// Host address to bind the server to
    #[arg(long, default_value = "127.0.0.1")]
    host: String,

    /// Port to bind the server to
    #[arg(long, default_value_t = 8000)]
    port: u16,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let device = if args.cpu {
        DeviceMap::ForceCpu
    } else {
        DeviceMap::Ordinal(args.device_ordinal)
    };

    // The bundled backend is the deterministic stub; a deployment implements
    // `TryOnPipeline` over its inference stack and builds the same router.
    // Weights are not touched here: the first request, or an explicit
    // /load-models call, pays the transfer.
    let pipeline = Arc::new(StubPipeline::new());
    let residency = Arc::new(ResidencyManager::new(pipeline.clone(), device));
    let service = Arc::new(TryOnService::new(pipeline, residency.clone(), args.generation_slots));

    let app = router(AppState::new(service), upload_limit_bytes(args.max_upload_mb));

    let bind_address = format!("{}:{}", args.host, args.port);
    let listener = TcpListener::bind(&bind_address).await?;
    info!(device = %device, "started server on {}", listener.local_addr()?);
    axum::serve(listener, app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    // Free accelerator memory before exiting.
    residency.ensure_unloaded().await;
    info!("server shutdown complete");
    Ok(())
}

async fn shutdown_signal() {
    tokio::signal::ctrl_c()
        .await
        .expect("failed to install ctrl-c handler");
    info!("shutdown signal received, draining connections");
}

fn upload_limit_bytes(megabytes: usize) -> usize {
    megabytes.saturating_mul(1024 * 1024)
}
