//! Serve command implementation

use super::Services;
use crate::config::Config;
use crate::error::{Error, Result};
use crate::server::{self, router, AppState};
use tokio::net::TcpListener;
use tracing::{info, warn};

/// Run the HTTP API with background ingestion workers until ctrl-c
pub async fn cmd_serve(config: Config) -> Result<()> {
    let services = Services::open(&config).await?;

    if let Err(e) = services.index.ensure_ready().await {
        if e.is_transient() {
            warn!(
                "Vector index '{}' not reachable yet: {}. Rulebook processing will fail until it is.",
                services.index.name(),
                e
            );
        } else {
            return Err(e);
        }
    }

    let bind_addr = config.server.bind_addr.clone();
    let db = services.db.clone();

    // Before any worker starts, so nothing of ours is mid-job
    let interrupted = services.pipeline(&config).fail_interrupted().await?;
    if !interrupted.is_empty() {
        info!(count = interrupted.len(), "Failed rulebooks interrupted by a previous run");
    }

    let (state, queue) = AppState::build(
        config,
        services.db,
        services.index,
        services.embedder,
        services.extractor,
    );

    queue.requeue_pending(&db).await?;

    let listener = TcpListener::bind(&bind_addr)
        .await
        .map_err(|e| Error::Config(format!("Cannot bind {}: {}", bind_addr, e)))?;

    let result = server::serve(listener, router(state)).await;

    info!("Draining ingestion workers");
    queue.shutdown().await;
    result
}
