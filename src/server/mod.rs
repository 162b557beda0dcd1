//! HTTP surface
//!
//! Thin axum handlers over the ingestion pipeline, retrieval engine and
//! metadata store. Uploads return once the rulebook is persisted and queued.

mod error;
pub mod handlers;
mod router;
mod state;

pub use error::ApiError;
pub use router::router;
pub use state::AppState;

use crate::error::Result;
use tokio::net::TcpListener;
use tracing::info;

/// Serve `app` on `listener` until ctrl-c
pub async fn serve(listener: TcpListener, app: axum::Router) -> Result<()> {
    let addr = listener.local_addr()?;
    info!("Listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("Could not listen for ctrl-c: {}", e);
        std::future::pending::<()>().await;
    }
    info!("Shutdown requested");
}
