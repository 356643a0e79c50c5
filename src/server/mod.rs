pub mod router;
pub mod service;
pub mod shutdown;

pub use router::build_router;
pub use service::AuthorizationService;
pub use shutdown::ShutdownCoordinator;

use crate::config::ServerConfig;
use anyhow::{Context, Result};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

/// Serve the bouncer until a termination signal drains it.
pub async fn serve(config: &ServerConfig, service: Arc<AuthorizationService>) -> Result<()> {
    let coordinator = Arc::new(ShutdownCoordinator::new(config.shutdown_timeout_secs));

    let app = build_router(service, &config.base_path).layer(
        axum::middleware::from_fn_with_state(coordinator.clone(), shutdown::track_requests),
    );

    let addr = format!("{}:{}", config.host, config.port);
    let listener = TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    info!(address = %addr, base_path = %config.base_path, "Bouncer listening");

    let signals = tokio::spawn(shutdown::setup_signal_handler(coordinator.clone()));
    let mut shutdown_rx = coordinator.subscribe();
    let server = async move {
        axum::serve(listener, app)
            .with_graceful_shutdown(async move {
                let _ = shutdown_rx.recv().await;
            })
            .await
    };

    tokio::select! {
        result = server => result.context("HTTP server failed")?,
        drained = signals => match drained {
            Ok(Ok(())) => info!("Shutdown drain finished"),
            Ok(Err(e)) => error!("Signal handling failed: {}", e),
            Err(e) => error!("Signal task failed: {}", e),
        },
    }

    info!("Bouncer stopped");
    Ok(())
}
