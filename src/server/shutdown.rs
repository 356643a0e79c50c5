use anyhow::{Context, Result};
use axum::{extract::Request, extract::State, middleware::Next, response::Response};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::broadcast;
use tracing::{info, warn};

/// Shutdown coordinator for graceful server shutdown
pub struct ShutdownCoordinator {
    /// Broadcast channel to notify all tasks of shutdown
    shutdown_tx: broadcast::Sender<()>,
    /// Flag indicating if shutdown has been initiated
    is_shutting_down: AtomicBool,
    /// Number of requests being evaluated
    in_flight: AtomicUsize,
    /// Graceful shutdown timeout
    timeout: Duration,
}

impl ShutdownCoordinator {
    pub fn new(timeout_secs: u64) -> Self {
        let (shutdown_tx, _) = broadcast::channel(16);

        Self {
            shutdown_tx,
            is_shutting_down: AtomicBool::new(false),
            in_flight: AtomicUsize::new(0),
            timeout: Duration::from_secs(timeout_secs),
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<()> {
        self.shutdown_tx.subscribe()
    }

    pub fn is_shutting_down(&self) -> bool {
        self.is_shutting_down.load(Ordering::SeqCst)
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Count a request until the returned guard is dropped.
    pub fn track(self: &Arc<Self>) -> InFlightGuard {
        self.in_flight.fetch_add(1, Ordering::SeqCst);
        InFlightGuard {
            coordinator: Arc::clone(self),
        }
    }

    /// Notify subscribers, then wait for in-flight requests up to the timeout.
    pub async fn shutdown(&self) {
        info!("Initiating graceful shutdown...");

        self.is_shutting_down.store(true, Ordering::SeqCst);
        let _ = self.shutdown_tx.send(());

        self.wait_for_requests().await
    }

    async fn wait_for_requests(&self) {
        let start = Instant::now();

        loop {
            let active = self.in_flight();

            if active == 0 {
                info!("All requests completed");
                return;
            }

            if start.elapsed() > self.timeout {
                warn!(
                    "Graceful shutdown timeout ({} seconds) reached with {} request(s) in flight, forcing shutdown",
                    self.timeout.as_secs(),
                    active
                );
                return;
            }

            info!(
                "Waiting for {} request(s) to complete... ({:.1}s remaining)",
                active,
                self.timeout.saturating_sub(start.elapsed()).as_secs_f64()
            );

            tokio::time::sleep(Duration::from_millis(250)).await;
        }
    }
}

pub struct InFlightGuard {
    coordinator: Arc<ShutdownCoordinator>,
}

impl Drop for InFlightGuard {
    fn drop(&mut self) {
        self.coordinator.in_flight.fetch_sub(1, Ordering::SeqCst);
    }
}

/// Middleware counting in-flight requests for the drain phase.
pub async fn track_requests(
    State(coordinator): State<Arc<ShutdownCoordinator>>,
    request: Request,
    next: Next,
) -> Response {
    let _guard = coordinator.track();
    next.run(request).await
}

/// Wait for SIGTERM or SIGINT, then run the shutdown sequence.
pub async fn setup_signal_handler(coordinator: Arc<ShutdownCoordinator>) -> Result<()> {
    use tokio::signal::unix::{signal, SignalKind};

    let mut sigterm =
        signal(SignalKind::terminate()).context("Failed to setup SIGTERM handler")?;
    let mut sigint = signal(SignalKind::interrupt()).context("Failed to setup SIGINT handler")?;

    tokio::select! {
        _ = sigterm.recv() => {
            info!("Received SIGTERM signal");
        }
        _ = sigint.recv() => {
            info!("Received SIGINT signal (Ctrl+C)");
        }
    }

    coordinator.shutdown().await;
    Ok(())
}
