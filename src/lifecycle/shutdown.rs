//! Signal handling for graceful shutdown

use tracing::{debug, warn};

/// Handles Ctrl-C for the replay tool
pub struct ShutdownSignal;

impl ShutdownSignal {
    /// Create a new shutdown signal handler
    pub fn new() -> Self {
        Self
    }

    /// Wait for a shutdown signal
    ///
    /// If the handler cannot be registered this never resolves, leaving EOF
    /// as the only way out.
    pub async fn wait(&self) {
        match tokio::signal::ctrl_c().await {
            Ok(()) => debug!("received Ctrl-C"),
            Err(e) => {
                warn!(?e, "failed to register Ctrl-C handler");
                std::future::pending::<()>().await;
            }
        }
    }
}

impl Default for ShutdownSignal {
    fn default() -> Self {
        Self::new()
    }
}
