//! Gateway server

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::signal;
use tracing::{info, warn};

use super::router::{AppState, create_router};
use crate::store::ConfigStore;
use crate::{Error, Result};

/// A2A gateway server
pub struct Gateway {
    /// Configuration/authorization store
    store: Arc<ConfigStore>,
}

impl Gateway {
    /// Create a new gateway over an opened store.
    #[must_use]
    pub fn new(store: Arc<ConfigStore>) -> Self {
        Self { store }
    }

    /// Run the gateway until a shutdown signal arrives.
    ///
    /// Starts the store's file watcher on entry and joins it on exit so no
    /// reload can land after shutdown.
    pub async fn run(self) -> Result<()> {
        let snapshot = self.store.current();
        let server = &snapshot.config().server;

        let addr: SocketAddr = server.address.parse().map_err(|e| {
            Error::ConfigParse(format!("invalid listen address '{}': {e}", server.address))
        })?;

        // Hot-reload is best-effort: a watcher failure leaves the startup
        // snapshot in force rather than aborting.
        if let Err(e) = Arc::clone(&self.store).start_watching(server.reload_min_interval) {
            warn!(error = %e, "Config watcher unavailable, hot-reload disabled");
        }

        let state = Arc::new(AppState {
            store: Arc::clone(&self.store),
        });
        let app = create_router(state);

        let listener = TcpListener::bind(addr).await?;

        info!("============================================================");
        info!("A2A GATEWAY v{}", env!("CARGO_PKG_VERSION"));
        info!("============================================================");
        info!(address = %server.address, "Listening");
        info!(
            policy = %snapshot.config().server.authorization.as_str(),
            backends = snapshot.config().backends.len(),
            users = snapshot.config().users.len(),
            "Authorization loaded"
        );
        for slug in snapshot.config().backends.keys() {
            info!("  POST /a2a/{slug}");
        }
        if server.ssl.enabled {
            info!(
                mode = %server.ssl.mode,
                "TLS termination delegated to the external provider"
            );
        }
        info!("============================================================");

        axum::serve(listener, app)
            .with_graceful_shutdown(shutdown_signal())
            .await
            .map_err(|e| Error::Internal(e.to_string()))?;

        info!("Shutting down");
        self.store.stop_watching().await;

        Ok(())
    }
}

/// Shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
