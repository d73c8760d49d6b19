//! Server startup, binding and graceful shutdown

use std::future::{Future, IntoFuture};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use pricer_forecast::ForecastEngine;
use tokio::net::TcpListener;
use tokio::sync::oneshot;

use crate::config::{ConfigError, ServerConfig};
use crate::routes;

/// Server instance that can be started
pub struct Server {
    /// Server configuration
    config: Arc<ServerConfig>,
    /// The built router
    router: Router,
}

impl Server {
    /// Create a new server over `engine`
    pub fn new(config: ServerConfig, engine: ForecastEngine) -> Self {
        let config = Arc::new(config);
        let router = routes::build_router(config.clone(), engine);

        Self { config, router }
    }

    /// Get the socket address the server will bind to
    pub fn socket_addr(&self) -> Result<SocketAddr, ConfigError> {
        let addr = self.config.socket_addr();
        addr.parse()
            .map_err(|_| ConfigError::InvalidAddress(addr))
    }

    /// Get the configuration
    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    /// Bind the configured address and serve until `shutdown` resolves
    pub async fn run<F>(self, shutdown: F) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = self
            .socket_addr()
            .map_err(|e| std::io::Error::new(std::io::ErrorKind::InvalidInput, e))?;
        let listener = TcpListener::bind(addr).await?;
        self.run_with_listener(listener, shutdown).await
    }

    /// Serve on an already bound listener until `shutdown` resolves
    ///
    /// In-flight requests get `shutdown_timeout_secs` to finish once the
    /// signal fires; the server then returns regardless.
    pub async fn run_with_listener<F>(
        self,
        listener: TcpListener,
        shutdown: F,
    ) -> Result<(), std::io::Error>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let addr = listener.local_addr()?;
        tracing::info!(%addr, "Server listening");

        let grace = Duration::from_secs(self.config.shutdown_timeout_secs);
        let (signalled_tx, signalled_rx) = oneshot::channel::<()>();
        let serve = axum::serve(listener, self.router).with_graceful_shutdown(async move {
            shutdown.await;
            tracing::info!("Shutdown signal received, draining connections");
            signalled_tx.send(()).ok();
        })
        .into_future();

        let drain_deadline = async move {
            if signalled_rx.await.is_ok() {
                tokio::time::sleep(grace).await;
            } else {
                std::future::pending::<()>().await;
            }
        };

        tokio::select! {
            result = serve => result,
            _ = drain_deadline => {
                tracing::warn!(grace_secs = grace.as_secs(), "Graceful shutdown timed out");
                Ok(())
            }
        }
    }
}

/// Resolves on Ctrl-C, or SIGTERM on Unix
pub async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
