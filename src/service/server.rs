use std::net::SocketAddr;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tracing::{debug, error, info, instrument, warn};

use crate::config::NetworkConfig;
use crate::core::codec::{default_codec, Codec};
use crate::error::Result;
use crate::handler::{Registry, RouterHandler};
use crate::transport::TcpConnection;
use crate::utils::metrics::{global_metrics, Metrics};

/// TCP server running one router loop per accepted connection.
pub struct Server {
    config: NetworkConfig,
    registry: Arc<Registry>,
    codec: Arc<dyn Codec>,
    metrics: Arc<Metrics>,
}

impl Server {
    pub fn new(config: NetworkConfig, registry: Arc<Registry>) -> Self {
        Self {
            config,
            registry,
            codec: default_codec(),
            metrics: global_metrics(),
        }
    }

    pub fn with_codec(mut self, codec: Arc<dyn Codec>) -> Self {
        self.codec = codec;
        self
    }

    pub fn with_metrics(mut self, metrics: Arc<Metrics>) -> Self {
        self.metrics = metrics;
        self
    }

    pub fn config(&self) -> &NetworkConfig {
        &self.config
    }

    /// Validate the configuration and bind the listen address.
    pub async fn bind(&self) -> Result<TcpListener> {
        self.config.validate_strict()?;
        let listener = TcpListener::bind(&self.config.server.address).await?;
        info!(address = %listener.local_addr()?, "Listening");
        Ok(listener)
    }

    /// Bind and serve until CTRL+C.
    pub async fn run(self) -> Result<()> {
        let listener = self.bind().await?;

        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>(1);
        tokio::spawn(async move {
            if let Ok(()) = tokio::signal::ctrl_c().await {
                info!("Received CTRL+C signal, shutting down");
                let _ = shutdown_tx.send(()).await;
            }
        });

        self.serve(listener, shutdown_rx).await
    }

    /// Accept connections on `listener` until a shutdown signal arrives or
    /// the sender is dropped.
    #[instrument(skip_all, fields(address = ?listener.local_addr().ok()))]
    pub async fn serve(
        self,
        listener: TcpListener,
        mut shutdown_rx: mpsc::Receiver<()>,
    ) -> Result<()> {
        self.config.validate_strict()?;
        let active_connections = Arc::new(AtomicUsize::new(0));

        loop {
            tokio::select! {
                _ = shutdown_rx.recv() => {
                    info!("Shutting down server. Waiting for connections to close...");
                    self.drain(&active_connections).await;
                    self.metrics.log_metrics();
                    return Ok(());
                }

                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => self.accept(stream, peer, &active_connections),
                        Err(e) => error!(error = %e, "Error accepting connection"),
                    }
                }
            }
        }
    }

    fn accept(&self, stream: TcpStream, peer: SocketAddr, active: &Arc<AtomicUsize>) {
        if active.load(Ordering::Acquire) >= self.config.server.max_connections {
            self.metrics.connection_rejected();
            warn!(peer = %peer, limit = self.config.server.max_connections, "Connection limit reached, refusing");
            return;
        }

        let conn = match TcpConnection::new(stream) {
            Ok(conn) => conn.with_read_timeout(self.config.server.read_timeout()),
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to set up connection");
                return;
            }
        };

        let router = match RouterHandler::builder()
            .conn(Arc::new(conn))
            .codec(Arc::clone(&self.codec))
            .registry(Arc::clone(&self.registry))
            .max_read_len(self.config.router.max_read_len)
            .metrics(Arc::clone(&self.metrics))
            .try_build()
        {
            Ok(router) => router,
            Err(e) => {
                error!(peer = %peer, error = %e, "Failed to build router");
                return;
            }
        };

        active.fetch_add(1, Ordering::AcqRel);
        self.metrics.connection_established();
        debug!(peer = %peer, "Accepted connection");

        let active = Arc::clone(active);
        let metrics = Arc::clone(&self.metrics);
        tokio::spawn(async move {
            match router.run().await {
                Ok(()) => debug!(peer = %peer, "Connection finished"),
                Err(e) => warn!(peer = %peer, error = %e, "Connection ended with error"),
            }
            active.fetch_sub(1, Ordering::AcqRel);
            metrics.connection_closed();
        });
    }

    async fn drain(&self, active: &AtomicUsize) {
        let timeout = tokio::time::sleep(self.config.server.shutdown_timeout());
        tokio::pin!(timeout);

        loop {
            let connections = active.load(Ordering::Acquire);
            if connections == 0 {
                info!("All connections closed, shutting down");
                return;
            }

            tokio::select! {
                _ = &mut timeout => {
                    warn!(connections, "Shutdown timeout reached, forcing exit");
                    return;
                }
                _ = tokio::time::sleep(Duration::from_millis(50)) => {
                    debug!(connections, "Waiting for connections to close");
                }
            }
        }
    }
}

/// Bind `config.server.address` and serve `registry` until CTRL+C.
pub async fn start_server(config: NetworkConfig, registry: Arc<Registry>) -> Result<()> {
    Server::new(config, registry).run().await
}
