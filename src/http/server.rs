//! HTTPS server setup and configuration.
//!
//! # Responsibilities
//! - Create the Axum Router with the RPC routes
//! - Wire up middleware (request ID, tracing, timeout, body limit)
//! - Accept connections and terminate mutual TLS with the live credential
//! - Drain in-flight requests on shutdown

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::{
    body::Body,
    extract::DefaultBodyLimit,
    http::{Request, StatusCode},
    Router,
};
use tokio::task::{JoinError, JoinSet};
use tokio_rustls::TlsAcceptor;
use tower_http::{
    limit::RequestBodyLimitLayer,
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::config::ShopConfig;
use crate::http::routes;
use crate::http::X_REQUEST_ID;
use crate::lifecycle::ShutdownSignal;
use crate::net::{connection, ConnectionLimits, Listener};
use crate::service::ShopService;

const ACCEPT_ERROR_BACKOFF: Duration = Duration::from_millis(50);

/// RPC server bound to a single address.
pub struct ShopServer {
    router: Router,
    listener: Listener,
    acceptor: TlsAcceptor,
    limits: ConnectionLimits,
    shutdown_grace: Duration,
}

impl ShopServer {
    /// Bind the listener. `tls` must already carry the client verifier and
    /// the certificate resolver.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn bind(
        config: &ShopConfig,
        addr: SocketAddr,
        service: ShopService,
        tls: Arc<rustls::ServerConfig>,
    ) -> std::io::Result<Self> {
        let timeouts = &config.timeouts;
        Ok(Self {
            router: Self::build_router(config, service),
            listener: Listener::bind(addr)?,
            acceptor: TlsAcceptor::from(tls),
            limits: ConnectionLimits {
                handshake: Duration::from_secs(timeouts.tls_handshake_secs),
                max_age: Duration::from_secs(timeouts.max_connection_age_secs),
            },
            shutdown_grace: Duration::from_secs(timeouts.shutdown_grace_secs),
        })
    }

    /// Build the Axum router with all middleware layers.
    fn build_router(config: &ShopConfig, service: ShopService) -> Router {
        routes::rpc_router(service)
            .layer(DefaultBodyLimit::disable())
            .layer(RequestBodyLimitLayer::new(config.server.max_body_bytes))
            .layer(TimeoutLayer::with_status_code(
                StatusCode::REQUEST_TIMEOUT,
                Duration::from_secs(config.timeouts.request_secs),
            ))
            .layer(PropagateRequestIdLayer::x_request_id())
            .layer(TraceLayer::new_for_http().make_span_with(|request: &Request<Body>| {
                let request_id = request
                    .headers()
                    .get(X_REQUEST_ID)
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or("unknown");
                tracing::info_span!("rpc", path = %request.uri().path(), request_id = %request_id)
            }))
            .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
    }

    /// The bound address; resolves an ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.listener.local_addr()
    }

    /// Serve until a shutdown signal arrives, then drain.
    ///
    /// Open connections get `shutdown_grace` to finish; whatever is left
    /// after that is closed.
    pub async fn run(self, mut shutdown: ShutdownSignal) -> std::io::Result<()> {
        tracing::info!(
            address = %self.listener.local_addr(),
            max_connection_age_secs = self.limits.max_age.as_secs(),
            "Starting RPC server"
        );

        let mut connections = JoinSet::new();
        loop {
            let accepted = tokio::select! {
                _ = shutdown.recv() => break,
                Some(joined) = connections.join_next(), if !connections.is_empty() => {
                    log_connection_task(joined);
                    continue;
                }
                accepted = self.listener.accept() => accepted,
            };

            match accepted {
                Ok((tcp, peer)) => {
                    connections.spawn(connection::serve_tls(
                        tcp,
                        peer,
                        self.acceptor.clone(),
                        self.router.clone(),
                        self.limits,
                        shutdown.clone(),
                    ));
                }
                Err(e) => {
                    tracing::warn!(error = %e, "Failed to accept connection");
                    tokio::time::sleep(ACCEPT_ERROR_BACKOFF).await;
                }
            }
        }

        let grace = self.shutdown_grace;
        drop(self.listener);
        tracing::info!(
            grace_secs = grace.as_secs(),
            open_connections = connections.len(),
            "Shutting down RPC server"
        );

        let drained = tokio::time::timeout(grace, async {
            while let Some(joined) = connections.join_next().await {
                log_connection_task(joined);
            }
        })
        .await;
        if drained.is_err() {
            tracing::warn!(
                remaining = connections.len(),
                "Grace period elapsed, closing remaining connections"
            );
            connections.shutdown().await;
        }

        tracing::info!("RPC server stopped");
        Ok(())
    }
}

fn log_connection_task(joined: Result<(), JoinError>) {
    if let Err(e) = joined {
        if e.is_panic() {
            tracing::error!(error = %e, "Connection task panicked");
        }
    }
}
