//! Per-connection lifecycle.
//!
//! # Responsibilities
//! - Bound the TLS handshake
//! - Serve HTTP/1.1 and HTTP/2 on the established stream
//! - Drain the connection once it reaches its maximum age, so the client
//!   reconnects and the next handshake picks up the current certificate
//! - Drain on server shutdown

use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::TcpStream;
use tokio_rustls::TlsAcceptor;
use tracing::Instrument;

use crate::lifecycle::ShutdownSignal;
use crate::observability::metrics;

static CONNECTION_ID_COUNTER: AtomicU64 = AtomicU64::new(1);

/// Unique identifier for a connection, used in log spans.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ConnectionId(u64);

impl ConnectionId {
    pub fn new() -> Self {
        Self(CONNECTION_ID_COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for ConnectionId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for ConnectionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "conn-{}", self.0)
    }
}

/// Time bounds applied to every connection.
#[derive(Debug, Clone, Copy)]
pub struct ConnectionLimits {
    pub handshake: Duration,
    pub max_age: Duration,
}

/// How a served connection ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionEnd {
    /// The peer closed it, or it failed.
    Closed,
    /// Drained after reaching its maximum age.
    AgedOut,
    /// Drained because the server is shutting down.
    Shutdown,
}

/// Handshake, then serve until the connection ends.
pub async fn serve_tls(
    tcp: TcpStream,
    peer: SocketAddr,
    acceptor: TlsAcceptor,
    router: Router,
    limits: ConnectionLimits,
    shutdown: ShutdownSignal,
) {
    let id = ConnectionId::new();
    let span = tracing::debug_span!("connection", id = %id, peer = %peer);

    async move {
        let stream = match tokio::time::timeout(limits.handshake, acceptor.accept(tcp)).await {
            Ok(Ok(stream)) => stream,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, "TLS handshake failed");
                return;
            }
            Err(_) => {
                tracing::debug!("TLS handshake timed out");
                return;
            }
        };

        let end = serve_http(stream, router, limits.max_age, shutdown).await;
        tracing::trace!(end = ?end, "Connection closed");
    }
    .instrument(span)
    .await
}

/// Serve HTTP on an established stream.
///
/// Once `max_age` elapses the connection is shut down gracefully: in-flight
/// requests complete, HTTP/2 peers get a GOAWAY, idle HTTP/1.1 connections
/// close immediately.
pub async fn serve_http<I>(
    io: I,
    router: Router,
    max_age: Duration,
    mut shutdown: ShutdownSignal,
) -> ConnectionEnd
where
    I: AsyncRead + AsyncWrite + Unpin + Send + 'static,
{
    let mut builder = auto::Builder::new(TokioExecutor::new());
    builder.http1().timer(TokioTimer::new());
    builder.http2().timer(TokioTimer::new());
    let conn = builder.serve_connection(TokioIo::new(io), TowerToHyperService::new(router));
    tokio::pin!(conn);

    let age = tokio::time::sleep(max_age);
    tokio::pin!(age);

    let mut end = ConnectionEnd::Closed;
    loop {
        tokio::select! {
            served = conn.as_mut() => {
                if let Err(e) = served {
                    tracing::debug!(error = %e, "Connection error");
                }
                return end;
            }
            _ = &mut age, if end == ConnectionEnd::Closed => {
                tracing::debug!(max_age_secs = max_age.as_secs_f64(), "Maximum connection age reached, draining");
                metrics::record_connection_aged_out();
                conn.as_mut().graceful_shutdown();
                end = ConnectionEnd::AgedOut;
            }
            _ = shutdown.recv(), if end == ConnectionEnd::Closed => {
                conn.as_mut().graceful_shutdown();
                end = ConnectionEnd::Shutdown;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lifecycle::Shutdown;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use axum::routing::get;

    fn router() -> Router {
        Router::new().route("/ping", get(|| async { "pong" }))
    }

    /// Connect an HTTP/1.1 client to `serve_http` over an in-memory pipe.
    async fn connect(
        max_age: Duration,
        shutdown: &Shutdown,
    ) -> (
        hyper::client::conn::http1::SendRequest<Body>,
        tokio::task::JoinHandle<()>,
        tokio::task::JoinHandle<ConnectionEnd>,
    ) {
        let (client_io, server_io) = tokio::io::duplex(16 * 1024);
        let server = tokio::spawn(serve_http(server_io, router(), max_age, shutdown.subscribe()));

        let (sender, conn) = hyper::client::conn::http1::handshake(TokioIo::new(client_io))
            .await
            .unwrap();
        let client = tokio::spawn(async move {
            let _ = conn.await;
        });
        (sender, client, server)
    }

    async fn ping(sender: &mut hyper::client::conn::http1::SendRequest<Body>) -> StatusCode {
        sender.ready().await.unwrap();
        let request = Request::get("/ping").header("host", "localhost").body(Body::empty()).unwrap();
        sender.send_request(request).await.unwrap().status()
    }

    #[test]
    fn test_connection_ids_are_unique() {
        let a = ConnectionId::new();
        let b = ConnectionId::new();
        assert_ne!(a, b);
        assert!(a.to_string().starts_with("conn-"));
    }

    #[tokio::test]
    async fn test_connection_closed_after_max_age() {
        let shutdown = Shutdown::new();
        let (mut sender, client, server) = connect(Duration::from_millis(200), &shutdown).await;

        assert_eq!(ping(&mut sender).await, StatusCode::OK);

        let end = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("aged connection should be closed")
            .unwrap();
        assert_eq!(end, ConnectionEnd::AgedOut);

        tokio::time::timeout(Duration::from_secs(2), client)
            .await
            .expect("client should observe the close")
            .unwrap();
    }

    #[tokio::test]
    async fn test_connection_kept_open_before_max_age() {
        let shutdown = Shutdown::new();
        let (mut sender, _client, server) = connect(Duration::from_secs(60), &shutdown).await;

        assert_eq!(ping(&mut sender).await, StatusCode::OK);
        tokio::time::sleep(Duration::from_millis(200)).await;
        assert_eq!(ping(&mut sender).await, StatusCode::OK);
        assert!(!server.is_finished());

        shutdown.trigger();
        let end = tokio::time::timeout(Duration::from_secs(2), server)
            .await
            .expect("shutdown should drain the connection")
            .unwrap();
        assert_eq!(end, ConnectionEnd::Shutdown);
    }
}
