//! HTTP protocol handling subsystem.
//!
//! # Data Flow
//! ```text
//! TLS connection (client certificate already verified)
//!     → server.rs (Axum setup, request ID, tracing, limits)
//!     → routes.rs (method path → service call, metrics)
//!     → service::ShopService
//!     → response.rs (RpcError → status + JSON body)
//! ```

pub mod response;
pub mod routes;
pub mod server;

pub use response::RpcStatus;
pub use server::ShopServer;

/// Header carrying the per-request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";
