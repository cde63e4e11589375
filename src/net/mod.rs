//! Network layer.
//!
//! # Data Flow
//! ```text
//! listener.rs (TCP accept)
//!     → connection.rs (TLS handshake with the live credential)
//!     → connection.rs (HTTP/1.1 or HTTP/2, drained at max age or shutdown)
//!     → http router
//! ```

pub mod connection;
pub mod listener;

pub use connection::{ConnectionEnd, ConnectionId, ConnectionLimits};
pub use listener::Listener;
