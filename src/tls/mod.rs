//! TLS subsystem: live server identity and mutual authentication.
//!
//! # Data Flow
//! ```text
//! cert.pem / key.pem on disk
//!     → credential.rs (PEM parse, key/cert consistency check)
//!     → watcher.rs (initial load, notify subscription, reload task)
//!     → ArcSwap<Credential> (single writer, lock-free readers)
//!     → resolver.rs (one load per handshake)
//!     → server_config.rs (rustls ServerConfig + client CA verifier)
//!     → net::connection (tokio-rustls acceptor per connection)
//! ```
//!
//! # Failure Handling
//! - Initial load or subscription failure aborts startup
//! - Reload failures are logged; the last good credential stays active
//! - A removed file is recreated empty and re-watched

pub mod credential;
pub mod resolver;
pub mod server_config;
pub mod watcher;

pub use credential::{Credential, CredentialError};
pub use resolver::CredentialResolver;
pub use server_config::{load_client_roots, mtls_server_config, TlsSetupError};
pub use watcher::{CredentialWatcher, WatchError};
