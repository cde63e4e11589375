//! Shop item service over mutual TLS with live certificate reload.

pub mod config;
pub mod error;
pub mod http;
pub mod lifecycle;
pub mod net;
pub mod observability;
pub mod service;
pub mod store;
pub mod tls;

pub use config::schema::ShopConfig;
pub use error::StartupError;
pub use http::ShopServer;
pub use lifecycle::{Application, Shutdown};
pub use tls::CredentialWatcher;
