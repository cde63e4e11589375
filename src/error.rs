//! Errors that abort startup.

use thiserror::Error;

use crate::config::ConfigError;
use crate::observability::logging::LoggingError;
use crate::tls::{TlsSetupError, WatchError};

#[derive(Debug, Error)]
pub enum StartupError {
    #[error("configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("logging: {0}")]
    Logging(#[from] LoggingError),

    #[error("metrics: {0}")]
    Metrics(#[from] metrics_exporter_prometheus::BuildError),

    #[error("invalid bind address {address:?}: {source}")]
    BindAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("invalid metrics address {address:?}: {source}")]
    MetricsAddress {
        address: String,
        #[source]
        source: std::net::AddrParseError,
    },

    #[error("can't bind {address}: {source}")]
    Bind {
        address: std::net::SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("certificate watcher: {0}")]
    Watch(#[from] WatchError),

    #[error("TLS setup: {0}")]
    Tls(#[from] TlsSetupError),

    #[error("server: {0}")]
    Io(#[from] std::io::Error),
}
