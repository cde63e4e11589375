//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (env expansion, parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → ShopConfig (validated, immutable)
//!     → handed to startup
//! ```
//!
//! The certificate files named in the config are hot reloaded by
//! `tls::watcher`; the config file itself is read once.

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, parse_config, ConfigError};
pub use schema::{LogFormat, ObservabilityConfig, ServerConfig, ShopConfig, TimeoutConfig};
