//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Startup (startup.rs):
//!     Config → Certificate watcher → Client CA → TLS config → Server
//!
//! Shutdown (shutdown.rs):
//!     Signal received → Stop accepting → Drain (grace period) → Stop watcher → Exit
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - Fail fast: any startup error is fatal
//! - Listeners start last (traffic only when a credential is loaded)
//! - Shutdown has a grace period, then connections are closed

pub mod shutdown;
pub mod signals;
pub mod startup;

pub use shutdown::{Shutdown, ShutdownSignal};
pub use startup::Application;
