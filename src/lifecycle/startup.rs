//! Startup orchestration.
//!
//! Order: bind address → certificate watcher (initial load is fatal) →
//! client CA → rustls config → store and service → listener. Any error
//! aborts before traffic is accepted.

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use crate::config::ShopConfig;
use crate::error::StartupError;
use crate::http::ShopServer;
use crate::lifecycle::ShutdownSignal;
use crate::service::ShopService;
use crate::store::InMemoryStore;
use crate::tls::{load_client_roots, mtls_server_config, CredentialWatcher};

/// A fully wired server that has not started accepting yet.
pub struct Application {
    watcher: Arc<CredentialWatcher>,
    server: ShopServer,
}

impl Application {
    /// Wire every subsystem from a validated config.
    ///
    /// Must be called from within a Tokio runtime; the certificate watcher
    /// task starts here.
    pub fn build(config: &ShopConfig) -> Result<Self, StartupError> {
        let addr: SocketAddr =
            config
                .server
                .bind_address
                .parse()
                .map_err(|source| StartupError::BindAddress {
                    address: config.server.bind_address.clone(),
                    source,
                })?;

        // a later failure drops the watcher, which ends its task
        let watcher = Arc::new(CredentialWatcher::start(
            &config.server.cert_path,
            &config.server.key_path,
        )?);

        let client_roots = load_client_roots(Path::new(&config.server.client_ca_path))?;
        let tls = mtls_server_config(watcher.resolver(), client_roots)?;
        tracing::info!("Mutual TLS configured, client certificates required");

        let service = ShopService::new(Arc::new(InMemoryStore::new()));
        let server = ShopServer::bind(config, addr, service, Arc::new(tls))
            .map_err(|source| StartupError::Bind { address: addr, source })?;

        Ok(Self { watcher, server })
    }

    pub fn watcher(&self) -> Arc<CredentialWatcher> {
        Arc::clone(&self.watcher)
    }

    /// Address the server accepts on; resolves an ephemeral port.
    pub fn local_addr(&self) -> SocketAddr {
        self.server.local_addr()
    }

    /// Serve until shutdown, then stop the certificate watcher.
    pub async fn run(self, shutdown: ShutdownSignal) -> Result<(), StartupError> {
        let served = self.server.run(shutdown).await;
        self.watcher.stop().await;
        served?;
        Ok(())
    }
}
