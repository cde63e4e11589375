//! rustls certificate source backed by the watcher's credential slot.

use std::sync::Arc;

use arc_swap::ArcSwap;
use rustls::server::{ClientHello, ResolvesServerCert};
use rustls::sign::CertifiedKey;

use crate::tls::credential::Credential;

/// Hands the current credential to every handshake.
///
/// One atomic load per handshake; a concurrent reload is seen either
/// entirely or not at all.
pub struct CredentialResolver {
    current: Arc<ArcSwap<Credential>>,
}

impl CredentialResolver {
    pub(crate) fn new(current: Arc<ArcSwap<Credential>>) -> Self {
        Self { current }
    }

    pub fn current(&self) -> Arc<Credential> {
        self.current.load_full()
    }
}

impl std::fmt::Debug for CredentialResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialResolver")
            .field("chain_len", &self.current.load().cert_chain().len())
            .finish()
    }
}

impl ResolvesServerCert for CredentialResolver {
    fn resolve(&self, _client_hello: ClientHello<'_>) -> Option<Arc<CertifiedKey>> {
        Some(self.current.load().certified_key())
    }
}
