//! Mutual TLS server configuration.
//!
//! The server identity comes from the credential watcher and may change at
//! any time. The client trust anchor is loaded once at startup and is not
//! reloaded.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use rustls::server::{ResolvesServerCert, VerifierBuilderError, WebPkiClientVerifier};
use rustls::{RootCertStore, ServerConfig};
use thiserror::Error;

/// Errors while assembling the TLS acceptor configuration.
#[derive(Debug, Error)]
pub enum TlsSetupError {
    #[error("client CA certificate read {path}: {source}")]
    ReadClientCa {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no CA certificates found in {0}")]
    EmptyClientCa(PathBuf),

    #[error("failed to append client CA certificate: {0}")]
    InvalidClientCa(#[source] rustls::Error),

    #[error("client certificate verifier: {0}")]
    Verifier(#[from] VerifierBuilderError),

    #[error("TLS configuration: {0}")]
    Rustls(#[from] rustls::Error),
}

/// Load the CA bundle client certificates are verified against.
pub fn load_client_roots(path: &Path) -> Result<RootCertStore, TlsSetupError> {
    tracing::info!(path = %path.display(), "Loading client CA certificate");

    let read_err = |source| TlsSetupError::ReadClientCa {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;
    if certs.is_empty() {
        return Err(TlsSetupError::EmptyClientCa(path.to_path_buf()));
    }

    let mut roots = RootCertStore::empty();
    for cert in certs {
        roots.add(cert).map_err(TlsSetupError::InvalidClientCa)?;
    }
    Ok(roots)
}

/// Build a server config that requires and verifies client certificates.
///
/// `resolver` is consulted once per handshake for the server identity.
pub fn mtls_server_config(
    resolver: Arc<dyn ResolvesServerCert>,
    client_roots: RootCertStore,
) -> Result<ServerConfig, TlsSetupError> {
    let provider = Arc::new(rustls::crypto::ring::default_provider());

    // no allow_unauthenticated(): a handshake without a client cert fails
    let verifier =
        WebPkiClientVerifier::builder_with_provider(Arc::new(client_roots), Arc::clone(&provider))
            .build()?;

    let mut config = ServerConfig::builder_with_provider(provider)
        .with_safe_default_protocol_versions()?
        .with_client_cert_verifier(verifier)
        .with_cert_resolver(resolver);
    config.alpn_protocols = vec![b"h2".to_vec(), b"http/1.1".to_vec()];

    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn self_signed_pem() -> String {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let params = rcgen::CertificateParams::new(vec!["client".to_string()]).unwrap();
        params.self_signed(&key_pair).unwrap().pem()
    }

    #[test]
    fn test_load_client_roots() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ca.pem");
        fs::write(&path, format!("{}{}", self_signed_pem(), self_signed_pem())).unwrap();

        let roots = load_client_roots(&path).unwrap();
        assert_eq!(roots.len(), 2);
    }

    #[test]
    fn test_load_client_roots_empty_bundle() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("ca.pem");
        fs::write(&path, "garbage").unwrap();

        let err = load_client_roots(&path).unwrap_err();
        assert!(matches!(err, TlsSetupError::EmptyClientCa(_)));
    }

    #[test]
    fn test_load_client_roots_missing_file() {
        let err = load_client_roots(Path::new("/nonexistent/ca.pem")).unwrap_err();
        assert!(err.to_string().contains("client CA certificate read"));
    }

    #[test]
    fn test_empty_root_store_is_rejected() {
        #[derive(Debug)]
        struct NoCert;
        impl ResolvesServerCert for NoCert {
            fn resolve(
                &self,
                _: rustls::server::ClientHello<'_>,
            ) -> Option<Arc<rustls::sign::CertifiedKey>> {
                None
            }
        }

        let err = mtls_server_config(Arc::new(NoCert), RootCertStore::empty()).unwrap_err();
        assert!(matches!(err, TlsSetupError::Verifier(_)));
    }
}
