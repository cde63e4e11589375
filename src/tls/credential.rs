//! Server identity loaded from a PEM certificate/key pair.

use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::SystemTime;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use rustls::sign::CertifiedKey;
use thiserror::Error;

/// Errors produced while loading a certificate/key pair.
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("failed to read certificate {path}: {source}")]
    ReadCertificate {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to read private key {path}: {source}")]
    ReadKey {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("no certificates found in {0}")]
    NoCertificates(PathBuf),

    #[error("no private key found in {0}")]
    NoPrivateKey(PathBuf),

    #[error("unsupported private key: {0}")]
    UnsupportedKey(#[source] rustls::Error),

    #[error("private key does not match certificate: {0}")]
    KeyMismatch(#[source] rustls::Error),
}

/// An immutable certificate chain and signing key.
///
/// Reloading never mutates a `Credential`; it builds a new one and swaps
/// the reference.
#[derive(Debug, Clone)]
pub struct Credential {
    key: Arc<CertifiedKey>,
    loaded_at: SystemTime,
}

impl Credential {
    /// Load and check a pair from disk.
    pub fn load(cert_path: &Path, key_path: &Path) -> Result<Self, CredentialError> {
        let certs = read_certs(cert_path)?;
        let key = read_key(key_path)?;
        Self::from_parts(certs, key)
    }

    fn from_parts(
        certs: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self, CredentialError> {
        let signing_key =
            rustls::crypto::ring::sign::any_supported_type(&key).map_err(CredentialError::UnsupportedKey)?;
        let certified = CertifiedKey::new(certs, signing_key);

        match certified.keys_match() {
            Ok(()) => {}
            // ring cannot derive a public key for every algorithm; nothing to compare then
            Err(rustls::Error::InconsistentKeys(rustls::InconsistentKeys::Unknown)) => {}
            Err(e) => return Err(CredentialError::KeyMismatch(e)),
        }

        Ok(Self {
            key: Arc::new(certified),
            loaded_at: SystemTime::now(),
        })
    }

    /// The rustls view handed to the handshake.
    pub fn certified_key(&self) -> Arc<CertifiedKey> {
        Arc::clone(&self.key)
    }

    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.key.cert
    }

    /// End-entity certificate.
    pub fn leaf(&self) -> &CertificateDer<'static> {
        // never empty: read_certs rejects files without certificates
        &self.key.cert[0]
    }

    pub fn loaded_at(&self) -> SystemTime {
        self.loaded_at
    }
}

fn read_certs(path: &Path) -> Result<Vec<CertificateDer<'static>>, CredentialError> {
    let read_err = |source| CredentialError::ReadCertificate {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<Result<Vec<_>, _>>()
        .map_err(read_err)?;

    if certs.is_empty() {
        return Err(CredentialError::NoCertificates(path.to_path_buf()));
    }
    Ok(certs)
}

fn read_key(path: &Path) -> Result<PrivateKeyDer<'static>, CredentialError> {
    let read_err = |source| CredentialError::ReadKey {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = BufReader::new(File::open(path).map_err(read_err)?);
    rustls_pemfile::private_key(&mut reader)
        .map_err(read_err)?
        .ok_or_else(|| CredentialError::NoPrivateKey(path.to_path_buf()))
}
