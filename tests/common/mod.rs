//! Shared utilities for the integration tests.

#![allow(dead_code)]

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// A freshly generated self-signed identity.
pub struct TestPair {
    pub cert_pem: String,
    pub key_pem: String,
    pub der: Vec<u8>,
}

impl TestPair {
    pub fn generate(common_name: &str) -> Self {
        let key_pair = rcgen::KeyPair::generate().unwrap();
        let mut params =
            rcgen::CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        params
            .distinguished_name
            .push(rcgen::DnType::CommonName, common_name);
        let cert = params.self_signed(&key_pair).unwrap();

        Self {
            cert_pem: cert.pem(),
            key_pem: key_pair.serialize_pem(),
            der: cert.der().to_vec(),
        }
    }

    /// Write certificate then key, the order a renewal tool would.
    pub fn write_to(&self, cert_path: &Path, key_path: &Path) {
        fs::write(cert_path, &self.cert_pem).unwrap();
        fs::write(key_path, &self.key_pem).unwrap();
    }

    /// Certificate followed by key, as reqwest expects for an identity.
    pub fn identity_pem(&self) -> Vec<u8> {
        format!("{}\n{}", self.cert_pem, self.key_pem).into_bytes()
    }
}

pub fn pair_paths(dir: &Path) -> (PathBuf, PathBuf) {
    (dir.join("server.crt"), dir.join("server.key"))
}

/// Poll `check` until it holds or `timeout` elapses.
pub async fn eventually<F>(timeout: Duration, mut check: F) -> bool
where
    F: FnMut() -> bool,
{
    let deadline = tokio::time::Instant::now() + timeout;
    loop {
        if check() {
            return true;
        }
        if tokio::time::Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(25)).await;
    }
}

pub const RELOAD_TIMEOUT: Duration = Duration::from_secs(5);
