//! Client credentials
//!
//! Loads the certificate + private key pair a provider presents to the
//! gateway during the TLS handshake.

use std::fmt;
use std::fs;
use std::path::Path;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};

use crate::error::{ApnsError, Result};

/// Certificate chain and private key used to authenticate to the gateway
pub struct Identity {
    certs: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl Identity {
    /// Build an identity from already parsed DER data
    pub fn new(certs: Vec<CertificateDer<'static>>, key: PrivateKeyDer<'static>) -> Result<Self> {
        if certs.is_empty() {
            return Err(ApnsError::Certificate("No certificates found".to_string()));
        }
        Ok(Self { certs, key })
    }

    /// Parse PEM data holding every CERTIFICATE block followed by the key
    ///
    /// PKCS#1, PKCS#8 and SEC1 keys are accepted.
    pub fn from_pem(pem: &[u8]) -> Result<Self> {
        let certs = load_certs(pem)?;
        let key = load_key(pem)?;
        Self::new(certs, key)
    }

    /// Load a combined certificate + key PEM file
    pub fn from_pem_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let pem = fs::read(path).map_err(|e| {
            ApnsError::Certificate(format!("Failed to read {}: {}", path.display(), e))
        })?;
        Self::from_pem(&pem)
    }

    /// Load the certificate and the key from separate PEM files
    pub fn from_pem_files(cert_path: impl AsRef<Path>, key_path: impl AsRef<Path>) -> Result<Self> {
        let (cert_path, key_path) = (cert_path.as_ref(), key_path.as_ref());
        let cert_pem = fs::read(cert_path).map_err(|e| {
            ApnsError::Certificate(format!("Failed to read {}: {}", cert_path.display(), e))
        })?;
        let key_pem = fs::read(key_path).map_err(|e| {
            ApnsError::Certificate(format!("Failed to read {}: {}", key_path.display(), e))
        })?;
        Self::new(load_certs(&cert_pem)?, load_key(&key_pem)?)
    }

    pub fn certificate_chain(&self) -> &[CertificateDer<'static>] {
        &self.certs
    }

    pub fn private_key(&self) -> &PrivateKeyDer<'static> {
        &self.key
    }

    /// Owned copies for handing to a rustls config builder
    pub(crate) fn to_parts(&self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.certs.clone(), self.key.clone_key())
    }
}

impl Clone for Identity {
    fn clone(&self) -> Self {
        let (certs, key) = self.to_parts();
        Self { certs, key }
    }
}

impl fmt::Debug for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Identity")
            .field("certificates", &self.certs.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

fn load_certs(pem: &[u8]) -> Result<Vec<CertificateDer<'static>>> {
    let mut reader = std::io::BufReader::new(pem);
    let certs = rustls_pemfile::certs(&mut reader)
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| ApnsError::Certificate(format!("Failed to parse certificate: {}", e)))?;

    if certs.is_empty() {
        return Err(ApnsError::Certificate("No certificates found".to_string()));
    }
    Ok(certs)
}

fn load_key(pem: &[u8]) -> Result<PrivateKeyDer<'static>> {
    let mut reader = std::io::BufReader::new(pem);
    rustls_pemfile::private_key(&mut reader)
        .map_err(|e| ApnsError::Certificate(format!("Failed to parse key: {}", e)))?
        .ok_or_else(|| ApnsError::Certificate("No private key found".to_string()))
}
