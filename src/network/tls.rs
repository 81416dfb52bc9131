//! TLS configuration
//!
//! The gateway authenticates the provider by its client certificate. The
//! provider does not have to authenticate the gateway, so server
//! verification is opt-in.

use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, DigitallySignedStruct, RootCertStore, ServerConfig, SignatureScheme};

use super::Identity;
use crate::error::{ApnsError, Result};

/// Create a client configuration presenting `identity`
pub fn client_config(identity: &Identity, verify_peer: bool) -> Result<Arc<ClientConfig>> {
    let builder = ClientConfig::builder();

    let builder = if verify_peer {
        let mut root_store = RootCertStore::empty();
        root_store.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(root_store)
    } else {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyServerCert))
    };

    let (certs, key) = identity.to_parts();
    let config = builder
        .with_client_auth_cert(certs, key)
        .map_err(|e| ApnsError::Certificate(format!("Failed to set client certificate: {}", e)))?;

    Ok(Arc::new(config))
}

/// Create a server configuration for the mock gateway
pub fn server_config(identity: &Identity) -> Result<Arc<ServerConfig>> {
    let (certs, key) = identity.to_parts();
    let config = ServerConfig::builder()
        .with_no_client_auth()
        .with_single_cert(certs, key)
        .map_err(|e| ApnsError::Certificate(format!("Failed to create server config: {}", e)))?;

    Ok(Arc::new(config))
}

/// Accepts whatever certificate the gateway presents
#[derive(Debug)]
struct AcceptAnyServerCert;

impl ServerCertVerifier for AcceptAnyServerCert {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> std::result::Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> std::result::Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        rustls::crypto::ring::default_provider()
            .signature_verification_algorithms
            .supported_schemes()
    }
}
