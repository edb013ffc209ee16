//! TLS client configuration for IRC connections.
//!
//! Verified connections trust the Mozilla root store shipped in
//! `webpki-roots`. Insecure connections accept any certificate, which is
//! how self-signed and expired certificates on private networks are
//! tolerated.

// ============================================================================
// Imports
// ============================================================================

use std::sync::Arc;

use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::client::danger::{
    HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier,
};
use tokio_rustls::rustls::crypto::{self, CryptoProvider};
use tokio_rustls::rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use tokio_rustls::rustls::{
    self, ClientConfig, DigitallySignedStruct, RootCertStore, SignatureScheme,
};
use tracing::debug;

use crate::error::{Error, Result};

// ============================================================================
// Config
// ============================================================================

/// Builds a rustls client configuration.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the crypto provider rejects the protocol versions.
pub fn client_config(insecure: bool) -> Result<ClientConfig> {
    let provider = Arc::new(crypto::aws_lc_rs::default_provider());
    let builder = ClientConfig::builder_with_provider(Arc::clone(&provider))
        .with_safe_default_protocol_versions()
        .map_err(|e| Error::tls(e.to_string()))?;

    let config = if insecure {
        builder
            .dangerous()
            .with_custom_certificate_verifier(Arc::new(AcceptAnyCertificate { provider }))
            .with_no_client_auth()
    } else {
        let roots = RootCertStore::from_iter(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());
        builder.with_root_certificates(roots).with_no_client_auth()
    };

    Ok(config)
}

/// Performs the TLS handshake over an established TCP stream.
///
/// # Errors
///
/// Returns [`Error::Tls`] if the host is not a valid server name or the
/// handshake fails.
pub async fn connect(host: &str, tcp: TcpStream, insecure: bool) -> Result<TlsStream<TcpStream>> {
    let connector = TlsConnector::from(Arc::new(client_config(insecure)?));
    let server_name =
        ServerName::try_from(host.to_owned()).map_err(|e| Error::tls(e.to_string()))?;

    let stream = connector
        .connect(server_name, tcp)
        .await
        .map_err(|e| Error::tls(format!("handshake with {host} failed: {e}")))?;

    debug!(host, insecure, "TLS handshake complete");
    Ok(stream)
}

// ============================================================================
// AcceptAnyCertificate
// ============================================================================

/// Certificate verifier that accepts every server certificate.
#[derive(Debug)]
struct AcceptAnyCertificate {
    provider: Arc<CryptoProvider>,
}

impl ServerCertVerifier for AcceptAnyCertificate {
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
        self.provider
            .signature_verification_algorithms
            .supported_schemes()
    }
}

// ============================================================================
// Tests
// ============================================================================
