//! TLS setup: the `SSLRequest` prelude plus sync `rustls` handshake.
//!
//! spec.md §6 scopes TLS handshake negotiation *policy* out of this crate
//! (the caller picks `sslmode`); what remains in scope is the wire-level
//! contract — send the 8-byte `SSLRequest`, read the server's one-byte
//! `S`/`N` reply, then hand the socket to `rustls` if accepted.

use std::io::{Read, Write};
use std::net::TcpStream;
use std::sync::Arc;

use rustls::client::danger::{HandshakeSignatureValid, ServerCertVerified, ServerCertVerifier};
use rustls::pki_types::{CertificateDer, ServerName, UnixTime};
use rustls::{ClientConfig, ClientConnection, DigitallySignedStruct, RootCertStore, SignatureScheme, StreamOwned};

use crate::error::{PgError, PgResult};
use crate::driver::stream::PgStream;

/// `SSLRequest`: length (8) + the fixed sentinel code `80877103`.
const SSL_REQUEST: [u8; 8] = [0, 0, 0, 8, 0x04, 0xd2, 0x16, 0x2f];

/// How strictly to verify the server's certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TlsVerify {
    #[default]
    Full,
    /// Accept any certificate chain without verifying the hostname or CA.
    /// Equivalent to libpq's `sslmode=require` (encryption without
    /// authentication); never the default.
    InsecureSkipVerify,
}

/// TLS configuration, including optional mutual-TLS client credentials.
#[derive(Clone, Default)]
pub struct TlsConfig {
    pub verify: TlsVerify,
    pub ca_cert_pem: Option<Vec<u8>>,
    pub client_cert_pem: Option<Vec<u8>>,
    pub client_key_pem: Option<Vec<u8>>,
}

impl TlsConfig {
    pub fn from_files(
        cert_path: impl AsRef<std::path::Path>,
        key_path: impl AsRef<std::path::Path>,
        ca_path: Option<impl AsRef<std::path::Path>>,
    ) -> std::io::Result<Self> {
        Ok(Self {
            verify: TlsVerify::Full,
            client_cert_pem: Some(std::fs::read(cert_path)?),
            client_key_pem: Some(std::fs::read(key_path)?),
            ca_cert_pem: ca_path.map(std::fs::read).transpose()?,
        })
    }

    fn build_client_config(&self) -> PgResult<ClientConfig> {
        let mut roots = RootCertStore::empty();
        if let Some(ca_pem) = &self.ca_cert_pem {
            for cert in rustls_pemfile::certs(&mut ca_pem.as_slice()).filter_map(|r| r.ok()) {
                let _ = roots.add(cert);
            }
        } else {
            let certs = rustls_native_certs::load_native_certs();
            for cert in certs.certs {
                let _ = roots.add(cert);
            }
        }

        let builder = if self.verify == TlsVerify::InsecureSkipVerify {
            ClientConfig::builder()
                .dangerous()
                .with_custom_certificate_verifier(Arc::new(NoVerifier))
        } else {
            ClientConfig::builder().with_root_certificates(roots)
        };

        let config = match (&self.client_cert_pem, &self.client_key_pem) {
            (Some(cert_pem), Some(key_pem)) => {
                let certs = rustls_pemfile::certs(&mut cert_pem.as_slice())
                    .filter_map(|r| r.ok())
                    .collect();
                let key = rustls_pemfile::private_key(&mut key_pem.as_slice())
                    .map_err(|e| PgError::Connection(format!("invalid client key: {e}")))?
                    .ok_or_else(|| PgError::Connection("no private key found in PEM".into()))?;
                builder
                    .with_client_auth_cert(certs, key)
                    .map_err(|e| PgError::Connection(format!("invalid client cert/key: {e}")))?
            }
            _ => builder.with_no_client_auth(),
        };

        Ok(config)
    }
}

/// Accepts any certificate chain. Only reachable via
/// `TlsVerify::InsecureSkipVerify`, never the default.
#[derive(Debug)]
struct NoVerifier;

impl ServerCertVerifier for NoVerifier {
    fn verify_server_cert(
        &self,
        _end_entity: &CertificateDer<'_>,
        _intermediates: &[CertificateDer<'_>],
        _server_name: &ServerName<'_>,
        _ocsp_response: &[u8],
        _now: UnixTime,
    ) -> Result<ServerCertVerified, rustls::Error> {
        Ok(ServerCertVerified::assertion())
    }

    fn verify_tls12_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn verify_tls13_signature(
        &self,
        _message: &[u8],
        _cert: &CertificateDer<'_>,
        _dss: &DigitallySignedStruct,
    ) -> Result<HandshakeSignatureValid, rustls::Error> {
        Ok(HandshakeSignatureValid::assertion())
    }

    fn supported_verify_schemes(&self) -> Vec<SignatureScheme> {
        vec![
            SignatureScheme::RSA_PKCS1_SHA256,
            SignatureScheme::ECDSA_NISTP256_SHA256,
            SignatureScheme::ED25519,
            SignatureScheme::RSA_PSS_SHA256,
        ]
    }
}

/// Send `SSLRequest` over `stream`, read the server's reply, and wrap the
/// socket in a TLS session if accepted. Returns the plain socket unchanged
/// if `config` is `None` (no TLS negotiated).
pub fn negotiate(mut stream: TcpStream, host: &str, config: &TlsConfig) -> PgResult<PgStream> {
    stream.write_all(&SSL_REQUEST)?;
    let mut reply = [0u8; 1];
    stream.read_exact(&mut reply)?;

    if reply[0] != b'S' {
        return Err(PgError::Connection(
            "server does not support TLS (SSLRequest rejected)".into(),
        ));
    }

    let rustls_config = config.build_client_config()?;
    let server_name = ServerName::try_from(host.to_string())
        .map_err(|_| PgError::Connection(format!("invalid hostname for TLS: {host}")))?;

    let conn = ClientConnection::new(Arc::new(rustls_config), server_name)
        .map_err(|e| PgError::Connection(format!("TLS handshake failed: {e}")))?;

    Ok(PgStream::Tls(Box::new(StreamOwned::new(conn, stream))))
}
