//! The TLS transport behind the APNS connection.
//!
//! Framing and retry logic are tested against a scripted in-memory
//! stream, so the socket side lives behind a small trait: `connect`
//! yields a writable stream, and everything above it only ever writes
//! frames.

use std::fs::File;
use std::io::BufReader;
use std::sync::Arc;

use tokio::io::AsyncWrite;
use tokio::net::TcpStream;
use tokio_rustls::rustls::pki_types::{CertificateDer, PrivateKeyDer, ServerName};
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;
use tracing::debug;

use pushbridge_common::BoxFuture;
use pushbridge_config::ApnsConfig;

use crate::error::ApnsError;
use crate::{APNS_PORT, HOST_PRODUCTION, HOST_SANDBOX};

/// A connected gateway stream. Notifications are write-only; the binary
/// protocol sends nothing back on success.
pub trait ApnsStream: AsyncWrite + Unpin + Send {}

impl<T: AsyncWrite + Unpin + Send> ApnsStream for T {}

/// Dials the gateway. The production implementation opens a mutually
/// authenticated TLS session; tests substitute scripted streams.
pub trait ApnsTransport: Send + Sync {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn ApnsStream>, ApnsError>>;
}

/// TLS transport to the Apple gateway, authenticated with the
/// provisioned client certificate.
pub struct TlsTransport {
    host: &'static str,
    connector: TlsConnector,
}

impl TlsTransport {
    pub fn from_config(config: &ApnsConfig) -> Result<Self, ApnsError> {
        let certs = load_certs(&config.certificate_path)?;
        let key = load_key(&config.key_path)?;

        let mut roots = RootCertStore::empty();
        roots.extend(webpki_roots::TLS_SERVER_ROOTS.iter().cloned());

        let tls = ClientConfig::builder()
            .with_root_certificates(roots)
            .with_client_auth_cert(certs, key)
            .map_err(|e| ApnsError::TlsConfig(e.to_string()))?;

        Ok(Self {
            host: if config.sandbox {
                HOST_SANDBOX
            } else {
                HOST_PRODUCTION
            },
            connector: TlsConnector::from(Arc::new(tls)),
        })
    }
}

impl ApnsTransport for TlsTransport {
    fn connect(&self) -> BoxFuture<'_, Result<Box<dyn ApnsStream>, ApnsError>> {
        Box::pin(async move {
            debug!(host = self.host, "opening APNS gateway connection");
            let tcp = TcpStream::connect((self.host, APNS_PORT)).await?;
            let name = ServerName::try_from(self.host)
                .map_err(|e| ApnsError::TlsConfig(e.to_string()))?;
            let stream = self.connector.connect(name, tcp).await?;
            Ok(Box::new(stream) as Box<dyn ApnsStream>)
        })
    }
}

fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>, ApnsError> {
    let mut reader = BufReader::new(File::open(path)?);
    let certs = rustls_pemfile::certs(&mut reader).collect::<Result<Vec<_>, _>>()?;
    if certs.is_empty() {
        return Err(ApnsError::TlsConfig(format!(
            "no certificates found in {path}"
        )));
    }
    Ok(certs)
}

fn load_key(path: &str) -> Result<PrivateKeyDer<'static>, ApnsError> {
    let mut reader = BufReader::new(File::open(path)?);
    rustls_pemfile::private_key(&mut reader)?
        .ok_or_else(|| ApnsError::TlsConfig(format!("no private key found in {path}")))
}
