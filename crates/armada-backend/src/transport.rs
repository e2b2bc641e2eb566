//! QUIC client endpoint for backend connections.
//!
//! # Purpose
//! Wraps a quinn client endpoint so the session layer deals only in
//! connections. Each backend pins its own CA certificate; there is no
//! ambient trust store.

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use quinn::crypto::rustls::QuicClientConfig;
use quinn::{Connection, Endpoint};
use rustls::RootCertStore;
use rustls::pki_types::CertificateDer;

#[derive(Debug)]
pub struct BackendTransport {
    endpoint: Endpoint,
}

impl BackendTransport {
    pub fn new() -> Result<Self> {
        let bind: SocketAddr = "0.0.0.0:0".parse().expect("bind addr");
        let endpoint = Endpoint::client(bind).context("bind QUIC client endpoint")?;
        Ok(Self { endpoint })
    }

    /// Dial `addr` (a `host:port` pair), trusting only `ca_pem`.
    pub async fn connect(&self, addr: &str, ca_pem: &str) -> Result<Connection> {
        let (host, _) = addr
            .rsplit_once(':')
            .ok_or_else(|| anyhow!("address {addr:?} is not host:port"))?;
        let socket_addr = tokio::net::lookup_host(addr)
            .await
            .with_context(|| format!("resolve {addr}"))?
            .next()
            .ok_or_else(|| anyhow!("no addresses for {addr}"))?;

        let mut roots = RootCertStore::empty();
        for der in pem_certificates(ca_pem)? {
            roots.add(der).context("add CA certificate")?;
        }
        if roots.is_empty() {
            return Err(anyhow!("no CA certificate for {addr}"));
        }
        let tls = rustls::ClientConfig::builder()
            .with_root_certificates(roots)
            .with_no_client_auth();
        let quic = QuicClientConfig::try_from(Arc::new(tls)).context("build QUIC TLS config")?;
        let config = quinn::ClientConfig::new(Arc::new(quic));

        let connection = self
            .endpoint
            .connect_with(config, socket_addr, host)
            .context("start QUIC connection")?
            .await
            .with_context(|| format!("connect to {addr}"))?;
        Ok(connection)
    }
}

/// Decode every CERTIFICATE block of a PEM bundle.
fn pem_certificates(pem: &str) -> Result<Vec<CertificateDer<'static>>> {
    const BEGIN: &str = "-----BEGIN CERTIFICATE-----";
    const END: &str = "-----END CERTIFICATE-----";
    let mut certs = Vec::new();
    let mut rest = pem;
    while let Some(start) = rest.find(BEGIN) {
        let body_start = start + BEGIN.len();
        let end = rest[body_start..]
            .find(END)
            .ok_or_else(|| anyhow!("unterminated certificate block"))?;
        let body: String = rest[body_start..body_start + end]
            .chars()
            .filter(|c| !c.is_whitespace())
            .collect();
        let der = STANDARD
            .decode(body)
            .context("decode certificate base64")?;
        certs.push(CertificateDer::from(der));
        rest = &rest[body_start + end + END.len()..];
    }
    Ok(certs)
}
