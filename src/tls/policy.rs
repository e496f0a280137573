//! rustls server configuration for the gate.
//!
//! The policy is fixed: a client certificate is mandatory and must chain to
//! the [`TrustStore`], and TLS 1.3 is the only protocol version offered. A
//! ClientHello that only proposes older versions fails the handshake.

use std::sync::Arc;

use rustls::ServerConfig;
use rustls::crypto::{CryptoProvider, aws_lc_rs};
use rustls::server::WebPkiClientVerifier;
use rustls::server::danger::ClientCertVerifier;
use tracing::debug;

use crate::config::TlsConfig;
use crate::tls::{ServerIdentity, TrustStore};
use crate::{Error, Result};

/// ALPN identifiers advertised by the gate, preferred first.
pub const ALPN_PROTOCOLS: [&[u8]; 2] = [b"h2", b"http/1.1"];

/// Immutable TLS policy shared by every accepted connection.
#[derive(Debug, Clone)]
pub struct TlsPolicy {
    config: Arc<ServerConfig>,
    summary: PolicySummary,
}

/// What a [`TlsPolicy`] was assembled from, for startup reports.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PolicySummary {
    /// Trust anchors in the CA bundle
    pub anchors: usize,
    /// CA bundle entries skipped as unusable
    pub skipped_anchors: usize,
    /// Revocation lists applied to client certificates
    pub crls: usize,
    /// Certificates in the server chain, leaf included
    pub server_chain_len: usize,
}

impl TlsPolicy {
    /// Assemble the policy from a trust store and the server identity.
    ///
    /// # Errors
    ///
    /// Returns `Error::Tls` if rustls rejects the verifier or the
    /// certificate/key pair (e.g. the key does not match the leaf).
    pub fn new(trust: &TrustStore, identity: ServerIdentity) -> Result<Self> {
        let provider = Arc::new(aws_lc_rs::default_provider());
        let verifier = build_client_verifier(trust, Arc::clone(&provider))?;
        let (cert_chain, key) = identity.into_parts();
        let summary = PolicySummary {
            anchors: trust.len(),
            skipped_anchors: trust.skipped(),
            crls: trust.crls().len(),
            server_chain_len: cert_chain.len(),
        };

        let mut tls_cfg = ServerConfig::builder_with_provider(provider)
            .with_protocol_versions(&[&rustls::version::TLS13])
            .map_err(|e| Error::Tls(format!("Unsupported protocol versions: {e}")))?
            .with_client_cert_verifier(verifier)
            .with_single_cert(cert_chain, key)
            .map_err(|e| Error::Tls(format!("TLS config error (cert/key mismatch?): {e}")))?;

        tls_cfg.alpn_protocols = ALPN_PROTOCOLS.iter().map(|p| p.to_vec()).collect();

        debug!(
            anchors = trust.len(),
            crls = trust.crls().len(),
            "mTLS policy built"
        );

        Ok(Self {
            config: Arc::new(tls_cfg),
            summary,
        })
    }

    /// Load every file named in `config` and assemble the policy.
    ///
    /// # Errors
    ///
    /// Propagates trust store, identity and rustls errors.
    pub fn from_config(config: &TlsConfig) -> Result<Self> {
        let mut trust = TrustStore::load(&config.ca_cert)?;
        if let Some(ref crl_path) = config.crl_path {
            trust = trust.with_crl_file(crl_path)?;
        }
        let identity = ServerIdentity::load(&config.server_cert, &config.server_key)?;
        Self::new(&trust, identity)
    }

    /// Counts describing the loaded material.
    #[must_use]
    pub fn summary(&self) -> PolicySummary {
        self.summary
    }

    /// The rustls configuration, ready for a `TlsAcceptor`.
    #[must_use]
    pub fn server_config(&self) -> Arc<ServerConfig> {
        Arc::clone(&self.config)
    }
}

/// Verifier that demands a client certificate chaining to `trust`.
fn build_client_verifier(
    trust: &TrustStore,
    provider: Arc<CryptoProvider>,
) -> Result<Arc<dyn ClientCertVerifier>> {
    let mut builder = WebPkiClientVerifier::builder_with_provider(trust.roots(), provider);

    if !trust.crls().is_empty() {
        builder = builder.with_crls(trust.crls().iter().cloned());
    }

    builder
        .build()
        .map_err(|e| Error::Tls(format!("Failed to build client verifier: {e}")))
}
