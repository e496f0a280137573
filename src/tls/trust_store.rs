//! CA bundle loading.
//!
//! A bundle may hold several concatenated certificates. PEM sections that are
//! not certificates are ignored. Certificates that webpki cannot use as trust
//! anchors are skipped with a warning. A bundle that leaves the store empty is
//! a startup failure.

use std::fs;
use std::sync::Arc;

use rustls::RootCertStore;
use rustls::pki_types::{CertificateDer, CertificateRevocationListDer};
use tracing::{debug, warn};

use crate::{Error, Result};

/// Immutable set of trusted client-certificate issuers, plus optional CRLs.
#[derive(Debug, Clone)]
pub struct TrustStore {
    roots: Arc<RootCertStore>,
    crls: Vec<CertificateRevocationListDer<'static>>,
    skipped: usize,
}

impl TrustStore {
    /// Load a PEM CA bundle from `path`.
    ///
    /// # Errors
    ///
    /// Returns `Error::TrustStore` if the file cannot be read, is not valid
    /// PEM, or yields zero usable trust anchors.
    pub fn load(path: &str) -> Result<Self> {
        let pem = fs::read(path)
            .map_err(|e| Error::TrustStore(format!("Cannot read CA bundle '{path}': {e}")))?;
        Self::from_pem(&pem, path)
    }

    /// Build a trust store from PEM bytes; `source` only labels errors and logs.
    ///
    /// # Errors
    ///
    /// Same as [`TrustStore::load`], minus the file access.
    pub fn from_pem(pem: &[u8], source: &str) -> Result<Self> {
        let mut reader = pem;
        let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut reader)
            .collect::<std::result::Result<_, _>>()
            .map_err(|e| Error::TrustStore(format!("Malformed PEM in '{source}': {e}")))?;

        let mut roots = RootCertStore::empty();
        let (added, skipped) = roots.add_parsable_certificates(certs);

        if skipped > 0 {
            warn!(
                source = %source,
                skipped,
                added,
                "Skipped CA certificates that are not usable as trust anchors"
            );
        }

        if added == 0 {
            return Err(Error::TrustStore(format!(
                "No usable CA certificates in '{source}'; refusing to start a gate that admits no client"
            )));
        }

        debug!(source = %source, anchors = added, "Trust store loaded");

        Ok(Self {
            roots: Arc::new(roots),
            crls: Vec::new(),
            skipped,
        })
    }

    /// Attach revocation lists from a PEM file.
    ///
    /// # Errors
    ///
    /// Returns `Error::TrustStore` if the file cannot be read, cannot be
    /// parsed, or contains no CRL.
    pub fn with_crl_file(mut self, path: &str) -> Result<Self> {
        let pem = fs::read(path)
            .map_err(|e| Error::TrustStore(format!("Cannot read CRL '{path}': {e}")))?;
        let crls: Vec<CertificateRevocationListDer<'static>> =
            rustls_pemfile::crls(&mut pem.as_slice())
                .collect::<std::result::Result<_, _>>()
                .map_err(|e| Error::TrustStore(format!("Failed to parse CRL from '{path}': {e}")))?;

        if crls.is_empty() {
            return Err(Error::TrustStore(format!("No CRL found in '{path}'")));
        }

        debug!(path = %path, crls = crls.len(), "Revocation lists loaded");
        self.crls.extend(crls);
        Ok(self)
    }

    /// Number of trust anchors in the store. Never zero.
    #[must_use]
    pub fn len(&self) -> usize {
        self.roots.len()
    }

    /// Always `false`; an empty store cannot be constructed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.roots.is_empty()
    }

    /// Number of certificates in the bundle that were skipped.
    #[must_use]
    pub fn skipped(&self) -> usize {
        self.skipped
    }

    /// Shared root store handed to the client verifier.
    #[must_use]
    pub fn roots(&self) -> Arc<RootCertStore> {
        Arc::clone(&self.roots)
    }

    /// Revocation lists handed to the client verifier.
    #[must_use]
    pub fn crls(&self) -> &[CertificateRevocationListDer<'static>] {
        &self.crls
    }
}
