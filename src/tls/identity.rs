//! The gate's own certificate chain and private key.

use std::fmt;
use std::fs;

use rustls::pki_types::{CertificateDer, PrivateKeyDer};
use tracing::debug;

use crate::{Error, Result};

/// Server certificate chain (leaf first) and its private key.
///
/// Only ever handed to rustls; `Debug` never prints the key.
pub struct ServerIdentity {
    cert_chain: Vec<CertificateDer<'static>>,
    key: PrivateKeyDer<'static>,
}

impl ServerIdentity {
    /// Load the chain and key from PEM files.
    ///
    /// # Errors
    ///
    /// Returns `Error::Identity` if either file cannot be read, the chain is
    /// empty, or the key file holds no private key.
    pub fn load(cert_path: &str, key_path: &str) -> Result<Self> {
        let cert_chain = load_certs(cert_path)?;
        let key = load_private_key(key_path)?;

        debug!(
            server_cert = %cert_path,
            chain_len = cert_chain.len(),
            "Server identity loaded"
        );

        Ok(Self { cert_chain, key })
    }

    /// Construct from already-decoded DER values.
    ///
    /// # Errors
    ///
    /// Returns `Error::Identity` if the chain is empty.
    pub fn from_der(
        cert_chain: Vec<CertificateDer<'static>>,
        key: PrivateKeyDer<'static>,
    ) -> Result<Self> {
        if cert_chain.is_empty() {
            return Err(Error::Identity(
                "Server certificate chain is empty".to_string(),
            ));
        }
        Ok(Self { cert_chain, key })
    }

    /// The certificate chain, leaf first.
    #[must_use]
    pub fn cert_chain(&self) -> &[CertificateDer<'static>] {
        &self.cert_chain
    }

    /// Consume into the pair rustls expects.
    pub(crate) fn into_parts(self) -> (Vec<CertificateDer<'static>>, PrivateKeyDer<'static>) {
        (self.cert_chain, self.key)
    }
}

impl fmt::Debug for ServerIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ServerIdentity")
            .field("chain_len", &self.cert_chain.len())
            .field("key", &"<redacted>")
            .finish()
    }
}

/// Load all certificates from a PEM file.
fn load_certs(path: &str) -> Result<Vec<CertificateDer<'static>>> {
    let pem_data = read_file(path)?;
    let certs: Vec<CertificateDer<'static>> = rustls_pemfile::certs(&mut pem_data.as_slice())
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(|e| Error::Identity(format!("Failed to parse certs from '{path}': {e}")))?;

    if certs.is_empty() {
        return Err(Error::Identity(format!(
            "No certificates found in '{path}'"
        )));
    }

    Ok(certs)
}

/// Load the first private key from a PEM file.
///
/// Supports RSA (`RSA PRIVATE KEY`), PKCS#8 (`PRIVATE KEY`), and EC keys.
fn load_private_key(path: &str) -> Result<PrivateKeyDer<'static>> {
    let pem_data = read_file(path)?;
    rustls_pemfile::private_key(&mut pem_data.as_slice())
        .map_err(|e| Error::Identity(format!("Failed to parse private key from '{path}': {e}")))?
        .ok_or_else(|| Error::Identity(format!("No private key found in '{path}'")))
}

fn read_file(path: &str) -> Result<Vec<u8>> {
    fs::read(path).map_err(|e| Error::Identity(format!("Cannot read '{path}': {e}")))
}
