//! Error types for the mTLS gate

use std::io;

use thiserror::Error;

/// Result type alias for the mTLS gate
pub type Result<T> = std::result::Result<T, Error>;

/// mTLS gate errors
///
/// Per-connection handshake failures are logged where they happen and never
/// become an `Error`.
#[derive(Error, Debug)]
pub enum Error {
    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    /// CA bundle or CRL could not be turned into a usable trust store
    #[error("Trust store error: {0}")]
    TrustStore(String),

    /// Server certificate chain or private key could not be loaded
    #[error("Server identity error: {0}")]
    Identity(String),

    /// rustls refused the assembled configuration
    #[error("TLS policy error: {0}")]
    Tls(String),

    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}
