//! mTLS Gate Library
//!
//! A mutual-TLS front door for an administrative network. Every inbound TCP
//! connection must complete a TLS 1.3 handshake with a client certificate
//! that chains to a configured CA; anything else is dropped before HTTP is
//! spoken. Authenticated connections receive a static confirmation response.
//!
//! Startup is load-once: the trust store, the TLS policy and the server
//! identity are built before the first accept and are read-only afterwards.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

pub mod cli;
pub mod config;
pub mod error;
pub mod gate;
pub mod tls;

pub use error::{Error, Result};

use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Setup tracing/logging
///
/// `RUST_LOG` takes precedence over `level` when set.
pub fn setup_tracing(level: &str, format: Option<&str>) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let subscriber = tracing_subscriber::registry().with(filter);

    match format {
        Some("json") => subscriber.with(fmt::layer().json()).try_init(),
        _ => subscriber.with(fmt::layer()).try_init(),
    }
    .map_err(|e| Error::Config(format!("Failed to install tracing subscriber: {e}")))
}
