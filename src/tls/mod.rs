//! Mutual TLS policy for the gate.
//!
//! ```text
//! ca.crt ──► TrustStore ─┐
//!                        ├─► TlsPolicy (Arc<rustls::ServerConfig>)
//! server.crt/key ──► ServerIdentity ┘        │
//!                                            ▼
//!                              every accepted TCP connection
//! ```
//!
//! Everything here runs once at startup and produces immutable values. The
//! client-certificate requirement and the TLS 1.3 floor live entirely in the
//! [`TlsPolicy`]; nothing downstream re-checks them.
//!
//! # Modules
//!
//! - [`trust_store`]: CA bundle and CRL loading (`TrustStore`)
//! - [`identity`]: the gate's own certificate chain and key (`ServerIdentity`)
//! - [`policy`]: rustls server config assembly (`TlsPolicy`)
//! - [`peer`]: subject of a verified client certificate, for log lines

pub mod identity;
pub mod peer;
pub mod policy;
pub mod trust_store;

#[cfg(test)]
pub(crate) mod test_pki;

pub use identity::ServerIdentity;
pub use peer::PeerIdentity;
pub use policy::{ALPN_PROTOCOLS, PolicySummary, TlsPolicy};
pub use trust_store::TrustStore;

