//! Subject of a verified client certificate.
//!
//! Used only to label log lines once rustls has accepted the peer. Access is
//! never decided from these fields: holding any certificate that chains to
//! the trust store is the whole authorization model.

use std::fmt;

use rustls::pki_types::CertificateDer;
use x509_parser::certificate::X509Certificate;
use x509_parser::extensions::GeneralName;
use x509_parser::prelude::FromDer;

/// Fields pulled from the leaf certificate a client presented.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PeerIdentity {
    /// Certificate Common Name (CN).
    pub common_name: Option<String>,

    /// Subject Alternative Name URI entries (e.g. SPIFFE IDs).
    pub san_uris: Vec<String>,

    /// Certificate serial number, lowercase hex.
    pub serial: String,
}

impl PeerIdentity {
    /// Parse the leaf of a verified chain.
    ///
    /// Returns `None` when the chain is empty or the leaf does not parse;
    /// rustls has already accepted it, so this only affects logging.
    #[must_use]
    pub fn from_chain(chain: &[CertificateDer<'_>]) -> Option<Self> {
        let leaf = chain.first()?;
        let (_, cert) = X509Certificate::from_der(leaf.as_ref()).ok()?;

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|attr| attr.as_str().ok())
            .map(str::to_owned);

        let mut san_uris = Vec::new();
        if let Ok(Some(san_ext)) = cert.subject_alternative_name() {
            for name in &san_ext.value.general_names {
                if let GeneralName::URI(uri) = name {
                    san_uris.push((*uri).to_owned());
                }
            }
        }

        Some(Self {
            common_name,
            san_uris,
            serial: format!("{:x}", cert.tbs_certificate.serial),
        })
    }
}

impl fmt::Display for PeerIdentity {
    /// SPIFFE URI if present, then CN, then the serial.
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(uri) = self.san_uris.iter().find(|u| u.starts_with("spiffe://")) {
            return f.write_str(uri);
        }
        match self.common_name {
            Some(ref cn) => f.write_str(cn),
            None => write!(f, "serial:{}", self.serial),
        }
    }
}
