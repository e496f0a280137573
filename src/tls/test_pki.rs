//! Throwaway PKI for tests: one CA, one server identity on disk, and client
//! certificates minted on demand.
//!
//! Also compiled into the integration tests via `#[path]`, so it may only
//! depend on external crates.

#![allow(dead_code)]

use std::net::{IpAddr, Ipv4Addr};

use rcgen::{
    BasicConstraints, CertificateParams, CertificateRevocationListParams, DnType,
    ExtendedKeyUsagePurpose, IsCa, Issuer, KeyIdMethod, KeyPair, KeyUsagePurpose,
    RevocationReason, RevokedCertParams, SanType, SerialNumber, date_time_ymd,
};
use rustls::pki_types::{CertificateDer, PrivateKeyDer, PrivatePkcs8KeyDer};
use tempfile::TempDir;

pub struct TestPki {
    dir: TempDir,
    ca_params: CertificateParams,
    ca_key: KeyPair,
    ca_cert_pem: String,
    ca_cert_der: CertificateDer<'static>,
}

pub struct ClientCert {
    pub cert: CertificateDer<'static>,
    pub key: PrivateKeyDer<'static>,
}

impl TestPki {
    pub fn generate() -> Self {
        let mut ca_params = CertificateParams::default();
        ca_params.is_ca = IsCa::Ca(BasicConstraints::Unconstrained);
        ca_params
            .distinguished_name
            .push(DnType::CommonName, "mtls-gate test CA");
        ca_params.key_usages = vec![
            KeyUsagePurpose::KeyCertSign,
            KeyUsagePurpose::CrlSign,
            KeyUsagePurpose::DigitalSignature,
        ];
        let ca_key = KeyPair::generate().unwrap();
        let ca_cert = ca_params.self_signed(&ca_key).unwrap();

        let pki = Self {
            dir: tempfile::tempdir().unwrap(),
            ca_params,
            ca_key,
            ca_cert_pem: ca_cert.pem(),
            ca_cert_der: ca_cert.der().clone(),
        };

        let mut server_params = CertificateParams::new(vec!["localhost".to_string()]).unwrap();
        server_params
            .subject_alt_names
            .push(SanType::IpAddress(IpAddr::V4(Ipv4Addr::LOCALHOST)));
        server_params
            .distinguished_name
            .push(DnType::CommonName, "mtls-gate test server");
        server_params
            .extended_key_usages
            .push(ExtendedKeyUsagePurpose::ServerAuth);
        let server_key = KeyPair::generate().unwrap();
        let server_cert = server_params
            .signed_by(&server_key, &pki.issuer())
            .unwrap();

        pki.write("ca.crt", &pki.ca_cert_pem);
        pki.write("server.crt", &server_cert.pem());
        pki.write("server.key", &server_key.serialize_pem());
        pki
    }

    fn issuer(&self) -> Issuer<'_, &KeyPair> {
        Issuer::from_params(&self.ca_params, &self.ca_key)
    }

    /// Writes `contents` into the PKI directory and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> String {
        std::fs::write(self.dir.path().join(name), contents).unwrap();
        self.path(name)
    }

    pub fn path(&self, name: &str) -> String {
        self.dir.path().join(name).to_string_lossy().into_owned()
    }

    pub fn ca_cert_pem(&self) -> &str {
        &self.ca_cert_pem
    }

    pub fn ca_cert_der(&self) -> CertificateDer<'static> {
        self.ca_cert_der.clone()
    }

    pub fn ca_cert_path(&self) -> String {
        self.path("ca.crt")
    }

    pub fn server_cert_path(&self) -> String {
        self.path("server.crt")
    }

    pub fn server_key_path(&self) -> String {
        self.path("server.key")
    }

    /// Client certificate for `cn`, signed by this CA.
    pub fn issue_client(&self, cn: &str, serial: u64) -> ClientCert {
        let mut params = CertificateParams::default();
        params.distinguished_name.push(DnType::CommonName, cn);
        params
            .extended_key_usages
            .push(ExtendedKeyUsagePurpose::ClientAuth);
        params.serial_number = Some(SerialNumber::from(serial));

        let key = KeyPair::generate().unwrap();
        let cert = params.signed_by(&key, &self.issuer()).unwrap();

        ClientCert {
            cert: cert.der().clone(),
            key: PrivateKeyDer::Pkcs8(PrivatePkcs8KeyDer::from(key.serialize_der())),
        }
    }

    /// Writes a CRL revoking `serials` and returns its path.
    pub fn crl_path(&self, serials: &[u64]) -> String {
        let params = CertificateRevocationListParams {
            this_update: date_time_ymd(2024, 1, 1),
            next_update: date_time_ymd(2099, 1, 1),
            crl_number: SerialNumber::from(1u64),
            issuing_distribution_point: None,
            revoked_certs: serials
                .iter()
                .map(|serial| RevokedCertParams {
                    serial_number: SerialNumber::from(*serial),
                    revocation_time: date_time_ymd(2024, 1, 1),
                    reason_code: Some(RevocationReason::KeyCompromise),
                    invalidity_date: None,
                })
                .collect(),
            key_identifier_method: KeyIdMethod::Sha256,
        };
        let crl = params.signed_by(&self.issuer()).unwrap();
        self.write("ca.crl", &crl.pem().unwrap())
    }

    pub fn empty_crl_path(&self) -> String {
        self.crl_path(&[])
    }
}
