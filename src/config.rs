//! Configuration management
//!
//! Layered in the order: built-in defaults, YAML file, `MTLS_GATE_*`
//! environment variables, then CLI flags (applied by `main`).
//!
//! ```yaml
//! server:
//!   host: "0.0.0.0"
//!   port: 8443
//!   handshake_timeout: 10s
//! tls:
//!   ca_cert: /etc/mtls-gate/ca.crt
//!   server_cert: /etc/mtls-gate/server.crt
//!   server_key: /etc/mtls-gate/server.key
//! ```

use std::{net::SocketAddr, path::Path, time::Duration};

use figment::{
    Figment,
    providers::{Env, Format, Yaml},
};
use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Body returned to every request that made it through the handshake.
pub const DEFAULT_RESPONSE_BODY: &str = "Authenticated: admin gate reached\n";

/// Main configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Listener configuration
    pub server: ServerConfig,
    /// TLS material locations
    pub tls: TlsConfig,
}

/// Listener configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,
    /// Port to listen on
    pub port: u16,
    /// Upper bound on a single TLS handshake
    #[serde(with = "humantime_serde")]
    pub handshake_timeout: Duration,
    /// Upper bound on reading HTTP/1 request headers after the handshake
    #[serde(with = "humantime_serde")]
    pub header_read_timeout: Duration,
    /// Interval between HTTP/2 keep-alive PINGs on an authenticated connection
    #[serde(with = "humantime_serde")]
    pub keep_alive_interval: Duration,
    /// HTTP/2 connections whose PING goes unanswered this long are closed
    #[serde(with = "humantime_serde")]
    pub keep_alive_timeout: Duration,
    /// How long shutdown waits for open connections
    #[serde(with = "humantime_serde")]
    pub shutdown_timeout: Duration,
    /// Static confirmation body
    pub response_body: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8443,
            handshake_timeout: Duration::from_secs(10),
            header_read_timeout: Duration::from_secs(10),
            keep_alive_interval: Duration::from_secs(30),
            keep_alive_timeout: Duration::from_secs(20),
            shutdown_timeout: Duration::from_secs(30),
            response_body: DEFAULT_RESPONSE_BODY.to_string(),
        }
    }
}

/// Locations of the PEM files the gate is built from.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TlsConfig {
    /// CA bundle used to verify client certificates
    pub ca_cert: String,
    /// Server certificate chain, leaf first
    pub server_cert: String,
    /// Server private key (PKCS#8, PKCS#1 or SEC1)
    pub server_key: String,
    /// Optional certificate revocation list applied to client certificates
    pub crl_path: Option<String>,
}

impl Default for TlsConfig {
    fn default() -> Self {
        Self {
            ca_cert: "/etc/mtls-gate/ca.crt".to_string(),
            server_cert: "/etc/mtls-gate/server.crt".to_string(),
            server_key: "/etc/mtls-gate/server.key".to_string(),
            crl_path: None,
        }
    }
}

impl Config {
    /// Load configuration from file and environment
    ///
    /// # Errors
    ///
    /// Returns an error if the config file does not exist or cannot be parsed.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut figment = Figment::new();

        if let Some(p) = path {
            if !p.exists() {
                return Err(Error::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            figment = figment.merge(Yaml::file(p));
        }

        // MTLS_GATE_SERVER__PORT=9443, MTLS_GATE_TLS__CA_CERT=/path/ca.crt
        figment = figment.merge(Env::prefixed("MTLS_GATE_").split("__"));

        figment
            .extract()
            .map_err(|e| Error::Config(e.to_string()))
    }

    /// Reject values that can only lead to a gate that never admits anyone.
    pub fn validate(&self) -> Result<()> {
        for (name, value) in [
            ("tls.ca_cert", &self.tls.ca_cert),
            ("tls.server_cert", &self.tls.server_cert),
            ("tls.server_key", &self.tls.server_key),
        ] {
            if value.trim().is_empty() {
                return Err(Error::Config(format!("{name} must not be empty")));
            }
        }

        if self.server.handshake_timeout.is_zero() {
            return Err(Error::Config(
                "server.handshake_timeout must be greater than zero".to_string(),
            ));
        }
        for (name, value) in [
            ("server.header_read_timeout", self.server.header_read_timeout),
            ("server.keep_alive_interval", self.server.keep_alive_interval),
            ("server.keep_alive_timeout", self.server.keep_alive_timeout),
        ] {
            if value.is_zero() {
                return Err(Error::Config(format!("{name} must be greater than zero")));
            }
        }

        self.bind_addr().map(|_| ())
    }

    /// Socket address the listener binds to.
    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip = self
            .server
            .host
            .parse()
            .map_err(|e| Error::Config(format!("Invalid host '{}': {e}", self.server.host)))?;
        Ok(SocketAddr::new(ip, self.server.port))
    }
}
