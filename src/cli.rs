//! Command-line interface

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::config::Config;

/// Mutual-TLS gate - only holders of a trusted client certificate get in
#[derive(Parser, Debug)]
#[command(name = "mtls-gate")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file (YAML)
    #[arg(short, long, env = "MTLS_GATE_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Port to listen on
    #[arg(short, long)]
    pub port: Option<u16>,

    /// Host (IP address) to bind to
    #[arg(long)]
    pub host: Option<String>,

    /// PEM bundle of CAs allowed to issue client certificates
    #[arg(long, global = true)]
    pub ca_cert: Option<String>,

    /// PEM server certificate chain
    #[arg(long, global = true)]
    pub server_cert: Option<String>,

    /// PEM server private key
    #[arg(long, global = true)]
    pub server_key: Option<String>,

    /// PEM certificate revocation list for client certificates
    #[arg(long, global = true)]
    pub crl: Option<String>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(
        long,
        default_value = "info",
        env = "MTLS_GATE_LOG_LEVEL",
        global = true
    )]
    pub log_level: String,

    /// Log format (text, json)
    #[arg(long, env = "MTLS_GATE_LOG_FORMAT", global = true)]
    pub log_format: Option<String>,

    /// Subcommand (optional - defaults to server mode)
    #[command(subcommand)]
    pub command: Option<Command>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Start the gate (default)
    Serve,

    /// Load the CA bundle, server certificate and key, build the TLS policy,
    /// and exit without binding
    Check,
}

impl Cli {
    /// Apply command-line overrides on top of file and environment config.
    pub fn apply_overrides(&self, config: &mut Config) {
        if let Some(port) = self.port {
            config.server.port = port;
        }
        if let Some(ref host) = self.host {
            config.server.host.clone_from(host);
        }
        if let Some(ref path) = self.ca_cert {
            config.tls.ca_cert.clone_from(path);
        }
        if let Some(ref path) = self.server_cert {
            config.tls.server_cert.clone_from(path);
        }
        if let Some(ref path) = self.server_key {
            config.tls.server_key.clone_from(path);
        }
        if let Some(ref path) = self.crl {
            config.tls.crl_path = Some(path.clone());
        }
    }
}
