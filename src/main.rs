//! mTLS Gate - keeps an admin network dark to anyone without a trusted
//! client certificate.

use std::process::ExitCode;

use clap::Parser;
use tracing::{error, info};

use mtls_gate::{
    cli::{Cli, Command},
    config::Config,
    gate::Gate,
    setup_tracing,
    tls::TlsPolicy,
};

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    if let Err(e) = setup_tracing(&cli.log_level, cli.log_format.as_deref()) {
        eprintln!("Failed to setup tracing: {e}");
        return ExitCode::FAILURE;
    }

    let config = match load_config(&cli) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load configuration: {e}");
            return ExitCode::FAILURE;
        }
    };

    match cli.command {
        Some(Command::Check) => run_check(&config),
        Some(Command::Serve) | None => run_server(config).await,
    }
}

fn load_config(cli: &Cli) -> mtls_gate::Result<Config> {
    let mut config = Config::load(cli.config.as_deref())?;
    cli.apply_overrides(&mut config);
    config.validate()?;
    Ok(config)
}

/// Load and assemble everything `serve` would, then report.
fn run_check(config: &Config) -> ExitCode {
    let summary = match TlsPolicy::from_config(&config.tls) {
        Ok(policy) => policy.summary(),
        Err(e) => {
            eprintln!("❌ {e}");
            return ExitCode::FAILURE;
        }
    };

    println!("✅ TLS policy is valid");
    println!(
        "   CA bundle:   {} ({} anchor(s), {} skipped)",
        config.tls.ca_cert, summary.anchors, summary.skipped_anchors
    );
    if let Some(ref crl_path) = config.tls.crl_path {
        println!("   CRL:         {crl_path} ({} list(s))", summary.crls);
    }
    println!(
        "   Server cert: {} ({} certificate(s))",
        config.tls.server_cert, summary.server_chain_len
    );
    println!("   Server key:  {}", config.tls.server_key);
    println!("   Protocol:    TLS 1.3 only, client certificate required");
    ExitCode::SUCCESS
}

/// Run the gate
async fn run_server(config: Config) -> ExitCode {
    let addr = match config.bind_addr() {
        Ok(a) => a,
        Err(e) => {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    };

    info!(
        version = env!("CARGO_PKG_VERSION"),
        addr = %addr,
        ca_cert = %config.tls.ca_cert,
        server_cert = %config.tls.server_cert,
        crl = config.tls.crl_path.is_some(),
        "Starting mTLS gate"
    );

    let gate = match Gate::from_config(&config) {
        Ok(g) => g,
        Err(e) => {
            error!("Failed to build mTLS gate: {e}");
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = gate.run(addr).await {
        error!("Gate error: {e}");
        return ExitCode::FAILURE;
    }

    info!("Gate shutdown complete");
    ExitCode::SUCCESS
}
