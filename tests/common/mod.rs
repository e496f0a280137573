//! Test infrastructure for end-to-end gate tests.

#![allow(dead_code)]

use std::io;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use mtls_gate::config::Config;
use mtls_gate::gate::Gate;
use rustls::crypto::aws_lc_rs;
use rustls::pki_types::ServerName;
use rustls::{ClientConfig, RootCertStore, SupportedProtocolVersion};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;

#[path = "../../src/tls/test_pki.rs"]
mod test_pki;

pub use test_pki::{ClientCert, TestPki};

pub const REQUEST: &[u8] = b"GET /admin HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
pub const KEEP_ALIVE_REQUEST: &[u8] = b"GET /admin HTTP/1.1\r\nHost: localhost\r\n\r\n";

/// Gate configuration pointing at `pki`, on an ephemeral port.
pub fn gate_config(pki: &TestPki) -> Config {
    let mut config = Config::default();
    config.server.port = 0;
    config.server.shutdown_timeout = Duration::from_secs(2);
    config.tls.ca_cert = pki.ca_cert_path();
    config.tls.server_cert = pki.server_cert_path();
    config.tls.server_key = pki.server_key_path();
    config
}

/// TLS 1.3 client config trusting `pki` for the server and presenting `client`.
pub fn client_config(pki: &TestPki, client: Option<ClientCert>) -> Arc<ClientConfig> {
    client_config_with(pki, client, &[&rustls::version::TLS13], &[b"http/1.1"])
}

pub fn client_config_with(
    pki: &TestPki,
    client: Option<ClientCert>,
    versions: &[&'static SupportedProtocolVersion],
    alpn: &[&[u8]],
) -> Arc<ClientConfig> {
    let mut roots = RootCertStore::empty();
    roots.add(pki.ca_cert_der()).unwrap();

    let builder = ClientConfig::builder_with_provider(Arc::new(aws_lc_rs::default_provider()))
        .with_protocol_versions(versions)
        .unwrap()
        .with_root_certificates(roots);

    let mut config = match client {
        Some(c) => builder.with_client_auth_cert(vec![c.cert], c.key).unwrap(),
        None => builder.with_no_client_auth(),
    };
    config.alpn_protocols = alpn.iter().map(|p| p.to_vec()).collect();
    Arc::new(config)
}

// ---------------------------------------------------------------------------
// TestGate
// ---------------------------------------------------------------------------

/// A gate serving on an ephemeral localhost port.
pub struct TestGate {
    pub addr: SocketAddr,
    shutdown_tx: oneshot::Sender<()>,
    handle: JoinHandle<mtls_gate::Result<()>>,
}

impl TestGate {
    pub async fn start(config: &Config) -> Self {
        let gate = Gate::from_config(config).unwrap();
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();
        let handle = tokio::spawn(gate.serve_with_shutdown(listener, async {
            let _ = shutdown_rx.await;
        }));

        Self {
            addr,
            shutdown_tx,
            handle,
        }
    }

    pub async fn stop(self) -> mtls_gate::Result<()> {
        let _ = self.shutdown_tx.send(());
        self.handle.await.unwrap()
    }
}

// ---------------------------------------------------------------------------
// Client helpers
// ---------------------------------------------------------------------------

pub async fn connect(addr: SocketAddr, config: Arc<ClientConfig>) -> io::Result<TlsStream<TcpStream>> {
    let tcp = TcpStream::connect(addr).await?;
    let domain = ServerName::try_from("localhost").unwrap();
    TlsConnector::from(config).connect(domain, tcp).await
}

/// Send one HTTP/1.1 request over TLS and return the raw response.
pub async fn get(addr: SocketAddr, config: Arc<ClientConfig>) -> io::Result<String> {
    let mut tls = connect(addr, config).await?;
    tls.write_all(REQUEST).await?;

    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];
    loop {
        match tls.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => buf.extend_from_slice(&chunk[..n]),
            // peer closed without close_notify after sending a full response
            Err(e) if e.kind() == io::ErrorKind::UnexpectedEof && !buf.is_empty() => break,
            Err(e) => return Err(e),
        }
    }
    Ok(String::from_utf8_lossy(&buf).into_owned())
}

/// Body of a raw HTTP/1.1 response.
pub fn body_of(response: &str) -> &str {
    response
        .split_once("\r\n\r\n")
        .map_or("", |(_, body)| body)
}

/// No HTTP response may come back on a connection the gate refused.
pub fn assert_rejected(result: &io::Result<String>) {
    match result {
        Err(_) => {}
        Ok(response) => assert!(
            !response.starts_with("HTTP/"),
            "expected the gate to refuse the connection, got: {response}"
        ),
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

/// In-memory sink for a `tracing_subscriber::fmt` layer.
#[derive(Clone, Default)]
pub struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl LogBuffer {
    /// Installs a thread-local subscriber writing into this buffer.
    ///
    /// Only sees events from tasks polled on the current thread, so pair it
    /// with a `current_thread` runtime.
    pub fn install(&self) -> tracing::subscriber::DefaultGuard {
        let sink = self.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || sink.clone())
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .finish();
        tracing::subscriber::set_default(subscriber)
    }

    pub fn contents(&self) -> String {
        String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
    }

    /// Polls until a line contains every needle, or gives up after `timeout`.
    pub async fn wait_for(&self, needles: &[&str], timeout: Duration) -> Option<String> {
        let deadline = tokio::time::Instant::now() + timeout;
        loop {
            let logs = self.contents();
            if let Some(line) = logs
                .lines()
                .find(|line| needles.iter().all(|n| line.contains(n)))
            {
                return Some(line.to_string());
            }
            if tokio::time::Instant::now() >= deadline {
                return None;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    }
}

impl io::Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}
