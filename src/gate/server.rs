//! TLS-terminating listener.
//!
//! Per connection:
//!
//! ```text
//! Accepted → Handshaking → Authenticated → Serving → Closed
//!                       ↘ HandshakeFailed → Closed
//! ```
//!
//! A failed or timed-out handshake is logged and the socket dropped; the
//! router never sees it. There is no retry: the client has to reconnect.
//!
//! On shutdown every connection task is told through a watch channel:
//! handshakes in progress are dropped, and served connections finish the
//! request in flight before closing (HTTP/2 gets a GOAWAY).

use std::future::Future;
use std::net::SocketAddr;
use std::time::Duration;

use axum::Router;
use hyper_util::rt::{TokioExecutor, TokioIo, TokioTimer};
use hyper_util::server::conn::auto;
use hyper_util::service::TowerToHyperService;
use tokio::net::{TcpListener, TcpStream};
use tokio::signal;
use tokio::sync::watch;
use tokio::task::JoinSet;
use tokio_rustls::TlsAcceptor;
use tracing::{debug, error, info, warn};

use super::handler::create_router;
use crate::config::{Config, ServerConfig};
use crate::tls::{PeerIdentity, TlsPolicy};
use crate::Result;

/// The mTLS gate: a TLS acceptor bound to an immutable policy plus the
/// confirmation router.
#[derive(Clone)]
pub struct Gate {
    acceptor: TlsAcceptor,
    router: Router,
    handshake_timeout: Duration,
    header_read_timeout: Duration,
    keep_alive_interval: Duration,
    keep_alive_timeout: Duration,
    shutdown_timeout: Duration,
}

impl Gate {
    /// Create a gate from an already-assembled policy.
    #[must_use]
    pub fn new(policy: &TlsPolicy, server: &ServerConfig) -> Self {
        Self {
            acceptor: TlsAcceptor::from(policy.server_config()),
            router: create_router(server.response_body.as_str()),
            handshake_timeout: server.handshake_timeout,
            header_read_timeout: server.header_read_timeout,
            keep_alive_interval: server.keep_alive_interval,
            keep_alive_timeout: server.keep_alive_timeout,
            shutdown_timeout: server.shutdown_timeout,
        }
    }

    /// Load all TLS material named in `config` and create the gate.
    ///
    /// # Errors
    ///
    /// Any trust store, identity or policy error. Nothing is bound yet.
    pub fn from_config(config: &Config) -> Result<Self> {
        let policy = TlsPolicy::from_config(&config.tls)?;
        Ok(Self::new(&policy, &config.server))
    }

    /// Bind `addr` and serve until Ctrl+C or SIGTERM.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn run(self, addr: SocketAddr) -> Result<()> {
        let listener = TcpListener::bind(addr).await?;
        info!(addr = %listener.local_addr()?, "mTLS gate listening (TLS 1.3, client certificate required)");
        self.serve_with_shutdown(listener, shutdown_signal()).await
    }

    /// Serve on an existing listener until `signal` resolves.
    ///
    /// After the signal, no new connection is accepted and open connections
    /// are asked to close once idle. Whatever is still open after
    /// `shutdown_timeout` is aborted.
    pub async fn serve_with_shutdown<F>(self, listener: TcpListener, signal: F) -> Result<()>
    where
        F: Future<Output = ()> + Send,
    {
        let mut connections = JoinSet::new();
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        tokio::pin!(signal);

        loop {
            tokio::select! {
                () = &mut signal => break,
                accepted = listener.accept() => match accepted {
                    Ok((stream, peer_addr)) => {
                        connections.spawn(self.clone().handle_connection(
                            stream,
                            peer_addr,
                            shutdown_rx.clone(),
                        ));
                    }
                    Err(e) => {
                        // EMFILE and friends: keep the listener alive
                        error!(error = %e, "Failed to accept connection");
                        tokio::time::sleep(Duration::from_millis(100)).await;
                    }
                },
                Some(_) = connections.join_next(), if !connections.is_empty() => {}
            }
        }

        drop(listener);
        shutdown_tx.send_replace(true);
        info!(open = connections.len(), "Stopped accepting connections");
        let drained = tokio::time::timeout(self.shutdown_timeout, async {
            while connections.join_next().await.is_some() {}
        })
        .await;
        if drained.is_err() {
            warn!(
                open = connections.len(),
                "Shutdown timeout elapsed, aborting remaining connections"
            );
            connections.shutdown().await;
        }

        Ok(())
    }

    async fn handle_connection(
        self,
        stream: TcpStream,
        peer_addr: SocketAddr,
        mut shutdown: watch::Receiver<bool>,
    ) {
        let handshake = tokio::time::timeout(self.handshake_timeout, self.acceptor.accept(stream));
        let tls_stream = tokio::select! {
            result = handshake => match result {
                Ok(Ok(s)) => s,
                Ok(Err(e)) => {
                    warn!(peer = %peer_addr, error = %e, "TLS handshake failed");
                    return;
                }
                Err(_) => {
                    warn!(
                        peer = %peer_addr,
                        timeout = ?self.handshake_timeout,
                        "TLS handshake timed out"
                    );
                    return;
                }
            },
            _ = shutdown.changed() => {
                debug!(peer = %peer_addr, "Shutting down, dropping connection mid-handshake");
                return;
            }
        };

        let (_, session) = tls_stream.get_ref();
        let client = session
            .peer_certificates()
            .and_then(PeerIdentity::from_chain)
            .map_or_else(|| "<unparsed>".to_string(), |p| p.to_string());
        let alpn = session
            .alpn_protocol()
            .map(|p| String::from_utf8_lossy(p).into_owned());
        debug!(peer = %peer_addr, client = %client, alpn = ?alpn, "Client authenticated");

        let io = TokioIo::new(tls_stream);
        let service = TowerToHyperService::new(self.router);

        let mut builder = auto::Builder::new(TokioExecutor::new());
        builder
            .http1()
            .timer(TokioTimer::new())
            .header_read_timeout(self.header_read_timeout);
        builder
            .http2()
            .timer(TokioTimer::new())
            .keep_alive_interval(self.keep_alive_interval)
            .keep_alive_timeout(self.keep_alive_timeout);

        let conn = builder.serve_connection(io, service);
        tokio::pin!(conn);

        let result = tokio::select! {
            result = conn.as_mut() => result,
            _ = shutdown.changed() => {
                conn.as_mut().graceful_shutdown();
                conn.await
            }
        };

        if let Err(e) = result {
            debug!(peer = %peer_addr, error = %e, "Connection closed with error");
        }
    }
}

/// Resolves on Ctrl+C or SIGTERM.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                error!(error = %e, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => {},
        () = terminate => {},
    }

    info!("Shutdown signal received");
}
