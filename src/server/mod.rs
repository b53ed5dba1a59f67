//! Registry server
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 REGISTRY SERVER (psc-regsrv)                │
//! ├─────────────────────────────────────────────────────────────┤
//! │                                                             │
//! │  accept loop ──► tokio task per connection ──► Session      │
//! │                                                   │         │
//! │                                                   ▼         │
//! │                        EntryStore (Arc<RwLock>)             │
//! │                                                             │
//! └─────────────────────────────────────────────────────────────┘
//! ```
//!
//! One slow or idle client never blocks another: each connection runs in
//! its own task and only touches the store for the in-memory step of a
//! request.

mod session;

pub use session::{Outcome, Session};

use std::future::Future;
use std::io;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use tokio::io::BufReader;
use tokio::net::{TcpListener, TcpStream};

use crate::net::{bind_with_retry, BindRetry, DEFAULT_MAX_LINE_LEN};
use crate::store::EntryStore;

/// How and where the server listens
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerOptions {
    /// Address to bind, e.g. `0.0.0.0`
    pub host: String,
    /// First port to try; 0 for an ephemeral port
    pub port: u16,
    /// Host name announced to clients; derived from the bind address if unset
    pub advertise: Option<String>,
    pub bind_retry: BindRetry,
    pub max_line_len: usize,
}

impl ServerOptions {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
            advertise: None,
            bind_retry: BindRetry::default(),
            max_line_len: DEFAULT_MAX_LINE_LEN,
        }
    }
}

pub struct RegistryServer {
    listener: TcpListener,
    store: Arc<EntryStore>,
    host: String,
    port: u16,
    max_line_len: usize,
}

impl RegistryServer {
    /// Bind the listening socket, stepping the port if it is taken
    pub async fn bind(options: &ServerOptions) -> io::Result<Self> {
        let listener = bind_with_retry(&options.host, options.port, &options.bind_retry).await?;
        let local = listener.local_addr()?;
        let host = match &options.advertise {
            Some(host) => host.clone(),
            None => advertised_host(local),
        };

        tracing::info!(
            "Registry server listening on {} (advertised as {}:{})",
            local,
            host,
            local.port()
        );

        Ok(Self {
            listener,
            store: Arc::new(EntryStore::new()),
            host,
            port: local.port(),
            max_line_len: options.max_line_len,
        })
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    /// Host and port clients should use to reach this server
    pub fn endpoint(&self) -> (&str, u16) {
        (&self.host, self.port)
    }

    pub fn store(&self) -> Arc<EntryStore> {
        Arc::clone(&self.store)
    }

    /// Serve until the process is terminated
    pub async fn run(self) {
        self.run_until(std::future::pending()).await
    }

    /// Serve until `shutdown` resolves. Sessions already running are left
    /// to finish on their own.
    pub async fn run_until<F>(self, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);

        loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!("Registry server shutting down");
                    break;
                }
                accepted = self.listener.accept() => {
                    match accepted {
                        Ok((stream, peer)) => {
                            let session = Session::new(
                                Arc::clone(&self.store),
                                self.host.clone(),
                                self.port,
                                self.max_line_len,
                            );
                            tokio::spawn(handle_connection(stream, peer, session));
                        }
                        Err(e) => {
                            tracing::error!("Failed to accept connection: {}", e);
                            tokio::time::sleep(Duration::from_millis(100)).await;
                        }
                    }
                }
            }
        }
    }
}

async fn handle_connection(stream: TcpStream, peer: SocketAddr, session: Session) {
    tracing::info!("[{}] Accepted connection from {}", session.id(), peer);
    let _ = stream.set_nodelay(true);

    let (read_half, write_half) = stream.into_split();
    if let Err(e) = session.run(BufReader::new(read_half), write_half).await {
        tracing::warn!("[{}] Connection error: {}", session.id(), e);
    }

    tracing::info!("[{}] Connection closed from {}", session.id(), peer);
}

/// Name announced in the greeting: the machine's host name when bound to a
/// wildcard address, the bound IP otherwise
fn advertised_host(local: SocketAddr) -> String {
    let ip = local.ip();
    if !ip.is_unspecified() {
        return ip.to_string();
    }
    hostname::get()
        .ok()
        .and_then(|name| name.into_string().ok())
        .unwrap_or_else(|| match ip {
            IpAddr::V4(_) => "127.0.0.1".to_string(),
            IpAddr::V6(_) => "::1".to_string(),
        })
}
