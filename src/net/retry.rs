//! Bind and connect with bounded retries

use std::io;
use std::net::TcpStream;
use std::time::Duration;

use rand::Rng;
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

use crate::error::{RegistryError, Result};

/// Server side: on a failed bind, move the port up by a random step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct BindRetry {
    /// Extra ports tried after the first one
    pub retries: u32,
    /// Largest random step between two candidate ports
    pub max_step: u16,
}

impl Default for BindRetry {
    fn default() -> Self {
        Self {
            retries: 10,
            max_step: 16,
        }
    }
}

/// Bind `host:port`, trying higher ports if it is taken.
///
/// Port 0 asks the OS for an ephemeral port and is never retried.
pub async fn bind_with_retry(host: &str, port: u16, retry: &BindRetry) -> io::Result<TcpListener> {
    let mut port = port;
    let mut attempt = 0;
    loop {
        match TcpListener::bind((host, port)).await {
            Ok(listener) => return Ok(listener),
            Err(err) if port != 0 && attempt < retry.retries => {
                let step = rand::thread_rng().gen_range(1..=retry.max_step.max(1));
                let Some(next) = port.checked_add(step) else {
                    return Err(err);
                };
                tracing::warn!("Bind to {}:{} failed ({}), trying port {}", host, port, err, next);
                port = next;
                attempt += 1;
            }
            Err(err) => return Err(err),
        }
    }
}

/// Client side: fixed number of attempts with a pause in between
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ConnectRetry {
    pub attempts: u32,
    pub delay: Duration,
}

impl ConnectRetry {
    /// Single attempt, no waiting
    pub fn once() -> Self {
        Self {
            attempts: 1,
            delay: Duration::ZERO,
        }
    }
}

impl Default for ConnectRetry {
    fn default() -> Self {
        Self {
            attempts: 10,
            delay: Duration::from_millis(100),
        }
    }
}

/// Connect to `host:port`, resolving the name again on every attempt
pub fn connect_with_retry(host: &str, port: u16, retry: &ConnectRetry) -> Result<TcpStream> {
    let attempts = retry.attempts.max(1);
    let mut last_err = None;

    for attempt in 1..=attempts {
        match TcpStream::connect((host, port)) {
            Ok(stream) => {
                // One short line per request
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => {
                tracing::debug!(
                    "Connect to {}:{} failed (attempt {}/{}): {}",
                    host,
                    port,
                    attempt,
                    attempts,
                    err
                );
                last_err = Some(err);
                if attempt < attempts {
                    std::thread::sleep(retry.delay);
                }
            }
        }
    }

    Err(RegistryError::Connection {
        target: format!("{host}:{port}"),
        source: last_err.unwrap_or_else(|| io::Error::from(io::ErrorKind::NotConnected)),
    })
}
