//! In-process registry server for integration tests
//!
//! The server runs on its own thread with its own tokio runtime so tests can
//! drive it with the blocking client. Dropping the handle stops it.

use std::io::{BufRead, BufReader, Write};
use std::net::{Shutdown, SocketAddr, TcpStream};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

use tokio::sync::oneshot;

use psc_registry::client::RegistryClient;
use psc_registry::config::RegistryLocation;
use psc_registry::net::ConnectRetry;
use psc_registry::server::{RegistryServer, ServerOptions};
use psc_registry::store::EntryStore;

pub struct TestServer {
    addr: SocketAddr,
    store: Arc<EntryStore>,
    shutdown: Option<oneshot::Sender<()>>,
    thread: Option<JoinHandle<()>>,
}

impl TestServer {
    /// Start on an ephemeral port of 127.0.0.1
    pub fn start() -> Self {
        Self::with_options(ServerOptions::new("127.0.0.1", 0))
    }

    /// Start with custom options; panics if the server cannot bind
    pub fn with_options(options: ServerOptions) -> Self {
        Self::try_with_options(options).expect("Failed to start test server")
    }

    pub fn try_with_options(options: ServerOptions) -> std::io::Result<Self> {
        let (ready_tx, ready_rx) = mpsc::channel();
        let (shutdown_tx, shutdown_rx) = oneshot::channel::<()>();

        let thread = std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_multi_thread()
                .worker_threads(2)
                .enable_all()
                .build()
                .expect("Failed to build runtime");

            runtime.block_on(async move {
                let server = match RegistryServer::bind(&options).await {
                    Ok(server) => server,
                    Err(e) => {
                        let _ = ready_tx.send(Err(e));
                        return;
                    }
                };
                let addr = server.local_addr().expect("Bound server has an address");
                let _ = ready_tx.send(Ok((addr, server.store())));
                server
                    .run_until(async {
                        let _ = shutdown_rx.await;
                    })
                    .await;
            });
        });

        let (addr, store) = ready_rx.recv().expect("Server thread exited early")?;
        Ok(Self {
            addr,
            store,
            shutdown: Some(shutdown_tx),
            thread: Some(thread),
        })
    }

    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    pub fn port(&self) -> u16 {
        self.addr.port()
    }

    pub fn location(&self) -> RegistryLocation {
        RegistryLocation::new("127.0.0.1", self.port())
    }

    /// Direct handle on the server's table
    pub fn store(&self) -> Arc<EntryStore> {
        Arc::clone(&self.store)
    }

    pub fn client(&self) -> RegistryClient {
        RegistryClient::connect("127.0.0.1", self.port(), &ConnectRetry::default())
            .expect("Failed to connect to test server")
    }

    pub fn raw(&self) -> RawConnection {
        RawConnection::connect(self.addr)
    }
}

impl Drop for TestServer {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Some(thread) = self.thread.take() {
            let _ = thread.join();
        }
    }
}

/// Line-level socket access for checking exact protocol output
pub struct RawConnection {
    reader: BufReader<TcpStream>,
    writer: TcpStream,
}

impl RawConnection {
    pub fn connect(addr: SocketAddr) -> Self {
        let stream = TcpStream::connect(addr).expect("Failed to connect");
        stream
            .set_read_timeout(Some(Duration::from_secs(5)))
            .expect("Failed to set timeout");
        let writer = stream.try_clone().expect("Failed to clone stream");
        Self {
            reader: BufReader::new(stream),
            writer,
        }
    }

    pub fn send_bytes(&mut self, bytes: &[u8]) {
        self.writer.write_all(bytes).expect("Failed to write");
        self.writer.flush().expect("Failed to flush");
    }

    /// Send `line` followed by `\n`
    pub fn send(&mut self, line: &str) {
        self.send_bytes(format!("{}\n", line).as_bytes());
    }

    /// Close the sending direction; the server sees EOF
    pub fn finish(&mut self) {
        self.writer
            .shutdown(Shutdown::Write)
            .expect("Failed to shut down write half");
    }

    /// Next line without its `\n`, or `None` at EOF
    pub fn read_line(&mut self) -> Option<String> {
        let mut line = String::new();
        let n = self.reader.read_line(&mut line).expect("Failed to read");
        if n == 0 {
            return None;
        }
        if line.ends_with('\n') {
            line.pop();
        }
        Some(line)
    }

    pub fn expect_line(&mut self) -> String {
        self.read_line().expect("Connection closed unexpectedly")
    }

    /// Send a request and return the status line
    pub fn request(&mut self, line: &str) -> String {
        self.send(line);
        self.expect_line()
    }

    /// Body lines up to (not including) the `.` terminator
    pub fn read_body(&mut self) -> Vec<String> {
        let mut lines = Vec::new();
        loop {
            let line = self.expect_line();
            if line == "." {
                return lines;
            }
            lines.push(line);
        }
    }
}
