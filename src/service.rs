//! High-level registry access
//!
//! [`RegistryService`] wraps [`RegistryClient`] for callers that only talk
//! to the registry now and then: each call opens a connection, does its
//! work and closes it again, unless a persistent session was opened with
//! [`RegistryService::connect`].
//!
//! [`ServerLauncher`] starts a private `psc-regsrv` as a child process and
//! learns its endpoint from the `PSC_REGISTRY=host:port` line the server
//! prints on stdout.

use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};
use std::process::{Child, Command, Stdio};
use std::sync::mpsc;
use std::time::Duration;

use serde::Serialize;

use crate::client::RegistryClient;
use crate::config::{RegistryConfig, RegistryLocation};
use crate::error::{RegistryError, Result};
use crate::net::ConnectRetry;
use crate::store::{EntryFields, EntryId, EntryRecord, FieldSet};

/// An entry together with (optionally) its attached strings
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EntryData {
    pub id: EntryId,
    #[serde(flatten)]
    pub fields: EntryFields,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub strings: Vec<String>,
}

impl From<EntryRecord> for EntryData {
    fn from(record: EntryRecord) -> Self {
        Self {
            id: record.id,
            fields: record.fields,
            strings: Vec::new(),
        }
    }
}

pub struct RegistryService {
    location: RegistryLocation,
    retry: ConnectRetry,
    session: Option<RegistryClient>,
}

impl RegistryService {
    pub fn new(location: RegistryLocation, retry: ConnectRetry) -> Self {
        Self {
            location,
            retry,
            session: None,
        }
    }

    /// Start a private server and return a service pointed at it
    pub fn start(
        launcher: &ServerLauncher,
        port: u16,
        retry: ConnectRetry,
    ) -> Result<(Self, ServerProcess)> {
        let process = launcher.spawn(port)?;
        let service = Self::new(process.location().clone(), retry);
        Ok((service, process))
    }

    /// Use the registry named by `PSC_REGISTRY`, or start a private one.
    ///
    /// A malformed `PSC_REGISTRY` is an error rather than a reason to spawn.
    pub fn bootstrap(
        config: &RegistryConfig,
        launcher: &ServerLauncher,
    ) -> Result<(Self, Option<ServerProcess>)> {
        let env = RegistryLocation::from_env()?;
        Self::bootstrap_with(env, config, launcher)
    }

    /// [`bootstrap`](Self::bootstrap) with the environment lookup already done
    pub fn bootstrap_with(
        env: Option<RegistryLocation>,
        config: &RegistryConfig,
        launcher: &ServerLauncher,
    ) -> Result<(Self, Option<ServerProcess>)> {
        let retry = config.connect_retry();
        match env {
            Some(location) => {
                tracing::info!("Using registry at {}", location);
                Ok((Self::new(location, retry), None))
            }
            None => {
                let port = config.server_options(None).port;
                tracing::info!("No registry configured, starting one on port {}", port);
                let (service, process) = Self::start(launcher, port, retry)?;
                Ok((service, Some(process)))
            }
        }
    }

    pub fn location(&self) -> &RegistryLocation {
        &self.location
    }

    pub fn is_connected(&self) -> bool {
        self.session.is_some()
    }

    /// Keep one session open for subsequent calls
    pub fn connect(&mut self) -> Result<()> {
        if self.session.is_none() {
            self.session = Some(RegistryClient::open_location(&self.location, &self.retry)?);
        }
        Ok(())
    }

    /// Close the persistent session, if any
    pub fn disconnect(&mut self) -> Result<bool> {
        match self.session.take() {
            Some(client) => client.close(),
            None => Ok(true),
        }
    }

    fn with_session<T>(&mut self, f: impl FnOnce(&mut RegistryClient) -> Result<T>) -> Result<T> {
        if let Some(client) = self.session.as_mut() {
            let result = f(client);
            if matches!(&result, Err(e) if e.is_transport()) {
                tracing::warn!("Dropping broken registry session to {}", self.location);
                self.session = None;
            }
            return result;
        }

        let mut client = RegistryClient::open_location(&self.location, &self.retry)?;
        let result = f(&mut client);
        if let Err(e) = client.close() {
            tracing::debug!("Closing registry connection failed: {}", e);
        }
        result
    }

    pub fn add_entry(&mut self, fields: &EntryFields) -> Result<EntryId> {
        self.with_session(|client| client.create_entry(fields))
    }

    pub fn delete_entry(&mut self, id: EntryId) -> Result<()> {
        self.with_session(|client| client.delete_entry(id).map(|_| ()))
    }

    pub fn change_entry(&mut self, id: EntryId, patch: &FieldSet) -> Result<()> {
        self.with_session(|client| client.change_entry(id, patch).map(|_| ()))
    }

    pub fn add_string(&mut self, id: EntryId, text: &str) -> Result<usize> {
        self.with_session(|client| client.store_string(id, text))
    }

    pub fn get_entry(&mut self, id: EntryId, with_strings: bool) -> Result<EntryData> {
        self.with_session(|client| {
            let mut data = EntryData::from(client.fill_entry(id)?);
            if with_strings {
                data.strings = fetch_strings(client, id)?;
            }
            Ok(data)
        })
    }

    /// Entries matching `query`; empty strings and numbers `<= 0` match
    /// anything
    pub fn query_entries(
        &mut self,
        query: &FieldSet,
        with_strings: bool,
    ) -> Result<Vec<EntryData>> {
        self.with_session(|client| {
            let records = client.query_entries(query)?;
            let mut entries = Vec::with_capacity(records.len());
            for record in records {
                let id = record.id;
                let mut data = EntryData::from(record);
                if with_strings {
                    data.strings = fetch_strings(client, id)?;
                }
                entries.push(data);
            }
            Ok(entries)
        })
    }
}

/// Strings of an entry, fetched one by one with COUNTSTR + GETSTR
fn fetch_strings(client: &mut RegistryClient, id: EntryId) -> Result<Vec<String>> {
    let count = client.count_strings(id)?;
    (1..=count).map(|pos| client.get_string_at(id, pos)).collect()
}

/// Spawns `psc-regsrv` child processes
#[derive(Debug, Clone)]
pub struct ServerLauncher {
    program: PathBuf,
    args: Vec<String>,
    startup_timeout: Duration,
}

impl ServerLauncher {
    pub const PROGRAM: &'static str = "psc-regsrv";

    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            startup_timeout: Duration::from_secs(10),
        }
    }

    /// Find `psc-regsrv` next to the running executable, then on `PATH`
    pub fn locate() -> Result<Self> {
        let sibling = std::env::current_exe().ok().and_then(|exe| {
            let dir = exe.parent()?;
            let candidate = dir.join(format!("{}{}", Self::PROGRAM, std::env::consts::EXE_SUFFIX));
            candidate.is_file().then_some(candidate)
        });
        if let Some(program) = sibling {
            return Ok(Self::new(program));
        }

        which::which(Self::PROGRAM).map(Self::new).map_err(|e| {
            RegistryError::config(format!("Cannot find {}: {}", Self::PROGRAM, e))
        })
    }

    pub fn program(&self) -> &Path {
        &self.program
    }

    /// Extra argument passed after the port
    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn startup_timeout(mut self, timeout: Duration) -> Self {
        self.startup_timeout = timeout;
        self
    }

    /// Start a server on `port` (0 for ephemeral) and wait for its
    /// announcement
    pub fn spawn(&self, port: u16) -> Result<ServerProcess> {
        let mut child = Command::new(&self.program)
            .arg(port.to_string())
            .args(&self.args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()?;

        let Some(stdout) = child.stdout.take() else {
            let _ = child.kill();
            let _ = child.wait();
            return Err(RegistryError::Server {
                message: "registry server stdout is not available".to_string(),
            });
        };

        let (tx, rx) = mpsc::channel();
        std::thread::spawn(move || {
            let mut announced = false;
            for line in BufReader::new(stdout).lines() {
                let Ok(line) = line else { break };
                if !announced {
                    if let Some(location) = RegistryLocation::from_announcement(&line) {
                        announced = true;
                        let _ = tx.send(location);
                    }
                }
            }
        });

        match rx.recv_timeout(self.startup_timeout) {
            Ok(location) => {
                tracing::info!("Started registry server (pid {}) at {}", child.id(), location);
                Ok(ServerProcess {
                    child: Some(child),
                    location,
                })
            }
            Err(_) => {
                let _ = child.kill();
                let status = child.wait()?;
                Err(RegistryError::Server {
                    message: format!(
                        "{} did not announce its address ({})",
                        self.program.display(),
                        status
                    ),
                })
            }
        }
    }
}

/// A running registry server child; killed on `stop` or drop
#[derive(Debug)]
pub struct ServerProcess {
    child: Option<Child>,
    location: RegistryLocation,
}

impl ServerProcess {
    pub fn location(&self) -> &RegistryLocation {
        &self.location
    }

    pub fn pid(&self) -> Option<u32> {
        self.child.as_ref().map(Child::id)
    }

    pub fn stop(mut self) -> Result<()> {
        self.terminate()
    }

    fn terminate(&mut self) -> Result<()> {
        if let Some(mut child) = self.child.take() {
            if child.try_wait()?.is_none() {
                child.kill()?;
            }
            child.wait()?;
            tracing::info!("Stopped registry server at {}", self.location);
        }
        Ok(())
    }
}

impl Drop for ServerProcess {
    fn drop(&mut self) {
        if let Err(e) = self.terminate() {
            tracing::warn!("Failed to stop registry server: {}", e);
        }
    }
}
