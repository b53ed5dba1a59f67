//! Periscope registry: a network directory of running tool components
//!
//! Distributed Periscope agents register themselves (application, site,
//! machine, node, port, pid, component and tag) with a small TCP server and
//! find each other again by searching on any subset of those fields. Each
//! entry can also carry an ordered list of free-text strings.
//!
//! # Components
//!
//! - [`protocol`]: the line-oriented text protocol (`+OK` / `-ERR`)
//! - [`store`]: the in-memory entry table
//! - [`server`]: async TCP server, one task per connection
//! - [`client`]: blocking request/response client
//! - [`service`]: connection-per-call facade and server launcher
//!
//! # Example
//!
//! ```no_run
//! use psc_registry::client::RegistryClient;
//! use psc_registry::store::EntryFields;
//!
//! # fn main() -> psc_registry::Result<()> {
//! let mut client = RegistryClient::open("localhost", 50001)?;
//! let id = client.create_entry(&EntryFields {
//!     app: "lulesh".into(),
//!     site: "lrz".into(),
//!     mach: "supermuc".into(),
//!     node: "node01".into(),
//!     port: 50002,
//!     pid: 4711,
//!     comp: "aagent".into(),
//!     tag: "leaf".into(),
//! })?;
//! client.store_string(id, "ready")?;
//! client.close()?;
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod client;
pub mod config;
pub mod error;
pub mod logging;
pub mod net;
pub mod protocol;
pub mod server;
pub mod service;
pub mod store;

// Re-export commonly used types
pub use client::RegistryClient;
pub use config::{RegistryConfig, RegistryLocation};
pub use error::{RegistryError, Result};
pub use net::{BindRetry, ConnectRetry};
pub use server::{RegistryServer, ServerOptions};
pub use service::{EntryData, RegistryService, ServerLauncher, ServerProcess};
pub use store::{EntryFields, EntryId, EntryRecord, EntryStore, FieldSet};
