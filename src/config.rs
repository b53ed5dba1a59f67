//! Registry configuration
//!
//! Settings live in a TOML file, by default `~/.periscope.toml`:
//!
//! ```toml
//! [registry]
//! host = "localhost"     # where clients connect
//! port = 50001
//! init_port = 50001      # first port the server tries to bind
//!
//! [server]
//! host = "0.0.0.0"
//! bind_retries = 10
//! max_port_step = 16
//!
//! [client]
//! connect_attempts = 10
//! connect_delay_ms = 100
//!
//! [logging]
//! level = "info"
//! ```
//!
//! The `PSC_REGISTRY=host:port` environment variable takes precedence over
//! the `[registry]` section.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{RegistryError, Result};
use crate::net::{BindRetry, ConnectRetry, DEFAULT_MAX_LINE_LEN};
use crate::server::ServerOptions;

/// Environment variable naming the registry endpoint
pub const REGISTRY_ENV: &str = "PSC_REGISTRY";

const CONFIG_FILE_NAME: &str = ".periscope.toml";

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryConfig {
    #[serde(default)]
    pub registry: EndpointConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub client: ClientConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where the registry server runs
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndpointConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_port")]
    pub port: u16,

    /// Host name a freshly started server announces, if different from the
    /// machine's own name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_host: Option<String>,

    /// First port a freshly started server tries
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub init_port: Option<u16>,
}

fn default_host() -> String {
    "localhost".to_string()
}

fn default_port() -> u16 {
    50001
}

impl Default for EndpointConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            init_host: None,
            init_port: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address
    #[serde(default = "default_bind_host")]
    pub host: String,

    #[serde(default = "default_bind_retries")]
    pub bind_retries: u32,

    #[serde(default = "default_max_port_step")]
    pub max_port_step: u16,

    /// Longest accepted request line in bytes
    #[serde(default = "default_max_line_len")]
    pub max_line_len: usize,
}

fn default_bind_host() -> String {
    "0.0.0.0".to_string()
}

fn default_bind_retries() -> u32 {
    BindRetry::default().retries
}

fn default_max_port_step() -> u16 {
    BindRetry::default().max_step
}

fn default_max_line_len() -> usize {
    DEFAULT_MAX_LINE_LEN
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_bind_host(),
            bind_retries: default_bind_retries(),
            max_port_step: default_max_port_step(),
            max_line_len: default_max_line_len(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClientConfig {
    #[serde(default = "default_connect_attempts")]
    pub connect_attempts: u32,

    #[serde(default = "default_connect_delay_ms")]
    pub connect_delay_ms: u64,
}

fn default_connect_attempts() -> u32 {
    ConnectRetry::default().attempts
}

fn default_connect_delay_ms() -> u64 {
    ConnectRetry::default().delay.as_millis() as u64
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            connect_attempts: default_connect_attempts(),
            connect_delay_ms: default_connect_delay_ms(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level (error, warn, info, debug, trace)
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

const LOG_LEVELS: [&str; 5] = ["error", "warn", "info", "debug", "trace"];

impl RegistryConfig {
    /// `~/.periscope.toml`, if a home directory is known
    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(CONFIG_FILE_NAME))
    }

    /// Load from the default path; defaults when there is no file
    pub fn load() -> Result<Self> {
        match Self::default_path() {
            Some(path) => Self::load_from(&path),
            None => Ok(Self::default()),
        }
    }

    /// Load from `path`, or from the default path when `None`
    pub fn load_or_default(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(path) => Self::load_from(path),
            None => Self::load(),
        }
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let content = fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| {
            RegistryError::config(format!("Failed to parse {}: {}", path.display(), e))
        })
    }

    /// Write atomically: temp file next to `path`, then rename over it
    pub fn save_to(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let content = toml::to_string_pretty(self)
            .map_err(|e| RegistryError::config(format!("Failed to serialize config: {}", e)))?;

        let temp_path = path.with_extension("tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;
        Ok(())
    }

    /// Get a value by key path (e.g. `registry.port`)
    pub fn get(&self, key: &str) -> Option<String> {
        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["registry", "host"] => Some(self.registry.host.clone()),
            ["registry", "port"] => Some(self.registry.port.to_string()),
            ["registry", "init_host"] => self.registry.init_host.clone(),
            ["registry", "init_port"] => self.registry.init_port.map(|p| p.to_string()),
            ["server", "host"] => Some(self.server.host.clone()),
            ["server", "bind_retries"] => Some(self.server.bind_retries.to_string()),
            ["server", "max_port_step"] => Some(self.server.max_port_step.to_string()),
            ["server", "max_line_len"] => Some(self.server.max_line_len.to_string()),
            ["client", "connect_attempts"] => Some(self.client.connect_attempts.to_string()),
            ["client", "connect_delay_ms"] => Some(self.client.connect_delay_ms.to_string()),
            ["logging", "level"] => Some(self.logging.level.clone()),
            _ => None,
        }
    }

    /// Set a value by key path
    pub fn set(&mut self, key: &str, value: &str) -> Result<()> {
        fn number<T: FromStr>(key: &str, value: &str) -> Result<T> {
            value
                .parse()
                .map_err(|_| RegistryError::config(format!("Invalid value for {}: {}", key, value)))
        }

        let parts: Vec<&str> = key.split('.').collect();
        match parts.as_slice() {
            ["registry", "host"] => self.registry.host = value.to_string(),
            ["registry", "port"] => self.registry.port = number(key, value)?,
            ["registry", "init_host"] => {
                self.registry.init_host = (!value.is_empty()).then(|| value.to_string());
            }
            ["registry", "init_port"] => {
                self.registry.init_port = if value.is_empty() {
                    None
                } else {
                    Some(number(key, value)?)
                };
            }
            ["server", "host"] => self.server.host = value.to_string(),
            ["server", "bind_retries"] => self.server.bind_retries = number(key, value)?,
            ["server", "max_port_step"] => self.server.max_port_step = number(key, value)?,
            ["server", "max_line_len"] => self.server.max_line_len = number(key, value)?,
            ["client", "connect_attempts"] => self.client.connect_attempts = number(key, value)?,
            ["client", "connect_delay_ms"] => self.client.connect_delay_ms = number(key, value)?,
            ["logging", "level"] => {
                if !LOG_LEVELS.contains(&value) {
                    return Err(RegistryError::config(format!(
                        "Invalid log level: {}. Must be one of: {}",
                        value,
                        LOG_LEVELS.join(", ")
                    )));
                }
                self.logging.level = value.to_string();
            }
            _ => {
                return Err(RegistryError::config(format!(
                    "Unknown configuration key: {}",
                    key
                )));
            }
        }
        Ok(())
    }

    /// Configuration rendered as TOML
    pub fn display(&self) -> Result<String> {
        toml::to_string_pretty(self)
            .map_err(|e| RegistryError::config(format!("Failed to serialize config: {}", e)))
    }

    pub fn connect_retry(&self) -> ConnectRetry {
        ConnectRetry {
            attempts: self.client.connect_attempts,
            delay: Duration::from_millis(self.client.connect_delay_ms),
        }
    }

    pub fn bind_retry(&self) -> BindRetry {
        BindRetry {
            retries: self.server.bind_retries,
            max_step: self.server.max_port_step,
        }
    }

    /// Listening options for a server starting at `port`, or at the
    /// configured initial port
    pub fn server_options(&self, port: Option<u16>) -> ServerOptions {
        let port = port
            .or(self.registry.init_port)
            .unwrap_or(self.registry.port);
        ServerOptions {
            host: self.server.host.clone(),
            port,
            advertise: self.registry.init_host.clone(),
            bind_retry: self.bind_retry(),
            max_line_len: self.server.max_line_len,
        }
    }

    /// Remember where a server ended up listening
    pub fn record_server_address(&mut self, host: &str, port: u16) {
        self.registry.host = host.to_string();
        self.registry.port = port;
    }

    /// Registry endpoint: `env` (the `PSC_REGISTRY` value) if set, the
    /// `[registry]` section otherwise
    pub fn resolve_location(&self, env: Option<&str>) -> Result<RegistryLocation> {
        match env {
            Some(value) => value.parse(),
            None => Ok(RegistryLocation::new(
                self.registry.host.clone(),
                self.registry.port,
            )),
        }
    }
}

/// A registry endpoint, written `host:port`
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RegistryLocation {
    pub host: String,
    pub port: u16,
}

impl RegistryLocation {
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }

    /// `PSC_REGISTRY=host:port`, the line a server prints once it listens
    pub fn announcement(&self) -> String {
        format!("{}={}", REGISTRY_ENV, self)
    }

    pub fn from_announcement(line: &str) -> Option<Self> {
        line.trim()
            .strip_prefix(REGISTRY_ENV)?
            .strip_prefix('=')?
            .parse()
            .ok()
    }

    /// Read `PSC_REGISTRY`; `Ok(None)` when it is not set
    pub fn from_env() -> Result<Option<Self>> {
        match std::env::var(REGISTRY_ENV) {
            Ok(value) => value.parse().map(Some),
            Err(std::env::VarError::NotPresent) => Ok(None),
            Err(e) => Err(RegistryError::config(format!("{}: {}", REGISTRY_ENV, e))),
        }
    }
}

impl FromStr for RegistryLocation {
    type Err = RegistryError;

    fn from_str(s: &str) -> Result<Self> {
        let invalid = || {
            RegistryError::config(format!(
                "Invalid registry location `{}`, expected host:port",
                s
            ))
        };

        let (host, port) = s.trim().rsplit_once(':').ok_or_else(invalid)?;
        if host.is_empty() {
            return Err(invalid());
        }
        let port = port.parse::<u16>().map_err(|_| invalid())?;
        Ok(Self::new(host, port))
    }
}

impl fmt::Display for RegistryLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
