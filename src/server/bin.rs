//! Periscope Registry Server Binary
//!
//! # Usage
//!
//! ```bash
//! psc-regsrv              # port from PSC_REGISTRY or ~/.periscope.toml
//! psc-regsrv 50001
//! psc-regsrv 0 --host 127.0.0.1 --write-config
//! ```
//!
//! Once listening, the server prints `PSC_REGISTRY=<host>:<port>` on stdout.

use std::io::Write;
use std::path::PathBuf;

use anyhow::Context;
use clap::Parser;

use psc_registry::config::{RegistryConfig, RegistryLocation};
use psc_registry::logging;
use psc_registry::server::RegistryServer;

/// Periscope registry server
#[derive(Parser, Debug)]
#[command(name = "psc-regsrv")]
#[command(version)]
#[command(about = "Periscope registry server")]
struct Args {
    /// First port to try (0 for an ephemeral port)
    port: Option<u16>,

    /// Address to bind to
    #[arg(long)]
    host: Option<String>,

    /// Host name announced to clients
    #[arg(long)]
    advertise: Option<String>,

    /// Configuration file (default: ~/.periscope.toml)
    #[arg(long)]
    config: Option<PathBuf>,

    /// Record the bound address in the configuration file
    #[arg(long)]
    write_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let mut config = RegistryConfig::load_or_default(args.config.as_deref())?;
    logging::init(&config.logging.level);

    let env_location = RegistryLocation::from_env()?;
    let port = args.port.or(env_location.map(|location| location.port));

    let mut options = config.server_options(port);
    if let Some(host) = args.host {
        options.host = host;
    }
    if let Some(advertise) = args.advertise {
        options.advertise = Some(advertise);
    }

    let server = RegistryServer::bind(&options).await.with_context(|| {
        format!(
            "Failed to bind registry server on {}:{}",
            options.host, options.port
        )
    })?;

    let (host, port) = server.endpoint();
    let location = RegistryLocation::new(host, port);

    if args.write_config {
        let path = args
            .config
            .clone()
            .or_else(RegistryConfig::default_path)
            .context("No configuration path available")?;
        config.record_server_address(&location.host, location.port);
        config.save_to(&path)?;
        tracing::info!("Recorded {} in {}", location, path.display());
    }

    let mut stdout = std::io::stdout();
    writeln!(stdout, "{}", location.announcement())?;
    stdout.flush()?;

    server
        .run_until(async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::error!("Failed to listen for shutdown signal: {}", e);
                std::future::pending::<()>().await;
            }
        })
        .await;

    Ok(())
}
