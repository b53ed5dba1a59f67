//! Tracing setup shared by both binaries
//!
//! Filter precedence: `RUST_LOG`, then the numeric `PERISCOPE_INFO` debug
//! level, then the configured level. Logs go to stderr.

use tracing_subscriber::EnvFilter;

/// Environment variable holding the numeric debug level
pub const DEBUG_LEVEL_ENV: &str = "PERISCOPE_INFO";

/// Map a numeric debug level onto a tracing level name
pub fn level_for_debug(level: u32) -> &'static str {
    match level {
        0 => "warn",
        1..=2 => "info",
        3..=5 => "debug",
        _ => "trace",
    }
}

/// Level used when `RUST_LOG` is unset
pub fn effective_level(debug_env: Option<&str>, configured: &str) -> String {
    debug_env
        .and_then(|value| value.trim().parse::<u32>().ok())
        .map(|level| level_for_debug(level).to_string())
        .unwrap_or_else(|| configured.to_string())
}

fn build_filter(configured: &str) -> EnvFilter {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return filter;
    }
    let debug_env = std::env::var(DEBUG_LEVEL_ENV).ok();
    let level = effective_level(debug_env.as_deref(), configured);
    EnvFilter::try_new(format!("psc_registry={level},psc_regsrv={level}"))
        .unwrap_or_else(|_| EnvFilter::new("psc_registry=info,psc_regsrv=info"))
}

/// Install the global subscriber. Calling it twice is harmless.
pub fn init(configured_level: &str) {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(build_filter(configured_level))
        .with_writer(std::io::stderr)
        .try_init();
}
