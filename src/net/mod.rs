//! Socket plumbing: bounded bind/connect retries and line framing

pub mod line;
pub mod retry;

pub use line::{decode_line, read_line, read_line_async, LineRead};
pub use retry::{bind_with_retry, connect_with_retry, BindRetry, ConnectRetry};

/// Default upper bound for a single protocol line
pub const DEFAULT_MAX_LINE_LEN: usize = 1 << 20;
