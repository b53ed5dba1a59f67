//! Registry wire protocol
//!
//! Plain text over TCP, one request per line:
//!
//! 1. On connect the server sends a `+OK` welcome line
//! 2. The client sends `COMMAND [args...]\n`
//! 3. The server answers with a status line starting with `+OK` or `-ERR`,
//!    optionally followed by a body
//!
//! Multi-line bodies (HELP, LIST, SEARCH, LISTSTR) end with a line holding a
//! single `.`; SHOW and GETSTR send exactly one unframed data line.

pub mod command;
pub mod grammar;
pub mod reply;

pub use command::{Command, CommandError, CommandKind};
pub use grammar::{encode_field_set, is_encodable, GrammarError};
pub use reply::{
    format_entry_line, msg, parse_entry_line, parse_status, render, scan, stuff, unstuff, Reply,
    Status,
};

pub const PREFIX_SUCCESS: &str = "+OK";
pub const PREFIX_ERROR: &str = "-ERR";
pub const END_OF_MULTILINE: &str = ".";

/// Version string sent in the welcome line
pub const SERVER_VERSION: &str = env!("CARGO_PKG_VERSION");

/// Build tag sent in the welcome line
pub const SERVER_BUILD: &str = "-";
