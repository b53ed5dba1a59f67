//! Blocking registry client
//!
//! One `RegistryClient` is one TCP session. Every method sends a single
//! request, waits for the complete response and maps `-ERR` replies onto
//! [`RegistryError`] variants.
//!
//! ```no_run
//! use psc_registry::client::RegistryClient;
//! use psc_registry::store::FieldSet;
//!
//! # fn main() -> psc_registry::Result<()> {
//! let mut client = RegistryClient::open("localhost", 50001)?;
//! for entry in client.query_entries(&FieldSet::new().comp("aagent"))? {
//!     println!("{} on {}:{}", entry.id, entry.fields.node, entry.fields.port);
//! }
//! client.close()?;
//! # Ok(())
//! # }
//! ```

use std::io::{BufReader, Write};
use std::net::TcpStream;

use crate::config::RegistryLocation;
use crate::error::{RegistryError, Result};
use crate::net::{connect_with_retry, read_line, ConnectRetry, LineRead};
use crate::protocol::{
    is_encodable, msg, parse_entry_line, parse_status, scan, unstuff, Command, CommandKind,
    Status, END_OF_MULTILINE,
};
use crate::store::{EntryFields, EntryId, EntryRecord, Field, FieldSet};

pub struct RegistryClient {
    host: String,
    port: u16,
    reader: BufReader<TcpStream>,
    writer: TcpStream,
    welcome: String,
}

impl RegistryClient {
    /// Connect with the default retry policy
    pub fn open(host: &str, port: u16) -> Result<Self> {
        Self::connect(host, port, &ConnectRetry::default())
    }

    pub fn open_location(location: &RegistryLocation, retry: &ConnectRetry) -> Result<Self> {
        Self::connect(&location.host, location.port, retry)
    }

    /// Connect and consume the welcome line
    pub fn connect(host: &str, port: u16, retry: &ConnectRetry) -> Result<Self> {
        let stream = connect_with_retry(host, port, retry)?;
        let writer = stream.try_clone()?;
        let mut client = Self {
            host: host.to_string(),
            port,
            reader: BufReader::new(stream),
            writer,
            welcome: String::new(),
        };

        let line = client.read_line()?;
        match parse_status(&line) {
            Some(Status::Ok(payload)) => client.welcome = payload.to_string(),
            _ => return Err(RegistryError::Protocol { line }),
        }
        tracing::debug!("Connected to registry at {}:{}", host, port);
        Ok(client)
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    /// Greeting payload sent by the server
    pub fn welcome(&self) -> &str {
        &self.welcome
    }

    /// Send QUIT; `Ok(false)` when the server did not confirm it
    pub fn close(mut self) -> Result<bool> {
        self.send(&Command::Quit)?;
        let confirmed = match self.read_line() {
            Ok(line) => matches!(parse_status(&line), Some(Status::Ok(_))),
            Err(RegistryError::Disconnected) => false,
            Err(e) => return Err(e),
        };
        tracing::debug!("Closed registry session {}:{}", self.host, self.port);
        Ok(confirmed)
    }

    pub fn create_entry(&mut self, fields: &EntryFields) -> Result<EntryId> {
        let set = FieldSet::from(fields);
        check_fields(&set)?;
        let payload = self.request(&Command::Create(set))?;
        first_value(msg::CREATE_OK, &payload)
    }

    /// Partial update; `port`/`pid` values `<= 0` leave the old value
    pub fn change_entry(&mut self, id: EntryId, patch: &FieldSet) -> Result<EntryId> {
        check_fields(patch)?;
        let payload = self.request(&Command::Change {
            id,
            patch: patch.clone(),
        })?;
        first_value(msg::CHANGE_OK, &payload)
    }

    pub fn delete_entry(&mut self, id: EntryId) -> Result<EntryId> {
        let payload = self.request(&Command::Delete(id))?;
        first_value(msg::DELETE_OK, &payload)
    }

    /// Id of the first entry matching `predicate`
    pub fn open_entry(&mut self, predicate: &FieldSet) -> Result<Option<EntryId>> {
        Ok(self
            .query_entries(predicate)?
            .first()
            .map(|record| record.id))
    }

    /// All entries matching `predicate`; empty strings and numbers `<= 0`
    /// are wildcards
    pub fn query_entries(&mut self, predicate: &FieldSet) -> Result<Vec<EntryRecord>> {
        check_fields(predicate)?;
        self.request(&Command::Search(predicate.clone()))?;
        self.read_entries()
    }

    pub fn list_entries(&mut self) -> Result<Vec<EntryRecord>> {
        self.request(&Command::List)?;
        self.read_entries()
    }

    pub fn fill_entry(&mut self, id: EntryId) -> Result<EntryRecord> {
        self.request(&Command::Show(id))?;
        let line = self.read_line()?;
        parse_entry_line(&line).ok_or(RegistryError::Protocol { line })
    }

    /// Delete every entry; returns how many were removed
    pub fn clean(&mut self) -> Result<usize> {
        let payload = self.request(&Command::Clean)?;
        first_value(msg::CLEAN_OK, &payload)
    }

    /// Attach `text` to an entry, returning its 1-based position
    pub fn store_string(&mut self, id: EntryId, text: &str) -> Result<usize> {
        if text.is_empty() {
            return Err(RegistryError::bad_format("string must not be empty"));
        }
        check_text("string", text)?;
        let payload = self.request(&Command::AddString {
            id,
            text: text.to_string(),
        })?;
        first_value(msg::ADDSTR_OK, &payload)
    }

    pub fn count_strings(&mut self, id: EntryId) -> Result<usize> {
        let payload = self.request(&Command::CountStrings(id))?;
        first_value(msg::COUNTSTR_OK, &payload)
    }

    pub fn get_string_at(&mut self, id: EntryId, pos: usize) -> Result<String> {
        self.request(&Command::GetString { id, pos })?;
        self.read_line()
    }

    pub fn delete_string(&mut self, id: EntryId, pos: usize) -> Result<()> {
        self.request(&Command::DeleteString { id, pos })?;
        Ok(())
    }

    pub fn list_strings(&mut self, id: EntryId) -> Result<Vec<String>> {
        self.request(&Command::ListStrings(id))?;
        self.read_body()
    }

    /// Command summary lines as sent by the server
    pub fn help(&mut self) -> Result<Vec<String>> {
        self.request(&Command::Help)?;
        self.read_body()
    }

    /// Send `line` verbatim and return every response line, status first.
    ///
    /// The line is parsed locally only to know how the response is framed.
    pub fn raw(&mut self, line: &str) -> Result<Vec<String>> {
        if line.contains(['\r', '\n']) {
            return Err(RegistryError::bad_format("request must be a single line"));
        }
        self.send_line(line)?;
        let status = self.read_line()?;
        let ok = matches!(parse_status(&status), Some(Status::Ok(_)));
        let mut lines = vec![status];

        let kind = Command::parse(line).ok().map(|command| command.kind());
        match kind {
            Some(CommandKind::Show | CommandKind::GetString) if ok => {
                lines.push(self.read_line()?);
            }
            Some(
                CommandKind::Help
                | CommandKind::Search
                | CommandKind::List
                | CommandKind::ListStrings,
            ) if ok => {
                lines.extend(self.read_body()?);
            }
            _ => {}
        }
        Ok(lines)
    }

    fn send(&mut self, command: &Command) -> Result<()> {
        self.send_line(&command.encode())
    }

    fn send_line(&mut self, line: &str) -> Result<()> {
        tracing::trace!("-> {}", line);
        self.writer.write_all(line.as_bytes())?;
        self.writer.write_all(b"\n")?;
        self.writer.flush()?;
        Ok(())
    }

    fn read_line(&mut self) -> Result<String> {
        // The server bounds what it stores, so replies are read whole
        match read_line(&mut self.reader, usize::MAX)? {
            LineRead::Line(line) | LineRead::Partial(line) => {
                tracing::trace!("<- {}", line);
                Ok(line)
            }
            LineRead::Eof => Err(RegistryError::Disconnected),
            LineRead::TooLong => Err(RegistryError::Protocol {
                line: "response line too long".to_string(),
            }),
        }
    }

    /// Send a request and return the `+OK` payload
    fn request(&mut self, command: &Command) -> Result<String> {
        self.send(command)?;
        let line = self.read_line()?;
        match parse_status(&line) {
            Some(Status::Ok(payload)) => Ok(payload.to_string()),
            Some(Status::Err(message)) => Err(classify_error(message, command)),
            None => Err(RegistryError::Protocol { line }),
        }
    }

    /// Body lines up to the terminator, unstuffed
    fn read_body(&mut self) -> Result<Vec<String>> {
        let mut lines = Vec::new();
        loop {
            let line = self.read_line()?;
            if line == END_OF_MULTILINE {
                return Ok(lines);
            }
            lines.push(unstuff(&line).to_string());
        }
    }

    fn read_entries(&mut self) -> Result<Vec<EntryRecord>> {
        self.read_body()?
            .into_iter()
            .map(|line| parse_entry_line(&line).ok_or(RegistryError::Protocol { line }))
            .collect()
    }
}

/// Map an `-ERR` payload onto an error for the request that caused it
fn classify_error(message: &str, command: &Command) -> RegistryError {
    let (id, pos) = match *command {
        Command::Change { id, .. }
        | Command::Delete(id)
        | Command::Show(id)
        | Command::AddString { id, .. }
        | Command::ListStrings(id)
        | Command::CountStrings(id) => (id, 0),
        Command::GetString { id, pos } | Command::DeleteString { id, pos } => (id, pos),
        _ => (0, 0),
    };

    if message.starts_with(msg::ENTRY_NOT_FOUND) {
        RegistryError::EntryNotFound { id }
    } else if message.starts_with(msg::STRING_NOT_FOUND) {
        RegistryError::StringNotFound { id, pos }
    } else if message.starts_with(msg::INCOMPLETE_DATA) {
        RegistryError::IncompleteData {
            message: message.to_string(),
        }
    } else if message.starts_with(msg::BAD_FORMAT) {
        RegistryError::bad_format(message)
    } else if let Some(token) = scan_unknown(message) {
        RegistryError::UnknownCommand {
            command: token.to_string(),
        }
    } else {
        RegistryError::Server {
            message: message.to_string(),
        }
    }
}

fn scan_unknown(message: &str) -> Option<&str> {
    let prefix = msg::UNKNOWN_COMMAND.strip_suffix("{}")?;
    message.strip_prefix(prefix)
}

fn first_value<T: TryFrom<i64>>(template: &str, payload: &str) -> Result<T> {
    scan(template, payload)
        .and_then(|values| values.first().copied())
        .and_then(|value| T::try_from(value).ok())
        .ok_or_else(|| RegistryError::Protocol {
            line: format!("+OK {}", payload),
        })
}

fn check_text(what: &str, value: &str) -> Result<()> {
    if is_encodable(value) {
        Ok(())
    } else {
        Err(RegistryError::bad_format(format!(
            "{} must not contain quotes or line breaks",
            what
        )))
    }
}

fn check_fields(set: &FieldSet) -> Result<()> {
    for field in Field::ALL {
        if let Some(text) = set.text(field) {
            check_text(field.name(), text)?;
        }
    }
    Ok(())
}
