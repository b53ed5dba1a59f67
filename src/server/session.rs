//! Per-connection request loop
//!
//! A session owns its socket halves and a handle to the shared store. Each
//! request is parsed, executed against the store and rendered into a
//! [`Reply`] before anything is written, so store locks are released before
//! the socket is touched.

use std::io;
use std::sync::Arc;

use tokio::io::{AsyncBufRead, AsyncWrite, AsyncWriteExt};

use crate::error::RegistryError;
use crate::net::{read_line_async, LineRead};
use crate::protocol::{
    format_entry_line, msg, render, Command, CommandError, CommandKind, Reply, SERVER_BUILD,
    SERVER_VERSION,
};
use crate::store::EntryStore;

/// Result of handling one request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outcome {
    pub reply: Reply,
    /// The client asked to end the session
    pub close: bool,
}

impl Outcome {
    fn reply(reply: Reply) -> Self {
        Self { reply, close: false }
    }
}

pub struct Session {
    id: String,
    store: Arc<EntryStore>,
    host: String,
    port: u16,
    max_line_len: usize,
}

impl Session {
    /// `host`/`port` are the advertised endpoint shown in the greeting
    pub fn new(
        store: Arc<EntryStore>,
        host: impl Into<String>,
        port: u16,
        max_line_len: usize,
    ) -> Self {
        let uuid = uuid::Uuid::new_v4().simple().to_string();
        Self {
            id: format!("ses_{}", &uuid[..8]),
            store,
            host: host.into(),
            port,
            max_line_len,
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn welcome(&self) -> Reply {
        Reply::ok(render(
            msg::WELCOME,
            &[&self.host, &self.port, &SERVER_VERSION, &SERVER_BUILD],
        ))
    }

    /// Serve requests until QUIT, EOF or a write failure
    pub async fn run<R, W>(&self, mut reader: R, mut writer: W) -> io::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        writer.write_all(self.welcome().encode().as_bytes()).await?;
        writer.flush().await?;

        loop {
            let (line, last) = match read_line_async(&mut reader, self.max_line_len).await? {
                LineRead::Line(line) => (line, false),
                LineRead::Partial(line) => (line, true),
                LineRead::Eof => break,
                LineRead::TooLong => {
                    tracing::warn!(
                        "[{}] Dropped line longer than {} bytes",
                        self.id,
                        self.max_line_len
                    );
                    let reply = Reply::err(format!(
                        "{} line exceeds {} bytes",
                        msg::BAD_FORMAT,
                        self.max_line_len
                    ));
                    writer.write_all(reply.encode().as_bytes()).await?;
                    writer.flush().await?;
                    continue;
                }
            };

            let outcome = self.dispatch(&line);
            writer.write_all(outcome.reply.encode().as_bytes()).await?;
            writer.flush().await?;

            if outcome.close || last {
                break;
            }
        }
        Ok(())
    }

    /// Execute one request line against the store
    pub fn dispatch(&self, line: &str) -> Outcome {
        tracing::debug!("[{}] <- {}", self.id, line);

        let command = match Command::parse(line) {
            Ok(command) => command,
            Err(err) => return Outcome::reply(parse_error_reply(&err)),
        };
        let kind = command.kind();

        match self.execute(command) {
            Ok(outcome) => outcome,
            Err(err) => {
                tracing::debug!("[{}] {} failed: {}", self.id, kind.name(), err);
                Outcome::reply(error_reply(kind, &err))
            }
        }
    }

    fn execute(&self, command: Command) -> Result<Outcome, RegistryError> {
        let store = &self.store;
        let reply = match command {
            Command::Quit => {
                return Ok(Outcome {
                    reply: Reply::ok(render(msg::QUIT_OK, &[&self.host, &self.port])),
                    close: true,
                });
            }
            Command::Help => Reply::ok(msg::HELP_OK).with_body(
                CommandKind::ALL
                    .into_iter()
                    .map(|kind| format!("{:>10} {}", kind.name(), kind.description())),
            ),
            Command::Create(fields) => {
                let id = store.create(&fields)?;
                tracing::info!("[{}] Created entry {}", self.id, id);
                Reply::ok(render(msg::CREATE_OK, &[&id]))
            }
            Command::Search(predicate) => Reply::ok(msg::SEARCH_OK)
                .with_body(store.search(&predicate).iter().map(format_entry_line)),
            Command::Change { id, patch } => {
                store.change(id, &patch)?;
                Reply::ok(render(msg::CHANGE_OK, &[&id]))
            }
            Command::Delete(id) => {
                store.delete(id)?;
                tracing::info!("[{}] Deleted entry {}", self.id, id);
                Reply::ok(render(msg::DELETE_OK, &[&id]))
            }
            Command::List => {
                let records = store.list();
                Reply::ok(render(msg::LIST_OK, &[&records.len()]))
                    .with_body(records.iter().map(format_entry_line))
            }
            Command::Show(id) => {
                let record = store.show(id)?;
                Reply::ok(render(msg::SHOW_OK, &[&id])).with_line(format_entry_line(&record))
            }
            Command::Clean => {
                let count = store.clean();
                tracing::info!("[{}] Cleaned registry ({} entries)", self.id, count);
                Reply::ok(render(msg::CLEAN_OK, &[&count]))
            }
            Command::AddString { id, text } => {
                let pos = store.add_string(id, text)?;
                Reply::ok(render(msg::ADDSTR_OK, &[&pos]))
            }
            Command::GetString { id, pos } => {
                let text = store.get_string(id, pos)?;
                Reply::ok(render(msg::GETSTR_OK, &[&pos, &id, &text.len()])).with_line(text)
            }
            Command::DeleteString { id, pos } => {
                store.delete_string(id, pos)?;
                Reply::ok(render(msg::DELSTR_OK, &[&pos, &id]))
            }
            Command::ListStrings(id) => {
                let strings = store.list_strings(id)?;
                Reply::ok(render(msg::LISTSTR_OK, &[&strings.len(), &id])).with_body(strings)
            }
            Command::CountStrings(id) => {
                let count = store.count_strings(id)?;
                Reply::ok(render(msg::COUNTSTR_OK, &[&count, &id]))
            }
        };
        Ok(Outcome::reply(reply))
    }
}

fn parse_error_reply(err: &CommandError) -> Reply {
    match err {
        CommandError::Unknown(token) => Reply::err(render(msg::UNKNOWN_COMMAND, &[token])),
        CommandError::BadFormat { kind, .. } => {
            Reply::err_with_usage(msg::BAD_FORMAT, kind.usage())
        }
        CommandError::Incomplete { kind, .. } => {
            Reply::err_with_usage(msg::INCOMPLETE_DATA, kind.usage())
        }
    }
}

fn error_reply(kind: CommandKind, err: &RegistryError) -> Reply {
    match err {
        RegistryError::EntryNotFound { .. } => Reply::err(msg::ENTRY_NOT_FOUND),
        RegistryError::StringNotFound { .. } => Reply::err(msg::STRING_NOT_FOUND),
        RegistryError::IncompleteData { .. } => {
            Reply::err_with_usage(msg::INCOMPLETE_DATA, kind.usage())
        }
        _ => Reply::err_with_usage(msg::BAD_FORMAT, kind.usage()),
    }
}
