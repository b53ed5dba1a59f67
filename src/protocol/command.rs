//! Request commands
//!
//! `Command::parse` is what the server runs on every request line;
//! `Command::encode` is what the client sends. Both sides share the grammar
//! in [`super::grammar`].

use thiserror::Error;

use super::grammar::{
    encode_field_set, parse_field_set, parse_text_argument, split_token, GrammarError,
};
use crate::store::{EntryId, FieldSet};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CommandKind {
    Quit,
    Help,
    Create,
    Search,
    Change,
    Delete,
    List,
    Show,
    Clean,
    AddString,
    GetString,
    DeleteString,
    ListStrings,
    CountStrings,
}

impl CommandKind {
    /// Every command, in HELP order
    pub const ALL: [CommandKind; 14] = [
        CommandKind::Quit,
        CommandKind::Help,
        CommandKind::Create,
        CommandKind::Search,
        CommandKind::Change,
        CommandKind::Delete,
        CommandKind::List,
        CommandKind::Show,
        CommandKind::Clean,
        CommandKind::AddString,
        CommandKind::GetString,
        CommandKind::DeleteString,
        CommandKind::ListStrings,
        CommandKind::CountStrings,
    ];

    pub fn name(self) -> &'static str {
        match self {
            CommandKind::Quit => "QUIT",
            CommandKind::Help => "HELP",
            CommandKind::Create => "CREATE",
            CommandKind::Search => "SEARCH",
            CommandKind::Change => "CHANGE",
            CommandKind::Delete => "DELETE",
            CommandKind::List => "LIST",
            CommandKind::Show => "SHOW",
            CommandKind::Clean => "CLEAN",
            CommandKind::AddString => "ADDSTR",
            CommandKind::GetString => "GETSTR",
            CommandKind::DeleteString => "DELSTR",
            CommandKind::ListStrings => "LISTSTR",
            CommandKind::CountStrings => "COUNTSTR",
        }
    }

    /// Case-insensitive lookup; `DEL` is accepted for `DELETE`
    pub fn from_token(token: &str) -> Option<Self> {
        if token.eq_ignore_ascii_case("DEL") {
            return Some(CommandKind::Delete);
        }
        Self::ALL
            .into_iter()
            .find(|kind| kind.name().eq_ignore_ascii_case(token))
    }

    pub fn description(self) -> &'static str {
        match self {
            CommandKind::Quit => "terminates the connection",
            CommandKind::Help => "shows this message",
            CommandKind::Create => "creates a new entry",
            CommandKind::Search => "searches for entries",
            CommandKind::Change => "changes an existing entry",
            CommandKind::Delete => "deletes an entry",
            CommandKind::List => "lists all entries",
            CommandKind::Show => "shows a specific entry",
            CommandKind::Clean => "deletes all entries (** DEBUGGING / use with care **)",
            CommandKind::AddString => "adds a string to an entry",
            CommandKind::GetString => "retrieves a specific string",
            CommandKind::DeleteString => "deletes the specified string",
            CommandKind::ListStrings => "lists all string for the specified entry",
            CommandKind::CountStrings => {
                "counts the number of available strings for the specified entry"
            }
        }
    }

    pub fn usage(self) -> &'static str {
        match self {
            CommandKind::Quit => "Usage: QUIT",
            CommandKind::Help => "Usage: HELP",
            CommandKind::Create => {
                "Usage: CREATE app=<app_name> site=<site_name> mach=<mach_name> node=<node_name> port=<port> pid=<pid> comp=<component> tag=<tag>"
            }
            CommandKind::Search => {
                "Usage: SEARCH [app=<app_name>] [site=<site_name>] [mach=<mach_name>] [node=<node_name>] [port=<port>] [pid=<pid>] [comp=<component>] [tag=<tag>]"
            }
            CommandKind::Change => {
                "Usage: CHANGE <entry id> [app=<app_name>] [site=<site_name>] [mach=<mach_name>] [node=<node_name>] [port=<port>] [pid=<pid>] [comp=<component>] [tag=<tag>]"
            }
            CommandKind::Delete => "Usage: DELETE <entry id>",
            CommandKind::List => "Usage: LIST",
            CommandKind::Show => "Usage: SHOW <entry id>",
            CommandKind::Clean => "Usage: CLEAN",
            CommandKind::AddString => "Usage: ADDSTR <entry id> <string>",
            CommandKind::GetString => "Usage: GETSTR <entry id> <string id>",
            CommandKind::DeleteString => "Usage: DELSTR <entry id> <string id>",
            CommandKind::ListStrings => "Usage: LISTSTR <entry id>",
            CommandKind::CountStrings => "Usage: COUNTSTR <entry id>",
        }
    }
}

/// A parsed request line
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    Help,
    Create(FieldSet),
    Search(FieldSet),
    Change { id: EntryId, patch: FieldSet },
    Delete(EntryId),
    List,
    Show(EntryId),
    Clean,
    AddString { id: EntryId, text: String },
    GetString { id: EntryId, pos: usize },
    DeleteString { id: EntryId, pos: usize },
    ListStrings(EntryId),
    CountStrings(EntryId),
}

/// Why a request line could not be turned into a `Command`
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum CommandError {
    #[error("unknown command: {0}")]
    Unknown(String),

    #[error("bad format for {}: {reason}", kind.name())]
    BadFormat { kind: CommandKind, reason: String },

    #[error("incomplete data for {}: {reason}", kind.name())]
    Incomplete { kind: CommandKind, reason: String },
}

fn bad_format(kind: CommandKind, reason: impl ToString) -> CommandError {
    CommandError::BadFormat {
        kind,
        reason: reason.to_string(),
    }
}

/// Positive decimal id or position
fn parse_positive<T>(token: &str) -> Option<T>
where
    T: std::str::FromStr + Default + PartialEq,
{
    if token.is_empty() || !token.bytes().all(|b| b.is_ascii_digit()) {
        return None;
    }
    token.parse::<T>().ok().filter(|value| *value != T::default())
}

fn parse_id(kind: CommandKind, rest: &str) -> Result<(EntryId, &str), CommandError> {
    let (token, rest) = split_token(rest);
    match parse_positive(token) {
        Some(id) => Ok((id, rest)),
        None if token.is_empty() => Err(bad_format(kind, "missing entry id")),
        None => Err(bad_format(kind, format!("invalid entry id `{token}`"))),
    }
}

fn parse_pos(kind: CommandKind, rest: &str) -> Result<usize, CommandError> {
    let (token, _) = split_token(rest);
    match parse_positive(token) {
        Some(pos) => Ok(pos),
        None if token.is_empty() => Err(bad_format(kind, "missing string id")),
        None => Err(bad_format(kind, format!("invalid string id `{token}`"))),
    }
}

/// Field pairs; invalid numbers are IncompleteData where `strict` is set
fn parse_fields(kind: CommandKind, rest: &str, strict: bool) -> Result<FieldSet, CommandError> {
    parse_field_set(rest).map_err(|err: GrammarError| {
        if strict && err.is_invalid_value() {
            CommandError::Incomplete {
                kind,
                reason: err.to_string(),
            }
        } else {
            bad_format(kind, err)
        }
    })
}

impl Command {
    pub fn kind(&self) -> CommandKind {
        match self {
            Command::Quit => CommandKind::Quit,
            Command::Help => CommandKind::Help,
            Command::Create(_) => CommandKind::Create,
            Command::Search(_) => CommandKind::Search,
            Command::Change { .. } => CommandKind::Change,
            Command::Delete(_) => CommandKind::Delete,
            Command::List => CommandKind::List,
            Command::Show(_) => CommandKind::Show,
            Command::Clean => CommandKind::Clean,
            Command::AddString { .. } => CommandKind::AddString,
            Command::GetString { .. } => CommandKind::GetString,
            Command::DeleteString { .. } => CommandKind::DeleteString,
            Command::ListStrings(_) => CommandKind::ListStrings,
            Command::CountStrings(_) => CommandKind::CountStrings,
        }
    }

    /// Parse one request line (without its line terminator).
    ///
    /// Trailing tokens after the last expected argument are ignored.
    pub fn parse(line: &str) -> Result<Command, CommandError> {
        let (token, rest) = split_token(line);
        let kind =
            CommandKind::from_token(token).ok_or_else(|| CommandError::Unknown(token.to_string()))?;

        let command = match kind {
            CommandKind::Quit => Command::Quit,
            CommandKind::Help => Command::Help,
            CommandKind::List => Command::List,
            CommandKind::Clean => Command::Clean,
            CommandKind::Create => Command::Create(parse_fields(kind, rest, true)?),
            CommandKind::Search => Command::Search(parse_fields(kind, rest, false)?),
            CommandKind::Change => {
                let (id, rest) = parse_id(kind, rest)?;
                Command::Change {
                    id,
                    patch: parse_fields(kind, rest, true)?,
                }
            }
            CommandKind::Delete => Command::Delete(parse_id(kind, rest)?.0),
            CommandKind::Show => Command::Show(parse_id(kind, rest)?.0),
            CommandKind::ListStrings => Command::ListStrings(parse_id(kind, rest)?.0),
            CommandKind::CountStrings => Command::CountStrings(parse_id(kind, rest)?.0),
            CommandKind::AddString => {
                let (id, rest) = parse_id(kind, rest)?;
                let text = parse_text_argument(rest).map_err(|err| bad_format(kind, err))?;
                Command::AddString { id, text }
            }
            CommandKind::GetString => {
                let (id, rest) = parse_id(kind, rest)?;
                Command::GetString {
                    id,
                    pos: parse_pos(kind, rest)?,
                }
            }
            CommandKind::DeleteString => {
                let (id, rest) = parse_id(kind, rest)?;
                Command::DeleteString {
                    id,
                    pos: parse_pos(kind, rest)?,
                }
            }
        };
        Ok(command)
    }

    /// Render as a request line, without the trailing `\n`.
    ///
    /// String values are sent quoted; callers must have checked them with
    /// [`super::grammar::is_encodable`].
    pub fn encode(&self) -> String {
        let name = self.kind().name();
        match self {
            Command::Quit | Command::Help | Command::List | Command::Clean => name.to_string(),
            Command::Create(fields) | Command::Search(fields) => {
                let pairs = encode_field_set(fields);
                if pairs.is_empty() {
                    name.to_string()
                } else {
                    format!("{name} {pairs}")
                }
            }
            Command::Change { id, patch } => {
                let pairs = encode_field_set(patch);
                if pairs.is_empty() {
                    format!("{name} {id}")
                } else {
                    format!("{name} {id} {pairs}")
                }
            }
            Command::Delete(id)
            | Command::Show(id)
            | Command::ListStrings(id)
            | Command::CountStrings(id) => format!("{name} {id}"),
            Command::AddString { id, text } => format!("{name} {id} \"{text}\""),
            Command::GetString { id, pos } | Command::DeleteString { id, pos } => {
                format!("{name} {id} {pos}")
            }
        }
    }
}
