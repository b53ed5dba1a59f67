//! Response lines
//!
//! Status payloads are kept as templates with `{}` placeholders. The server
//! fills them with [`render`]; the client reads the numbers back out of the
//! same templates with [`scan`], so both ends agree on the format by
//! construction.

use std::borrow::Cow;
use std::fmt::Display;

use super::grammar::{parse_pairs, split_token};
use super::{END_OF_MULTILINE, PREFIX_ERROR, PREFIX_SUCCESS};
use crate::store::{EntryFields, EntryRecord, Field};

pub mod msg {
    pub const WELCOME: &str = "{}:{} PERISCOPE registry server ver. {} ({})";
    pub const QUIT_OK: &str = "{}:{} PERISCOPE registry server closing connection";
    pub const HELP_OK: &str = "showing available commands";
    pub const UNKNOWN_COMMAND: &str = "unknown command: {}";

    pub const BAD_FORMAT: &str = "bad format.";
    pub const INCOMPLETE_DATA: &str = "incomplete data.";
    pub const ENTRY_NOT_FOUND: &str = "no such entry ID";
    pub const STRING_NOT_FOUND: &str = "no such string ID";

    pub const CREATE_OK: &str = "entry ID is {}";
    pub const SEARCH_OK: &str = "displaying search results";
    pub const CHANGE_OK: &str = "applied changes to entry {}";
    pub const DELETE_OK: &str = "entry {} deleted";
    pub const LIST_OK: &str = "{} entries in registry";
    pub const SHOW_OK: &str = "showing entry {}";
    pub const CLEAN_OK: &str = "{} entries deleted";
    pub const ADDSTR_OK: &str = "string ID is {}";
    pub const GETSTR_OK: &str = "string {} of entry {} size {}";
    pub const DELSTR_OK: &str = "deleted string {} of entry {}";
    pub const LISTSTR_OK: &str = "listing {} strings for entry {}";
    pub const COUNTSTR_OK: &str = "{} strings stored for entry {}";
}

/// Substitute `args` into the `{}` placeholders of `template`, in order
pub fn render(template: &str, args: &[&dyn Display]) -> String {
    let mut out = String::with_capacity(template.len() + 16);
    let mut pieces = template.split("{}");
    if let Some(first) = pieces.next() {
        out.push_str(first);
    }
    for (index, piece) in pieces.enumerate() {
        if let Some(arg) = args.get(index) {
            out.push_str(&arg.to_string());
        }
        out.push_str(piece);
    }
    out
}

/// Read the integers out of `text` produced by `render(template, ..)`.
///
/// Literal text must match exactly; anything after the template is ignored.
pub fn scan(template: &str, text: &str) -> Option<Vec<i64>> {
    let mut pieces = template.split("{}");
    let mut rest = text.strip_prefix(pieces.next().unwrap_or(""))?;
    let mut values = Vec::new();

    for literal in pieces {
        let digits_end = rest
            .char_indices()
            .find(|&(i, c)| !(c.is_ascii_digit() || (i == 0 && c == '-')))
            .map_or(rest.len(), |(i, _)| i);
        values.push(rest[..digits_end].parse().ok()?);
        rest = rest[digits_end..].strip_prefix(literal)?;
    }
    Some(values)
}

/// A decoded status line
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Status<'a> {
    Ok(&'a str),
    Err(&'a str),
}

pub fn parse_status(line: &str) -> Option<Status<'_>> {
    let strip = |prefix: &str| {
        line.strip_prefix(prefix)
            .map(|rest| rest.strip_prefix(' ').unwrap_or(rest))
    };
    strip(PREFIX_SUCCESS)
        .map(Status::Ok)
        .or_else(|| strip(PREFIX_ERROR).map(Status::Err))
}

/// Escape a multi-line body line so it can never equal the terminator
pub fn stuff(line: &str) -> Cow<'_, str> {
    if line.starts_with('.') {
        Cow::Owned(format!(".{line}"))
    } else {
        Cow::Borrowed(line)
    }
}

pub fn unstuff(line: &str) -> &str {
    if line.starts_with("..") {
        &line[1..]
    } else {
        line
    }
}

/// Entry line as sent by SHOW, LIST and SEARCH. String values carry a
/// trailing space inside the quotes.
pub fn format_entry_line(record: &EntryRecord) -> String {
    let f = &record.fields;
    format!(
        "ID {} app=\"{} \" site=\"{} \" mach=\"{} \" node=\"{} \" port={} pid={} comp=\"{} \" tag=\"{} \"",
        record.id, f.app, f.site, f.mach, f.node, f.port, f.pid, f.comp, f.tag
    )
}

/// Inverse of [`format_entry_line`]; unknown keys are skipped
pub fn parse_entry_line(line: &str) -> Option<EntryRecord> {
    let rest = line.strip_prefix("ID")?;
    let (id_token, rest) = split_token(rest);
    let id = id_token.parse().ok()?;

    let mut fields = EntryFields::default();
    for (key, value) in parse_pairs(rest).ok()? {
        let Some(field) = Field::from_name(key) else {
            continue;
        };
        let value = value.strip_suffix(' ').unwrap_or(value);
        match field {
            Field::App => fields.app = value.to_string(),
            Field::Site => fields.site = value.to_string(),
            Field::Mach => fields.mach = value.to_string(),
            Field::Node => fields.node = value.to_string(),
            Field::Comp => fields.comp = value.to_string(),
            Field::Tag => fields.tag = value.to_string(),
            Field::Port => fields.port = value.trim().parse().ok()?,
            Field::Pid => fields.pid = value.trim().parse().ok()?,
        }
    }
    Some(EntryRecord { id, fields })
}

/// A complete server response: status line plus optional body
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Reply {
    lines: Vec<String>,
}

impl Reply {
    pub fn ok(payload: impl Display) -> Self {
        Self {
            lines: vec![format!("{PREFIX_SUCCESS} {payload}")],
        }
    }

    pub fn err(payload: impl Display) -> Self {
        Self {
            lines: vec![format!("{PREFIX_ERROR} {payload}")],
        }
    }

    /// `-ERR <reason>. <usage>`
    pub fn err_with_usage(reason: &str, usage: &str) -> Self {
        Self::err(format!("{reason} {usage}"))
    }

    /// Append a single unframed data line (SHOW, GETSTR)
    pub fn with_line(mut self, line: impl Into<String>) -> Self {
        self.lines.push(line.into());
        self
    }

    /// Append a dot-stuffed body followed by the terminator
    pub fn with_body<I, S>(mut self, body: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        self.lines
            .extend(body.into_iter().map(|line| stuff(line.as_ref()).into_owned()));
        self.lines.push(END_OF_MULTILINE.to_string());
        self
    }

    pub fn is_ok(&self) -> bool {
        self.lines
            .first()
            .is_some_and(|line| line.starts_with(PREFIX_SUCCESS))
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Wire bytes, every line terminated by `\n`
    pub fn encode(&self) -> String {
        let mut out = String::new();
        for line in &self.lines {
            out.push_str(line);
            out.push('\n');
        }
        out
    }
}
