//! Registry entry data types
//!
//! `EntryFields` is the complete identity/location record of one registered
//! component. `FieldSet` is the partial form used on the wire: all fields for
//! CREATE, a patch for CHANGE, and a predicate for SEARCH.

use serde::{Deserialize, Serialize};

/// Server-assigned entry identifier (positive, never reused)
pub type EntryId = u32;

/// One of the eight entry fields, in wire order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    App,
    Site,
    Mach,
    Node,
    Port,
    Pid,
    Comp,
    Tag,
}

impl Field {
    pub const ALL: [Field; 8] = [
        Field::App,
        Field::Site,
        Field::Mach,
        Field::Node,
        Field::Port,
        Field::Pid,
        Field::Comp,
        Field::Tag,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Field::App => "app",
            Field::Site => "site",
            Field::Mach => "mach",
            Field::Node => "node",
            Field::Port => "port",
            Field::Pid => "pid",
            Field::Comp => "comp",
            Field::Tag => "tag",
        }
    }

    /// Keys are case-sensitive
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }

    pub fn is_numeric(self) -> bool {
        matches!(self, Field::Port | Field::Pid)
    }
}

/// The full set of values stored for an entry
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryFields {
    pub app: String,
    pub site: String,
    pub mach: String,
    pub node: String,
    pub port: i32,
    pub pid: i32,
    pub comp: String,
    pub tag: String,
}

impl EntryFields {
    /// Names of the fields that are empty or non-positive
    pub fn missing_fields(&self) -> Vec<&'static str> {
        Field::ALL
            .into_iter()
            .filter(|&field| match field {
                Field::Port => self.port <= 0,
                Field::Pid => self.pid <= 0,
                _ => self.text(field).is_some_and(str::is_empty),
            })
            .map(Field::name)
            .collect()
    }

    pub fn is_complete(&self) -> bool {
        self.missing_fields().is_empty()
    }

    /// Borrow a string field; `None` for the numeric ones
    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::App => Some(&self.app),
            Field::Site => Some(&self.site),
            Field::Mach => Some(&self.mach),
            Field::Node => Some(&self.node),
            Field::Comp => Some(&self.comp),
            Field::Tag => Some(&self.tag),
            Field::Port | Field::Pid => None,
        }
    }
}

/// A stored entry as seen by readers: id plus field values
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EntryRecord {
    pub id: EntryId,
    #[serde(flatten)]
    pub fields: EntryFields,
}

/// Partial entry fields; `None` means "not given"
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldSet {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub app: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub site: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mach: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub port: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub pid: Option<i32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub comp: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tag: Option<String>,
}

impl FieldSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn app(mut self, value: impl Into<String>) -> Self {
        self.app = Some(value.into());
        self
    }

    pub fn site(mut self, value: impl Into<String>) -> Self {
        self.site = Some(value.into());
        self
    }

    pub fn mach(mut self, value: impl Into<String>) -> Self {
        self.mach = Some(value.into());
        self
    }

    pub fn node(mut self, value: impl Into<String>) -> Self {
        self.node = Some(value.into());
        self
    }

    pub fn port(mut self, value: i32) -> Self {
        self.port = Some(value);
        self
    }

    pub fn pid(mut self, value: i32) -> Self {
        self.pid = Some(value);
        self
    }

    pub fn comp(mut self, value: impl Into<String>) -> Self {
        self.comp = Some(value.into());
        self
    }

    pub fn tag(mut self, value: impl Into<String>) -> Self {
        self.tag = Some(value.into());
        self
    }

    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Set a string field; ignored for `port`/`pid`
    pub fn set_text(&mut self, field: Field, value: String) {
        match field {
            Field::App => self.app = Some(value),
            Field::Site => self.site = Some(value),
            Field::Mach => self.mach = Some(value),
            Field::Node => self.node = Some(value),
            Field::Comp => self.comp = Some(value),
            Field::Tag => self.tag = Some(value),
            Field::Port | Field::Pid => {}
        }
    }

    /// Set a numeric field; ignored for string fields
    pub fn set_number(&mut self, field: Field, value: i32) {
        match field {
            Field::Port => self.port = Some(value),
            Field::Pid => self.pid = Some(value),
            _ => {}
        }
    }

    pub fn text(&self, field: Field) -> Option<&str> {
        match field {
            Field::App => self.app.as_deref(),
            Field::Site => self.site.as_deref(),
            Field::Mach => self.mach.as_deref(),
            Field::Node => self.node.as_deref(),
            Field::Comp => self.comp.as_deref(),
            Field::Tag => self.tag.as_deref(),
            Field::Port | Field::Pid => None,
        }
    }

    pub fn number(&self, field: Field) -> Option<i32> {
        match field {
            Field::Port => self.port,
            Field::Pid => self.pid,
            _ => None,
        }
    }

    /// Build full entry values; fields not given default to empty / zero
    pub fn to_fields(&self) -> EntryFields {
        self.apply_to(&EntryFields::default())
    }

    /// Merge into `base` the way CHANGE does: given strings replace the old
    /// value (even when empty), numbers `<= 0` leave the old value alone.
    pub fn apply_to(&self, base: &EntryFields) -> EntryFields {
        let text =
            |given: &Option<String>, old: &String| given.clone().unwrap_or_else(|| old.clone());
        let number = |given: Option<i32>, old: i32| given.filter(|v| *v > 0).unwrap_or(old);

        EntryFields {
            app: text(&self.app, &base.app),
            site: text(&self.site, &base.site),
            mach: text(&self.mach, &base.mach),
            node: text(&self.node, &base.node),
            port: number(self.port, base.port),
            pid: number(self.pid, base.pid),
            comp: text(&self.comp, &base.comp),
            tag: text(&self.tag, &base.tag),
        }
    }

    /// Search predicate: every given, non-wildcard field must match exactly.
    /// Empty strings and numbers `<= 0` are wildcards.
    pub fn matches(&self, fields: &EntryFields) -> bool {
        Field::ALL.into_iter().all(|field| {
            if field.is_numeric() {
                let wanted = self.number(field).filter(|v| *v > 0);
                let actual = if field == Field::Port { fields.port } else { fields.pid };
                wanted.map_or(true, |v| v == actual)
            } else {
                let wanted = self.text(field).filter(|v| !v.is_empty());
                wanted.map_or(true, |v| Some(v) == fields.text(field))
            }
        })
    }
}

impl From<&EntryFields> for FieldSet {
    fn from(fields: &EntryFields) -> Self {
        Self {
            app: Some(fields.app.clone()),
            site: Some(fields.site.clone()),
            mach: Some(fields.mach.clone()),
            node: Some(fields.node.clone()),
            port: Some(fields.port),
            pid: Some(fields.pid),
            comp: Some(fields.comp.clone()),
            tag: Some(fields.tag.clone()),
        }
    }
}

impl From<EntryFields> for FieldSet {
    fn from(fields: EntryFields) -> Self {
        Self::from(&fields)
    }
}
