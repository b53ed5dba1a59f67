//! CLI argument definitions for `psc-registry`
//!
//! Each subcommand maps onto one registry request. The registry endpoint
//! comes from `--registry`, `PSC_REGISTRY` or the configuration file, in
//! that order.

use clap::{Args, Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::RegistryLocation;
use crate::store::{EntryFields, EntryId, FieldSet};

/// Command line client for the Periscope registry
#[derive(Parser, Debug)]
#[command(name = "psc-registry")]
#[command(about = "Inspect and edit a running Periscope registry")]
#[command(version)]
#[command(propagate_version = true)]
#[command(disable_help_subcommand = true)]
pub struct Cli {
    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,

    /// Registry endpoint as HOST:PORT
    #[arg(short, long, env = "PSC_REGISTRY", global = true)]
    pub registry: Option<RegistryLocation>,

    /// Configuration file (default: ~/.periscope.toml)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Output format
    #[arg(short, long, default_value = "text", value_enum, global = true)]
    pub format: OutputFormat,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Register a new entry
    Create(CreateArgs),

    /// Change fields of an existing entry
    Change {
        id: EntryId,

        #[command(flatten)]
        fields: FieldArgs,
    },

    /// Delete an entry and its strings
    #[command(visible_alias = "del")]
    Delete { id: EntryId },

    /// Show one entry
    Show {
        id: EntryId,

        /// Also print the strings attached to the entry
        #[arg(long)]
        strings: bool,
    },

    /// List all entries
    List,

    /// Search entries; omitted fields match anything
    Search(FieldArgs),

    /// Delete every entry
    Clean,

    /// Attach a string to an entry
    AddStr { id: EntryId, text: String },

    /// Print the string at a 1-based position
    GetStr { id: EntryId, pos: usize },

    /// Delete the string at a 1-based position
    DelStr { id: EntryId, pos: usize },

    /// List all strings of an entry
    ListStr { id: EntryId },

    /// Count the strings of an entry
    CountStr { id: EntryId },

    /// Show the command summary sent by the server
    Help,

    /// Send one raw protocol line and print the response
    Raw { line: String },

    /// Show or edit the configuration file
    Config(ConfigArgs),
}

/// All eight fields, required
#[derive(Args, Debug, Clone)]
pub struct CreateArgs {
    #[arg(long)]
    pub app: String,
    #[arg(long)]
    pub site: String,
    #[arg(long)]
    pub mach: String,
    #[arg(long)]
    pub node: String,
    #[arg(long)]
    pub port: i32,
    #[arg(long)]
    pub pid: i32,
    #[arg(long)]
    pub comp: String,
    #[arg(long)]
    pub tag: String,
}

impl CreateArgs {
    pub fn to_fields(&self) -> EntryFields {
        EntryFields {
            app: self.app.clone(),
            site: self.site.clone(),
            mach: self.mach.clone(),
            node: self.node.clone(),
            port: self.port,
            pid: self.pid,
            comp: self.comp.clone(),
            tag: self.tag.clone(),
        }
    }
}

/// Any subset of the entry fields
#[derive(Args, Debug, Clone, Default)]
pub struct FieldArgs {
    #[arg(long)]
    pub app: Option<String>,
    #[arg(long)]
    pub site: Option<String>,
    #[arg(long)]
    pub mach: Option<String>,
    #[arg(long)]
    pub node: Option<String>,
    #[arg(long, allow_negative_numbers = true)]
    pub port: Option<i32>,
    #[arg(long, allow_negative_numbers = true)]
    pub pid: Option<i32>,
    #[arg(long)]
    pub comp: Option<String>,
    #[arg(long)]
    pub tag: Option<String>,
}

impl FieldArgs {
    pub fn to_field_set(&self) -> FieldSet {
        FieldSet {
            app: self.app.clone(),
            site: self.site.clone(),
            mach: self.mach.clone(),
            node: self.node.clone(),
            port: self.port,
            pid: self.pid,
            comp: self.comp.clone(),
            tag: self.tag.clone(),
        }
    }
}

#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Print the effective configuration
    Show,
    /// Print one value, e.g. `registry.port`
    Get { key: String },
    /// Set one value and save the file
    Set { key: String, value: String },
}

/// Output format for command results
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    /// Human-readable text
    #[default]
    Text,
    /// JSON for scripts
    Json,
}
