//! psc-registry CLI entry point

use std::io;
use std::process::ExitCode;

use clap::Parser;
use serde::Serialize;

use psc_registry::cli::{Cli, Commands, ConfigAction, OutputFormat};
use psc_registry::client::RegistryClient;
use psc_registry::config::RegistryConfig;
use psc_registry::service::EntryData;
use psc_registry::store::{EntryFields, EntryRecord};
use psc_registry::{logging, RegistryError, Result};

fn main() -> ExitCode {
    match run() {
        Ok(output) => {
            print!("{}", output);
            ExitCode::SUCCESS
        }
        Err(e) => {
            eprintln!("Error: {}", e);
            e.exit_code()
        }
    }
}

fn run() -> Result<String> {
    let cli = Cli::parse();
    let mut config = RegistryConfig::load_or_default(cli.config.as_deref())?;
    logging::init(&config.logging.level);

    if let Commands::Config(args) = &cli.command {
        return run_config(&cli, &mut config, &args.action);
    }

    let location = match &cli.registry {
        Some(location) => location.clone(),
        None => config.resolve_location(None)?,
    };
    let mut client = RegistryClient::open_location(&location, &config.connect_retry())?;
    let output = execute(&cli, &mut client);

    // The request outcome matters more than a clean QUIT
    if let Err(e) = client.close() {
        tracing::debug!("QUIT failed: {}", e);
    }
    output
}

fn execute(cli: &Cli, client: &mut RegistryClient) -> Result<String> {
    let format = cli.format;
    match &cli.command {
        Commands::Create(args) => {
            let id = client.create_entry(&args.to_fields())?;
            render_id(format, "created entry", id)
        }
        Commands::Change { id, fields } => {
            client.change_entry(*id, &fields.to_field_set())?;
            render_id(format, "changed entry", *id)
        }
        Commands::Delete { id } => {
            client.delete_entry(*id)?;
            render_id(format, "deleted entry", *id)
        }
        Commands::Show { id, strings } => {
            let mut data = EntryData::from(client.fill_entry(*id)?);
            if *strings {
                data.strings = client.list_strings(*id)?;
            }
            match format {
                OutputFormat::Json => to_json(&data),
                OutputFormat::Text => Ok(entry_details(&data)),
            }
        }
        Commands::List => render_entries(format, &client.list_entries()?),
        Commands::Search(fields) => {
            render_entries(format, &client.query_entries(&fields.to_field_set())?)
        }
        Commands::Clean => {
            let count = client.clean()?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "deleted": count })),
                OutputFormat::Text => Ok(format!("{} entries deleted\n", count)),
            }
        }
        Commands::AddStr { id, text } => {
            let pos = client.store_string(*id, text)?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "id": id, "pos": pos })),
                OutputFormat::Text => Ok(format!("{}\n", pos)),
            }
        }
        Commands::GetStr { id, pos } => {
            let text = client.get_string_at(*id, *pos)?;
            match format {
                OutputFormat::Json => {
                    to_json(&serde_json::json!({ "id": id, "pos": pos, "text": text }))
                }
                OutputFormat::Text => Ok(format!("{}\n", text)),
            }
        }
        Commands::DelStr { id, pos } => {
            client.delete_string(*id, *pos)?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "id": id, "deleted": pos })),
                OutputFormat::Text => Ok(format!("deleted string {} of entry {}\n", pos, id)),
            }
        }
        Commands::ListStr { id } => render_lines(format, &client.list_strings(*id)?),
        Commands::CountStr { id } => {
            let count = client.count_strings(*id)?;
            match format {
                OutputFormat::Json => to_json(&serde_json::json!({ "id": id, "count": count })),
                OutputFormat::Text => Ok(format!("{}\n", count)),
            }
        }
        Commands::Help => render_lines(format, &client.help()?),
        Commands::Raw { line } => render_lines(format, &client.raw(line)?),
        Commands::Config(_) => Err(RegistryError::config("config is handled locally")),
    }
}

fn run_config(cli: &Cli, config: &mut RegistryConfig, action: &ConfigAction) -> Result<String> {
    match action {
        ConfigAction::Show => config.display(),
        ConfigAction::Get { key } => config
            .get(key)
            .map(|value| format!("{}\n", value))
            .ok_or_else(|| RegistryError::config(format!("No value for {}", key))),
        ConfigAction::Set { key, value } => {
            config.set(key, value)?;
            let path = cli
                .config
                .clone()
                .or_else(RegistryConfig::default_path)
                .ok_or_else(|| RegistryError::config("No configuration path available"))?;
            config.save_to(&path)?;
            Ok(format!("Set {} = {}\n", key, value))
        }
    }
}

fn to_json<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    let mut json = serde_json::to_string_pretty(value).map_err(io::Error::from)?;
    json.push('\n');
    Ok(json)
}

fn render_id(format: OutputFormat, action: &str, id: u32) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(&serde_json::json!({ "id": id })),
        OutputFormat::Text => Ok(format!("{} {}\n", action, id)),
    }
}

fn render_lines(format: OutputFormat, lines: &[String]) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(lines),
        OutputFormat::Text => Ok(lines.iter().map(|line| format!("{}\n", line)).collect()),
    }
}

fn render_entries(format: OutputFormat, records: &[EntryRecord]) -> Result<String> {
    match format {
        OutputFormat::Json => to_json(records),
        OutputFormat::Text => {
            let mut output = String::from("ID\tAPP\tSITE\tMACH\tNODE\tPORT\tPID\tCOMP\tTAG\n");
            for record in records {
                output.push_str(&entry_row(record.id, &record.fields));
            }
            Ok(output)
        }
    }
}

fn entry_row(id: u32, f: &EntryFields) -> String {
    format!(
        "{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\t{}\n",
        id, f.app, f.site, f.mach, f.node, f.port, f.pid, f.comp, f.tag
    )
}

fn entry_details(data: &EntryData) -> String {
    let f = &data.fields;
    let rows = [
        ("id", data.id.to_string()),
        ("app", f.app.clone()),
        ("site", f.site.clone()),
        ("mach", f.mach.clone()),
        ("node", f.node.clone()),
        ("port", f.port.to_string()),
        ("pid", f.pid.to_string()),
        ("comp", f.comp.clone()),
        ("tag", f.tag.clone()),
    ];
    let mut output: String = rows
        .iter()
        .map(|(label, value)| format!("{:<5} {}\n", format!("{}:", label), value))
        .collect();
    for (pos, text) in data.strings.iter().enumerate() {
        output.push_str(&format!("[{}]  {}\n", pos + 1, text));
    }
    output
}
