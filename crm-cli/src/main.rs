mod cli;
mod prompts;

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use std::collections::BTreeMap;
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use crm_core::{
    db, determine_database_path, get_config_path, CrmBackend, CrmConfig, CrmError, EntityRow,
    FieldDefinition, Module, NewRow, SlotNumber,
};

use crate::cli::{Cli, Command, FieldCommand, OutputFormat, RowCommand};

const DEFAULT_LOG_FILTER: &str = "crm_core=info";

fn main() -> Result<()> {
    let cli = Cli::parse();

    let config_path = match &cli.config {
        Some(path) => path.clone(),
        None => get_config_path()?,
    };
    let config = CrmConfig::load_or_create(&config_path)?;

    init_logging(&config, cli.verbose);

    let db_path = determine_database_path(cli.db.as_deref(), &config);
    let backend = db::open_or_create(&config.store_config(db_path.clone()))
        .with_context(|| format!("Failed to open database {:?}", db_path))?;

    match &cli.command {
        Command::Field(field_cmd) => handle_field_command(field_cmd, backend.as_ref())?,
        Command::Row(row_cmd) => handle_row_command(row_cmd, backend.as_ref())?,
        Command::Stats => show_stats(backend.as_ref())?,
    }

    Ok(())
}

/// Logs go to stderr; `CRM_LOG` wins over the config file's filter
fn init_logging(config: &CrmConfig, verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("crm_core=debug")
    } else {
        EnvFilter::try_from_env("CRM_LOG").unwrap_or_else(|_| {
            EnvFilter::new(config.log_filter.as_deref().unwrap_or(DEFAULT_LOG_FILTER))
        })
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn parse_module(s: &str) -> Result<Module> {
    s.parse::<Module>().map_err(anyhow::Error::msg)
}

fn parse_slot(n: u8) -> Result<SlotNumber> {
    Ok(SlotNumber::new(n)?)
}

fn parse_id(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s.trim()).with_context(|| format!("Invalid row ID: {}", s))
}

fn handle_field_command(cmd: &FieldCommand, backend: &dyn CrmBackend) -> Result<()> {
    match cmd {
        FieldCommand::List { module, format } => {
            let module = parse_module(module)?;
            let fields = backend.list_fields(module)?;
            match format {
                OutputFormat::Table => print_fields(module, &fields),
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&fields)?),
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&fields)?),
            }
        }
        FieldCommand::Add {
            module,
            name,
            r#type,
            interactive,
        } => {
            let module = module.as_deref().map(parse_module).transpose()?;

            let (module, name, field_type) = match (module, name, r#type) {
                (Some(m), Some(n), Some(t)) if !*interactive => (m, n.clone(), t.clone()),
                _ => {
                    let request =
                        prompts::prompt_new_field(module, name.as_deref(), r#type.as_deref())?;
                    (request.module, request.name, request.field_type)
                }
            };

            let field = backend.create_field(module, &name, &field_type)?;
            println!(
                "{} {} field '{}' ({}) added in slot {}.",
                "✓".green(),
                module,
                field.field_name,
                field.field_type,
                field.slot.to_string().green()
            );
        }
        FieldCommand::Del { module, slot, yes } => {
            let module = parse_module(module)?;
            let slot = parse_slot(*slot)?;

            if !*yes {
                let Some(field) = backend
                    .list_fields(module)?
                    .into_iter()
                    .find(|f| f.slot == slot)
                else {
                    println!("{} No {} field in slot {}.", "!".yellow(), module, slot);
                    return Ok(());
                };
                println!(
                    "About to delete {} field '{}' (slot {}) and clear its value on every row",
                    module, field.field_name, slot
                );
                if !prompts::confirm("Are you sure?")? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }

            match backend.delete_field(module, slot) {
                Ok(report) => println!(
                    "{} {} field '{}' deleted; cleared {} row(s).",
                    "✓".green(),
                    module,
                    report.definition.field_name,
                    report.rows_cleared
                ),
                Err(err @ CrmError::NotFound { .. }) => {
                    println!("{} {}", "!".yellow(), err);
                }
                Err(err) => return Err(err.into()),
            }
        }
    }

    Ok(())
}

fn print_fields(module: Module, fields: &[FieldDefinition]) {
    println!("{}", format!("{} custom fields:", module).blue().bold());
    if fields.is_empty() {
        println!("  (none)");
        return;
    }
    println!("{:<6} | {:<24} | {:<8} | {}", "Slot", "Name", "Type", "Created");
    println!("{}", "-".repeat(70));
    for field in fields {
        println!(
            "{:<6} | {:<24} | {:<8} | {}",
            field.slot,
            field.field_name,
            field.field_type,
            field.created_time.format("%Y-%m-%d %H:%M")
        );
    }
}

fn parse_attributes(pairs: &[String]) -> Result<BTreeMap<String, String>> {
    let mut attributes = BTreeMap::new();
    for pair in pairs {
        let (key, value) = pair
            .split_once('=')
            .with_context(|| format!("Attribute '{}' is not key=value", pair))?;
        attributes.insert(key.trim().to_string(), value.trim().to_string());
    }
    Ok(attributes)
}

fn handle_row_command(cmd: &RowCommand, backend: &dyn CrmBackend) -> Result<()> {
    match cmd {
        RowCommand::Add {
            module,
            title,
            contact,
            attributes,
        } => {
            let module = parse_module(module)?;
            let new_row = NewRow {
                title: title.clone(),
                contact_id: contact.as_deref().map(parse_id).transpose()?,
                attributes: parse_attributes(attributes)?,
            };
            let row = backend.insert_row(module, new_row)?;
            println!("{} {} added.", "✓".green(), module);
            println!("ID: {}", row.id.to_string().green());
        }
        RowCommand::List { module, format } => {
            let module = parse_module(module)?;
            let rows = backend.list_rows(module)?;
            match format {
                OutputFormat::Table => {
                    println!("{}", format!("{} rows:", module).blue().bold());
                    for row in &rows {
                        println!("{} | {}", row.id, row.title);
                    }
                }
                OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&rows)?),
                OutputFormat::Yaml => print!("{}", serde_yaml::to_string(&rows)?),
            }
        }
        RowCommand::Show { module, id } => {
            let module = parse_module(module)?;
            let row = backend.get_row(module, &parse_id(id)?)?;
            let fields = backend.list_fields(module)?;
            print_row(&row, &fields);
        }
        RowCommand::Set {
            module,
            id,
            slot,
            value,
        } => {
            let module = parse_module(module)?;
            let slot = parse_slot(*slot)?;
            backend.set_slot_value(module, &parse_id(id)?, slot, value.as_deref())?;
            match value {
                Some(v) => println!("{} Slot {} set to '{}'.", "✓".green(), slot, v),
                None => println!("{} Slot {} cleared.", "✓".green(), slot),
            }
        }
        RowCommand::Del { module, id, yes } => {
            let module = parse_module(module)?;
            let id = parse_id(id)?;
            let row = backend.get_row(module, &id)?;

            if !*yes {
                println!("About to delete {} '{}'", module, row.title);
                if module == Module::Contact {
                    println!("Leads, deals and follow-ups owned by this contact are deleted too.");
                }
                if !prompts::confirm("Are you sure?")? {
                    println!("Deletion cancelled.");
                    return Ok(());
                }
            }

            backend.delete_row(module, &id)?;
            println!("{} {} '{}' deleted.", "✓".green(), module, row.title);
        }
    }

    Ok(())
}

fn print_row(row: &EntityRow, fields: &[FieldDefinition]) {
    println!("{}", format!("{}: {}", row.module, row.title).blue().bold());
    println!("ID: {}", row.id);
    if let Some(contact_id) = row.contact_id {
        println!("Contact: {}", contact_id);
    }
    println!("Created: {}", row.created_at.format("%Y-%m-%d %H:%M"));
    for (key, value) in &row.attributes {
        println!("{}: {}", key, value);
    }

    if !fields.is_empty() {
        println!();
        println!("{}", "Custom fields:".bold());
        for field in fields {
            let value = row.slots.get(field.slot).unwrap_or("-");
            println!("  [{}] {}: {}", field.slot, field.field_name, value);
        }
    }
}

fn show_stats(backend: &dyn CrmBackend) -> Result<()> {
    let stats = backend.stats()?;
    println!("{:<10} | {:>6} | {:>6}", "Module", "Fields", "Rows");
    println!("{}", "-".repeat(30));
    for (module, counts) in &stats.modules {
        println!(
            "{:<10} | {:>6} | {:>6}",
            module,
            counts.field_count,
            counts.row_count
        );
    }
    if let Some(path) = backend.path() {
        println!("Database: {}", path.display());
    }
    Ok(())
}
