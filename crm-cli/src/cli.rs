use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[clap(author, version, about = "A personal CRM with user-defined custom fields")]
pub struct Cli {
    /// Path to the database file (overrides CRM_DB_PATH and the config file)
    #[clap(long, global = true)]
    pub db: Option<PathBuf>,

    /// Path to the config file (defaults to CRM_CONFIG_PATH or ~/.crm.config)
    #[clap(long, global = true)]
    pub config: Option<PathBuf>,

    /// Log debug output to stderr
    #[clap(long, short = 'v', global = true)]
    pub verbose: bool,

    #[clap(subcommand)]
    pub command: Command,
}

#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum OutputFormat {
    Table,
    Json,
    Yaml,
}

#[derive(Subcommand, Debug)]
pub enum FieldCommand {
    /// List the custom fields of a module in slot order
    List {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Output format
        #[clap(long, short = 'f', value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Add a custom field; it is bound to the lowest free slot
    Add {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: Option<String>,

        /// Name of the field
        #[clap(long)]
        name: Option<String>,

        /// Field type (text, number, choice)
        #[clap(long, short = 't')]
        r#type: Option<String>,

        /// Use interactive mode (prompts)
        #[clap(long)]
        interactive: bool,
    },

    /// Delete a custom field and clear its values on every row
    Del {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Slot number of the field
        #[clap(long, short = 's')]
        slot: u8,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum RowCommand {
    /// Add a row to a module
    Add {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Title (contact name, deal title, ...)
        #[clap(long)]
        title: String,

        /// Owning contact (UUID); not allowed for contacts
        #[clap(long)]
        contact: Option<String>,

        /// Extra attributes as key=value (repeatable)
        #[clap(long = "attr", short = 'a')]
        attributes: Vec<String>,
    },

    /// List the rows of a module
    List {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Output format
        #[clap(long, short = 'f', value_enum, default_value = "table")]
        format: OutputFormat,
    },

    /// Show one row with its custom field values
    Show {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Row ID (UUID)
        id: String,
    },

    /// Set or clear a custom field value on a row
    Set {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Row ID (UUID)
        id: String,

        /// Slot number of the field
        #[clap(long, short = 's')]
        slot: u8,

        /// New value; omit to clear the slot
        #[clap(long)]
        value: Option<String>,
    },

    /// Delete a row (rows owned by a contact go with it)
    Del {
        /// Module (contact, lead, deal, follow-up)
        #[clap(long, short = 'm')]
        module: String,

        /// Row ID (UUID)
        id: String,

        /// Skip confirmation prompt
        #[clap(long, short = 'y')]
        yes: bool,
    },
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Custom field management commands
    #[clap(subcommand)]
    Field(FieldCommand),

    /// Contact, lead, deal and follow-up records
    #[clap(subcommand)]
    Row(RowCommand),

    /// Show field and row counts per module
    Stats,
}
