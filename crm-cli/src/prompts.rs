use anyhow::Result;
use inquire::{Select, Text};

use crm_core::{FieldType, Module};

/// A field request gathered from prompts
pub struct FieldRequest {
    pub module: Module,
    pub name: String,
    pub field_type: String,
}

/// Prompts the user for a new custom field, filling in anything not given on the command line
pub fn prompt_new_field(
    module: Option<Module>,
    name: Option<&str>,
    field_type: Option<&str>,
) -> Result<FieldRequest> {
    let module = match module {
        Some(m) => m,
        None => Select::new("Module:", Module::ALL.to_vec()).prompt()?,
    };

    let name = match name {
        Some(n) => n.to_string(),
        None => Text::new("Field name:")
            .with_validator(inquire::required!("Field name is required"))
            .prompt()?,
    };

    let field_type = match field_type {
        Some(t) => t.to_string(),
        None => Select::new("Type:", FieldType::ALL.to_vec())
            .prompt()?
            .to_string(),
    };

    Ok(FieldRequest {
        module,
        name,
        field_type,
    })
}

/// Asks before a destructive action
pub fn confirm(message: &str) -> Result<bool> {
    Ok(inquire::Confirm::new(message)
        .with_default(false)
        .prompt()?)
}
