use crate::error::ValidationError;
use crate::models::{FieldDefinition, FieldType, Module, SLOT_COUNT};

/// Checks a requested field definition against the module's current fields.
///
/// Rules are applied in order and the first failure is reported:
/// blank name, unsupported type, module at capacity, duplicate name
/// (case-insensitive). Nothing is written; the allocator and registry
/// repeat the capacity and uniqueness checks inside the write transaction.
pub fn validate(
    module: Module,
    field_name: &str,
    field_type: &str,
    existing: &[FieldDefinition],
) -> Result<FieldType, ValidationError> {
    let name = field_name.trim();
    if name.is_empty() {
        return Err(ValidationError::BlankName);
    }

    let parsed: FieldType = field_type.parse()?;

    let in_module = existing.iter().filter(|f| f.module == module);
    if in_module.clone().count() >= SLOT_COUNT {
        return Err(ValidationError::CapacityReached {
            module,
            limit: SLOT_COUNT,
        });
    }

    let wanted = name.to_lowercase();
    if let Some(taken) = in_module
        .map(|f| &f.field_name)
        .find(|n| n.trim().to_lowercase() == wanted)
    {
        return Err(ValidationError::DuplicateName {
            module,
            name: taken.clone(),
        });
    }

    Ok(parsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::SlotNumber;

    fn field(module: Module, slot: u8, name: &str) -> FieldDefinition {
        FieldDefinition::new(module, SlotNumber::new(slot).unwrap(), name.into(), FieldType::Text)
    }

    #[test]
    fn test_valid_definition_returns_type() {
        let existing = vec![field(Module::Deal, 1, "Region")];
        assert_eq!(
            validate(Module::Deal, "Budget", "number", &existing),
            Ok(FieldType::Number)
        );
    }

    #[test]
    fn test_blank_name_rejected() {
        assert_eq!(
            validate(Module::Contact, "   ", "text", &[]),
            Err(ValidationError::BlankName)
        );
    }

    #[test]
    fn test_unknown_type_rejected() {
        assert_eq!(
            validate(Module::Contact, "Birthday", "date", &[]),
            Err(ValidationError::UnsupportedType("date".into()))
        );
    }

    #[test]
    fn test_duplicate_name_is_case_insensitive() {
        let existing = vec![field(Module::Lead, 2, "Source")];
        assert_eq!(
            validate(Module::Lead, " source ", "text", &existing),
            Err(ValidationError::DuplicateName {
                module: Module::Lead,
                name: "Source".into()
            })
        );
    }

    #[test]
    fn test_same_name_in_other_module_is_fine() {
        let existing = vec![field(Module::Lead, 2, "Source")];
        assert!(validate(Module::Deal, "Source", "text", &existing).is_ok());
    }

    #[test]
    fn test_capacity_checked_before_duplicate_name() {
        let existing: Vec<_> = SlotNumber::all()
            .map(|s| field(Module::Contact, s.get(), &format!("F{}", s)))
            .collect();
        assert_eq!(
            validate(Module::Contact, "F1", "text", &existing),
            Err(ValidationError::CapacityReached {
                module: Module::Contact,
                limit: SLOT_COUNT
            })
        );
    }

    #[test]
    fn test_type_checked_before_capacity() {
        let existing: Vec<_> = SlotNumber::all()
            .map(|s| field(Module::Deal, s.get(), &format!("F{}", s)))
            .collect();
        assert_eq!(
            validate(Module::Deal, "Closing date", "date", &existing),
            Err(ValidationError::UnsupportedType("date".into()))
        );
    }

    #[test]
    fn test_blank_name_checked_before_type() {
        assert_eq!(
            validate(Module::Contact, "", "bogus", &[]),
            Err(ValidationError::BlankName)
        );
    }
}
