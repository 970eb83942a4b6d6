use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

use crate::error::ValidationError;

/// Number of generic custom-field slots carried by every entity row
pub const SLOT_COUNT: usize = 20;

/// Identifies which entity table and which field-definition partition an operation targets
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum Module {
    Contact,
    Lead,
    Deal,
    FollowUp,
}

impl Module {
    pub const ALL: [Module; 4] = [Module::Contact, Module::Lead, Module::Deal, Module::FollowUp];

    /// Stable tag stored in the registry table
    pub fn as_str(&self) -> &'static str {
        match self {
            Module::Contact => "contact",
            Module::Lead => "lead",
            Module::Deal => "deal",
            Module::FollowUp => "follow_up",
        }
    }
}

impl fmt::Display for Module {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(match self {
            Module::Contact => "Contact",
            Module::Lead => "Lead",
            Module::Deal => "Deal",
            Module::FollowUp => "Follow-up",
        })
    }
}

impl FromStr for Module {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "contact" | "contacts" => Ok(Module::Contact),
            "lead" | "leads" => Ok(Module::Lead),
            "deal" | "deals" => Ok(Module::Deal),
            "follow_up" | "follow-up" | "followup" | "follow_ups" | "followups" => {
                Ok(Module::FollowUp)
            }
            other => Err(format!("Unknown module: {}", other)),
        }
    }
}

/// The closed set of custom field types
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
pub enum FieldType {
    Text,
    Number,
    Choice,
}

impl FieldType {
    pub const ALL: [FieldType; 3] = [FieldType::Text, FieldType::Number, FieldType::Choice];

    pub fn as_str(&self) -> &'static str {
        match self {
            FieldType::Text => "Text",
            FieldType::Number => "Number",
            FieldType::Choice => "Choice",
        }
    }

    /// Checks a value about to be written into a slot bound to a field of this type
    pub fn check_value(&self, value: &str) -> Result<(), ValidationError> {
        let trimmed = value.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::InvalidValue {
                field_type: *self,
                value: value.to_string(),
            });
        }
        if *self == FieldType::Number {
            match trimmed.parse::<f64>() {
                Ok(n) if n.is_finite() => {}
                _ => {
                    return Err(ValidationError::InvalidValue {
                        field_type: *self,
                        value: value.to_string(),
                    })
                }
            }
        }
        Ok(())
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for FieldType {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "text" => Ok(FieldType::Text),
            "number" => Ok(FieldType::Number),
            "choice" => Ok(FieldType::Choice),
            _ => Err(ValidationError::UnsupportedType(s.to_string())),
        }
    }
}

/// A slot index that is always within `1..=SLOT_COUNT`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, PartialOrd, Ord, Hash)]
#[serde(try_from = "u8", into = "u8")]
pub struct SlotNumber(u8);

impl SlotNumber {
    pub fn new(n: u8) -> Result<Self, ValidationError> {
        if n == 0 || n as usize > SLOT_COUNT {
            return Err(ValidationError::InvalidSlot(i64::from(n)));
        }
        Ok(Self(n))
    }

    pub fn get(&self) -> u8 {
        self.0
    }

    /// Iterates every slot in ascending order
    pub fn all() -> impl Iterator<Item = SlotNumber> {
        (1..=SLOT_COUNT as u8).map(SlotNumber)
    }

    /// Physical column name of this slot in an entity table
    pub fn column(&self) -> String {
        format!("cf{}", self.0)
    }

    fn index(&self) -> usize {
        self.0 as usize - 1
    }
}

impl TryFrom<u8> for SlotNumber {
    type Error = ValidationError;

    fn try_from(n: u8) -> Result<Self, Self::Error> {
        SlotNumber::new(n)
    }
}

impl TryFrom<i64> for SlotNumber {
    type Error = ValidationError;

    fn try_from(n: i64) -> Result<Self, Self::Error> {
        u8::try_from(n)
            .map_err(|_| ValidationError::InvalidSlot(n))
            .and_then(SlotNumber::new)
    }
}

impl From<SlotNumber> for u8 {
    fn from(slot: SlotNumber) -> Self {
        slot.0
    }
}

impl fmt::Display for SlotNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(&self.0.to_string())
    }
}

/// The fixed pool of nullable slot values embedded in an entity row
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SlotArray([Option<String>; SLOT_COUNT]);

impl SlotArray {
    pub fn get(&self, slot: SlotNumber) -> Option<&str> {
        self.0[slot.index()].as_deref()
    }

    pub fn set(&mut self, slot: SlotNumber, value: Option<String>) {
        self.0[slot.index()] = value;
    }

    pub fn clear(&mut self, slot: SlotNumber) {
        self.0[slot.index()] = None;
    }

    /// Slots that currently hold a value
    pub fn filled(&self) -> impl Iterator<Item = (SlotNumber, &str)> + '_ {
        SlotNumber::all().filter_map(move |slot| self.get(slot).map(|v| (slot, v)))
    }
}

/// Metadata binding a human-chosen name and type to one slot within one module
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct FieldDefinition {
    pub id: Uuid,
    pub module: Module,
    pub slot: SlotNumber,
    pub field_name: String,
    pub field_type: FieldType,
    pub created_time: DateTime<Utc>,
}

impl FieldDefinition {
    pub fn new(module: Module, slot: SlotNumber, field_name: String, field_type: FieldType) -> Self {
        Self {
            id: Uuid::new_v4(),
            module,
            slot,
            field_name,
            field_type,
            created_time: Utc::now(),
        }
    }
}

/// A Contact, Lead, Deal or Follow-up record
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct EntityRow {
    pub id: Uuid,
    pub module: Module,
    pub title: String,
    /// Owning contact; rows of other modules are removed when it is deleted
    pub contact_id: Option<Uuid>,
    /// Module-specific business attributes, opaque to the slot engine
    pub attributes: BTreeMap<String, String>,
    pub created_at: DateTime<Utc>,
    pub slots: SlotArray,
}

/// Input for creating an entity row; all slots start empty
#[derive(Debug, Clone, Default)]
pub struct NewRow {
    pub title: String,
    pub contact_id: Option<Uuid>,
    pub attributes: BTreeMap<String, String>,
}

impl NewRow {
    pub fn titled(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Default::default()
        }
    }

    pub fn for_contact(mut self, contact_id: Uuid) -> Self {
        self.contact_id = Some(contact_id);
        self
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }
}
