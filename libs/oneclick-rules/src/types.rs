//! Rule type definitions
//!
//! Core types for trigger evaluation and validation:
//! - FieldType / FieldDescriptor / FieldCatalog: field metadata from the host
//! - TriggerKind / TriggerConfig: declarative trigger with string attributes
//! - ChangeEvent: post-commit snapshot of a work item change
//! - Rule: named set of triggers

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::str::FromStr;

use crate::error::{Result, RuleError};

/// Attribute holding the watched field's reference name
pub const ATTR_FIELD_NAME: &str = "fieldName";
/// Attribute holding the expected previous value (not enforced post-commit)
pub const ATTR_OLD_FIELD_VALUE: &str = "oldFieldValue";
/// Attribute holding the expected new value
pub const ATTR_NEW_FIELD_VALUE: &str = "newFieldValue";

// ============================================================================
// Field metadata
// ============================================================================

/// Work item field value type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "String")]
pub enum FieldType {
    String,
    Integer,
    Double,
    DateTime,
    Boolean,
    Identity,
    PlainText,
    Html,
    TreePath,
    History,
    Guid,
    PicklistString,
    PicklistInteger,
    PicklistDouble,
}

impl FieldType {
    pub const ALL: [FieldType; 14] = [
        FieldType::String,
        FieldType::Integer,
        FieldType::Double,
        FieldType::DateTime,
        FieldType::Boolean,
        FieldType::Identity,
        FieldType::PlainText,
        FieldType::Html,
        FieldType::TreePath,
        FieldType::History,
        FieldType::Guid,
        FieldType::PicklistString,
        FieldType::PicklistInteger,
        FieldType::PicklistDouble,
    ];

    pub fn name(self) -> &'static str {
        match self {
            FieldType::String => "string",
            FieldType::Integer => "integer",
            FieldType::Double => "double",
            FieldType::DateTime => "dateTime",
            FieldType::Boolean => "boolean",
            FieldType::Identity => "identity",
            FieldType::PlainText => "plainText",
            FieldType::Html => "html",
            FieldType::TreePath => "treePath",
            FieldType::History => "history",
            FieldType::Guid => "guid",
            FieldType::PicklistString => "picklistString",
            FieldType::PicklistInteger => "picklistInteger",
            FieldType::PicklistDouble => "picklistDouble",
        }
    }

    pub fn is_integer(self) -> bool {
        matches!(self, FieldType::Integer | FieldType::PicklistInteger)
    }

    pub fn is_double(self) -> bool {
        matches!(self, FieldType::Double | FieldType::PicklistDouble)
    }

    pub fn is_date(self) -> bool {
        self == FieldType::DateTime
    }

    /// Free-form text types that can hold any resolved value
    pub fn is_textual(self) -> bool {
        matches!(
            self,
            FieldType::String
                | FieldType::PlainText
                | FieldType::Html
                | FieldType::History
                | FieldType::PicklistString
        )
    }
}

impl fmt::Display for FieldType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for FieldType {
    type Err = RuleError;

    fn from_str(s: &str) -> Result<Self> {
        FieldType::ALL
            .iter()
            .copied()
            .find(|ty| ty.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| RuleError::parse(format!("Unknown field type: '{}'", s)))
    }
}

impl TryFrom<String> for FieldType {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self> {
        value.parse()
    }
}

/// Field metadata supplied by the host field catalog
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldDescriptor {
    /// Reference name (e.g., "System.State")
    pub reference_name: String,

    /// Display name (e.g., "State")
    #[serde(default)]
    pub name: String,

    /// Value type
    #[serde(rename = "type")]
    pub field_type: FieldType,
}

impl FieldDescriptor {
    pub fn new(
        reference_name: impl Into<String>,
        name: impl Into<String>,
        field_type: FieldType,
    ) -> Self {
        Self {
            reference_name: reference_name.into(),
            name: name.into(),
            field_type,
        }
    }

    /// Matches by reference name or display name, case-insensitively
    pub fn is_named(&self, field: &str) -> bool {
        let field = field.trim();
        self.reference_name.eq_ignore_ascii_case(field)
            || (!self.name.is_empty() && self.name.eq_ignore_ascii_case(field))
    }
}

/// Fields available on the work item type a rule targets
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FieldCatalog {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item_type: Option<String>,

    #[serde(default)]
    pub fields: Vec<FieldDescriptor>,
}

impl FieldCatalog {
    pub fn new(fields: Vec<FieldDescriptor>) -> Self {
        Self {
            work_item_type: None,
            fields,
        }
    }

    pub fn for_work_item_type(mut self, work_item_type: impl Into<String>) -> Self {
        self.work_item_type = Some(work_item_type.into());
        self
    }

    /// Find a field by reference or display name
    pub fn find(&self, field: &str) -> Option<&FieldDescriptor> {
        self.fields.iter().find(|descriptor| descriptor.is_named(field))
    }

    pub fn contains(&self, field: &str) -> bool {
        self.find(field).is_some()
    }

    /// Human readable owner of the catalog for messages
    pub fn scope(&self) -> String {
        match &self.work_item_type {
            Some(wit) => format!("work item type '{}'", wit),
            None => "the field catalog".to_string(),
        }
    }
}

// ============================================================================
// Triggers
// ============================================================================

/// Trigger variants
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", try_from = "String")]
pub enum TriggerKind {
    /// Fires when a watched field changes to an expected value
    FieldValueChanged,
    /// Fires when the work item form loads
    WorkItemLoaded,
    /// Fires after the work item is saved
    WorkItemSaved,
}

impl TriggerKind {
    pub const ALL: [TriggerKind; 3] = [
        TriggerKind::FieldValueChanged,
        TriggerKind::WorkItemLoaded,
        TriggerKind::WorkItemSaved,
    ];

    pub fn name(self) -> &'static str {
        match self {
            TriggerKind::FieldValueChanged => "fieldValueChanged",
            TriggerKind::WorkItemLoaded => "workItemLoaded",
            TriggerKind::WorkItemSaved => "workItemSaved",
        }
    }

    /// Case-insensitive lookup by name
    pub fn from_name(name: &str) -> Result<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name.trim()))
            .ok_or_else(|| {
                RuleError::UnsupportedTrigger(
                    name.to_string(),
                    Self::ALL
                        .iter()
                        .map(|kind| kind.name())
                        .collect::<Vec<_>>()
                        .join(", "),
                )
            })
    }

    /// Whether the trigger watches a field through its attributes
    pub fn watches_field(self) -> bool {
        self == TriggerKind::FieldValueChanged
    }
}

impl fmt::Display for TriggerKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl TryFrom<String> for TriggerKind {
    type Error = RuleError;

    fn try_from(value: String) -> Result<Self> {
        Self::from_name(&value)
    }
}

/// Declarative trigger: a kind plus string attributes
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerConfig {
    #[serde(rename = "type")]
    pub kind: TriggerKind,

    #[serde(default)]
    pub attributes: BTreeMap<String, String>,
}

impl TriggerConfig {
    pub fn new(kind: TriggerKind) -> Self {
        Self {
            kind,
            attributes: BTreeMap::new(),
        }
    }

    /// Field-change trigger watching `field` for `new_value`
    pub fn field_changed(field: impl Into<String>, new_value: impl Into<String>) -> Self {
        Self::new(TriggerKind::FieldValueChanged)
            .with_attribute(ATTR_FIELD_NAME, field)
            .with_attribute(ATTR_NEW_FIELD_VALUE, new_value)
    }

    pub fn with_attribute(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.attributes.insert(key.into(), value.into());
        self
    }

    pub fn with_old_value(self, old_value: impl Into<String>) -> Self {
        self.with_attribute(ATTR_OLD_FIELD_VALUE, old_value)
    }

    /// Attribute by key, case-insensitively
    pub fn attribute(&self, key: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|(name, _)| name.eq_ignore_ascii_case(key))
            .map(|(_, value)| value.as_str())
    }

    pub fn field_name(&self) -> Option<&str> {
        self.attribute(ATTR_FIELD_NAME)
    }

    pub fn old_field_value(&self) -> Option<&str> {
        self.attribute(ATTR_OLD_FIELD_VALUE)
    }

    pub fn new_field_value(&self) -> Option<&str> {
        self.attribute(ATTR_NEW_FIELD_VALUE)
    }
}

// ============================================================================
// Change events and rules
// ============================================================================

/// What happened to the work item
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum EventKind {
    #[default]
    FieldChanged,
    Loaded,
    Saved,
}

/// Post-commit snapshot of a work item change
///
/// `changed_fields` holds the new values of the fields that changed; `fields`
/// holds the remaining current values. Values are JSON as the host returns
/// them (scalars, or identity objects with `displayName`/`uniqueName`).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChangeEvent {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item_id: Option<i64>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub work_item_type: Option<String>,

    #[serde(default)]
    pub kind: EventKind,

    #[serde(default)]
    pub changed_fields: HashMap<String, Value>,

    #[serde(default)]
    pub fields: HashMap<String, Value>,
}

impl ChangeEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            ..Self::default()
        }
    }

    pub fn field_changed(field: impl Into<String>, new_value: Value) -> Self {
        Self::new(EventKind::FieldChanged).with_change(field, new_value)
    }

    pub fn with_change(mut self, field: impl Into<String>, new_value: Value) -> Self {
        self.changed_fields.insert(field.into(), new_value);
        self
    }

    pub fn with_field(mut self, field: impl Into<String>, value: Value) -> Self {
        self.fields.insert(field.into(), value);
        self
    }

    pub fn with_work_item_type(mut self, work_item_type: impl Into<String>) -> Self {
        self.work_item_type = Some(work_item_type.into());
        self
    }

    /// Whether the described field is among the changed fields
    pub fn has_changed(&self, field: &FieldDescriptor) -> bool {
        lookup(&self.changed_fields, field).is_some()
    }

    /// Current (post-commit) value of the described field
    ///
    /// Returns `None` when the host did not report the field, and
    /// `Some(Value::Null)` when it reported it as cleared.
    pub fn current_value(&self, field: &FieldDescriptor) -> Option<&Value> {
        lookup(&self.changed_fields, field).or_else(|| lookup(&self.fields, field))
    }

    /// All reported values, changed fields taking precedence
    pub fn all_values(&self) -> impl Iterator<Item = (&String, &Value)> {
        self.fields
            .iter()
            .filter(|(name, _)| {
                !self
                    .changed_fields
                    .keys()
                    .any(|changed| changed.eq_ignore_ascii_case(name))
            })
            .chain(self.changed_fields.iter())
    }
}

fn lookup<'a>(values: &'a HashMap<String, Value>, field: &FieldDescriptor) -> Option<&'a Value> {
    values
        .iter()
        .find(|(name, _)| field.is_named(name))
        .map(|(_, value)| value)
}

/// Automation rule: fires when any of its triggers fires
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Rule {
    /// Unique identifier
    pub id: String,

    /// Rule name
    pub name: String,

    /// Whether the rule is enabled
    #[serde(default = "default_enabled")]
    pub enabled: bool,

    /// Triggers, any of which fires the rule
    #[serde(default)]
    pub triggers: Vec<TriggerConfig>,
}

fn default_enabled() -> bool {
    true
}

impl Rule {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            enabled: true,
            triggers: Vec::new(),
        }
    }

    pub fn with_trigger(mut self, trigger: TriggerConfig) -> Self {
        self.triggers.push(trigger);
        self
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_field_type_names_round_trip() {
        for ty in FieldType::ALL {
            assert_eq!(ty.name().parse::<FieldType>().unwrap(), ty);
            assert_eq!(ty.name().to_uppercase().parse::<FieldType>().unwrap(), ty);
        }
        assert!("matrix".parse::<FieldType>().is_err());
    }

    #[test]
    fn test_catalog_lookup() {
        let catalog: FieldCatalog = serde_json::from_value(json!({
            "workItemType": "Bug",
            "fields": [
                { "referenceName": "System.State", "name": "State", "type": "string" },
                { "referenceName": "Microsoft.VSTS.Common.Priority", "name": "Priority", "type": "Integer" }
            ]
        }))
        .unwrap();

        assert_eq!(catalog.work_item_type.as_deref(), Some("Bug"));
        assert!(catalog.contains("system.state"));
        assert!(catalog.contains("Priority"));
        assert_eq!(
            catalog.find("Microsoft.VSTS.Common.Priority").unwrap().field_type,
            FieldType::Integer
        );
        assert!(catalog.find("System.Title").is_none());
    }

    #[test]
    fn test_trigger_attributes_are_case_insensitive() {
        let trigger = TriggerConfig::new(TriggerKind::FieldValueChanged)
            .with_attribute("FieldName", "System.State")
            .with_attribute("NEWFIELDVALUE", "Active");

        assert_eq!(trigger.field_name(), Some("System.State"));
        assert_eq!(trigger.new_field_value(), Some("Active"));
        assert_eq!(trigger.old_field_value(), None);
    }

    #[test]
    fn test_trigger_serde_shape() {
        let trigger: TriggerConfig = serde_json::from_value(json!({
            "type": "FieldValueChanged",
            "attributes": { "fieldName": "System.State", "newFieldValue": "@Any" }
        }))
        .unwrap();
        assert_eq!(trigger.kind, TriggerKind::FieldValueChanged);

        let value = serde_json::to_value(&trigger).unwrap();
        assert_eq!(value["type"], "fieldValueChanged");

        let unknown = serde_json::from_value::<TriggerConfig>(json!({ "type": "onRainyDay" }));
        assert!(unknown.is_err());
    }

    #[test]
    fn test_change_event_lookup() {
        let state = FieldDescriptor::new("System.State", "State", FieldType::String);
        let title = FieldDescriptor::new("System.Title", "Title", FieldType::String);
        let event = ChangeEvent::field_changed("system.state", json!("Active"))
            .with_field("System.State", json!("New"))
            .with_field("System.Title", json!("Crash on save"));

        assert!(event.has_changed(&state));
        assert!(!event.has_changed(&title));
        assert_eq!(event.current_value(&state), Some(&json!("Active")));
        assert_eq!(event.current_value(&title), Some(&json!("Crash on save")));
        assert_eq!(event.all_values().count(), 2);
    }
}
