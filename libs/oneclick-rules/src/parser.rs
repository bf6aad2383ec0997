//! Rule document parser
//!
//! Reads rules, field catalogs and change events from JSON or YAML documents.
//! Rules are walked by hand so that older documents keep loading: attribute
//! values may be numbers or booleans, and trigger type names are matched
//! case-insensitively.

use serde_json::Value;
use std::collections::BTreeMap;
use std::path::Path;
use tracing::debug;

use crate::error::{Result, RuleError};
use crate::types::{ChangeEvent, FieldCatalog, Rule, TriggerConfig, TriggerKind};

/// Read a JSON or YAML document (chosen by file extension)
pub fn load_document(path: &Path) -> Result<Value> {
    let text = std::fs::read_to_string(path)?;
    let is_yaml = path
        .extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("yaml") || ext.eq_ignore_ascii_case("yml"));

    debug!("Loading {} document {:?}", if is_yaml { "YAML" } else { "JSON" }, path);
    if is_yaml {
        Ok(serde_yaml::from_str(&text)?)
    } else {
        Ok(serde_json::from_str(&text)?)
    }
}

/// Parse rules from a document
///
/// Accepts a single rule object, an array of rules, or `{ "rules": [...] }`.
pub fn parse_rules(document: &Value) -> Result<Vec<Rule>> {
    if let Some(array) = document.as_array() {
        return array.iter().map(parse_rule).collect();
    }
    if let Some(array) = document.get("rules").and_then(|v| v.as_array()) {
        return array.iter().map(parse_rule).collect();
    }
    parse_rule(document).map(|rule| vec![rule])
}

/// Parse a single rule object
pub fn parse_rule(value: &Value) -> Result<Rule> {
    let id = value
        .get("id")
        .map(scalar_to_string)
        .filter(|id| !id.is_empty())
        .ok_or_else(|| RuleError::parse("Rule missing 'id'"))?;

    let name = value
        .get("name")
        .and_then(|v| v.as_str())
        .unwrap_or("Unnamed Rule")
        .to_string();

    let enabled = value
        .get("enabled")
        .and_then(|v| v.as_bool())
        .unwrap_or(true);

    let triggers = value
        .get("triggers")
        .and_then(|v| v.as_array())
        .ok_or_else(|| RuleError::parse(format!("Rule '{}' missing 'triggers' array", id)))?
        .iter()
        .map(parse_trigger)
        .collect::<Result<Vec<_>>>()?;

    Ok(Rule {
        id,
        name,
        enabled,
        triggers,
    })
}

/// Parse one trigger: `{ "type": "...", "attributes": { ... } }`
pub fn parse_trigger(value: &Value) -> Result<TriggerConfig> {
    let type_name = value
        .get("type")
        .and_then(|v| v.as_str())
        .ok_or_else(|| RuleError::parse("Trigger missing 'type'"))?;
    let kind = TriggerKind::from_name(type_name)?;

    let mut attributes = BTreeMap::new();
    if let Some(map) = value.get("attributes").and_then(|v| v.as_object()) {
        for (key, attr) in map {
            match attr {
                Value::Null => {},
                Value::Array(_) | Value::Object(_) => {
                    return Err(RuleError::parse(format!(
                        "Trigger attribute '{}' must be a scalar value",
                        key
                    )));
                },
                scalar => {
                    attributes.insert(key.clone(), scalar_to_string(scalar));
                },
            }
        }
    }

    Ok(TriggerConfig { kind, attributes })
}

/// Parse a field catalog document
pub fn parse_catalog(document: &Value) -> Result<FieldCatalog> {
    Ok(serde_json::from_value(document.clone())?)
}

/// Parse a change event document
pub fn parse_event(document: &Value) -> Result<ChangeEvent> {
    Ok(serde_json::from_value(document.clone())?)
}

fn scalar_to_string(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Bool(b) => if *b { "True" } else { "False" }.to_string(),
        other => other.to_string(),
    }
}
