//! Operand coercion
//!
//! Converts trigger operands (strings from rule configuration) and host field
//! values (JSON) into typed values, and compares them with per-type equality.
//!
//! Operand rules are strict:
//! - boolean: `True`/`1` and `False`/`0`, case-insensitive
//! - integer/double: trimmed, non-empty, finite
//! - dateTime: `yyyy-MM-dd`
//! - everything else passes through as text
//!
//! Host values are read leniently, since hosts report dates as full
//! timestamps and identities as objects.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use oneclick_macro::{Identity, DATE_FORMAT};
use serde_json::Value;

use crate::error::{Result, RuleError};
use crate::types::FieldType;

/// Operand or field value converted to the field's type
#[derive(Debug, Clone, PartialEq)]
pub enum TypedValue {
    Boolean(bool),
    Integer(i64),
    Double(f64),
    Date(NaiveDate),
    Text(String),
}

/// Coerce an operand string to `field_type`
pub fn coerce(raw: &str, field_type: FieldType) -> Result<TypedValue> {
    match field_type {
        FieldType::Boolean => parse_boolean(raw)
            .map(TypedValue::Boolean)
            .ok_or_else(|| {
                RuleError::type_coercion(raw, field_type, "expected True, False, 1 or 0")
            }),
        ty if ty.is_integer() => {
            let text = non_empty(raw, field_type)?;
            text.parse::<i64>()
                .map(TypedValue::Integer)
                .map_err(|_| RuleError::type_coercion(raw, field_type, "expected a whole number"))
        },
        ty if ty.is_double() => {
            let text = non_empty(raw, field_type)?;
            text.parse::<f64>()
                .ok()
                .filter(|value| value.is_finite())
                .map(TypedValue::Double)
                .ok_or_else(|| RuleError::type_coercion(raw, field_type, "expected a number"))
        },
        FieldType::DateTime => {
            let text = non_empty(raw, field_type)?;
            NaiveDate::parse_from_str(text, DATE_FORMAT)
                .map(TypedValue::Date)
                .map_err(|_| RuleError::type_coercion(raw, field_type, "expected yyyy-MM-dd"))
        },
        _ => Ok(TypedValue::Text(raw.to_string())),
    }
}

/// Format a typed value back to operand text
pub fn format_value(value: &TypedValue) -> String {
    match value {
        TypedValue::Boolean(true) => "True".to_string(),
        TypedValue::Boolean(false) => "False".to_string(),
        TypedValue::Integer(i) => i.to_string(),
        TypedValue::Double(d) => d.to_string(),
        TypedValue::Date(date) => date.format(DATE_FORMAT).to_string(),
        TypedValue::Text(text) => text.clone(),
    }
}

fn non_empty(raw: &str, field_type: FieldType) -> Result<&str> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(RuleError::type_coercion(raw, field_type, "value is empty"));
    }
    Ok(text)
}

fn parse_boolean(raw: &str) -> Option<bool> {
    let text = raw.trim();
    if text.eq_ignore_ascii_case("true") || text == "1" {
        Some(true)
    } else if text.eq_ignore_ascii_case("false") || text == "0" {
        Some(false)
    } else {
        None
    }
}

/// Text form of a host value, as stored in the evaluation context
///
/// Identity objects become `Display Name <unique>`; null becomes `None`.
pub fn host_value_text(value: &Value) -> Option<String> {
    match value {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(if *b { "True" } else { "False" }.to_string()),
        Value::Number(n) => Some(n.to_string()),
        Value::Object(map) => {
            let display = map
                .get("displayName")
                .and_then(|v| v.as_str())
                .or_else(|| map.get("name").and_then(|v| v.as_str()));
            let unique = map.get("uniqueName").and_then(|v| v.as_str());
            match (display, unique) {
                (Some(display), Some(unique)) => Some(format!("{} <{}>", display, unique)),
                (Some(display), None) => Some(display.to_string()),
                (None, Some(unique)) => Some(unique.to_string()),
                (None, None) => Some(value.to_string()),
            }
        },
        Value::Array(_) => Some(value.to_string()),
    }
}

/// Read a host field value as `field_type`, `None` when absent or unreadable
pub fn from_host_value(value: &Value, field_type: FieldType) -> Option<TypedValue> {
    match (value, field_type) {
        (Value::Null, _) => None,
        (Value::Bool(b), FieldType::Boolean) => Some(TypedValue::Boolean(*b)),
        (Value::Number(n), ty) if ty.is_integer() => n
            .as_i64()
            .or_else(|| n.as_f64().filter(|f| f.fract() == 0.0).map(|f| f as i64))
            .map(TypedValue::Integer),
        (Value::Number(n), ty) if ty.is_double() => n.as_f64().map(TypedValue::Double),
        (Value::String(s), FieldType::DateTime) => parse_host_date(s).map(TypedValue::Date),
        (_, ty) if is_scalar_type(ty) => {
            host_value_text(value).and_then(|text| coerce(&text, ty).ok())
        },
        _ => host_value_text(value).map(TypedValue::Text),
    }
}

fn is_scalar_type(field_type: FieldType) -> bool {
    field_type.is_integer()
        || field_type.is_double()
        || field_type.is_date()
        || field_type == FieldType::Boolean
}

fn parse_host_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .or_else(|| DateTime::parse_from_rfc3339(raw).ok().map(|dt| dt.date_naive()))
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|dt| dt.date())
        })
}

/// Whether a reported value means "field is empty"
pub fn is_cleared(value: Option<&Value>) -> bool {
    match value {
        None | Some(Value::Null) => true,
        Some(Value::String(s)) => s.trim().is_empty(),
        Some(_) => false,
    }
}

/// Compare an expected value against the actual field value
///
/// Strings compare case-insensitively, identities by identity, numbers
/// numerically (integer and double interchangeably), dates by calendar day.
pub fn values_equal(expected: &TypedValue, actual: &TypedValue, field_type: FieldType) -> bool {
    match (expected, actual) {
        (TypedValue::Boolean(a), TypedValue::Boolean(b)) => a == b,
        (TypedValue::Integer(a), TypedValue::Integer(b)) => a == b,
        (
            TypedValue::Integer(_) | TypedValue::Double(_),
            TypedValue::Integer(_) | TypedValue::Double(_),
        ) => as_f64(expected) == as_f64(actual),
        (TypedValue::Date(a), TypedValue::Date(b)) => a == b,
        (TypedValue::Text(a), TypedValue::Text(b)) if field_type == FieldType::Identity => {
            Identity::parse(a).same_as(&Identity::parse(b))
        },
        (TypedValue::Text(a), TypedValue::Text(b)) => a.trim().eq_ignore_ascii_case(b.trim()),
        _ => false,
    }
}

fn as_f64(value: &TypedValue) -> Option<f64> {
    match value {
        TypedValue::Integer(i) => Some(*i as f64),
        TypedValue::Double(d) => Some(*d),
        _ => None,
    }
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_boolean_coercion() {
        for raw in ["True", "true", "TRUE", "1"] {
            assert_eq!(coerce(raw, FieldType::Boolean).unwrap(), TypedValue::Boolean(true));
        }
        for raw in ["False", "false", "0"] {
            assert_eq!(coerce(raw, FieldType::Boolean).unwrap(), TypedValue::Boolean(false));
        }
        for raw in ["yes", "", "2", "truthy"] {
            assert!(matches!(
                coerce(raw, FieldType::Boolean).unwrap_err(),
                RuleError::TypeCoercion { .. }
            ));
        }
    }

    #[test]
    fn test_boolean_formats_back() {
        let value = coerce("True", FieldType::Boolean).unwrap();
        assert!(format_value(&value).eq_ignore_ascii_case("True"));
        let value = coerce("0", FieldType::Boolean).unwrap();
        assert_eq!(format_value(&value), "False");
    }

    #[test]
    fn test_numeric_coercion_is_strict() {
        assert_eq!(coerce(" 42 ", FieldType::Integer).unwrap(), TypedValue::Integer(42));
        assert_eq!(
            coerce("3", FieldType::PicklistInteger).unwrap(),
            TypedValue::Integer(3)
        );
        assert!(coerce("4.5", FieldType::Integer).is_err());
        assert!(coerce("12abc", FieldType::Integer).is_err());
        assert!(coerce("", FieldType::Integer).is_err());

        assert_eq!(coerce("2.5", FieldType::Double).unwrap(), TypedValue::Double(2.5));
        assert!(coerce("NaN", FieldType::Double).is_err());
        assert!(coerce("inf", FieldType::PicklistDouble).is_err());
    }

    #[test]
    fn test_date_coercion() {
        assert_eq!(
            coerce("2024-03-15", FieldType::DateTime).unwrap(),
            TypedValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
        );
        assert!(coerce("15/03/2024", FieldType::DateTime).is_err());
        assert!(coerce("2024-03-15T10:00:00Z", FieldType::DateTime).is_err());
    }

    #[test]
    fn test_text_passes_through() {
        assert_eq!(
            coerce("Anything goes", FieldType::Html).unwrap(),
            TypedValue::Text("Anything goes".to_string())
        );
        assert_eq!(
            coerce("Fabrikam\\Web", FieldType::TreePath).unwrap(),
            TypedValue::Text("Fabrikam\\Web".to_string())
        );
    }

    #[test]
    fn test_host_values() {
        assert_eq!(
            from_host_value(&json!("2024-03-15T08:30:00Z"), FieldType::DateTime),
            Some(TypedValue::Date(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap()))
        );
        assert_eq!(
            from_host_value(&json!(2), FieldType::Integer),
            Some(TypedValue::Integer(2))
        );
        assert_eq!(
            from_host_value(&json!(2.0), FieldType::Integer),
            Some(TypedValue::Integer(2))
        );
        assert_eq!(
            from_host_value(&json!(true), FieldType::Boolean),
            Some(TypedValue::Boolean(true))
        );
        assert_eq!(
            from_host_value(&json!("1"), FieldType::Boolean),
            Some(TypedValue::Boolean(true))
        );
        assert_eq!(
            from_host_value(
                &json!({ "displayName": "Jane Doe", "uniqueName": "jane@contoso.com" }),
                FieldType::Identity
            ),
            Some(TypedValue::Text("Jane Doe <jane@contoso.com>".to_string()))
        );
        assert_eq!(from_host_value(&Value::Null, FieldType::String), None);
    }

    #[test]
    fn test_type_equality() {
        let ty = FieldType::String;
        assert!(values_equal(
            &TypedValue::Text("active".into()),
            &TypedValue::Text("Active".into()),
            ty
        ));
        assert!(values_equal(
            &TypedValue::Integer(2),
            &TypedValue::Double(2.0),
            FieldType::Double
        ));
        assert!(values_equal(
            &TypedValue::Text("jane@contoso.com".into()),
            &TypedValue::Text("Jane Doe <JANE@contoso.com>".into()),
            FieldType::Identity
        ));
        assert!(!values_equal(
            &TypedValue::Text("Active".into()),
            &TypedValue::Integer(1),
            ty
        ));
    }

    #[test]
    fn test_cleared_values() {
        assert!(is_cleared(None));
        assert!(is_cleared(Some(&Value::Null)));
        assert!(is_cleared(Some(&json!("  "))));
        assert!(!is_cleared(Some(&json!(0))));
    }
}
