//! Macro commands: list supported macros, resolve a token

use anyhow::{anyhow, Result};
use colored::*;
use oneclick_macro::{MacroKind, MacroResolver, MacroToken, MacroValue};

use crate::context::Session;

/// Print the supported macros
pub fn list_macros(json: bool) -> Result<()> {
    if json {
        let rows: Vec<_> = MacroKind::ALL
            .iter()
            .map(|kind| {
                serde_json::json!({
                    "token": kind.to_string(),
                    "description": kind.description(),
                    "offset": kind.offset_unit(),
                    "argument": kind.requires_argument(),
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&rows)?);
        return Ok(());
    }

    println!("{}", "Supported macros".bright_cyan().bold());
    for kind in MacroKind::ALL {
        println!("  {:<20} {}", usage(kind).bright_yellow(), kind.description());
    }
    Ok(())
}

/// Usage pattern shown for a macro
fn usage(kind: MacroKind) -> String {
    if kind.requires_argument() {
        format!("{}=<field>", kind)
    } else if kind.accepts_offset() {
        format!("{}[+/-n]", kind)
    } else {
        kind.to_string()
    }
}

/// Resolve one token against the session context
///
/// `fields` are `Name=Value` pairs served to `@FieldValue`.
pub fn resolve_token(session: &Session, token: &str, fields: &[String], json: bool) -> Result<()> {
    let mut context = session.evaluation_context();
    for assignment in fields {
        let (field, value) = parse_field_assignment(assignment)?;
        context = context.with_field_value(field, value);
    }

    let parsed = MacroToken::parse(token)?;
    let value = MacroResolver::new(&context).resolve_token(&parsed)?;

    if json {
        let output = serde_json::json!({
            "token": parsed.to_string(),
            "value": value.to_field_string(),
            "any": value.is_any(),
        });
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(());
    }

    let shown = match &value {
        MacroValue::Any => "(any value)".bright_green(),
        MacroValue::Null => "(no value)".yellow(),
        other => other.to_string().bright_green(),
    };
    println!("{} = {}", parsed.to_string().bright_yellow(), shown);
    Ok(())
}

/// Split `Name=Value`
fn parse_field_assignment(raw: &str) -> Result<(&str, &str)> {
    raw.split_once('=')
        .map(|(field, value)| (field.trim(), value.trim()))
        .filter(|(field, _)| !field.is_empty())
        .ok_or_else(|| anyhow!("Invalid field '{}', expected Name=Value", raw))
}
