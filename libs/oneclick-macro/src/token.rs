//! Macro token grammar
//!
//! ```text
//! "@" NAME [ "=" ARG ] [ ("+" | "-") DIGITS ]
//! ```
//!
//! NAME is matched case-insensitively against [`MacroKind`]. Saved rules store
//! tokens verbatim, so `Display` re-emits the canonical spelling of a parsed
//! token and parsing accepts everything earlier releases wrote.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{MacroError, Result};

/// Prefix that marks an operand as a macro token
pub const MACRO_PREFIX: char = '@';

/// Closed set of supported macros
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MacroKind {
    /// Current user identity
    Me,
    /// Current date, offset in days
    Today,
    /// Midnight of the current date, offset in days
    StartOfDay,
    /// First day of the current month, offset in months
    StartOfMonth,
    /// First day of the current year, offset in years
    StartOfYear,
    /// Current value of another field (`@FieldValue=<referenceName>`)
    ///
    /// A reference ending in `-<digits>` or `+<digits>` (e.g.
    /// `Custom.Phase-2`) reads as an offset and is rejected, since this
    /// macro takes none. Refer to such fields by display name instead.
    FieldValue,
    /// Wildcard, only meaningful in trigger comparisons
    Any,
    /// Current iteration path, offset in iterations
    CurrentIteration,
    /// Same schedule as `CurrentIteration`
    CurrentSprint,
}

impl MacroKind {
    pub const ALL: [MacroKind; 9] = [
        MacroKind::Me,
        MacroKind::Today,
        MacroKind::StartOfDay,
        MacroKind::StartOfMonth,
        MacroKind::StartOfYear,
        MacroKind::FieldValue,
        MacroKind::Any,
        MacroKind::CurrentIteration,
        MacroKind::CurrentSprint,
    ];

    /// Canonical macro name (without the `@`)
    pub fn name(self) -> &'static str {
        match self {
            MacroKind::Me => "Me",
            MacroKind::Today => "Today",
            MacroKind::StartOfDay => "StartOfDay",
            MacroKind::StartOfMonth => "StartOfMonth",
            MacroKind::StartOfYear => "StartOfYear",
            MacroKind::FieldValue => "FieldValue",
            MacroKind::Any => "Any",
            MacroKind::CurrentIteration => "CurrentIteration",
            MacroKind::CurrentSprint => "CurrentSprint",
        }
    }

    /// Case-insensitive lookup by name (without the `@`)
    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|kind| kind.name().eq_ignore_ascii_case(name))
    }

    /// Comma separated list of every supported token, for diagnostics
    pub fn supported_list() -> String {
        Self::ALL
            .iter()
            .map(|kind| format!("{}{}", MACRO_PREFIX, kind.name()))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn is_date(self) -> bool {
        matches!(
            self,
            MacroKind::Today
                | MacroKind::StartOfDay
                | MacroKind::StartOfMonth
                | MacroKind::StartOfYear
        )
    }

    pub fn is_iteration(self) -> bool {
        matches!(self, MacroKind::CurrentIteration | MacroKind::CurrentSprint)
    }

    pub fn accepts_offset(self) -> bool {
        self.is_date() || self.is_iteration()
    }

    pub fn requires_argument(self) -> bool {
        self == MacroKind::FieldValue
    }

    /// Unit a signed offset is counted in
    pub fn offset_unit(self) -> Option<&'static str> {
        match self {
            MacroKind::Today | MacroKind::StartOfDay => Some("days"),
            MacroKind::StartOfMonth => Some("months"),
            MacroKind::StartOfYear => Some("years"),
            MacroKind::CurrentIteration | MacroKind::CurrentSprint => Some("iterations"),
            _ => None,
        }
    }

    /// One-line description shown by tooling
    pub fn description(self) -> &'static str {
        match self {
            MacroKind::Me => "current user",
            MacroKind::Today => "current date",
            MacroKind::StartOfDay => "midnight of the current date",
            MacroKind::StartOfMonth => "first day of the current month",
            MacroKind::StartOfYear => "first day of the current year",
            MacroKind::FieldValue => "value of another field on the work item",
            MacroKind::Any => "matches any value",
            MacroKind::CurrentIteration => "current iteration path",
            MacroKind::CurrentSprint => "current sprint (iteration) path",
        }
    }
}

impl fmt::Display for MacroKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}{}", MACRO_PREFIX, self.name())
    }
}

/// Parsed macro token
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MacroToken {
    pub kind: MacroKind,
    pub argument: Option<String>,
    pub offset: Option<i64>,
}

impl MacroToken {
    pub fn new(kind: MacroKind) -> Self {
        Self {
            kind,
            argument: None,
            offset: None,
        }
    }

    pub fn with_argument(mut self, argument: impl Into<String>) -> Self {
        self.argument = Some(argument.into());
        self
    }

    pub fn with_offset(mut self, offset: i64) -> Self {
        self.offset = Some(offset);
        self
    }

    /// Parse a macro token
    ///
    /// Fails with [`MacroError::UnsupportedMacro`] when the name is not one of
    /// [`MacroKind::ALL`], and with [`MacroError::InvalidOperand`] when the
    /// argument or offset is malformed or not accepted by the macro.
    pub fn parse(token: &str) -> Result<Self> {
        let trimmed = token.trim();
        let body = trimmed.strip_prefix(MACRO_PREFIX).ok_or_else(|| {
            MacroError::invalid_operand(token, "macro tokens must start with '@'")
        })?;

        let name_end = body
            .find(|c: char| c == '=' || c == '+' || c == '-' || c.is_whitespace())
            .unwrap_or(body.len());
        let (name, rest) = body.split_at(name_end);
        let kind = MacroKind::from_name(name).ok_or_else(|| MacroError::unsupported(name))?;

        let rest = rest.trim_start();
        let (argument, offset_text) = match rest.strip_prefix('=') {
            Some(arg) => split_argument(arg),
            None => (None, rest),
        };

        let offset = if offset_text.trim().is_empty() {
            None
        } else {
            Some(parse_offset(trimmed, offset_text)?)
        };

        let parsed = Self {
            kind,
            argument,
            offset,
        };
        parsed.check_shape(trimmed)?;
        Ok(parsed)
    }

    fn check_shape(&self, token: &str) -> Result<()> {
        if self.kind.requires_argument() && self.argument.is_none() {
            return Err(MacroError::invalid_operand(
                token,
                format!(
                    "{} requires a field reference, e.g. {}=System.Title",
                    self.kind, self.kind
                ),
            ));
        }
        if !self.kind.requires_argument() && self.argument.is_some() {
            return Err(MacroError::invalid_operand(
                token,
                format!("{} does not take an '=' argument", self.kind),
            ));
        }
        if self.offset.is_some() && !self.kind.accepts_offset() {
            return Err(MacroError::invalid_operand(
                token,
                format!("{} does not accept an offset", self.kind),
            ));
        }
        Ok(())
    }
}

impl fmt::Display for MacroToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)?;
        if let Some(argument) = &self.argument {
            write!(f, "={}", argument)?;
        }
        match self.offset {
            Some(offset) if offset >= 0 => write!(f, "+{}", offset),
            Some(offset) => write!(f, "{}", offset),
            None => Ok(()),
        }
    }
}

impl FromStr for MacroToken {
    type Err = MacroError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}

/// Split `ARG[(+|-)DIGITS]` into the argument and the offset text
///
/// The offset is only split off when everything after the last sign is
/// digits, so references such as `Custom.Go-Live` stay intact.
fn split_argument(body: &str) -> (Option<String>, &str) {
    let split = body.rfind(|c: char| c == '+' || c == '-').filter(|&idx| {
        let digits = body[idx + 1..].trim();
        !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit())
    });

    let (argument, offset) = match split {
        Some(idx) => body.split_at(idx),
        None => (body, ""),
    };

    let argument = argument.trim();
    ((!argument.is_empty()).then(|| argument.to_string()), offset)
}

fn parse_offset(token: &str, text: &str) -> Result<i64> {
    let text = text.trim();
    let (negative, digits) = match text.chars().next() {
        Some('+') => (false, text[1..].trim_start()),
        Some('-') => (true, text[1..].trim_start()),
        _ => {
            return Err(MacroError::invalid_operand(
                token,
                format!("unexpected text '{}' after macro name", text),
            ))
        },
    };

    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(MacroError::invalid_operand(
            token,
            format!("offset '{}' is not a signed integer", text),
        ));
    }

    let magnitude: i64 = digits.parse().map_err(|_| {
        MacroError::invalid_operand(token, format!("offset '{}' is out of range", text))
    })?;

    Ok(if negative { -magnitude } else { magnitude })
}

/// Trigger operand: either a macro token or a literal value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operand {
    Macro(MacroToken),
    Literal(String),
}

impl Operand {
    /// Classify a raw operand; anything not starting with `@` is a literal
    pub fn parse(raw: &str) -> Result<Self> {
        if is_macro(raw) {
            MacroToken::parse(raw).map(Operand::Macro)
        } else {
            Ok(Operand::Literal(raw.to_string()))
        }
    }

    pub fn is_any(&self) -> bool {
        matches!(self, Operand::Macro(token) if token.kind == MacroKind::Any)
    }

    pub fn as_macro(&self) -> Option<&MacroToken> {
        match self {
            Operand::Macro(token) => Some(token),
            Operand::Literal(_) => None,
        }
    }
}

/// Whether a raw operand is written as a macro token
pub fn is_macro(raw: &str) -> bool {
    raw.trim_start().starts_with(MACRO_PREFIX)
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;

    #[test]
    fn test_parse_every_kind_in_any_casing() {
        for kind in MacroKind::ALL {
            let argument = if kind.requires_argument() {
                "=System.Title"
            } else {
                ""
            };
            for name in [
                kind.name().to_string(),
                kind.name().to_lowercase(),
                kind.name().to_uppercase(),
            ] {
                let token = MacroToken::parse(&format!("@{}{}", name, argument)).unwrap();
                assert_eq!(token.kind, kind);
            }
        }
    }

    #[test]
    fn test_parse_offsets() {
        let plus = MacroToken::parse("@Today+5").unwrap();
        assert_eq!(plus.offset, Some(5));

        let minus = MacroToken::parse("@today-5").unwrap();
        assert_eq!(minus.offset, Some(-5));

        let spaced = MacroToken::parse("@StartOfMonth - 2").unwrap();
        assert_eq!(spaced.kind, MacroKind::StartOfMonth);
        assert_eq!(spaced.offset, Some(-2));

        let none = MacroToken::parse("@Today").unwrap();
        assert_eq!(none.offset, None);
    }

    #[test]
    fn test_bad_offset_is_invalid_operand() {
        for token in ["@Today+abc", "@Today+", "@Today-1.5", "@Today 5"] {
            let err = MacroToken::parse(token).unwrap_err();
            assert!(
                matches!(err, MacroError::InvalidOperand { .. }),
                "{} -> {:?}",
                token,
                err
            );
        }
    }

    #[test]
    fn test_unknown_name_lists_supported_set() {
        let err = MacroToken::parse("@Yesterday").unwrap_err();
        match err {
            MacroError::UnsupportedMacro { name, supported } => {
                assert_eq!(name, "Yesterday");
                assert!(supported.contains("@Today"));
                assert!(supported.contains("@CurrentSprint"));
            },
            other => panic!("Expected UnsupportedMacro, got {:?}", other),
        }

        assert!(matches!(
            MacroToken::parse("@").unwrap_err(),
            MacroError::UnsupportedMacro { .. }
        ));
        assert!(matches!(
            MacroToken::parse("@Me!").unwrap_err(),
            MacroError::UnsupportedMacro { .. }
        ));
    }

    #[test]
    fn test_field_value_argument() {
        let token = MacroToken::parse("@FieldValue=System.CreatedBy").unwrap();
        assert_eq!(token.kind, MacroKind::FieldValue);
        assert_eq!(token.argument.as_deref(), Some("System.CreatedBy"));

        let hyphenated = MacroToken::parse("@fieldvalue=Custom.Go-Live").unwrap();
        assert_eq!(hyphenated.argument.as_deref(), Some("Custom.Go-Live"));
        assert_eq!(hyphenated.offset, None);

        let missing = MacroToken::parse("@FieldValue").unwrap_err();
        assert!(missing.to_string().contains("requires a field reference"));

        let empty = MacroToken::parse("@FieldValue=").unwrap_err();
        assert!(matches!(empty, MacroError::InvalidOperand { .. }));
    }

    #[test]
    fn test_field_value_reference_with_numeric_suffix() {
        // Trailing `-<digits>` is an offset, which @FieldValue rejects
        let err = MacroToken::parse("@FieldValue=Custom.Phase-2").unwrap_err();
        assert!(matches!(err, MacroError::InvalidOperand { .. }));
        assert!(err.to_string().contains("does not accept an offset"));

        let by_name = MacroToken::parse("@FieldValue=Phase 2").unwrap();
        assert_eq!(by_name.argument.as_deref(), Some("Phase 2"));
    }

    #[test]
    fn test_shape_rules() {
        assert!(MacroToken::parse("@Me+1").is_err());
        assert!(MacroToken::parse("@Any-2").is_err());
        assert!(MacroToken::parse("@Today=5").is_err());
        assert!(MacroToken::parse("@FieldValue=System.Title+1").is_err());
        assert!(MacroToken::parse("@CurrentIteration+1").is_ok());
    }

    #[test]
    fn test_display_is_canonical() {
        let token = MacroToken::parse("  @startofyear-1 ").unwrap();
        assert_eq!(token.to_string(), "@StartOfYear-1");

        let token = MacroToken::parse("@TODAY+0").unwrap();
        assert_eq!(token.to_string(), "@Today+0");

        let token = MacroToken::new(MacroKind::FieldValue).with_argument("System.State");
        assert_eq!(token.to_string(), "@FieldValue=System.State");
    }

    #[test]
    fn test_operand_classification() {
        assert_eq!(
            Operand::parse("Active").unwrap(),
            Operand::Literal("Active".to_string())
        );
        assert!(Operand::parse("@any").unwrap().is_any());
        assert!(!Operand::parse("@Me").unwrap().is_any());
        assert!(Operand::parse("@Bogus").is_err());
        assert!(is_macro(" @Me"));
        assert!(!is_macro("me@example.com"));
    }
}
