//! MacroResolver - turns macro tokens into concrete values
//!
//! Resolution is a pure function of the token and the [`EvaluationContext`]:
//! - `@Me` -> current user identity
//! - `@Today`, `@StartOfDay`, `@StartOfMonth`, `@StartOfYear` -> dates, shifted by offset
//! - `@FieldValue=<ref>` -> another field's current value (soft: `Null` when unknown)
//! - `@CurrentIteration`, `@CurrentSprint` -> iteration path, shifted by offset
//! - `@Any` -> wildcard, never a concrete value

use chrono::{Datelike, Days, Months, NaiveDate, NaiveDateTime};
use std::fmt;
use tracing::debug;

use crate::context::{EvaluationContext, Identity};
use crate::error::{MacroError, Result};
use crate::token::{MacroKind, MacroToken, Operand};

/// Date format used when a resolved date is written back as text
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Resolved macro value
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MacroValue {
    /// Wildcard (`@Any`)
    Any,
    /// Nothing to compare against; callers treat it as "no match"
    Null,
    Date(NaiveDate),
    DateTime(NaiveDateTime),
    Identity(Identity),
    Text(String),
}

impl MacroValue {
    pub fn is_any(&self) -> bool {
        matches!(self, MacroValue::Any)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MacroValue::Null)
    }

    /// Calendar date carried by the value, if any
    pub fn as_date(&self) -> Option<NaiveDate> {
        match self {
            MacroValue::Date(date) => Some(*date),
            MacroValue::DateTime(datetime) => Some(datetime.date()),
            _ => None,
        }
    }

    /// Textual form written into a field, `None` for `Any`/`Null`
    pub fn to_field_string(&self) -> Option<String> {
        match self {
            MacroValue::Any | MacroValue::Null => None,
            MacroValue::Date(date) => Some(date.format(DATE_FORMAT).to_string()),
            MacroValue::DateTime(datetime) => {
                Some(datetime.format("%Y-%m-%dT%H:%M:%S").to_string())
            },
            MacroValue::Identity(identity) => Some(identity.to_string()),
            MacroValue::Text(text) => Some(text.clone()),
        }
    }
}

impl fmt::Display for MacroValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MacroValue::Any => write!(f, "*"),
            MacroValue::Null => write!(f, "null"),
            other => write!(f, "{}", other.to_field_string().unwrap_or_default()),
        }
    }
}

/// Macro resolver bound to one evaluation context
///
/// # Example
/// ```
/// use chrono::NaiveDate;
/// use oneclick_macro::{EvaluationContext, MacroResolver, MacroValue};
///
/// let today = NaiveDate::from_ymd_opt(2024, 3, 15).unwrap();
/// let ctx = EvaluationContext::new(today);
/// let resolver = MacroResolver::new(&ctx);
///
/// let value = resolver.resolve("@Today-5").unwrap();
/// assert_eq!(value, MacroValue::Date(NaiveDate::from_ymd_opt(2024, 3, 10).unwrap()));
/// ```
pub struct MacroResolver<'ctx> {
    context: &'ctx EvaluationContext,
}

impl<'ctx> MacroResolver<'ctx> {
    pub fn new(context: &'ctx EvaluationContext) -> Self {
        Self { context }
    }

    pub fn context(&self) -> &EvaluationContext {
        self.context
    }

    /// Parse and resolve a raw macro token
    pub fn resolve(&self, token: &str) -> Result<MacroValue> {
        let parsed = MacroToken::parse(token)?;
        self.resolve_token(&parsed)
    }

    /// Resolve an operand; literals resolve to themselves as text
    pub fn resolve_operand(&self, operand: &Operand) -> Result<MacroValue> {
        match operand {
            Operand::Macro(token) => self.resolve_token(token),
            Operand::Literal(text) => Ok(MacroValue::Text(text.clone())),
        }
    }

    /// Resolve an already parsed token
    pub fn resolve_token(&self, token: &MacroToken) -> Result<MacroValue> {
        let offset = token.offset.unwrap_or(0);
        let today = self.context.today();

        match token.kind {
            MacroKind::Any => Ok(MacroValue::Any),
            MacroKind::Me => Ok(self
                .context
                .current_user()
                .cloned()
                .map_or(MacroValue::Null, MacroValue::Identity)),
            MacroKind::Today => shift_days(today, offset, token).map(MacroValue::Date),
            MacroKind::StartOfDay => {
                let date = shift_days(today, offset, token)?;
                let midnight = date
                    .and_hms_opt(0, 0, 0)
                    .ok_or_else(|| out_of_range(token))?;
                Ok(MacroValue::DateTime(midnight))
            },
            MacroKind::StartOfMonth => {
                let first = NaiveDate::from_ymd_opt(today.year(), today.month(), 1)
                    .ok_or_else(|| out_of_range(token))?;
                shift_months(first, offset, token).map(MacroValue::Date)
            },
            MacroKind::StartOfYear => {
                let first =
                    NaiveDate::from_ymd_opt(today.year(), 1, 1).ok_or_else(|| out_of_range(token))?;
                let months = offset.checked_mul(12).ok_or_else(|| out_of_range(token))?;
                shift_months(first, months, token).map(MacroValue::Date)
            },
            MacroKind::FieldValue => {
                let reference = token.argument.as_deref().unwrap_or_default();
                match self.context.field_value(reference) {
                    Some(value) => Ok(MacroValue::Text(value.to_string())),
                    None => {
                        debug!("@FieldValue: no value for field '{}'", reference);
                        Ok(MacroValue::Null)
                    },
                }
            },
            MacroKind::CurrentIteration | MacroKind::CurrentSprint => {
                match self.context.iterations().shifted(offset) {
                    Some(path) => Ok(MacroValue::Text(path.to_string())),
                    None => {
                        debug!("{}: no scheduled iteration at offset {}", token.kind, offset);
                        Ok(MacroValue::Null)
                    },
                }
            },
        }
    }
}

/// Parse and resolve `token` against `context`
pub fn resolve(token: &str, context: &EvaluationContext) -> Result<MacroValue> {
    MacroResolver::new(context).resolve(token)
}

fn shift_days(date: NaiveDate, offset: i64, token: &MacroToken) -> Result<NaiveDate> {
    let days = Days::new(offset.unsigned_abs());
    let shifted = if offset >= 0 {
        date.checked_add_days(days)
    } else {
        date.checked_sub_days(days)
    };
    shifted.ok_or_else(|| out_of_range(token))
}

fn shift_months(date: NaiveDate, offset: i64, token: &MacroToken) -> Result<NaiveDate> {
    let months = u32::try_from(offset.unsigned_abs())
        .map(Months::new)
        .map_err(|_| out_of_range(token))?;
    let shifted = if offset >= 0 {
        date.checked_add_months(months)
    } else {
        date.checked_sub_months(months)
    };
    shifted.ok_or_else(|| out_of_range(token))
}

fn out_of_range(token: &MacroToken) -> MacroError {
    MacroError::invalid_operand(
        token.to_string(),
        "offset moves the date outside the supported range",
    )
}
