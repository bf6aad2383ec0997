//! Rule Engine Error Types

use oneclick_macro::MacroError;
use thiserror::Error;

/// Result type for rule operations
pub type Result<T> = std::result::Result<T, RuleError>;

/// Rule engine errors
#[derive(Debug, Error)]
pub enum RuleError {
    /// Macro token could not be parsed or resolved
    #[error(transparent)]
    Macro(#[from] MacroError),

    /// Operand does not match the field type
    #[error("Cannot use '{value}' as {field_type}: {reason}")]
    TypeCoercion {
        value: String,
        field_type: String,
        reason: String,
    },

    /// Field is not in the catalog (rule no longer applies)
    #[error("Field not found: {0}")]
    FieldNotFound(String),

    /// Unknown trigger type
    #[error("Unsupported trigger type '{0}'. Supported triggers: {1}")]
    UnsupportedTrigger(String, String),

    /// Rule document parsing error
    #[error("Rule parsing error: {0}")]
    ParseError(String),

    /// Serialization error
    #[error("Serialization error: {0}")]
    SerializationError(String),

    /// Host service lookup failed
    #[error("Host error: {0}")]
    HostError(String),

    /// IO error while reading a document
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl RuleError {
    pub fn type_coercion(
        value: impl Into<String>,
        field_type: impl std::fmt::Display,
        reason: impl Into<String>,
    ) -> Self {
        Self::TypeCoercion {
            value: value.into(),
            field_type: field_type.to_string(),
            reason: reason.into(),
        }
    }

    pub fn parse(msg: impl Into<String>) -> Self {
        Self::ParseError(msg.into())
    }

    pub fn host(msg: impl Into<String>) -> Self {
        Self::HostError(msg.into())
    }

    /// Soft errors mean "rule inapplicable" rather than a broken rule
    pub fn is_soft(&self) -> bool {
        matches!(self, RuleError::FieldNotFound(_))
    }
}

impl From<serde_json::Error> for RuleError {
    fn from(err: serde_json::Error) -> Self {
        RuleError::SerializationError(err.to_string())
    }
}

impl From<serde_yaml::Error> for RuleError {
    fn from(err: serde_yaml::Error) -> Self {
        RuleError::SerializationError(err.to_string())
    }
}
