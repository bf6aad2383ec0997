//! Error types for oneclick-macro

use thiserror::Error;

use crate::token::MacroKind;

/// Macro parsing and resolution errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MacroError {
    #[error("Unsupported macro '@{name}'. Supported macros: {supported}")]
    UnsupportedMacro { name: String, supported: String },

    #[error("Invalid operand '{token}': {reason}")]
    InvalidOperand { token: String, reason: String },
}

impl MacroError {
    pub fn unsupported(name: impl Into<String>) -> Self {
        Self::UnsupportedMacro {
            name: name.into(),
            supported: MacroKind::supported_list(),
        }
    }

    pub fn invalid_operand(token: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::InvalidOperand {
            token: token.into(),
            reason: reason.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, MacroError>;
