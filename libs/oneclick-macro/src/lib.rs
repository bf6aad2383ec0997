//! oneclick-macro - Macro tokens for OneClick work-item rules
//!
//! Parses `@`-prefixed operands found in trigger configuration and resolves
//! them against an explicit [`EvaluationContext`].
//!
//! # Grammar
//!
//! ```text
//! "@" NAME [ "=" ARG ] [ ("+" | "-") DIGITS ]
//! ```
//!
//! # Supported Macros
//!
//! | Macro | Argument | Offset unit | Resolves to |
//! |-------|----------|-------------|-------------|
//! | `@Me` | - | - | current user identity |
//! | `@Today` | - | days | current date |
//! | `@StartOfDay` | - | days | midnight of the current date |
//! | `@StartOfMonth` | - | months | first day of the month |
//! | `@StartOfYear` | - | years | first day of the year |
//! | `@FieldValue` | field reference | - | another field's value |
//! | `@Any` | - | - | wildcard (trigger comparisons only) |
//! | `@CurrentIteration` | - | iterations | current iteration path |
//! | `@CurrentSprint` | - | iterations | current iteration path |
//!
//! A `@FieldValue` reference ending in `-<digits>` is read as an offset and
//! rejected; reference such fields by display name.
//!
//! # Example
//!
//! ```rust
//! use chrono::NaiveDate;
//! use oneclick_macro::{resolve, EvaluationContext, Identity, MacroValue};
//!
//! let ctx = EvaluationContext::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
//!     .with_current_user(Identity::parse("Jane Doe <jane@contoso.com>"));
//!
//! assert_eq!(
//!     resolve("@today+5", &ctx).unwrap(),
//!     MacroValue::Date(NaiveDate::from_ymd_opt(2024, 3, 20).unwrap())
//! );
//! assert!(resolve("@Yesterday", &ctx).is_err());
//! ```

pub mod context;
pub mod error;
pub mod resolver;
pub mod token;

// Re-exports for convenience
pub use context::{EvaluationContext, Identity, IterationSchedule};
pub use error::{MacroError, Result};
pub use resolver::{resolve, MacroResolver, MacroValue, DATE_FORMAT};
pub use token::{is_macro, MacroKind, MacroToken, Operand, MACRO_PREFIX};
