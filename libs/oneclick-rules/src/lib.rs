//! OneClick Rules - trigger evaluation and rule validation
//!
//! Decides whether automation rules fire for a work item change, and checks
//! rule configuration before it is saved:
//! - Trigger evaluation against a field catalog and a context snapshot
//! - Typed operand coercion (boolean, numeric, date, text, identity)
//! - Save-time validation with errors and warnings
//! - Rule, catalog and event documents in JSON or YAML
//! - Per-rule daily decision logs
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────┐     ┌──────────────┐     ┌──────────────┐
//! │    Host     │────▶│   Context    │────▶│  Evaluator   │──▶ RuleDecision
//! │ (async API) │     │  (snapshot)  │     │ (per trigger)│
//! └─────────────┘     └──────────────┘     └──────────────┘
//!                                                 │
//!                     ┌──────────────┐            ▼
//!                     │  Validator   │     ┌──────────────┐
//!                     │ (save time)  │     │ RuleLogger   │
//!                     └──────────────┘     └──────────────┘
//! ```
//!
//! # Example
//!
//! ```
//! use chrono::NaiveDate;
//! use oneclick_macro::EvaluationContext;
//! use oneclick_rules::{
//!     should_fire, ChangeEvent, FieldCatalog, FieldDescriptor, FieldType, TriggerConfig,
//! };
//! use serde_json::json;
//!
//! let catalog = FieldCatalog::new(vec![FieldDescriptor::new(
//!     "System.State",
//!     "State",
//!     FieldType::String,
//! )]);
//! let context = EvaluationContext::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap());
//! let trigger = TriggerConfig::field_changed("System.State", "Active");
//! let event = ChangeEvent::field_changed("System.State", json!("Active"));
//!
//! assert!(should_fire(&event, &trigger, &catalog, &context));
//! ```

pub mod coercion;
mod error;
mod evaluator;
mod host;
pub mod logger;
mod parser;
pub mod types;
mod validator;

// Re-export public API
pub use error::{Result, RuleError};
pub use evaluator::{should_fire, with_event_values, RuleDecision, TriggerEvaluator};
pub use host::{capture_context, evaluate_with_host, HostServices, MemoryHost};
pub use logger::{format_decision, format_trigger, RuleLogger, RuleLoggerManager};
pub use parser::{load_document, parse_catalog, parse_event, parse_rule, parse_rules, parse_trigger};
pub use validator::{validate, RuleValidator, ValidationResult, DEFAULT_EXCLUDED_FIELDS};

pub use types::{
    ChangeEvent, EventKind, FieldCatalog, FieldDescriptor, FieldType, Rule, TriggerConfig,
    TriggerKind,
};
