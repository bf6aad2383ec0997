//! Rule Validator
//!
//! Advisory validation of trigger configuration before a rule is saved.
//! Problems are collected rather than returned early, so an editor can show
//! all of them at once. Validation has no side effects and is safe to run on
//! every keystroke against partially edited configuration.

use oneclick_macro::{MacroKind, MacroToken, Operand};
use serde::Serialize;

use crate::coercion::coerce;
use crate::types::{
    FieldCatalog, FieldDescriptor, FieldType, Rule, TriggerConfig, ATTR_FIELD_NAME,
    ATTR_NEW_FIELD_VALUE, ATTR_OLD_FIELD_VALUE,
};

/// System fields a trigger may not watch
pub const DEFAULT_EXCLUDED_FIELDS: &[&str] = &[
    "System.Id",
    "System.Rev",
    "System.Watermark",
    "System.AuthorizedAs",
    "System.AuthorizedDate",
    "System.RevisedDate",
    "System.ChangedDate",
    "System.ChangedBy",
    "System.PersonId",
    "System.AreaId",
    "System.IterationId",
    "System.NodeName",
    "System.TeamProject",
    "System.WorkItemType",
];

/// Result of a validation pass
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ValidationResult {
    /// Whether the configuration may be saved
    pub valid: bool,
    /// Problems that block saving
    pub errors: Vec<String>,
    /// Observations that do not block saving
    pub warnings: Vec<String>,
}

impl ValidationResult {
    fn new() -> Self {
        Self {
            valid: true,
            ..Self::default()
        }
    }

    pub fn is_valid(&self) -> bool {
        self.valid && self.errors.is_empty()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.valid = false;
        self.errors.push(message.into());
    }

    fn warning(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    /// Fold another result in, prefixing its messages
    fn merge(&mut self, prefix: &str, other: ValidationResult) {
        self.valid &= other.valid;
        self.errors
            .extend(other.errors.into_iter().map(|e| format!("{}: {}", prefix, e)));
        self.warnings
            .extend(other.warnings.into_iter().map(|w| format!("{}: {}", prefix, w)));
    }
}

/// Trigger configuration validator
#[derive(Debug, Clone)]
pub struct RuleValidator {
    excluded_fields: Vec<String>,
}

impl Default for RuleValidator {
    fn default() -> Self {
        Self::with_excluded_fields(DEFAULT_EXCLUDED_FIELDS.iter().copied())
    }
}

impl RuleValidator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Validator with a custom system-field deny-list
    pub fn with_excluded_fields<I, S>(fields: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            excluded_fields: fields.into_iter().map(Into::into).collect(),
        }
    }

    pub fn excluded_fields(&self) -> &[String] {
        &self.excluded_fields
    }

    fn is_excluded(&self, field: &str) -> bool {
        self.excluded_fields
            .iter()
            .any(|excluded| excluded.eq_ignore_ascii_case(field))
    }

    /// Validate one trigger against the catalog of the targeted work item type
    pub fn validate(&self, trigger: &TriggerConfig, catalog: &FieldCatalog) -> ValidationResult {
        let mut result = ValidationResult::new();

        if !trigger.kind.watches_field() {
            if !trigger.attributes.is_empty() {
                result.warning(format!(
                    "{} triggers ignore attributes ({})",
                    trigger.kind,
                    trigger
                        .attributes
                        .keys()
                        .map(String::as_str)
                        .collect::<Vec<_>>()
                        .join(", ")
                ));
            }
            return result;
        }

        let field_name = trigger.field_name().map(str::trim).unwrap_or_default();
        let descriptor = self.check_field(field_name, catalog, &mut result);

        for attribute in [ATTR_OLD_FIELD_VALUE, ATTR_NEW_FIELD_VALUE] {
            if let Some(raw) = trigger.attribute(attribute) {
                check_operand(attribute, raw, descriptor, catalog, &mut result);
            }
        }

        if trigger.old_field_value().is_some() {
            result.warning(format!(
                "{} is not enforced: triggers are evaluated after the change is saved, \
                 when the previous value is no longer available",
                ATTR_OLD_FIELD_VALUE
            ));
        }

        result
    }

    /// Validate every trigger of a rule
    pub fn validate_rule(&self, rule: &Rule, catalog: &FieldCatalog) -> ValidationResult {
        let mut result = ValidationResult::new();

        if rule.name.trim().is_empty() {
            result.error("Rule name is empty");
        }
        if rule.triggers.is_empty() {
            result.error("Rule has no triggers");
        }

        for (index, trigger) in rule.triggers.iter().enumerate() {
            let prefix = format!("Trigger {} ({})", index + 1, trigger.kind);
            result.merge(&prefix, self.validate(trigger, catalog));
        }

        result
    }

    fn check_field<'c>(
        &self,
        field_name: &str,
        catalog: &'c FieldCatalog,
        result: &mut ValidationResult,
    ) -> Option<&'c FieldDescriptor> {
        if field_name.is_empty() {
            result.error(format!(
                "Field name is empty: '{}' must name the field the trigger watches",
                ATTR_FIELD_NAME
            ));
            return None;
        }

        let descriptor = catalog.find(field_name);
        let reference = descriptor.map_or(field_name, |d| d.reference_name.as_str());
        if self.is_excluded(reference) || self.is_excluded(field_name) {
            result.error(format!(
                "Field '{}' is a system field and cannot be used in a trigger",
                field_name
            ));
            return None;
        }

        if descriptor.is_none() {
            result.error(format!(
                "Field '{}' does not exist on {}",
                field_name,
                catalog.scope()
            ));
        }
        descriptor
    }
}

/// Check one operand: macro syntax first, then type coercion for literals
fn check_operand(
    attribute: &str,
    raw: &str,
    descriptor: Option<&FieldDescriptor>,
    catalog: &FieldCatalog,
    result: &mut ValidationResult,
) {
    let operand = match Operand::parse(raw) {
        Ok(operand) => operand,
        Err(e) => {
            result.error(format!("{}: {}", attribute, e));
            return;
        },
    };

    match operand {
        Operand::Macro(token) => {
            check_macro(attribute, &token, catalog, result);
            if let Some(descriptor) = descriptor {
                if !macro_fits(token.kind, descriptor.field_type) {
                    result.warning(format!(
                        "{}: {} can never equal a {} field ('{}')",
                        attribute, token, descriptor.field_type, descriptor.reference_name
                    ));
                }
            }
        },
        // Empty literal means "field cleared" and fits every type
        Operand::Literal(text) if text.trim().is_empty() => {},
        Operand::Literal(text) => {
            if let Some(descriptor) = descriptor {
                if let Err(e) = coerce(&text, descriptor.field_type) {
                    result.error(format!("{}: {}", attribute, e));
                }
            }
        },
    }
}

fn check_macro(
    attribute: &str,
    token: &MacroToken,
    catalog: &FieldCatalog,
    result: &mut ValidationResult,
) {
    if token.kind != MacroKind::FieldValue {
        return;
    }
    if let Some(reference) = token.argument.as_deref() {
        if !catalog.contains(reference) {
            result.error(format!(
                "{}: {} references field '{}', which does not exist on {}",
                attribute,
                token.kind,
                reference,
                catalog.scope()
            ));
        }
    }
}

/// Whether a macro's value kind can ever match the field type
fn macro_fits(kind: MacroKind, field_type: FieldType) -> bool {
    if field_type.is_textual() {
        return true;
    }
    match kind {
        MacroKind::Any | MacroKind::FieldValue => true,
        MacroKind::Me => field_type == FieldType::Identity,
        k if k.is_date() => field_type.is_date(),
        k if k.is_iteration() => field_type == FieldType::TreePath,
        _ => false,
    }
}

/// Validate `trigger` with the default system-field deny-list
pub fn validate(trigger: &TriggerConfig, catalog: &FieldCatalog) -> ValidationResult {
    RuleValidator::default().validate(trigger, catalog)
}
