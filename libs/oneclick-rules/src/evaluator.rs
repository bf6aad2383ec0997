//! Trigger Evaluator - decide whether rules fire for a change event
//!
//! Evaluates triggers by:
//! 1. Looking up the watched field in the catalog (missing = rule inapplicable)
//! 2. Checking the field is among the event's changed fields
//! 3. Resolving the new-value operand (macro or literal) and comparing it with
//!    the field's post-commit value under the field type's equality
//!
//! Evaluation happens after commit, so the previous value is no longer
//! observable: `oldFieldValue` is never compared, only `newFieldValue` is
//! enforced. Downstream consumers rely on this; keep it.

use oneclick_macro::{EvaluationContext, MacroResolver, MacroValue, Operand};
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use crate::coercion::{coerce, from_host_value, host_value_text, is_cleared, values_equal, TypedValue};
use crate::error::{Result, RuleError};
use crate::logger::format_trigger;
use crate::types::{ChangeEvent, EventKind, FieldCatalog, FieldType, Rule, TriggerConfig, TriggerKind};

/// Outcome of evaluating one rule
#[derive(Debug, Clone, Serialize)]
pub struct RuleDecision {
    pub rule_id: String,
    pub rule_name: String,
    pub enabled: bool,
    pub fired: bool,
    /// Indices of the triggers that fired
    pub matched_triggers: Vec<usize>,
    /// Triggers that could not be evaluated (treated as not fired)
    pub errors: Vec<String>,
}

/// Trigger evaluator bound to one catalog and context snapshot
pub struct TriggerEvaluator<'a> {
    catalog: &'a FieldCatalog,
    context: &'a EvaluationContext,
}

impl<'a> TriggerEvaluator<'a> {
    pub fn new(catalog: &'a FieldCatalog, context: &'a EvaluationContext) -> Self {
        Self { catalog, context }
    }

    /// Fire decision; every failure degrades to `false`
    pub fn should_fire(&self, event: &ChangeEvent, trigger: &TriggerConfig) -> bool {
        match self.evaluate(event, trigger) {
            Ok(fired) => fired,
            Err(e) if e.is_soft() => {
                debug!("Trigger {} inapplicable: {}", format_trigger(trigger), e);
                false
            },
            Err(e) => {
                warn!("Trigger {} not evaluated: {}", format_trigger(trigger), e);
                false
            },
        }
    }

    /// Fire decision that surfaces why a trigger could not be evaluated
    pub fn evaluate(&self, event: &ChangeEvent, trigger: &TriggerConfig) -> Result<bool> {
        match trigger.kind {
            TriggerKind::WorkItemLoaded => Ok(event.kind == EventKind::Loaded),
            TriggerKind::WorkItemSaved => Ok(event.kind == EventKind::Saved),
            TriggerKind::FieldValueChanged => self.evaluate_field_change(event, trigger),
        }
    }

    fn evaluate_field_change(&self, event: &ChangeEvent, trigger: &TriggerConfig) -> Result<bool> {
        let field_name = trigger.field_name().map(str::trim).unwrap_or_default();
        let descriptor = self
            .catalog
            .find(field_name)
            .ok_or_else(|| RuleError::FieldNotFound(field_name.to_string()))?;

        if !event.has_changed(descriptor) {
            return Ok(false);
        }

        // No expected value: any change fires
        let Some(raw) = trigger.new_field_value() else {
            return Ok(true);
        };

        let operand = Operand::parse(raw)?;
        self.matches(
            &operand,
            event.current_value(descriptor),
            descriptor.field_type,
        )
    }

    fn matches(
        &self,
        operand: &Operand,
        current: Option<&Value>,
        field_type: FieldType,
    ) -> Result<bool> {
        let expected = match operand {
            Operand::Literal(text) if text.trim().is_empty() => return Ok(is_cleared(current)),
            Operand::Literal(text) => coerce(text, field_type)?,
            Operand::Macro(token) => match MacroResolver::new(self.context).resolve_token(token)? {
                MacroValue::Any => return Ok(true),
                MacroValue::Null => return Ok(false),
                value => expected_from_macro(&value, field_type)?,
            },
        };

        Ok(current
            .and_then(|value| from_host_value(value, field_type))
            .is_some_and(|actual| values_equal(&expected, &actual, field_type)))
    }

    /// Evaluate every trigger of a rule; the rule fires if any trigger fires
    pub fn evaluate_rule(&self, rule: &Rule, event: &ChangeEvent) -> RuleDecision {
        let mut decision = RuleDecision {
            rule_id: rule.id.clone(),
            rule_name: rule.name.clone(),
            enabled: rule.enabled,
            fired: false,
            matched_triggers: vec![],
            errors: vec![],
        };

        if !rule.enabled {
            debug!("Rule {} disabled, skipped", rule.id);
            return decision;
        }

        for (index, trigger) in rule.triggers.iter().enumerate() {
            match self.evaluate(event, trigger) {
                Ok(true) => decision.matched_triggers.push(index),
                Ok(false) => {},
                Err(e) if e.is_soft() => {
                    debug!("Rule {} trigger {} inapplicable: {}", rule.id, index, e);
                },
                Err(e) => {
                    warn!("Rule {} trigger {} not evaluated: {}", rule.id, index, e);
                    decision
                        .errors
                        .push(format!("{}: {}", format_trigger(trigger), e));
                },
            }
        }

        decision.fired = !decision.matched_triggers.is_empty();
        if decision.fired {
            info!("Rule {} ({}) fired", rule.id, rule.name);
        }
        decision
    }

    /// Evaluate independent rules; one malformed rule never affects another
    pub fn evaluate_rules(&self, rules: &[Rule], event: &ChangeEvent) -> Vec<RuleDecision> {
        rules
            .iter()
            .map(|rule| self.evaluate_rule(rule, event))
            .collect()
    }
}

/// Convert a resolved macro into the field's type
///
/// Resolved text comes from host values (other fields, iteration paths), so
/// it is read with the lenient host rules rather than operand rules.
fn expected_from_macro(value: &MacroValue, field_type: FieldType) -> Result<TypedValue> {
    if field_type.is_date() {
        if let Some(date) = value.as_date() {
            return Ok(TypedValue::Date(date));
        }
    }

    let text = value.to_field_string().unwrap_or_default();
    from_host_value(&Value::String(text.clone()), field_type).ok_or_else(|| {
        RuleError::type_coercion(text, field_type, "resolved macro value does not fit the field")
    })
}

/// Fire decision for one trigger against a catalog and context snapshot
pub fn should_fire(
    event: &ChangeEvent,
    trigger: &TriggerConfig,
    catalog: &FieldCatalog,
    context: &EvaluationContext,
) -> bool {
    TriggerEvaluator::new(catalog, context).should_fire(event, trigger)
}

/// Add the event's field values to a context, for `@FieldValue` lookups
pub fn with_event_values(context: EvaluationContext, event: &ChangeEvent) -> EvaluationContext {
    context.with_field_values(
        event
            .all_values()
            .filter_map(|(field, value)| host_value_text(value).map(|text| (field.clone(), text))),
    )
}

#[cfg(test)]
#[allow(clippy::disallowed_methods)] // Test code - unwrap is acceptable
mod tests {
    use super::*;
    use crate::types::FieldDescriptor;
    use chrono::NaiveDate;
    use oneclick_macro::Identity;
    use serde_json::json;

    fn create_catalog() -> FieldCatalog {
        FieldCatalog::new(vec![
            FieldDescriptor::new("System.State", "State", FieldType::String),
            FieldDescriptor::new("System.AssignedTo", "Assigned To", FieldType::Identity),
            FieldDescriptor::new("Microsoft.VSTS.Common.Priority", "Priority", FieldType::Integer),
            FieldDescriptor::new("Microsoft.VSTS.Scheduling.DueDate", "Due Date", FieldType::DateTime),
            FieldDescriptor::new("Custom.Blocked", "Blocked", FieldType::Boolean),
        ])
        .for_work_item_type("Bug")
    }

    fn create_context() -> EvaluationContext {
        EvaluationContext::new(NaiveDate::from_ymd_opt(2024, 3, 15).unwrap())
            .with_current_user(Identity::parse("Jane Doe <jane@contoso.com>"))
    }

    fn fires(trigger: &TriggerConfig, event: &ChangeEvent) -> bool {
        should_fire(event, trigger, &create_catalog(), &create_context())
    }

    #[test]
    fn test_any_fires_regardless_of_value() {
        let trigger = TriggerConfig::field_changed("System.State", "@Any");
        for value in [json!("Active"), json!("Closed"), json!(""), Value::Null] {
            let event = ChangeEvent::field_changed("System.State", value);
            assert!(fires(&trigger, &event));
        }
    }

    #[test]
    fn test_literal_string_match() {
        let trigger = TriggerConfig::field_changed("System.State", "Active");
        assert!(fires(&trigger, &ChangeEvent::field_changed("System.State", json!("Active"))));
        assert!(fires(&trigger, &ChangeEvent::field_changed("System.State", json!("active"))));
        assert!(!fires(&trigger, &ChangeEvent::field_changed("System.State", json!("Closed"))));
    }

    #[test]
    fn test_unchanged_field_does_not_fire() {
        let trigger = TriggerConfig::field_changed("System.State", "Active");
        let event = ChangeEvent::field_changed("System.Title", json!("Renamed"))
            .with_field("System.State", json!("Active"));
        assert!(!fires(&trigger, &event));
    }

    #[test]
    fn test_missing_field_does_not_fire() {
        let trigger = TriggerConfig::field_changed("Custom.Removed", "@Any");
        let event = ChangeEvent::field_changed("Custom.Removed", json!("x"));
        assert!(!fires(&trigger, &event));

        let evaluator_catalog = create_catalog();
        let ctx = create_context();
        let err = TriggerEvaluator::new(&evaluator_catalog, &ctx)
            .evaluate(&event, &trigger)
            .unwrap_err();
        assert!(err.is_soft());
    }

    #[test]
    fn test_old_value_is_not_enforced() {
        let trigger = TriggerConfig::field_changed("System.State", "Active").with_old_value("New");
        // Whatever the previous state was, only the new value is checked
        let event = ChangeEvent::field_changed("System.State", json!("Active"));
        assert!(fires(&trigger, &event));
    }

    #[test]
    fn test_typed_comparisons() {
        let priority = TriggerConfig::field_changed("Priority", "1");
        assert!(fires(&priority, &ChangeEvent::field_changed("Microsoft.VSTS.Common.Priority", json!(1))));
        assert!(!fires(&priority, &ChangeEvent::field_changed("Microsoft.VSTS.Common.Priority", json!(2))));

        let blocked = TriggerConfig::field_changed("Custom.Blocked", "true");
        assert!(fires(&blocked, &ChangeEvent::field_changed("Custom.Blocked", json!(true))));
        assert!(!fires(&blocked, &ChangeEvent::field_changed("Custom.Blocked", json!(false))));

        let due = TriggerConfig::field_changed("Microsoft.VSTS.Scheduling.DueDate", "2024-03-20");
        assert!(fires(
            &due,
            &ChangeEvent::field_changed("Microsoft.VSTS.Scheduling.DueDate", json!("2024-03-20T17:00:00Z"))
        ));
    }

    #[test]
    fn test_macro_comparisons() {
        let due = TriggerConfig::field_changed("Microsoft.VSTS.Scheduling.DueDate", "@Today+5");
        assert!(fires(
            &due,
            &ChangeEvent::field_changed("Microsoft.VSTS.Scheduling.DueDate", json!("2024-03-20T09:00:00Z"))
        ));

        let assigned = TriggerConfig::field_changed("System.AssignedTo", "@Me");
        assert!(fires(
            &assigned,
            &ChangeEvent::field_changed(
                "System.AssignedTo",
                json!({ "displayName": "Jane Doe", "uniqueName": "JANE@contoso.com" })
            )
        ));
        assert!(!fires(
            &assigned,
            &ChangeEvent::field_changed("System.AssignedTo", json!("John Roe <john@contoso.com>"))
        ));
    }

    #[test]
    fn test_field_value_macro_uses_event_snapshot() {
        let catalog = create_catalog();
        let trigger = TriggerConfig::field_changed("System.AssignedTo", "@FieldValue=System.CreatedBy");
        let event = ChangeEvent::field_changed("System.AssignedTo", json!("Jane Doe <jane@contoso.com>"))
            .with_field("System.CreatedBy", json!({ "displayName": "Jane Doe", "uniqueName": "jane@contoso.com" }));

        let ctx = with_event_values(create_context(), &event);
        assert!(should_fire(&event, &trigger, &catalog, &ctx));

        // Unresolvable reference is "no match", not an error
        let dangling = TriggerConfig::field_changed("System.AssignedTo", "@FieldValue=Custom.Nope");
        assert!(!should_fire(&event, &dangling, &catalog, &ctx));
        assert!(TriggerEvaluator::new(&catalog, &ctx)
            .evaluate(&event, &dangling)
            .is_ok());
    }

    #[test]
    fn test_missing_and_empty_new_value() {
        let any_change = TriggerConfig::new(TriggerKind::FieldValueChanged)
            .with_attribute("fieldName", "System.State");
        assert!(fires(&any_change, &ChangeEvent::field_changed("System.State", json!("Closed"))));

        let cleared = TriggerConfig::field_changed("Priority", "");
        assert!(fires(&cleared, &ChangeEvent::field_changed("Microsoft.VSTS.Common.Priority", Value::Null)));
        assert!(!fires(&cleared, &ChangeEvent::field_changed("Microsoft.VSTS.Common.Priority", json!(3))));
    }

    #[test]
    fn test_failures_degrade_to_no_fire() {
        let event = ChangeEvent::field_changed("Microsoft.VSTS.Common.Priority", json!(1));
        assert!(!fires(&TriggerConfig::field_changed("Priority", "high"), &event));
        assert!(!fires(&TriggerConfig::field_changed("Priority", "@Tomorrow"), &event));
        assert!(!fires(&TriggerConfig::field_changed("Priority", "@Today"), &event));
    }

    #[test]
    #[tracing_test::traced_test]
    fn test_bad_operand_is_logged() {
        let event = ChangeEvent::field_changed("Microsoft.VSTS.Common.Priority", json!(1));
        assert!(!fires(&TriggerConfig::field_changed("Priority", "high"), &event));
        assert!(logs_contain("Priority: * -> high not evaluated"));

        assert!(!fires(&TriggerConfig::field_changed("Custom.Removed", "@Any"), &event));
        assert!(logs_contain("inapplicable"));
    }

    #[test]
    fn test_event_only_triggers() {
        let loaded = TriggerConfig::new(TriggerKind::WorkItemLoaded);
        let saved = TriggerConfig::new(TriggerKind::WorkItemSaved);
        assert!(fires(&loaded, &ChangeEvent::new(EventKind::Loaded)));
        assert!(!fires(&loaded, &ChangeEvent::new(EventKind::Saved)));
        assert!(fires(&saved, &ChangeEvent::new(EventKind::Saved)));
    }

    #[test]
    fn test_rules_are_isolated() {
        let catalog = create_catalog();
        let ctx = create_context();
        let evaluator = TriggerEvaluator::new(&catalog, &ctx);

        let broken = Rule::new("r1", "Broken")
            .with_trigger(TriggerConfig::field_changed("System.State", "@Bogus"));
        let good = Rule::new("r2", "Activate")
            .with_trigger(TriggerConfig::field_changed("System.State", "Active"));
        let mut disabled = Rule::new("r3", "Disabled")
            .with_trigger(TriggerConfig::field_changed("System.State", "@Any"));
        disabled.enabled = false;

        let event = ChangeEvent::field_changed("System.State", json!("Active"));
        let decisions = evaluator.evaluate_rules(&[broken, good, disabled], &event);

        assert!(!decisions[0].fired);
        assert_eq!(decisions[0].errors.len(), 1);
        assert!(decisions[1].fired);
        assert_eq!(decisions[1].matched_triggers, vec![0]);
        assert!(!decisions[2].fired);
        assert!(!decisions[2].enabled);
    }
}
