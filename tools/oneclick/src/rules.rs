//! Rule commands: validate rules against a catalog, evaluate them for an event

use std::path::Path;

use anyhow::{Context, Result};
use colored::*;
use oneclick_rules::{
    evaluate_with_host, load_document, parse_catalog, parse_event, parse_rules, FieldCatalog,
    Rule, RuleDecision, RuleLoggerManager, ValidationResult,
};
use tracing::info;

use crate::context::Session;

fn load_rules(path: &Path) -> Result<Vec<Rule>> {
    let document =
        load_document(path).with_context(|| format!("Failed to read rules {:?}", path))?;
    parse_rules(&document).with_context(|| format!("Invalid rules in {:?}", path))
}

fn load_catalog(path: &Path) -> Result<FieldCatalog> {
    let document =
        load_document(path).with_context(|| format!("Failed to read catalog {:?}", path))?;
    parse_catalog(&document).with_context(|| format!("Invalid catalog in {:?}", path))
}

/// Validate every rule; returns whether all rules are valid
pub fn validate(session: &Session, rules: &Path, catalog: &Path, json: bool) -> Result<bool> {
    let rules = load_rules(rules)?;
    let catalog = load_catalog(catalog)?;
    let validator = session.validator();

    let results: Vec<(&Rule, ValidationResult)> = rules
        .iter()
        .map(|rule| (rule, validator.validate_rule(rule, &catalog)))
        .collect();
    let all_valid = results.iter().all(|(_, result)| result.is_valid());

    if json {
        let output: Vec<_> = results
            .iter()
            .map(|(rule, result)| {
                serde_json::json!({
                    "id": rule.id,
                    "name": rule.name,
                    "valid": result.is_valid(),
                    "errors": result.errors,
                    "warnings": result.warnings,
                })
            })
            .collect();
        println!("{}", serde_json::to_string_pretty(&output)?);
        return Ok(all_valid);
    }

    for (rule, result) in &results {
        print!("{} {} ... ", rule.id.bright_yellow(), rule.name);
        if result.is_valid() {
            println!("{}", "OK".green());
        } else {
            println!("{}", "FAIL".red());
        }
        for error in &result.errors {
            println!("   {} {}", "ERROR".red(), error);
        }
        for warning in &result.warnings {
            println!("   {} {}", "WARNING".yellow(), warning);
        }
    }

    let invalid = results.iter().filter(|(_, r)| !r.is_valid()).count();
    if all_valid {
        println!("{} {} rule(s) valid", "DONE".green(), results.len());
    } else {
        println!("{} {} of {} rule(s) invalid", "FAIL".red(), invalid, results.len());
    }
    Ok(all_valid)
}

/// Evaluate rules for an event document
pub async fn evaluate(
    session: &Session,
    rules: &Path,
    catalog: &Path,
    event: &Path,
    json: bool,
) -> Result<Vec<RuleDecision>> {
    let rules = load_rules(rules)?;
    let catalog = load_catalog(catalog)?;
    let event = load_document(event)
        .and_then(|document| parse_event(&document))
        .with_context(|| format!("Invalid event in {:?}", event))?;

    let host = session.host(catalog).await;
    let decisions = evaluate_with_host(&host, &rules, &event, session.today).await;
    info!(
        "Evaluated {} rule(s), {} fired",
        decisions.len(),
        decisions.iter().filter(|d| d.fired).count()
    );

    if let Some(log_dir) = &session.config.log_dir {
        RuleLoggerManager::new(log_dir.clone()).log_decisions(&decisions);
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&decisions)?);
    } else {
        print_decisions(&decisions);
    }
    Ok(decisions)
}

fn print_decisions(decisions: &[RuleDecision]) {
    for decision in decisions {
        let status = if !decision.enabled {
            "DISABLED".dimmed()
        } else if decision.fired {
            "FIRED".bright_green()
        } else {
            "SKIPPED".yellow()
        };
        println!("{} {} {}", status, decision.rule_id.bright_yellow(), decision.rule_name);
        if !decision.matched_triggers.is_empty() {
            let triggers: Vec<_> = decision
                .matched_triggers
                .iter()
                .map(|index| (index + 1).to_string())
                .collect();
            println!("   matched trigger(s): {}", triggers.join(", "));
        }
        for error in &decision.errors {
            println!("   {} {}", "ERROR".red(), error);
        }
    }
}
