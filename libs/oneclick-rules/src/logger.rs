//! Rule decision logger
//!
//! Writes one log file per rule per day, recording every decision taken for
//! that rule: whether it fired, which triggers matched, and trigger errors.

use std::{
    collections::HashMap,
    fs::{self, File, OpenOptions},
    io::Write,
    path::{Path, PathBuf},
    sync::{Arc, Mutex},
};

use chrono::{Local, Utc};
use tracing::warn;

use crate::evaluator::RuleDecision;
use crate::types::{TriggerConfig, TriggerKind};

/// Logger for one rule's decisions
pub struct RuleLogger {
    rule_id: String,
    file_stem: String,
    log_dir: PathBuf,
    current_date: Mutex<String>,
    current_file: Mutex<Option<File>>,
}

impl RuleLogger {
    /// Create a logger for a rule
    ///
    /// Log files are created in `{log_root}/rules/{stem}/` and named
    /// `{YYYYMMDD}_{stem}.log`, where `stem` is [`log_file_stem`] of the id.
    pub fn new(log_root: &Path, rule_id: &str) -> Self {
        let file_stem = log_file_stem(rule_id);
        let rule_dir = log_root.join("rules").join(&file_stem);
        if let Err(e) = fs::create_dir_all(&rule_dir) {
            warn!("Log dir err {:?}: {}", rule_dir, e);
        }

        Self {
            rule_id: rule_id.to_string(),
            file_stem,
            log_dir: rule_dir,
            current_date: Mutex::new(String::new()),
            current_file: Mutex::new(None),
        }
    }

    /// Log a decision
    ///
    /// Format: `timestamp [RULE] rule_id outcome | matched | errors`
    pub fn log_decision(&self, decision: &RuleDecision) {
        self.write_line(&format_decision(decision));
    }

    fn write_line(&self, message: &str) {
        let today = Local::now().format("%Y%m%d").to_string();
        let timestamp = Utc::now().format("%Y-%m-%dT%H:%M:%S%.3fZ");

        let Ok(mut current_date) = self.current_date.lock() else {
            warn!("Date lock fail");
            return;
        };
        let Ok(mut file_guard) = self.current_file.lock() else {
            warn!("File lock fail");
            return;
        };

        // New day: rotate
        if *current_date != today {
            *current_date = today.clone();
            let file_path = self.log_dir.join(format!("{}_{}.log", today, self.file_stem));

            match OpenOptions::new()
                .create(true)
                .append(true)
                .open(&file_path)
            {
                Ok(file) => *file_guard = Some(file),
                Err(e) => {
                    warn!("Log open err {:?}: {}", file_path, e);
                    return;
                },
            }
        }

        if let Some(ref mut file) = *file_guard {
            let line = format!("{} [RULE] {} {}\n", timestamp, self.rule_id, message);
            if let Err(e) = file.write_all(line.as_bytes()) {
                warn!("Log write err: {}", e);
            }
        }
    }
}

/// Rule id as a single path component
///
/// Rule ids come from rule documents and may hold any text. Characters other
/// than ASCII alphanumerics, `-`, `_` and `.` become `_`, as do leading dots,
/// so the result never names a parent directory or a nested path.
pub fn log_file_stem(rule_id: &str) -> String {
    let mut stem: String = rule_id
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.') {
                c
            } else {
                '_'
            }
        })
        .collect();

    let leading_dots = stem.len() - stem.trim_start_matches('.').len();
    stem.replace_range(..leading_dots, &"_".repeat(leading_dots));

    if stem.is_empty() {
        stem.push('_');
    }
    stem
}

/// Format a decision as `fired | #0,#2 | -`
pub fn format_decision(decision: &RuleDecision) -> String {
    let outcome = if !decision.enabled {
        "disabled"
    } else if decision.fired {
        "fired"
    } else {
        "skipped"
    };

    let matched = if decision.matched_triggers.is_empty() {
        "-".to_string()
    } else {
        decision
            .matched_triggers
            .iter()
            .map(|index| format!("#{}", index))
            .collect::<Vec<_>>()
            .join(",")
    };

    let errors = if decision.errors.is_empty() {
        "-".to_string()
    } else {
        decision.errors.join("; ")
    };

    format!("{} | {} | {}", outcome, matched, errors)
}

/// Format a trigger for logs (e.g. `System.State: * -> Active`)
///
/// Event-only triggers print their type name.
pub fn format_trigger(trigger: &TriggerConfig) -> String {
    match trigger.kind {
        TriggerKind::FieldValueChanged => format!(
            "{}: {} -> {}",
            trigger.field_name().unwrap_or("?"),
            trigger.old_field_value().unwrap_or("*"),
            trigger.new_field_value().unwrap_or("*"),
        ),
        kind => kind.name().to_string(),
    }
}

/// Manager for per-rule loggers
pub struct RuleLoggerManager {
    log_root: PathBuf,
    loggers: Mutex<HashMap<String, Arc<RuleLogger>>>,
}

impl RuleLoggerManager {
    pub fn new(log_root: PathBuf) -> Self {
        Self {
            log_root,
            loggers: Mutex::new(HashMap::new()),
        }
    }

    /// Get or create the logger for a rule
    pub fn get_logger(&self, rule_id: &str) -> Arc<RuleLogger> {
        let Ok(mut loggers) = self.loggers.lock() else {
            warn!("Loggers lock fail, temp logger");
            return Arc::new(RuleLogger::new(&self.log_root, rule_id));
        };

        if let Some(logger) = loggers.get(rule_id) {
            return Arc::clone(logger);
        }

        let logger = Arc::new(RuleLogger::new(&self.log_root, rule_id));
        loggers.insert(rule_id.to_string(), Arc::clone(&logger));
        logger
    }

    /// Log each decision to its rule's file
    pub fn log_decisions(&self, decisions: &[RuleDecision]) {
        for decision in decisions {
            self.get_logger(&decision.rule_id).log_decision(decision);
        }
    }
}
