//! Evaluation context
//!
//! A snapshot of the ambient values macros resolve against: current user,
//! current date, iteration schedule and the work item's field values. It is
//! built once per evaluation pass (host lookups happen before, never during
//! resolution) and is immutable afterwards.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

/// Work-tracking identity in the `Display Name <unique@name>` form
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Identity {
    pub display_name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unique_name: Option<String>,
}

impl Identity {
    pub fn new(display_name: impl Into<String>) -> Self {
        Self {
            display_name: display_name.into(),
            unique_name: None,
        }
    }

    pub fn with_unique_name(mut self, unique_name: impl Into<String>) -> Self {
        self.unique_name = Some(unique_name.into());
        self
    }

    /// Parse `Display Name <unique@name>`; text without brackets is a display name
    pub fn parse(raw: &str) -> Self {
        let raw = raw.trim();
        if let Some(open) = raw.rfind('<') {
            if let Some(inner) = raw[open + 1..].strip_suffix('>') {
                let display_name = raw[..open].trim();
                let unique_name = inner.trim();
                return Self {
                    display_name: display_name.to_string(),
                    unique_name: (!unique_name.is_empty()).then(|| unique_name.to_string()),
                };
            }
        }
        Self::new(raw)
    }

    /// Case-insensitive identity comparison
    ///
    /// Unique names win when both sides carry one; otherwise display names
    /// are compared. A bare unique name also matches the other side's unique
    /// name, since hosts store either form.
    pub fn same_as(&self, other: &Identity) -> bool {
        if let (Some(a), Some(b)) = (&self.unique_name, &other.unique_name) {
            return a.eq_ignore_ascii_case(b);
        }
        if self.display_name.eq_ignore_ascii_case(&other.display_name) {
            return true;
        }
        let bare_matches = |bare: &Identity, full: &Identity| {
            bare.unique_name.is_none()
                && full
                    .unique_name
                    .as_deref()
                    .is_some_and(|unique| unique.eq_ignore_ascii_case(&bare.display_name))
        };
        bare_matches(self, other) || bare_matches(other, self)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.unique_name {
            Some(unique) => write!(f, "{} <{}>", self.display_name, unique),
            None => write!(f, "{}", self.display_name),
        }
    }
}

/// Ordered iteration paths with a pointer at the current one
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationSchedule {
    paths: Vec<String>,
    current: Option<usize>,
}

impl IterationSchedule {
    /// Build a schedule; `current_path` is matched case-insensitively
    pub fn new(paths: Vec<String>, current_path: &str) -> Self {
        let current = paths
            .iter()
            .position(|path| path.eq_ignore_ascii_case(current_path));
        Self { paths, current }
    }

    /// Schedule that only knows the current iteration
    pub fn single(current_path: impl Into<String>) -> Self {
        Self {
            paths: vec![current_path.into()],
            current: Some(0),
        }
    }

    pub fn paths(&self) -> &[String] {
        &self.paths
    }

    pub fn current(&self) -> Option<&str> {
        self.shifted(0)
    }

    /// Iteration `offset` steps away from the current one, if scheduled
    pub fn shifted(&self, offset: i64) -> Option<&str> {
        let current = i64::try_from(self.current?).ok()?;
        let index = usize::try_from(current.checked_add(offset)?).ok()?;
        self.paths.get(index).map(String::as_str)
    }
}

/// Ambient values for one evaluation pass
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    today: NaiveDate,
    current_user: Option<Identity>,
    iterations: IterationSchedule,
    /// Keyed by lowercased field reference/display name
    field_values: HashMap<String, String>,
}

impl EvaluationContext {
    pub fn new(today: NaiveDate) -> Self {
        Self {
            today,
            current_user: None,
            iterations: IterationSchedule::default(),
            field_values: HashMap::new(),
        }
    }

    pub fn with_current_user(mut self, user: Identity) -> Self {
        self.current_user = Some(user);
        self
    }

    pub fn with_iterations(mut self, iterations: IterationSchedule) -> Self {
        self.iterations = iterations;
        self
    }

    pub fn with_field_value(mut self, field: impl AsRef<str>, value: impl Into<String>) -> Self {
        self.field_values
            .insert(field.as_ref().to_lowercase(), value.into());
        self
    }

    pub fn with_field_values<I, K, V>(mut self, values: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: AsRef<str>,
        V: Into<String>,
    {
        for (field, value) in values {
            self.field_values
                .insert(field.as_ref().to_lowercase(), value.into());
        }
        self
    }

    pub fn today(&self) -> NaiveDate {
        self.today
    }

    pub fn current_user(&self) -> Option<&Identity> {
        self.current_user.as_ref()
    }

    pub fn iterations(&self) -> &IterationSchedule {
        &self.iterations
    }

    /// Current value of a field, by reference name (case-insensitive)
    pub fn field_value(&self, field: &str) -> Option<&str> {
        self.field_values
            .get(&field.trim().to_lowercase())
            .map(String::as_str)
    }
}
