//! Offline evaluation context
//!
//! Without a connected host, "today", the current user and the iteration
//! schedule come from configuration and command line overrides.

use anyhow::{Context, Result};
use chrono::{Local, NaiveDate};
use common::{ContextSettings, OneClickConfig, ValidationSettings};
use oneclick_macro::{EvaluationContext, Identity, IterationSchedule, DATE_FORMAT};
use oneclick_rules::{FieldCatalog, MemoryHost, RuleValidator};

/// Settings for one command run
pub struct Session {
    pub config: OneClickConfig,
    pub today: NaiveDate,
    pub user: Option<Identity>,
}

impl Session {
    /// Apply `--today` / `--user` overrides on top of the loaded config
    pub fn new(config: OneClickConfig, today: Option<&str>, user: Option<&str>) -> Result<Self> {
        let today = resolve_today(today, &config.context)?;
        let user = user
            .or(config.context.current_user.as_deref())
            .filter(|u| !u.trim().is_empty())
            .map(Identity::parse);

        Ok(Self {
            config,
            today,
            user,
        })
    }

    pub fn iterations(&self) -> IterationSchedule {
        iteration_schedule(&self.config.context)
    }

    /// Context for resolving macros outside of an event
    pub fn evaluation_context(&self) -> EvaluationContext {
        let mut context = EvaluationContext::new(self.today).with_iterations(self.iterations());
        if let Some(user) = &self.user {
            context = context.with_current_user(user.clone());
        }
        context
    }

    /// In-memory host serving the configured user, iterations and `catalog`
    ///
    /// The catalog was chosen explicitly, so it also serves events with no
    /// or a different work item type.
    pub async fn host(&self, catalog: FieldCatalog) -> MemoryHost {
        let host = MemoryHost::new();
        if let Some(user) = &self.user {
            host.set_current_user(user.clone()).await;
        }
        host.set_iterations(self.iterations()).await;
        host.set_default_catalog(catalog.clone()).await;
        host.add_catalog(catalog).await;
        host
    }

    pub fn validator(&self) -> RuleValidator {
        validator(&self.config.validation)
    }
}

fn resolve_today(cli: Option<&str>, settings: &ContextSettings) -> Result<NaiveDate> {
    match cli.or(settings.today.as_deref()) {
        Some(raw) => NaiveDate::parse_from_str(raw.trim(), DATE_FORMAT)
            .with_context(|| format!("Invalid date '{}', expected yyyy-MM-dd", raw)),
        None => Ok(Local::now().date_naive()),
    }
}

fn iteration_schedule(settings: &ContextSettings) -> IterationSchedule {
    match (&settings.current_iteration, settings.iterations.is_empty()) {
        (Some(current), true) => IterationSchedule::single(current.clone()),
        (Some(current), false) => IterationSchedule::new(settings.iterations.clone(), current),
        (None, _) => IterationSchedule::new(settings.iterations.clone(), ""),
    }
}

fn validator(settings: &ValidationSettings) -> RuleValidator {
    match &settings.excluded_fields {
        Some(fields) => RuleValidator::with_excluded_fields(fields.iter().cloned()),
        None => RuleValidator::default(),
    }
}
