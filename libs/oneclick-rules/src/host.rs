//! Host services
//!
//! The work-tracking host supplies the current user, field catalogs and the
//! iteration schedule through async calls. Each lookup is awaited once, in
//! order, to build the snapshot an evaluation pass runs on; nothing is
//! retried or re-queried mid-evaluation.

use chrono::NaiveDate;
use oneclick_macro::{EvaluationContext, Identity, IterationSchedule};
use std::collections::HashMap;
use std::future::Future;
use tokio::sync::RwLock;
use tracing::warn;

use crate::error::{Result, RuleError};
use crate::evaluator::{with_event_values, RuleDecision, TriggerEvaluator};
use crate::types::{ChangeEvent, FieldCatalog, Rule};

/// Host integration trait
///
/// Implementations wrap the host's REST clients, or hold fixed data.
pub trait HostServices: Send + Sync {
    /// Identity of the signed-in user
    fn current_user(&self) -> impl Future<Output = Result<Identity>> + Send;

    /// Fields of a work item type
    fn field_catalog(&self, work_item_type: &str)
        -> impl Future<Output = Result<FieldCatalog>> + Send;

    /// Team iteration schedule
    fn iteration_schedule(&self) -> impl Future<Output = Result<IterationSchedule>> + Send;
}

/// In-memory host for testing and offline tooling
#[derive(Default)]
pub struct MemoryHost {
    user: RwLock<Option<Identity>>,
    catalogs: RwLock<HashMap<String, FieldCatalog>>,
    iterations: RwLock<IterationSchedule>,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_current_user(&self, user: Identity) {
        *self.user.write().await = Some(user);
    }

    /// Register a catalog under its work item type (or `""` when untyped)
    pub async fn add_catalog(&self, catalog: FieldCatalog) {
        let key = catalog
            .work_item_type
            .as_deref()
            .unwrap_or_default()
            .to_lowercase();
        self.catalogs.write().await.insert(key, catalog);
    }

    /// Register a catalog served for any work item type without its own
    pub async fn set_default_catalog(&self, catalog: FieldCatalog) {
        self.catalogs.write().await.insert(String::new(), catalog);
    }

    pub async fn set_iterations(&self, iterations: IterationSchedule) {
        *self.iterations.write().await = iterations;
    }
}

impl HostServices for MemoryHost {
    async fn current_user(&self) -> Result<Identity> {
        self.user
            .read()
            .await
            .clone()
            .ok_or_else(|| RuleError::host("No current user"))
    }

    async fn field_catalog(&self, work_item_type: &str) -> Result<FieldCatalog> {
        let catalogs = self.catalogs.read().await;
        catalogs
            .get(&work_item_type.to_lowercase())
            .or_else(|| catalogs.get(""))
            .cloned()
            .ok_or_else(|| {
                RuleError::host(format!(
                    "No field catalog for work item type '{}'",
                    work_item_type
                ))
            })
    }

    async fn iteration_schedule(&self) -> Result<IterationSchedule> {
        Ok(self.iterations.read().await.clone())
    }
}

/// Build the evaluation snapshot for an event
///
/// A failed user or iteration lookup leaves that part empty, so `@Me` and
/// `@CurrentIteration` resolve to nothing instead of failing the pass.
pub async fn capture_context<H: HostServices>(
    host: &H,
    event: &ChangeEvent,
    today: NaiveDate,
) -> EvaluationContext {
    let mut context = EvaluationContext::new(today);

    match host.current_user().await {
        Ok(user) => context = context.with_current_user(user),
        Err(e) => warn!("Current user unavailable: {}", e),
    }

    match host.iteration_schedule().await {
        Ok(iterations) => context = context.with_iterations(iterations),
        Err(e) => warn!("Iteration schedule unavailable: {}", e),
    }

    with_event_values(context, event)
}

/// Evaluate rules for an event, fetching everything from the host first
///
/// When the field catalog cannot be fetched no rule fires.
pub async fn evaluate_with_host<H: HostServices>(
    host: &H,
    rules: &[Rule],
    event: &ChangeEvent,
    today: NaiveDate,
) -> Vec<RuleDecision> {
    let work_item_type = event.work_item_type.as_deref().unwrap_or_default();
    let catalog = match host.field_catalog(work_item_type).await {
        Ok(catalog) => catalog,
        Err(e) => {
            warn!("Field catalog unavailable, no rule fires: {}", e);
            return rules
                .iter()
                .map(|rule| RuleDecision {
                    rule_id: rule.id.clone(),
                    rule_name: rule.name.clone(),
                    enabled: rule.enabled,
                    fired: false,
                    matched_triggers: vec![],
                    errors: vec![e.to_string()],
                })
                .collect();
        },
    };

    let context = capture_context(host, event, today).await;
    TriggerEvaluator::new(&catalog, &context).evaluate_rules(rules, event)
}
