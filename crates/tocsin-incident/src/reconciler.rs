// SPDX-FileCopyrightText: 2026 Tocsin Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Drives incident lifecycles from rule evaluations.

use std::fmt;
use std::sync::Arc;

use dashmap::DashMap;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use tocsin_core::{Incident, IncidentStatus, IncidentStore, NewIncident, TocsinError};
use tocsin_expression::Evaluator;

use crate::rule::CompiledRule;

/// What one reconciliation did.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", content = "incident", rename_all = "snake_case")]
pub enum Outcome {
    /// The rule fired with no active incident; one was opened.
    Opened(Incident),
    /// The active incident already reflects the rule's state.
    Unchanged(Incident),
    /// The rule stopped firing; the incident awaits confirmation.
    MarkedCanBeClosed(Incident),
    /// The rule stopped firing and auto-close is on.
    Closed(Incident),
    /// The rule did not fire and nothing is open.
    Idle,
}

impl Outcome {
    pub fn incident(&self) -> Option<&Incident> {
        match self {
            Outcome::Opened(i)
            | Outcome::Unchanged(i)
            | Outcome::MarkedCanBeClosed(i)
            | Outcome::Closed(i) => Some(i),
            Outcome::Idle => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Outcome::Opened(_) => "opened",
            Outcome::Unchanged(_) => "unchanged",
            Outcome::MarkedCanBeClosed(_) => "marked_can_be_closed",
            Outcome::Closed(_) => "closed",
            Outcome::Idle => "idle",
        }
    }
}

/// Applies rule results to the incident store.
///
/// Holds one async mutex per rule id, so the read-decide-write sequence of a
/// rule is a single writer even when reconciliations arrive concurrently.
/// Clones share the lock table.
#[derive(Clone)]
pub struct Reconciler {
    store: Arc<dyn IncidentStore>,
    evaluator: Evaluator,
    locks: Arc<DashMap<String, Arc<Mutex<()>>>>,
}

impl fmt::Debug for Reconciler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Reconciler")
            .field("store", &self.store.name())
            .field("evaluator", &self.evaluator)
            .field("rules_in_flight", &self.locks.len())
            .finish()
    }
}

impl Reconciler {
    pub fn new(store: Arc<dyn IncidentStore>, evaluator: Evaluator) -> Self {
        Self {
            store,
            evaluator,
            locks: Arc::new(DashMap::new()),
        }
    }

    /// Reconcile `rule` using the current wall clock as the incident start.
    pub async fn reconcile(&self, rule: &CompiledRule) -> Result<Outcome, TocsinError> {
        self.reconcile_at(rule, chrono::Utc::now().timestamp_millis())
            .await
    }

    /// Reconcile `rule`; a newly opened incident starts at `now` (Unix ms).
    pub async fn reconcile_at(
        &self,
        rule: &CompiledRule,
        now: i64,
    ) -> Result<Outcome, TocsinError> {
        let result = {
            let lock = self.rule_lock(rule.rule_id());
            let _guard = lock.lock().await;
            self.apply(rule, now).await
        };
        self.release_lock(rule.rule_id());

        match &result {
            Ok(outcome @ (Outcome::Idle | Outcome::Unchanged(_))) => debug!(
                rule_id = rule.rule_id(),
                outcome = outcome.name(),
                "rule reconciled"
            ),
            Ok(outcome) => info!(
                rule_id = rule.rule_id(),
                incident_id = outcome.incident().map_or("", |i| i.incident_id.as_str()),
                outcome = outcome.name(),
                "incident transitioned"
            ),
            Err(e) => warn!(
                rule_id = rule.rule_id(),
                scheduler_id = rule.scheduler_id(),
                error = %e,
                "rule reconciliation failed"
            ),
        }
        result
    }

    /// Reconcile several rules concurrently, returning results in input order.
    pub async fn reconcile_all(
        &self,
        rules: &[CompiledRule],
    ) -> Vec<Result<Outcome, TocsinError>> {
        futures::future::join_all(rules.iter().map(|rule| self.reconcile(rule))).await
    }

    fn rule_lock(&self, rule_id: &str) -> Arc<Mutex<()>> {
        Arc::clone(&self.locks.entry(rule_id.to_string()).or_default())
    }

    /// Drop the lock entry once no reconciliation holds or waits on it.
    fn release_lock(&self, rule_id: &str) {
        self.locks
            .remove_if(rule_id, |_, lock| Arc::strong_count(lock) == 1);
    }

    async fn apply(&self, rule: &CompiledRule, now: i64) -> Result<Outcome, TocsinError> {
        let fired = self
            .evaluator
            .evaluate_rule(rule.scheduler_id(), rule.program())
            .await?;

        let active = match self.store.get_active_incident_by_rule_id(rule.rule_id()).await {
            Ok(incident) => Some(incident),
            Err(TocsinError::NotFound { .. }) => None,
            Err(e) => return Err(e),
        };

        match (fired, active) {
            (true, None) => {
                let new = NewIncident::opened(
                    uuid::Uuid::new_v4().to_string(),
                    rule.rule_id(),
                    now,
                );
                Ok(Outcome::Opened(self.store.insert_incident(&new).await?))
            }
            (true, Some(incident)) => Ok(Outcome::Unchanged(incident)),
            (false, None) => Ok(Outcome::Idle),
            (false, Some(incident)) => {
                if rule.auto_close() {
                    let closed = self
                        .store
                        .update_incident_status(&incident.incident_id, IncidentStatus::Closed)
                        .await?;
                    return Ok(Outcome::Closed(closed));
                }
                if incident.status == IncidentStatus::CanBeClosed {
                    return Ok(Outcome::Unchanged(incident));
                }
                let parked = self
                    .store
                    .update_incident_status(&incident.incident_id, IncidentStatus::CanBeClosed)
                    .await?;
                Ok(Outcome::MarkedCanBeClosed(parked))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tocsin_core::SchedulerCode;
    use tocsin_test_utils::{MockSnapshotSource, TestHarness, snapshot};
    use tracing_test::traced_test;

    use crate::rule::Rule;

    const LATEST_FAILED: &str = "any(last(1), {#.Code == Error})";

    async fn setup() -> (TestHarness, MockSnapshotSource, Reconciler) {
        let harness = TestHarness::builder().build().await.unwrap();
        let source = MockSnapshotSource::new();
        let reconciler = Reconciler::new(
            harness.incident_store(),
            Evaluator::new(Arc::new(source.clone())),
        );
        (harness, source, reconciler)
    }

    #[tokio::test]
    async fn lock_is_shared_per_rule() {
        let (_harness, _source, reconciler) = setup().await;
        let a = reconciler.rule_lock("r-1");
        let b = reconciler.clone().rule_lock("r-1");
        let c = reconciler.rule_lock("r-2");
        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn idle_rule_locks_are_pruned() {
        let (_harness, source, reconciler) = setup().await;
        source.push(snapshot("s-1", 10, SchedulerCode::Error)).await;
        let rule = Rule::new("r-1", "s-1", LATEST_FAILED).compile().unwrap();

        let held = reconciler.rule_lock("r-2");
        reconciler.reconcile_at(&rule, 10).await.unwrap();
        assert!(!reconciler.locks.contains_key("r-1"));
        assert!(reconciler.locks.contains_key("r-2"));

        reconciler.release_lock("r-2");
        assert!(reconciler.locks.contains_key("r-2"));
        drop(held);
        reconciler.release_lock("r-2");
        assert!(reconciler.locks.is_empty());
    }

    #[tokio::test]
    async fn waiting_reconciliation_keeps_the_lock_entry() {
        let (_harness, source, reconciler) = setup().await;
        source.push(snapshot("s-1", 10, SchedulerCode::Error)).await;
        let rule = Rule::new("r-1", "s-1", LATEST_FAILED).compile().unwrap();

        let lock = reconciler.rule_lock("r-1");
        let guard = lock.lock().await;
        let pending = {
            let reconciler = reconciler.clone();
            let rule = rule.clone();
            tokio::spawn(async move { reconciler.reconcile_at(&rule, 10).await })
        };
        tokio::task::yield_now().await;
        reconciler.release_lock("r-1");
        assert!(reconciler.locks.contains_key("r-1"));

        drop(guard);
        drop(lock);
        let outcome = pending.await.unwrap().unwrap();
        assert_eq!(outcome.name(), "opened");
        assert!(reconciler.locks.is_empty());
    }

    #[tokio::test]
    async fn outcome_serializes_with_tag() {
        let json = serde_json::to_value(Outcome::Idle).unwrap();
        assert_eq!(json["outcome"], "idle");
    }

    #[tokio::test]
    #[traced_test]
    async fn transitions_are_logged() {
        let (_harness, source, reconciler) = setup().await;
        source.push(snapshot("s-1", 10, SchedulerCode::Error)).await;
        let rule = Rule::new("r-1", "s-1", LATEST_FAILED).compile().unwrap();

        reconciler.reconcile_at(&rule, 10).await.unwrap();
        assert!(logs_contain("incident transitioned"));
        assert!(logs_contain("opened"));
    }

    #[tokio::test]
    #[traced_test]
    async fn evaluation_failures_are_logged_and_returned() {
        let (harness, _source, _) = setup().await;
        let reconciler = Reconciler::new(
            harness.incident_store(),
            Evaluator::new(Arc::new(tocsin_test_utils::FailingSnapshotSource::new("down"))),
        );
        let rule = Rule::new("r-1", "s-1", LATEST_FAILED).compile().unwrap();

        let err = reconciler.reconcile_at(&rule, 10).await.unwrap_err();
        assert!(matches!(err, TocsinError::Evaluation { .. }));
        assert!(logs_contain("rule reconciliation failed"));
    }
}
