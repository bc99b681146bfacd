//! Instance-state event rule synchronization
//!
//! Maintains one rule and one delivery target per cluster. The rule's
//! pattern document carries the set of monitored instance ids; there is no
//! local store. Every membership change reads the remote document, edits it,
//! and writes it back in full.

use std::sync::Arc;

use serde_json::json;
use tracing::{debug, info, warn};

use crate::error::{Error, Result};

use super::pattern::EventPattern;
use super::store::{EventRule, QueueStore, RuleState, RuleStore, RuleTarget};

/// Synchronizes the instance-state rule, target, and queue policy for one
/// cluster.
pub struct InstanceStateService {
    cluster_name: String,
    rules: Arc<dyn RuleStore>,
    queues: Arc<dyn QueueStore>,
}

impl InstanceStateService {
    pub fn new(cluster_name: &str, rules: Arc<dyn RuleStore>, queues: Arc<dyn QueueStore>) -> Self {
        Self {
            cluster_name: cluster_name.to_string(),
            rules,
            queues,
        }
    }

    /// Deterministic per-cluster rule name.
    pub fn rule_name(&self) -> String {
        format!("{}-instance-state-rule", self.cluster_name)
    }

    /// Deterministic per-cluster delivery queue name.
    pub fn queue_name(&self) -> String {
        format!("{}-queue", self.cluster_name)
    }

    /// Idempotent setup of the rule, its delivery target, and the queue
    /// policy. Safe to call on every reconcile.
    pub async fn reconcile_rules(&self) -> Result<()> {
        let rule_name = self.rule_name();

        let rule = match self.rules.describe_rule(&rule_name).await {
            Ok(rule) => rule,
            Err(e) if e.is_not_found() => {
                self.create_rule(&rule_name).await?;
                // creation responses carry no identifier, so describe again
                self.rules.describe_rule(&rule_name).await?
            }
            Err(e) => return Err(e.into()),
        };

        let queue_name = self.queue_name();
        let queue_url = self.queues.queue_url(&queue_name).await?;
        let attributes = self.queues.queue_attributes(&queue_url).await?;
        let queue_arn = attributes.arn.ok_or(Error::QueueMisconfigured {
            name: queue_name.clone(),
        })?;

        let targets = self.rules.list_targets(&rule_name).await?;
        if !targets.iter().any(|t| t.id == queue_name) {
            self.rules
                .put_target(
                    &rule_name,
                    &RuleTarget {
                        id: queue_name.clone(),
                        arn: queue_arn.clone(),
                    },
                )
                .await?;
            info!(rule = %rule_name, queue = %queue_name, "Bound delivery target to instance-state rule");
        }

        // existence check only: a present policy is never diffed or rewritten
        if attributes.policy.is_none() {
            let policy = delivery_policy(&queue_arn, rule.arn.as_deref());
            self.queues.set_queue_policy(&queue_url, &policy).await?;
            info!(queue = %queue_name, "Granted the rule store delivery permission on the queue");
        }

        Ok(())
    }

    async fn create_rule(&self, rule_name: &str) -> Result<()> {
        let pattern = EventPattern::instance_state_changes();
        self.rules
            .put_rule(&EventRule {
                name: rule_name.to_string(),
                arn: None,
                state: RuleState::Disabled,
                event_pattern: Some(pattern.to_json()?),
            })
            .await?;
        info!(rule = %rule_name, "Created instance-state rule");
        Ok(())
    }

    /// Track an instance in the rule's pattern document.
    ///
    /// Already-tracked ids are a no-op; otherwise the id is appended and the
    /// rule written back enabled, since tracking any instance (re-)enables
    /// it.
    pub async fn add_instance_to_event_pattern(&self, instance_id: &str) -> Result<()> {
        let rule_name = self.rule_name();
        let rule = self.rules.describe_rule(&rule_name).await?;
        let mut pattern = parse_pattern(&rule)?;

        if pattern.tracks_instance(instance_id) {
            debug!(rule = %rule_name, instance = %instance_id, "Instance already tracked");
            return Ok(());
        }
        pattern.track_instance(instance_id);

        self.rules
            .put_rule(&EventRule {
                name: rule_name.clone(),
                arn: None,
                state: RuleState::Enabled,
                event_pattern: Some(pattern.to_json()?),
            })
            .await?;
        info!(rule = %rule_name, instance = %instance_id, "Tracking instance state changes");
        Ok(())
    }

    /// Stop tracking an instance.
    ///
    /// Best-effort cleanup: failures are logged, never propagated.
    pub async fn remove_instance_from_event_pattern(&self, instance_id: &str) {
        if let Err(err) = self.try_remove_instance(instance_id).await {
            warn!(instance = %instance_id, "Failed to remove instance from event pattern: {err}");
        }
    }

    async fn try_remove_instance(&self, instance_id: &str) -> Result<()> {
        let rule_name = self.rule_name();
        let rule = self.rules.describe_rule(&rule_name).await?;
        let mut pattern = parse_pattern(&rule)?;

        if !pattern.tracks_instance(instance_id) {
            return Ok(());
        }
        pattern.untrack_instance(instance_id);

        let state = if pattern.instance_ids().is_empty() {
            RuleState::Disabled
        } else {
            RuleState::Enabled
        };
        self.rules
            .put_rule(&EventRule {
                name: rule_name,
                arn: None,
                state,
                event_pattern: Some(pattern.to_json()?),
            })
            .await?;
        Ok(())
    }

    /// Cluster teardown: unbind this cluster's queue, then delete the rule.
    ///
    /// An already-absent target is fine. Any other unbind failure aborts
    /// before the rule itself is touched, so a rule is never deleted ahead
    /// of confirming this cluster's binding is gone.
    pub async fn delete_rules(&self) -> Result<()> {
        let rule_name = self.rule_name();

        match self.rules.remove_target(&rule_name, &self.queue_name()).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {
                debug!(rule = %rule_name, "Delivery target already gone");
            }
            Err(e) => return Err(e.into()),
        }

        self.rules.delete_rule(&rule_name).await?;
        info!(rule = %rule_name, "Deleted instance-state rule");
        Ok(())
    }
}

fn parse_pattern(rule: &EventRule) -> Result<EventPattern> {
    let raw = rule
        .event_pattern
        .as_deref()
        .ok_or_else(|| Error::ConfigError(format!("rule {} has no event pattern", rule.name)))?;
    EventPattern::parse(raw).map_err(Error::SerializationError)
}

/// Policy document granting the rule store permission to deliver to the
/// queue. Written once when absent; never diffed afterwards.
fn delivery_policy(queue_arn: &str, rule_arn: Option<&str>) -> String {
    json!({
        "Version": "2012-10-17",
        "Id": format!("{queue_arn}/events-delivery"),
        "Statement": [{
            "Sid": "EventsDelivery",
            "Effect": "Allow",
            "Principal": { "Service": "events.amazonaws.com" },
            "Action": "sqs:SendMessage",
            "Resource": queue_arn,
            "Condition": { "ArnEquals": { "aws:SourceArn": rule_arn } }
        }]
    })
    .to_string()
}
