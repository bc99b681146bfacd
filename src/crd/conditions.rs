//! Condition tracking for CloudCluster status
//!
//! Conditions follow Kubernetes API conventions: a typed status flag with a
//! severity, a machine-readable reason, and a transition timestamp. The
//! [`ConditionSet`] wrapper is the status storage itself and guarantees at
//! most one condition per type.

use chrono::Utc;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Condition status values
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionStatus {
    True,
    False,
    #[default]
    Unknown,
}

impl std::fmt::Display for ConditionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ConditionStatus::True => write!(f, "True"),
            ConditionStatus::False => write!(f, "False"),
            ConditionStatus::Unknown => write!(f, "Unknown"),
        }
    }
}

/// How severe a False condition is for the cluster.
///
/// True conditions carry no severity.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ConditionSeverity {
    /// The cluster cannot make progress without intervention
    Error,
    /// The step failed but will be retried
    Warning,
    /// Expected transient state, e.g. waiting on the cloud provider
    Info,
}

/// A single typed status flag on a resource
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct Condition {
    #[serde(rename = "type")]
    pub type_: String,
    pub status: ConditionStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub severity: Option<ConditionSeverity>,
    pub last_transition_time: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub reason: String,
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub message: String,
}

/// Ordered mapping from condition type to condition.
///
/// Serializes as a plain list, so it slots directly into the status
/// sub-resource, but every write goes through [`ConditionSet::set`] which
/// replaces any previous entry of the same type in place. Entries keep the
/// order of their first write and are never removed.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(transparent)]
pub struct ConditionSet {
    entries: Vec<Condition>,
}

impl ConditionSet {
    /// Insert or replace the condition for its type.
    ///
    /// The transition time is refreshed only when the status actually
    /// changes; reason and message updates alone keep the old timestamp.
    pub fn set(&mut self, condition: Condition) {
        if let Some(existing) = self.entries.iter_mut().find(|c| c.type_ == condition.type_) {
            let transition_time = if existing.status == condition.status {
                existing.last_transition_time.clone()
            } else {
                condition.last_transition_time.clone()
            };
            *existing = Condition {
                last_transition_time: transition_time,
                ..condition
            };
        } else {
            self.entries.push(condition);
        }
    }

    /// Record a True condition with no severity or reason.
    pub fn mark_true(&mut self, type_: &str) {
        self.set(Condition {
            type_: type_.to_string(),
            status: ConditionStatus::True,
            severity: None,
            last_transition_time: Utc::now().to_rfc3339(),
            reason: String::new(),
            message: String::new(),
        });
    }

    /// Record a False condition with the given severity and reason.
    pub fn mark_false(
        &mut self,
        type_: &str,
        severity: ConditionSeverity,
        reason: &str,
        message: &str,
    ) {
        self.set(Condition {
            type_: type_.to_string(),
            status: ConditionStatus::False,
            severity: Some(severity),
            last_transition_time: Utc::now().to_rfc3339(),
            reason: reason.to_string(),
            message: message.to_string(),
        });
    }

    /// Find a condition by type.
    pub fn get(&self, type_: &str) -> Option<&Condition> {
        self.entries.iter().find(|c| c.type_ == type_)
    }

    /// Whether the condition for this type exists and is True.
    pub fn is_true(&self, type_: &str) -> bool {
        self.get(type_)
            .map(|c| c.status == ConditionStatus::True)
            .unwrap_or(false)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Condition> {
        self.entries.iter()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
