//! Remote rule and queue store contracts
//!
//! The synchronizer never constructs its own transport clients; concrete
//! implementations of these traits are injected by the caller.

use async_trait::async_trait;
use thiserror::Error;

/// Error kind shared by the remote stores.
///
/// Not-found is distinguished because several operations treat it as a
/// normal outcome: create-on-miss when describing, tolerate-on-miss when
/// removing a target.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("resource not found")]
    NotFound,
    #[error("{0}")]
    Remote(String),
}

impl StoreError {
    pub fn remote(message: impl Into<String>) -> Self {
        StoreError::Remote(message.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }
}

/// State of an event rule.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum RuleState {
    Enabled,
    #[default]
    Disabled,
}

/// An event-matching rule as stored remotely.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct EventRule {
    pub name: String,
    /// Store-assigned identifier; absent until the store has assigned one
    pub arn: Option<String>,
    pub state: RuleState,
    /// Serialized [`EventPattern`](super::pattern::EventPattern) document
    pub event_pattern: Option<String>,
}

/// A delivery binding from a rule to one downstream queue.
#[derive(Clone, Debug, PartialEq)]
pub struct RuleTarget {
    pub id: String,
    pub arn: String,
}

/// Attributes of a delivery queue.
#[derive(Clone, Debug, Default)]
pub struct QueueAttributes {
    pub arn: Option<String>,
    pub policy: Option<String>,
}

/// Remote store holding event rules and their delivery targets.
#[async_trait]
pub trait RuleStore: Send + Sync {
    /// Describe a rule by name. Absent rules are `StoreError::NotFound`.
    async fn describe_rule(&self, name: &str) -> Result<EventRule, StoreError>;

    /// Create or replace a rule by name.
    async fn put_rule(&self, rule: &EventRule) -> Result<(), StoreError>;

    async fn list_targets(&self, rule_name: &str) -> Result<Vec<RuleTarget>, StoreError>;

    /// Add a target binding. Additive: existing targets are untouched.
    async fn put_target(&self, rule_name: &str, target: &RuleTarget) -> Result<(), StoreError>;

    /// Remove a target binding by id. Absent targets are
    /// `StoreError::NotFound`.
    async fn remove_target(&self, rule_name: &str, target_id: &str) -> Result<(), StoreError>;

    async fn delete_rule(&self, name: &str) -> Result<(), StoreError>;
}

/// Remote store holding the per-cluster delivery queue.
#[async_trait]
pub trait QueueStore: Send + Sync {
    async fn queue_url(&self, name: &str) -> Result<String, StoreError>;

    async fn queue_attributes(&self, url: &str) -> Result<QueueAttributes, StoreError>;

    async fn set_queue_policy(&self, url: &str, policy: &str) -> Result<(), StoreError>;
}
