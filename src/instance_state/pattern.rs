//! Event pattern wire document
//!
//! The rule's pattern document is the only persistent state the synchronizer
//! has: the set of monitored instance ids lives inside it, and every change
//! is a full read-modify-write of the document.

use serde::{Deserialize, Serialize};

use crate::crd::InstanceState;

/// Event source matched by instance-state rules.
pub const EVENT_SOURCE: &str = "aws.ec2";

/// Detail type of instance state-change notifications.
pub const INSTANCE_STATE_CHANGE_NOTIFICATION: &str = "EC2 Instance State-change Notification";

/// Structured filter describing which provider events a rule matches.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventPattern {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub source: Vec<String>,

    #[serde(rename = "detail-type", default, skip_serializing_if = "Vec::is_empty")]
    pub detail_type: Vec<String>,

    #[serde(rename = "detail", default, skip_serializing_if = "Option::is_none")]
    pub event_detail: Option<EventDetail>,
}

/// The detail block: states to match and the tracked instance-id set.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct EventDetail {
    #[serde(rename = "state", default, skip_serializing_if = "Vec::is_empty")]
    pub states: Vec<InstanceState>,

    #[serde(rename = "instance-id", default, skip_serializing_if = "Vec::is_empty")]
    pub instance_ids: Vec<String>,
}

impl EventPattern {
    /// Pattern for a freshly created rule: matches instances on their way
    /// out, with no instance filter yet.
    pub fn instance_state_changes() -> Self {
        Self {
            source: vec![EVENT_SOURCE.to_string()],
            detail_type: vec![INSTANCE_STATE_CHANGE_NOTIFICATION.to_string()],
            event_detail: Some(EventDetail {
                states: vec![InstanceState::ShuttingDown, InstanceState::Terminated],
                instance_ids: Vec::new(),
            }),
        }
    }

    pub fn parse(raw: &str) -> serde_json::Result<Self> {
        serde_json::from_str(raw)
    }

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }

    /// Instance ids currently tracked by the pattern.
    pub fn instance_ids(&self) -> &[String] {
        self.event_detail
            .as_ref()
            .map(|d| d.instance_ids.as_slice())
            .unwrap_or(&[])
    }

    pub fn tracks_instance(&self, instance_id: &str) -> bool {
        self.instance_ids().iter().any(|id| id == instance_id)
    }

    /// Append an instance id. The set stays duplicate-free.
    pub fn track_instance(&mut self, instance_id: &str) {
        if self.tracks_instance(instance_id) {
            return;
        }
        self.event_detail
            .get_or_insert_with(Default::default)
            .instance_ids
            .push(instance_id.to_string());
    }

    /// Remove an instance id, preserving the order of remaining entries.
    pub fn untrack_instance(&mut self, instance_id: &str) {
        if let Some(detail) = &mut self.event_detail {
            detail.instance_ids.retain(|id| id != instance_id);
        }
    }
}
