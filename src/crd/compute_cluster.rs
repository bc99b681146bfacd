//! ComputeCluster Custom Resource Definition
//!
//! The higher-level cluster object that owns a CloudCluster. The operator
//! only reads it: presence of an owner reference gates reconciliation, and
//! `spec.paused` suspends it.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "cluster.nimbus.dev",
    version = "v1beta1",
    kind = "ComputeCluster",
    namespaced,
    status = "ComputeClusterStatus",
    printcolumn = r#"{"name":"Paused","type":"boolean","jsonPath":".spec.paused"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct ComputeClusterSpec {
    /// Suspends reconciliation of the cluster and everything it owns
    #[serde(default)]
    pub paused: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub control_plane_endpoint: Option<String>,
}

/// Observed state of a ComputeCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ComputeClusterStatus {
    #[serde(default)]
    pub infrastructure_ready: bool,
}
