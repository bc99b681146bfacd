//! CloudCluster Custom Resource Definition
//!
//! A CloudCluster describes the cloud infrastructure backing one compute
//! cluster: network topology, security groups, bastion access, and the
//! control plane load balancer. The spec is owned by the caller; the
//! operator only ever mutates status and finalizers.

use kube::CustomResource;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

use super::conditions::ConditionSet;
use super::types::{BastionSpec, LoadBalancerSpec, NetworkSpec, NetworkStatus};

/// Finalizer preventing deletion of a CloudCluster until its cloud
/// resources are cleaned up.
pub const CLUSTER_FINALIZER: &str = "cloudcluster.infrastructure.nimbus.dev";

/// Annotation that pauses reconciliation of a single CloudCluster.
pub const PAUSED_ANNOTATION: &str = "cluster.nimbus.dev/paused";

/// Condition recording the outcome of load balancer reconciliation.
pub const LOAD_BALANCER_READY_CONDITION: &str = "LoadBalancerReady";
/// Condition recording the outcome of security group reconciliation.
pub const CLUSTER_SECURITY_GROUPS_READY_CONDITION: &str = "ClusterSecurityGroupsReady";
/// Condition recording the outcome of bastion host reconciliation.
pub const BASTION_HOST_READY_CONDITION: &str = "BastionHostReady";

/// Reason set when load balancer reconciliation fails.
pub const LOAD_BALANCER_FAILED_REASON: &str = "LoadBalancerFailed";
/// Reason set while waiting for the provider to assign a DNS name.
pub const WAIT_FOR_DNS_NAME_REASON: &str = "WaitForDNSName";
/// Reason set when security group reconciliation fails.
pub const SECURITY_GROUP_RECONCILIATION_FAILED_REASON: &str = "SecurityGroupReconciliationFailed";
/// Reason set when bastion host reconciliation fails.
pub const BASTION_HOST_FAILED_REASON: &str = "BastionHostFailed";

#[derive(CustomResource, Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[kube(
    group = "infrastructure.nimbus.dev",
    version = "v1beta1",
    kind = "CloudCluster",
    namespaced,
    status = "CloudClusterStatus",
    shortname = "cc",
    printcolumn = r#"{"name":"Region","type":"string","jsonPath":".spec.region"}"#,
    printcolumn = r#"{"name":"Ready","type":"boolean","jsonPath":".status.ready"}"#,
    printcolumn = r#"{"name":"Endpoint","type":"string","jsonPath":".status.network.apiServerLoadBalancer.dnsName"}"#,
    printcolumn = r#"{"name":"Age","type":"date","jsonPath":".metadata.creationTimestamp"}"#
)]
#[serde(rename_all = "camelCase")]
pub struct CloudClusterSpec {
    /// Cloud region the cluster's infrastructure lives in. Immutable.
    pub region: String,

    #[serde(default)]
    pub network: NetworkSpec,

    #[serde(default)]
    pub bastion: BastionSpec,

    #[serde(default)]
    pub control_plane_load_balancer: LoadBalancerSpec,

    /// When set, all infrastructure is provisioned out of band and the
    /// operator only validates and adopts it.
    #[serde(default)]
    pub externally_managed: bool,
}

/// Observed state of a CloudCluster
#[derive(Clone, Debug, Default, Deserialize, Serialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CloudClusterStatus {
    /// True once every infrastructure step has completed
    #[serde(default)]
    pub ready: bool,

    #[serde(default)]
    pub network: NetworkStatus,

    #[serde(default, skip_serializing_if = "ConditionSet::is_empty")]
    pub conditions: ConditionSet,
}

impl CloudCluster {
    /// Whether a bastion host is requested for this cluster.
    pub fn bastion_enabled(&self) -> bool {
        self.spec.bastion.enabled
    }
}
