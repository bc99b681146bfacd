//! Shared types for CloudCluster specifications
//!
//! These types describe the cloud infrastructure a compute cluster needs:
//! network topology, security group roles, bastion access, and the control
//! plane load balancer. They are used across the CRD definitions and the
//! controller logic.

use std::collections::BTreeMap;

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// Logical security-group roles a cluster requires.
///
/// The role list drives deterministic group-name derivation downstream, so
/// ordering is significant everywhere a role set appears.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum SecurityGroupRole {
    /// Load balancer fronting the API server
    ApiserverLb,
    /// General-purpose load balancers
    Lb,
    /// Control plane instances
    #[serde(rename = "controlplane")]
    ControlPlane,
    /// Worker node instances
    Node,
    /// The bastion jump host
    Bastion,
}

impl SecurityGroupRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            SecurityGroupRole::ApiserverLb => "apiserver-lb",
            SecurityGroupRole::Lb => "lb",
            SecurityGroupRole::ControlPlane => "controlplane",
            SecurityGroupRole::Node => "node",
            SecurityGroupRole::Bastion => "bastion",
        }
    }
}

impl std::fmt::Display for SecurityGroupRole {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Lifecycle states a compute instance moves through.
///
/// Wire values match the provider's state-change notification payloads.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum InstanceState {
    Pending,
    Running,
    ShuttingDown,
    Terminated,
    Stopping,
    Stopped,
}

/// Network topology request for a cluster
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkSpec {
    #[serde(default)]
    pub vpc: VpcSpec,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subnets: Vec<SubnetSpec>,

    /// Pre-created security group ids, keyed by role name.
    ///
    /// When set for a role, the cluster adopts that group instead of
    /// managing one.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub security_group_overrides: BTreeMap<String, String>,

    /// Tags applied to every resource created for this cluster
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub additional_tags: BTreeMap<String, String>,
}

/// VPC configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct VpcSpec {
    /// Id of an existing VPC to use; empty when the cluster manages its own
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,

    /// Bring-your-own public IPv4 pool for addresses allocated by the cluster
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub elastic_ip_pool: Option<ElasticIpPool>,
}

/// Bring-your-own elastic IP pool with a fallback-order policy
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ElasticIpPool {
    /// Id of the public IPv4 pool, e.g. `ipv4pool-ec2-0123456789abcdef0`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv4_pool: Option<String>,

    /// What to do when the pool is exhausted
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub public_ipv4_pool_fallback_order: Option<Ipv4PoolFallbackOrder>,
}

/// Fallback behavior when a bring-your-own IPv4 pool runs out of addresses
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum Ipv4PoolFallbackOrder {
    /// Fall back to the provider's shared address pool
    #[default]
    AmazonPool,
    /// Fail the allocation instead of falling back
    None,
}

/// A single subnet the cluster spans
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SubnetSpec {
    pub id: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub availability_zone: String,

    #[serde(default)]
    pub is_public: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cidr_block: Option<String>,
}

/// Bastion host configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BastionSpec {
    /// Whether a bastion host should exist for this cluster
    #[serde(default)]
    pub enabled: bool,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub instance_type: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ami_id: Option<String>,

    /// CIDR blocks allowed to reach the bastion; empty means operator default
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub allowed_cidr_blocks: Vec<String>,
}

/// Control plane load balancer configuration
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerSpec {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scheme: Option<LoadBalancerScheme>,

    /// DNS name of a pre-provisioned load balancer to adopt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub additional_security_groups: Vec<String>,
}

/// Reachability scheme of the control plane load balancer
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "kebab-case")]
pub enum LoadBalancerScheme {
    #[default]
    InternetFacing,
    Internal,
}

impl std::fmt::Display for LoadBalancerScheme {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LoadBalancerScheme::InternetFacing => write!(f, "internet-facing"),
            LoadBalancerScheme::Internal => write!(f, "internal"),
        }
    }
}

/// Observed state of the cluster network
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct NetworkStatus {
    #[serde(default)]
    pub api_server_load_balancer: LoadBalancerStatus,
}

/// Observed state of the control plane load balancer
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LoadBalancerStatus {
    /// DNS name assigned by the provider; absent until provisioning finishes
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dns_name: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub availability_zones: Vec<String>,
}
