//! Custom Resource Definitions for the nimbus-k8s operator

pub mod cloud_cluster;
pub mod compute_cluster;
pub mod conditions;
pub mod types;

pub use cloud_cluster::{
    CloudCluster, CloudClusterSpec, CloudClusterStatus, BASTION_HOST_FAILED_REASON,
    BASTION_HOST_READY_CONDITION, CLUSTER_FINALIZER, CLUSTER_SECURITY_GROUPS_READY_CONDITION,
    LOAD_BALANCER_FAILED_REASON, LOAD_BALANCER_READY_CONDITION, PAUSED_ANNOTATION,
    SECURITY_GROUP_RECONCILIATION_FAILED_REASON, WAIT_FOR_DNS_NAME_REASON,
};
pub use compute_cluster::{ComputeCluster, ComputeClusterSpec, ComputeClusterStatus};
pub use conditions::{Condition, ConditionSet, ConditionSeverity, ConditionStatus};
pub use types::{
    BastionSpec, ElasticIpPool, InstanceState, Ipv4PoolFallbackOrder, LoadBalancerScheme,
    LoadBalancerSpec, LoadBalancerStatus, NetworkSpec, NetworkStatus, SecurityGroupRole,
    SubnetSpec, VpcSpec,
};
