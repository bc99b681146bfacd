//! Controller module for CloudCluster reconciliation
//!
//! This module contains the controller loop, the orchestration pipeline
//! sequencing the infrastructure sub-reconcilers, and the scope plumbing
//! shared by every reconcile call.

pub mod external;
mod orchestrator;
#[cfg(test)]
mod orchestrator_test;
pub mod scope;
pub mod services;

pub use external::{externally_managed_services, ExternalInfraService};
pub use orchestrator::{
    run_controller, security_group_roles_for_cluster, ClusterOrchestrator, ControllerState,
    DEFAULT_SECURITY_GROUP_ROLES,
};
pub use scope::{CloudSession, ClusterScope, ClusterScopeParams, FIELD_MANAGER};
pub use services::{
    BastionService, ClusterServices, LoadBalancerService, NetworkService, SecurityGroupService,
};
