//! Sub-reconciler contracts consumed by the orchestrator
//!
//! Each infrastructure concern is an independently-injectable trait object
//! so the pipeline can be composed from any mix of implementations, and
//! tests can substitute deterministic fakes per role. Implementations talk
//! to the cloud through their own injected transports; errors are opaque to
//! the orchestrator and simply propagated.

use std::sync::Arc;

use async_trait::async_trait;

use super::scope::ClusterScope;

#[async_trait]
pub trait NetworkService: Send + Sync {
    async fn reconcile_network(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
    async fn delete_network(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
}

#[async_trait]
pub trait SecurityGroupService: Send + Sync {
    async fn reconcile_security_groups(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
    async fn delete_security_groups(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
}

#[async_trait]
pub trait BastionService: Send + Sync {
    async fn reconcile_bastion(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
    async fn delete_bastion(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
}

#[async_trait]
pub trait LoadBalancerService: Send + Sync {
    async fn reconcile_load_balancers(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
    async fn delete_load_balancers(&self, scope: &mut ClusterScope) -> anyhow::Result<()>;
}

/// The four injectable sub-reconcilers the orchestrator sequences.
#[derive(Clone)]
pub struct ClusterServices {
    pub network: Arc<dyn NetworkService>,
    pub security_groups: Arc<dyn SecurityGroupService>,
    pub bastion: Arc<dyn BastionService>,
    pub load_balancer: Arc<dyn LoadBalancerService>,
}
