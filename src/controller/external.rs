//! Externally-managed infrastructure services
//!
//! When a CloudCluster is marked `externallyManaged`, every piece of cloud
//! infrastructure is provisioned out of band and declared in the spec. These
//! services validate the declarations and adopt them into status instead of
//! creating anything. Deletions are no-ops: the operator does not own the
//! underlying resources.

use std::sync::Arc;

use anyhow::bail;
use async_trait::async_trait;
use tracing::info;

use super::orchestrator::security_group_roles_for_cluster;
use super::scope::ClusterScope;
use super::services::{
    BastionService, ClusterServices, LoadBalancerService, NetworkService, SecurityGroupService,
};

/// Adopts pre-provisioned infrastructure declared in the CloudCluster spec.
#[derive(Clone, Copy, Debug, Default)]
pub struct ExternalInfraService;

#[async_trait]
impl NetworkService for ExternalInfraService {
    async fn reconcile_network(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        if !scope.cloud_cluster.spec.externally_managed {
            bail!(
                "CloudCluster {} is not marked externallyManaged; this build carries no managed infrastructure services",
                scope.name()
            );
        }

        let vpc_id = scope.cloud_cluster.spec.network.vpc.id.clone();
        if vpc_id.is_empty() {
            bail!("externally managed infrastructure requires spec.network.vpc.id");
        }
        if scope.cloud_cluster.spec.network.subnets.is_empty() {
            bail!("externally managed infrastructure requires at least one subnet");
        }

        info!(vpc = %vpc_id, "Adopted externally managed network");
        Ok(())
    }

    async fn delete_network(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        info!(cluster = %scope.name(), "Network is externally managed, nothing to delete");
        Ok(())
    }
}

#[async_trait]
impl SecurityGroupService for ExternalInfraService {
    async fn reconcile_security_groups(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        let roles = security_group_roles_for_cluster(scope);
        let overrides = &scope.cloud_cluster.spec.network.security_group_overrides;

        for role in roles {
            if !overrides.contains_key(role.as_str()) {
                bail!("missing security group override for role {role}");
            }
        }
        Ok(())
    }

    async fn delete_security_groups(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        info!(cluster = %scope.name(), "Security groups are externally managed, nothing to delete");
        Ok(())
    }
}

#[async_trait]
impl BastionService for ExternalInfraService {
    async fn reconcile_bastion(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        if scope.bastion_enabled() {
            bail!("a bastion host cannot be provisioned on externally managed infrastructure");
        }
        Ok(())
    }

    async fn delete_bastion(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        info!(cluster = %scope.name(), "Bastion is externally managed, nothing to delete");
        Ok(())
    }
}

#[async_trait]
impl LoadBalancerService for ExternalInfraService {
    async fn reconcile_load_balancers(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        let dns_name = scope
            .cloud_cluster
            .spec
            .control_plane_load_balancer
            .dns_name
            .clone();

        let mut zones: Vec<String> = Vec::new();
        for subnet in &scope.cloud_cluster.spec.network.subnets {
            let az = &subnet.availability_zone;
            if !az.is_empty() && !zones.iter().any(|z| z == az) {
                zones.push(az.clone());
            }
        }

        let lb = &mut scope.status_mut().network.api_server_load_balancer;
        if let Some(dns) = dns_name {
            lb.dns_name = Some(dns);
        }
        lb.availability_zones = zones;
        Ok(())
    }

    async fn delete_load_balancers(&self, scope: &mut ClusterScope) -> anyhow::Result<()> {
        info!(cluster = %scope.name(), "Load balancer is externally managed, nothing to delete");
        Ok(())
    }
}

/// Service bundle adopting externally managed infrastructure for all four
/// roles.
pub fn externally_managed_services() -> ClusterServices {
    let svc = Arc::new(ExternalInfraService);
    ClusterServices {
        network: svc.clone(),
        security_groups: svc.clone(),
        bastion: svc.clone(),
        load_balancer: svc,
    }
}
