//! CloudCluster reconciliation pipeline
//!
//! Sequences the network, security group, bastion, and load balancer
//! sub-reconcilers for create/update, undoes them in reverse order on
//! delete, and keeps the resource's conditions and deletion finalizer in
//! sync with what actually happened.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use kube::{
    api::Api,
    client::Client,
    runtime::{
        controller::{Action, Controller},
        watcher::Config,
    },
    ResourceExt,
};
use tracing::{error, info, instrument, warn};

use crate::crd::{
    CloudCluster, ComputeCluster, ConditionSeverity, SecurityGroupRole,
    BASTION_HOST_FAILED_REASON, BASTION_HOST_READY_CONDITION,
    CLUSTER_SECURITY_GROUPS_READY_CONDITION, LOAD_BALANCER_FAILED_REASON,
    LOAD_BALANCER_READY_CONDITION, PAUSED_ANNOTATION,
    SECURITY_GROUP_RECONCILIATION_FAILED_REASON, WAIT_FOR_DNS_NAME_REASON,
};
use crate::error::{Error, Result};

use super::scope::{CloudSession, ClusterScope, ClusterScopeParams};
use super::services::ClusterServices;

/// Baseline security-group roles every cluster requires, in derivation order.
pub const DEFAULT_SECURITY_GROUP_ROLES: [SecurityGroupRole; 4] = [
    SecurityGroupRole::ApiserverLb,
    SecurityGroupRole::Lb,
    SecurityGroupRole::ControlPlane,
    SecurityGroupRole::Node,
];

/// Requeue interval while waiting for the provider to assign a DNS name.
const DNS_NAME_REQUEUE: Duration = Duration::from_secs(15);

/// Security-group roles required for a cluster: the baseline set, with the
/// bastion role appended when a bastion host is enabled.
pub fn security_group_roles_for_cluster(scope: &ClusterScope) -> Vec<SecurityGroupRole> {
    let mut roles = DEFAULT_SECURITY_GROUP_ROLES.to_vec();
    if scope.bastion_enabled() {
        roles.push(SecurityGroupRole::Bastion);
    }
    roles
}

/// Drives one CloudCluster toward its desired infrastructure state.
pub struct ClusterOrchestrator {
    client: Client,
    services: ClusterServices,
    session: CloudSession,
}

impl ClusterOrchestrator {
    pub fn new(client: Client, services: ClusterServices, session: CloudSession) -> Self {
        Self {
            client,
            services,
            session,
        }
    }

    /// Entry point for one reconcile invocation.
    ///
    /// Resolves the resource and its owner, builds a scope, and dispatches
    /// to the create/update or delete pipeline. Status and finalizer
    /// mutations are persisted afterwards even when the pipeline failed, so
    /// conditions recorded for a failed step land on the resource.
    #[instrument(skip_all, fields(namespace = %namespace, name = %name))]
    pub async fn reconcile(&self, namespace: &str, name: &str) -> Result<Action> {
        let api: Api<CloudCluster> = Api::namespaced(self.client.clone(), namespace);

        let cloud_cluster = match api.get(name).await {
            Ok(cc) => cc,
            Err(kube::Error::Api(ae)) if ae.code == 404 => {
                info!("CloudCluster no longer exists");
                return Ok(Action::await_change());
            }
            Err(e) => return Err(Error::KubeError(e)),
        };

        let cluster = match self.get_owner_cluster(&cloud_cluster).await? {
            Some(cluster) => cluster,
            None => {
                info!("CloudCluster has no owning ComputeCluster yet, skipping");
                return Ok(Action::await_change());
            }
        };

        if is_paused(&cluster, &cloud_cluster) {
            info!("CloudCluster or its owner is paused, skipping");
            return Ok(Action::await_change());
        }

        let mut session = self.session.clone();
        session.region = cloud_cluster.spec.region.clone();

        let mut scope = ClusterScope::new(ClusterScopeParams {
            client: self.client.clone(),
            cluster,
            cloud_cluster,
            session,
        })?;

        let result = if scope.cloud_cluster.metadata.deletion_timestamp.is_some() {
            self.reconcile_delete(&mut scope).await
        } else {
            self.reconcile_normal(&mut scope).await
        };

        let persisted = scope.close().await;
        match result {
            Ok(action) => {
                persisted?;
                Ok(action)
            }
            Err(err) => {
                if let Err(persist_err) = persisted {
                    warn!("Failed to persist status after pipeline error: {persist_err}");
                }
                Err(err)
            }
        }
    }

    /// Resolve the owning ComputeCluster.
    ///
    /// No owner reference means the resource has not been adopted yet and is
    /// skipped without error; a reference to a missing owner is an error so
    /// the caller retries later.
    async fn get_owner_cluster(
        &self,
        cloud_cluster: &CloudCluster,
    ) -> Result<Option<ComputeCluster>> {
        let Some(reference) = cloud_cluster.owner_references().iter().find(|r| {
            r.kind == "ComputeCluster" && r.api_version.starts_with("cluster.nimbus.dev/")
        }) else {
            return Ok(None);
        };

        let namespace = cloud_cluster
            .namespace()
            .unwrap_or_else(|| "default".to_string());
        let api: Api<ComputeCluster> = Api::namespaced(self.client.clone(), &namespace);

        match api.get(&reference.name).await {
            Ok(cluster) => Ok(Some(cluster)),
            Err(kube::Error::Api(ae)) if ae.code == 404 => Err(Error::OwnerNotFound {
                name: reference.name.clone(),
                source: kube::Error::Api(ae),
            }),
            Err(e) => Err(Error::KubeError(e)),
        }
    }

    /// Create/update pipeline: Network, SecurityGroup, Bastion, LoadBalancer,
    /// strictly in that order.
    #[instrument(skip(self, scope), fields(cluster = %scope.name(), namespace = %scope.namespace()))]
    pub async fn reconcile_normal(&self, scope: &mut ClusterScope) -> Result<Action> {
        info!("Reconciling CloudCluster");

        scope.add_finalizer();
        // the finalizer must be on the resource before the first cloud call,
        // otherwise a crash mid-pipeline can orphan cloud resources
        scope.patch_object().await?;

        // a network failure is a precondition failure: no condition recorded
        if let Err(err) = self.services.network.reconcile_network(scope).await {
            return Err(Error::Service(err));
        }

        if let Err(err) = self
            .services
            .security_groups
            .reconcile_security_groups(scope)
            .await
        {
            scope.conditions_mut().mark_false(
                CLUSTER_SECURITY_GROUPS_READY_CONDITION,
                ConditionSeverity::Warning,
                SECURITY_GROUP_RECONCILIATION_FAILED_REASON,
                &err.to_string(),
            );
            return Err(Error::Service(err));
        }

        if let Err(err) = self.services.bastion.reconcile_bastion(scope).await {
            scope.conditions_mut().mark_false(
                BASTION_HOST_READY_CONDITION,
                ConditionSeverity::Warning,
                BASTION_HOST_FAILED_REASON,
                &err.to_string(),
            );
            return Err(Error::Service(err));
        }

        if let Err(err) = self
            .services
            .load_balancer
            .reconcile_load_balancers(scope)
            .await
        {
            scope.conditions_mut().mark_false(
                LOAD_BALANCER_READY_CONDITION,
                ConditionSeverity::Warning,
                LOAD_BALANCER_FAILED_REASON,
                &err.to_string(),
            );
            return Err(Error::Service(err));
        }

        if scope.api_server_dns_name().is_none() {
            info!("Waiting on API server load balancer to have a DNS name");
            scope.conditions_mut().mark_false(
                LOAD_BALANCER_READY_CONDITION,
                ConditionSeverity::Info,
                WAIT_FOR_DNS_NAME_REASON,
                "Waiting on the load balancer to have a DNS name",
            );
            return Ok(Action::requeue(DNS_NAME_REQUEUE));
        }

        scope.conditions_mut().mark_true(LOAD_BALANCER_READY_CONDITION);
        scope.status_mut().ready = true;
        info!("CloudCluster infrastructure is ready");

        Ok(Action::await_change())
    }

    /// Delete pipeline: undo in reverse dependency order.
    ///
    /// The finalizer is removed only once every deletion has succeeded; any
    /// failure leaves it in place so the resource is retried instead of
    /// orphaning cloud resources.
    #[instrument(skip(self, scope), fields(cluster = %scope.name(), namespace = %scope.namespace()))]
    pub async fn reconcile_delete(&self, scope: &mut ClusterScope) -> Result<Action> {
        info!("Reconciling CloudCluster delete");

        self.services
            .bastion
            .delete_bastion(scope)
            .await
            .map_err(Error::Service)?;

        self.services
            .load_balancer
            .delete_load_balancers(scope)
            .await
            .map_err(Error::Service)?;

        self.services
            .security_groups
            .delete_security_groups(scope)
            .await
            .map_err(Error::Service)?;

        self.services
            .network
            .delete_network(scope)
            .await
            .map_err(Error::Service)?;

        scope.remove_finalizer();
        info!("CloudCluster infrastructure deleted");

        Ok(Action::await_change())
    }
}

/// Whether reconciliation of this resource is suspended, either through the
/// owner's `spec.paused` or the resource-level annotation.
fn is_paused(cluster: &ComputeCluster, cloud_cluster: &CloudCluster) -> bool {
    if cluster.spec.paused {
        return true;
    }
    cloud_cluster
        .metadata
        .annotations
        .as_ref()
        .map(|a| a.contains_key(PAUSED_ANNOTATION))
        .unwrap_or(false)
}

/// Shared state for the controller loop.
pub struct ControllerState {
    pub client: Client,
    pub orchestrator: ClusterOrchestrator,
}

/// Main entry point to start the controller.
pub async fn run_controller(state: Arc<ControllerState>) -> Result<()> {
    let client = state.client.clone();
    let cloud_clusters: Api<CloudCluster> = Api::all(client.clone());

    info!("Starting CloudCluster controller");

    // Verify CRD exists
    match cloud_clusters.list(&Default::default()).await {
        Ok(_) => info!("CloudCluster CRD is available"),
        Err(e) => {
            error!(
                "CloudCluster CRD not found. Please install the CRD first: {:?}",
                e
            );
            return Err(Error::ConfigError(
                "CloudCluster CRD not installed".to_string(),
            ));
        }
    }

    Controller::new(cloud_clusters, Config::default())
        .shutdown_on_signal()
        .run(reconcile, error_policy, state)
        .for_each(|res| async move {
            match res {
                Ok(obj) => info!("Reconciled: {:?}", obj),
                Err(e) => error!("Reconcile error: {:?}", e),
            }
        })
        .await;

    Ok(())
}

/// Controller-loop shim delegating to the orchestrator.
async fn reconcile(obj: Arc<CloudCluster>, ctx: Arc<ControllerState>) -> Result<Action> {
    let namespace = obj.namespace().unwrap_or_else(|| "default".to_string());
    ctx.orchestrator.reconcile(&namespace, &obj.name_any()).await
}

/// Error policy determines how to handle reconciliation errors.
fn error_policy(obj: Arc<CloudCluster>, error: &Error, _ctx: Arc<ControllerState>) -> Action {
    error!("Reconciliation error for {}: {:?}", obj.name_any(), error);

    let retry_duration = if error.is_retriable() {
        Duration::from_secs(15)
    } else {
        Duration::from_secs(60)
    };

    Action::requeue(retry_duration)
}
