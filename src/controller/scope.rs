//! Cluster scope: the shared context threaded through every reconcile call
//!
//! A scope binds one CloudCluster, its owning ComputeCluster, a Kubernetes
//! client able to persist status and finalizer changes, and the pre-resolved
//! cloud session for the cluster's region. Scopes are built per reconcile
//! invocation and passed explicitly, never held in global state, so many
//! clusters can reconcile concurrently.

use std::sync::Arc;

use kube::{
    api::{Api, Patch, PatchParams},
    Client, ResourceExt,
};
use serde_json::json;

use crate::crd::{CloudCluster, CloudClusterStatus, ComputeCluster, ConditionSet, CLUSTER_FINALIZER};
use crate::error::{Error, Result};
use crate::instance_state::{InstanceStateService, QueueStore, RuleStore};

/// Field manager used for every patch issued by the operator.
pub const FIELD_MANAGER: &str = "nimbus-operator";

/// Pre-resolved cloud credentials bound to a region.
///
/// Resolution (profiles, role assumption, secret lookup) happens outside the
/// engine; the scope only carries the result.
#[derive(Clone, Debug, Default)]
pub struct CloudSession {
    pub region: String,
    pub access_key_id: String,
    pub secret_access_key: String,
    pub session_token: Option<String>,
}

/// Parameters for [`ClusterScope::new`].
pub struct ClusterScopeParams {
    pub client: Client,
    pub cluster: ComputeCluster,
    pub cloud_cluster: CloudCluster,
    pub session: CloudSession,
}

/// Ambient context for reconciling one CloudCluster.
pub struct ClusterScope {
    client: Client,
    api: Api<CloudCluster>,
    pub cluster: ComputeCluster,
    pub cloud_cluster: CloudCluster,
    pub session: CloudSession,
}

impl ClusterScope {
    pub fn new(params: ClusterScopeParams) -> Result<Self> {
        if params.cloud_cluster.metadata.name.is_none() {
            return Err(Error::ConfigError(
                "CloudCluster has no metadata.name".to_string(),
            ));
        }
        let namespace = params
            .cloud_cluster
            .namespace()
            .unwrap_or_else(|| "default".to_string());
        let api = Api::namespaced(params.client.clone(), &namespace);

        Ok(Self {
            client: params.client,
            api,
            cluster: params.cluster,
            cloud_cluster: params.cloud_cluster,
            session: params.session,
        })
    }

    pub fn client(&self) -> Client {
        self.client.clone()
    }

    pub fn name(&self) -> String {
        self.cloud_cluster.name_any()
    }

    pub fn namespace(&self) -> String {
        self.cloud_cluster
            .namespace()
            .unwrap_or_else(|| "default".to_string())
    }

    pub fn region(&self) -> &str {
        &self.session.region
    }

    pub fn bastion_enabled(&self) -> bool {
        self.cloud_cluster.bastion_enabled()
    }

    /// Mutable status, created on first access.
    pub fn status_mut(&mut self) -> &mut CloudClusterStatus {
        self.cloud_cluster.status.get_or_insert_with(Default::default)
    }

    pub fn conditions_mut(&mut self) -> &mut ConditionSet {
        &mut self.status_mut().conditions
    }

    /// DNS name of the API server load balancer, if the provider has
    /// assigned one yet.
    pub fn api_server_dns_name(&self) -> Option<&str> {
        self.cloud_cluster
            .status
            .as_ref()
            .and_then(|s| s.network.api_server_load_balancer.dns_name.as_deref())
            .filter(|dns| !dns.is_empty())
    }

    pub fn has_finalizer(&self) -> bool {
        self.cloud_cluster
            .finalizers()
            .iter()
            .any(|f| f == CLUSTER_FINALIZER)
    }

    /// Add the deletion finalizer to the working copy. Idempotent.
    pub fn add_finalizer(&mut self) {
        let finalizers = self
            .cloud_cluster
            .metadata
            .finalizers
            .get_or_insert_with(Vec::new);
        if !finalizers.iter().any(|f| f == CLUSTER_FINALIZER) {
            finalizers.push(CLUSTER_FINALIZER.to_string());
        }
    }

    /// Drop the deletion finalizer from the working copy.
    pub fn remove_finalizer(&mut self) {
        if let Some(finalizers) = &mut self.cloud_cluster.metadata.finalizers {
            finalizers.retain(|f| f != CLUSTER_FINALIZER);
        }
    }

    /// Persist finalizer changes on the resource.
    pub async fn patch_object(&self) -> Result<()> {
        let patch = json!({
            "metadata": {
                "finalizers": self.cloud_cluster.metadata.finalizers
            }
        });
        self.api
            .patch(
                &self.name(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }

    /// Persist the status sub-resource.
    pub async fn patch_status(&self) -> Result<()> {
        let status = self.cloud_cluster.status.clone().unwrap_or_default();
        let patch = json!({ "status": status });
        self.api
            .patch_status(
                &self.name(),
                &PatchParams::apply(FIELD_MANAGER),
                &Patch::Merge(&patch),
            )
            .await
            .map_err(Error::KubeError)?;
        Ok(())
    }

    /// Persist everything the pipeline mutated.
    ///
    /// Called after both successful and failed pipelines: conditions written
    /// on a failed step must land on the resource so the next reconcile
    /// resumes from observed reality.
    pub async fn close(&self) -> Result<()> {
        self.patch_object().await?;
        self.patch_status().await
    }

    /// Build the instance-state event-rule synchronizer for this cluster.
    pub fn instance_state_service(
        &self,
        rules: Arc<dyn RuleStore>,
        queues: Arc<dyn QueueStore>,
    ) -> InstanceStateService {
        InstanceStateService::new(&self.name(), rules, queues)
    }
}
