//! Tests for the CloudCluster orchestration pipeline
//!
//! Sub-reconcilers are replaced with fakes that record every call in order,
//! so the tests can assert both what happened to the resource and which
//! steps ran. The Kubernetes API is served by a local mock server, letting
//! finalizer and status persistence run for real.

use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use k8s_openapi::apimachinery::pkg::apis::meta::v1::OwnerReference;
use kube::Client;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, ResponseTemplate};

use crate::crd::{
    CloudCluster, CloudClusterSpec, CloudClusterStatus, ComputeCluster, ComputeClusterSpec,
    ConditionSeverity, ConditionStatus, ElasticIpPool, Ipv4PoolFallbackOrder, SecurityGroupRole,
    BASTION_HOST_FAILED_REASON, BASTION_HOST_READY_CONDITION, CLUSTER_FINALIZER,
    CLUSTER_SECURITY_GROUPS_READY_CONDITION, LOAD_BALANCER_FAILED_REASON,
    LOAD_BALANCER_READY_CONDITION, SECURITY_GROUP_RECONCILIATION_FAILED_REASON,
    WAIT_FOR_DNS_NAME_REASON,
};
use crate::error::Error;

use super::orchestrator::{
    security_group_roles_for_cluster, ClusterOrchestrator, DEFAULT_SECURITY_GROUP_ROLES,
};
use super::scope::{CloudSession, ClusterScope, ClusterScopeParams};
use super::services::{
    BastionService, ClusterServices, LoadBalancerService, NetworkService, SecurityGroupService,
};

type CallLog = Arc<Mutex<Vec<&'static str>>>;

/// A fake sub-reconciler usable in any of the four roles.
#[derive(Clone, Default)]
struct FakeService {
    log: CallLog,
    fail_reconcile: bool,
    fail_delete: bool,
}

impl FakeService {
    fn record(&self, op: &'static str) {
        self.log.lock().unwrap().push(op);
    }

    fn reconcile_result(&self) -> anyhow::Result<()> {
        if self.fail_reconcile {
            anyhow::bail!("failed to get resource");
        }
        Ok(())
    }

    fn delete_result(&self) -> anyhow::Result<()> {
        if self.fail_delete {
            anyhow::bail!("failed to get resource");
        }
        Ok(())
    }
}

#[async_trait]
impl NetworkService for FakeService {
    async fn reconcile_network(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("network.reconcile");
        self.reconcile_result()
    }

    async fn delete_network(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("network.delete");
        self.delete_result()
    }
}

#[async_trait]
impl SecurityGroupService for FakeService {
    async fn reconcile_security_groups(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("security_groups.reconcile");
        self.reconcile_result()
    }

    async fn delete_security_groups(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("security_groups.delete");
        self.delete_result()
    }
}

#[async_trait]
impl BastionService for FakeService {
    async fn reconcile_bastion(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("bastion.reconcile");
        self.reconcile_result()
    }

    async fn delete_bastion(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("bastion.delete");
        self.delete_result()
    }
}

#[async_trait]
impl LoadBalancerService for FakeService {
    async fn reconcile_load_balancers(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("load_balancer.reconcile");
        self.reconcile_result()
    }

    async fn delete_load_balancers(&self, _scope: &mut ClusterScope) -> anyhow::Result<()> {
        self.record("load_balancer.delete");
        self.delete_result()
    }
}

/// All four roles backed by fakes sharing one ordered call log.
struct FakeFleet {
    log: CallLog,
    network: Arc<FakeService>,
    security_groups: Arc<FakeService>,
    bastion: Arc<FakeService>,
    load_balancer: Arc<FakeService>,
}

impl FakeFleet {
    fn new() -> Self {
        let log: CallLog = Default::default();
        let ok = |log: &CallLog| {
            Arc::new(FakeService {
                log: log.clone(),
                ..Default::default()
            })
        };
        Self {
            network: ok(&log),
            security_groups: ok(&log),
            bastion: ok(&log),
            load_balancer: ok(&log),
            log,
        }
    }

    fn fake(&self, fail_reconcile: bool, fail_delete: bool) -> Arc<FakeService> {
        Arc::new(FakeService {
            log: self.log.clone(),
            fail_reconcile,
            fail_delete,
        })
    }

    fn services(&self) -> ClusterServices {
        ClusterServices {
            network: self.network.clone(),
            security_groups: self.security_groups.clone(),
            bastion: self.bastion.clone(),
            load_balancer: self.load_balancer.clone(),
        }
    }

    fn calls(&self) -> Vec<&'static str> {
        self.log.lock().unwrap().clone()
    }
}

fn dummy_client() -> Client {
    let config = kube::Config::new("http://127.0.0.1:8080".parse().unwrap());
    Client::try_from(config).expect("client")
}

fn base_cluster(name: &str) -> CloudCluster {
    let mut cluster = CloudCluster::new(
        name,
        CloudClusterSpec {
            region: "us-east-1".to_string(),
            ..Default::default()
        },
    );
    cluster.metadata.namespace = Some("default".to_string());
    cluster.metadata.uid = Some(format!("uid-{name}"));
    cluster
}

/// A cluster whose load balancer already has a DNS name.
fn cluster_with_dns(name: &str) -> CloudCluster {
    let mut cluster = base_cluster(name);
    let mut status = CloudClusterStatus::default();
    status.network.api_server_load_balancer.dns_name = Some("lb.us-east-1.example.com".to_string());
    status.network.api_server_load_balancer.availability_zones =
        vec!["us-east-1a".to_string(), "us-east-1b".to_string()];
    cluster.status = Some(status);
    cluster
}

fn owned(mut cluster: CloudCluster, owner_name: &str) -> CloudCluster {
    cluster.metadata.owner_references = Some(vec![OwnerReference {
        api_version: "cluster.nimbus.dev/v1beta1".to_string(),
        kind: "ComputeCluster".to_string(),
        name: owner_name.to_string(),
        uid: "1".to_string(),
        ..Default::default()
    }]);
    cluster
}

fn scope_with_client(client: Client, cloud_cluster: CloudCluster) -> ClusterScope {
    ClusterScope::new(ClusterScopeParams {
        client,
        cluster: ComputeCluster::new("owner", ComputeClusterSpec::default()),
        cloud_cluster,
        session: CloudSession::default(),
    })
    .expect("scope")
}

fn scope_for(cloud_cluster: CloudCluster) -> ClusterScope {
    scope_with_client(dummy_client(), cloud_cluster)
}

async fn client_for(server: &MockServer) -> Client {
    let config = kube::Config::new(server.uri().parse().unwrap());
    Client::try_from(config).expect("client")
}

fn not_found_body(name: &str) -> serde_json::Value {
    serde_json::json!({
        "kind": "Status",
        "apiVersion": "v1",
        "metadata": {},
        "status": "Failure",
        "message": format!("{name} not found"),
        "reason": "NotFound",
        "code": 404
    })
}

/// Scope backed by a mock API server that accepts object and status patches.
async fn scope_with_api(cloud_cluster: &CloudCluster) -> (MockServer, ClusterScope) {
    let server = MockServer::start().await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"/cloudclusters/[^/]+(/status)?$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(cloud_cluster).unwrap()),
        )
        .mount(&server)
        .await;
    let client = client_for(&server).await;
    let scope = scope_with_client(client, cloud_cluster.clone());
    (server, scope)
}

fn orchestrator_with(client: Client, services: ClusterServices) -> ClusterOrchestrator {
    ClusterOrchestrator::new(client, services, CloudSession::default())
}

#[tokio::test]
async fn test_security_group_roles_without_bastion() {
    let scope = scope_for(base_cluster("test"));
    let roles = security_group_roles_for_cluster(&scope);
    assert_eq!(roles, DEFAULT_SECURITY_GROUP_ROLES.to_vec());
}

#[tokio::test]
async fn test_security_group_roles_with_bastion_appends_last() {
    let mut cluster = base_cluster("test");
    cluster.spec.bastion.enabled = true;
    let scope = scope_for(cluster);

    let roles = security_group_roles_for_cluster(&scope);
    assert_eq!(roles[..4], DEFAULT_SECURITY_GROUP_ROLES);
    assert_eq!(roles[4], SecurityGroupRole::Bastion);
    assert_eq!(roles.len(), 5);
}

#[tokio::test]
async fn test_reconcile_normal_success_sets_finalizer_and_condition() {
    let cluster = cluster_with_dns("test");
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    orchestrator.reconcile_normal(&mut scope).await.unwrap();

    assert!(scope.has_finalizer());
    let status = scope.cloud_cluster.status.as_ref().unwrap();
    assert!(status.ready);
    let condition = status.conditions.get(LOAD_BALANCER_READY_CONDITION).unwrap();
    assert_eq!(condition.status, ConditionStatus::True);
    assert_eq!(condition.severity, None);
    assert!(condition.reason.is_empty());
    assert_eq!(
        fleet.calls(),
        vec![
            "network.reconcile",
            "security_groups.reconcile",
            "bastion.reconcile",
            "load_balancer.reconcile",
        ]
    );
}

#[tokio::test]
async fn test_reconcile_normal_with_byo_ip_pool() {
    let mut cluster = cluster_with_dns("test");
    cluster.spec.network.vpc.elastic_ip_pool = Some(ElasticIpPool {
        public_ipv4_pool: Some("ipv4pool-ec2-0123456789abcdef0".to_string()),
        public_ipv4_pool_fallback_order: Some(Ipv4PoolFallbackOrder::AmazonPool),
    });
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    orchestrator.reconcile_normal(&mut scope).await.unwrap();
    assert!(scope.cloud_cluster.status.as_ref().unwrap().ready);
}

#[tokio::test]
async fn test_network_failure_aborts_without_condition() {
    let cluster = cluster_with_dns("test");
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let mut fleet = FakeFleet::new();
    fleet.network = fleet.fake(true, false);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    let err = orchestrator.reconcile_normal(&mut scope).await.unwrap_err();
    assert!(err.to_string().contains("failed to get resource"));

    // network failures are precondition failures, not reportable state
    let conditions_empty = scope
        .cloud_cluster
        .status
        .as_ref()
        .map(|s| s.conditions.is_empty())
        .unwrap_or(true);
    assert!(conditions_empty);
    assert_eq!(fleet.calls(), vec!["network.reconcile"]);
}

#[tokio::test]
async fn test_security_group_failure_sets_condition_and_halts() {
    let cluster = cluster_with_dns("test");
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let mut fleet = FakeFleet::new();
    fleet.security_groups = fleet.fake(true, false);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    let result = orchestrator.reconcile_normal(&mut scope).await;
    assert!(result.is_err());

    let status = scope.cloud_cluster.status.as_ref().unwrap();
    let condition = status
        .conditions
        .get(CLUSTER_SECURITY_GROUPS_READY_CONDITION)
        .unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.severity, Some(ConditionSeverity::Warning));
    assert_eq!(condition.reason, SECURITY_GROUP_RECONCILIATION_FAILED_REASON);
    assert_eq!(
        fleet.calls(),
        vec!["network.reconcile", "security_groups.reconcile"]
    );
}

#[tokio::test]
async fn test_bastion_failure_sets_condition_and_halts() {
    let cluster = cluster_with_dns("test");
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let mut fleet = FakeFleet::new();
    fleet.bastion = fleet.fake(true, false);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    let result = orchestrator.reconcile_normal(&mut scope).await;
    assert!(result.is_err());

    let status = scope.cloud_cluster.status.as_ref().unwrap();
    let condition = status.conditions.get(BASTION_HOST_READY_CONDITION).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.severity, Some(ConditionSeverity::Warning));
    assert_eq!(condition.reason, BASTION_HOST_FAILED_REASON);
    assert_eq!(
        fleet.calls(),
        vec![
            "network.reconcile",
            "security_groups.reconcile",
            "bastion.reconcile",
        ]
    );
}

#[tokio::test]
async fn test_load_balancer_failure_sets_condition() {
    let cluster = cluster_with_dns("test");
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let mut fleet = FakeFleet::new();
    fleet.load_balancer = fleet.fake(true, false);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    let result = orchestrator.reconcile_normal(&mut scope).await;
    assert!(result.is_err());

    let status = scope.cloud_cluster.status.as_ref().unwrap();
    let condition = status.conditions.get(LOAD_BALANCER_READY_CONDITION).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.severity, Some(ConditionSeverity::Warning));
    assert_eq!(condition.reason, LOAD_BALANCER_FAILED_REASON);
}

#[tokio::test]
async fn test_missing_dns_name_requeues_without_error() {
    let cluster = base_cluster("test");
    let (_server, mut scope) = scope_with_api(&cluster).await;
    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    // not an error: this is the steady-state polling path while the
    // provider assigns a DNS name
    orchestrator.reconcile_normal(&mut scope).await.unwrap();

    let status = scope.cloud_cluster.status.as_ref().unwrap();
    assert!(!status.ready);
    let condition = status.conditions.get(LOAD_BALANCER_READY_CONDITION).unwrap();
    assert_eq!(condition.status, ConditionStatus::False);
    assert_eq!(condition.severity, Some(ConditionSeverity::Info));
    assert_eq!(condition.reason, WAIT_FOR_DNS_NAME_REASON);
}

#[tokio::test]
async fn test_reconcile_delete_removes_finalizer_in_reverse_order() {
    let mut cluster = base_cluster("test");
    cluster.metadata.finalizers = Some(vec![CLUSTER_FINALIZER.to_string()]);
    let mut scope = scope_for(cluster);
    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    orchestrator.reconcile_delete(&mut scope).await.unwrap();

    assert!(!scope.has_finalizer());
    assert_eq!(
        fleet.calls(),
        vec![
            "bastion.delete",
            "load_balancer.delete",
            "security_groups.delete",
            "network.delete",
        ]
    );
}

#[tokio::test]
async fn test_delete_load_balancer_failure_keeps_finalizer() {
    let mut cluster = base_cluster("test");
    cluster.metadata.finalizers = Some(vec![CLUSTER_FINALIZER.to_string()]);
    let mut scope = scope_for(cluster);
    let mut fleet = FakeFleet::new();
    fleet.load_balancer = fleet.fake(false, true);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    let result = orchestrator.reconcile_delete(&mut scope).await;
    assert!(result.is_err());
    assert!(scope.has_finalizer());
    assert_eq!(fleet.calls(), vec!["bastion.delete", "load_balancer.delete"]);
}

#[tokio::test]
async fn test_delete_bastion_failure_keeps_finalizer() {
    let mut cluster = base_cluster("test");
    cluster.metadata.finalizers = Some(vec![CLUSTER_FINALIZER.to_string()]);
    let mut scope = scope_for(cluster);
    let mut fleet = FakeFleet::new();
    fleet.bastion = fleet.fake(false, true);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    let result = orchestrator.reconcile_delete(&mut scope).await;
    assert!(result.is_err());
    assert!(scope.has_finalizer());
    assert_eq!(fleet.calls(), vec!["bastion.delete"]);
}

#[tokio::test]
async fn test_delete_security_group_failure_keeps_finalizer() {
    let mut cluster = base_cluster("test");
    cluster.metadata.finalizers = Some(vec![CLUSTER_FINALIZER.to_string()]);
    let mut scope = scope_for(cluster);
    let mut fleet = FakeFleet::new();
    fleet.security_groups = fleet.fake(false, true);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    assert!(orchestrator.reconcile_delete(&mut scope).await.is_err());
    assert!(scope.has_finalizer());
}

#[tokio::test]
async fn test_delete_network_failure_keeps_finalizer() {
    let mut cluster = base_cluster("test");
    cluster.metadata.finalizers = Some(vec![CLUSTER_FINALIZER.to_string()]);
    let mut scope = scope_for(cluster);
    let mut fleet = FakeFleet::new();
    fleet.network = fleet.fake(false, true);
    let orchestrator = orchestrator_with(dummy_client(), fleet.services());

    assert!(orchestrator.reconcile_delete(&mut scope).await.is_err());
    assert!(scope.has_finalizer());
}

#[tokio::test]
async fn test_reconcile_skips_resource_without_owner_reference() {
    let server = MockServer::start().await;
    let cluster = base_cluster("test");
    Mock::given(method("GET"))
        .and(path(
            "/apis/infrastructure.nimbus.dev/v1beta1/namespaces/default/cloudclusters/test",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&cluster).unwrap()),
        )
        .mount(&server)
        .await;

    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(client_for(&server).await, fleet.services());

    orchestrator.reconcile("default", "test").await.unwrap();
    assert!(fleet.calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_errors_when_owner_is_missing() {
    let server = MockServer::start().await;
    let cluster = owned(base_cluster("test"), "capi-fail-test");
    Mock::given(method("GET"))
        .and(path(
            "/apis/infrastructure.nimbus.dev/v1beta1/namespaces/default/cloudclusters/test",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&cluster).unwrap()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/cluster.nimbus.dev/v1beta1/namespaces/default/computeclusters/capi-fail-test",
        ))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found_body("capi-fail-test")))
        .mount(&server)
        .await;

    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(client_for(&server).await, fleet.services());

    let err = orchestrator.reconcile("default", "test").await.unwrap_err();
    assert!(matches!(err, Error::OwnerNotFound { .. }));
    assert!(fleet.calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_skips_when_owner_is_paused() {
    let server = MockServer::start().await;
    let cluster = owned(base_cluster("test"), "owner");
    let mut owner = ComputeCluster::new(
        "owner",
        ComputeClusterSpec {
            paused: true,
            ..Default::default()
        },
    );
    owner.metadata.namespace = Some("default".to_string());

    Mock::given(method("GET"))
        .and(path(
            "/apis/infrastructure.nimbus.dev/v1beta1/namespaces/default/cloudclusters/test",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&cluster).unwrap()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/cluster.nimbus.dev/v1beta1/namespaces/default/computeclusters/owner",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&owner).unwrap()),
        )
        .mount(&server)
        .await;

    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(client_for(&server).await, fleet.services());

    orchestrator.reconcile("default", "test").await.unwrap();
    assert!(fleet.calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_missing_resource_is_a_noop() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/infrastructure.nimbus.dev/v1beta1/namespaces/default/cloudclusters/test",
        ))
        .respond_with(ResponseTemplate::new(404).set_body_json(not_found_body("test")))
        .mount(&server)
        .await;

    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(client_for(&server).await, fleet.services());

    orchestrator.reconcile("default", "test").await.unwrap();
    assert!(fleet.calls().is_empty());
}

#[tokio::test]
async fn test_reconcile_end_to_end_runs_pipeline_and_persists() {
    let server = MockServer::start().await;
    let cluster = owned(cluster_with_dns("test"), "owner");
    let mut owner = ComputeCluster::new("owner", ComputeClusterSpec::default());
    owner.metadata.namespace = Some("default".to_string());

    Mock::given(method("GET"))
        .and(path(
            "/apis/infrastructure.nimbus.dev/v1beta1/namespaces/default/cloudclusters/test",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&cluster).unwrap()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(
            "/apis/cluster.nimbus.dev/v1beta1/namespaces/default/computeclusters/owner",
        ))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&owner).unwrap()),
        )
        .mount(&server)
        .await;
    Mock::given(method("PATCH"))
        .and(path_regex(r"/cloudclusters/test(/status)?$"))
        .respond_with(
            ResponseTemplate::new(200).set_body_json(serde_json::to_value(&cluster).unwrap()),
        )
        .mount(&server)
        .await;

    let fleet = FakeFleet::new();
    let orchestrator = orchestrator_with(client_for(&server).await, fleet.services());

    orchestrator.reconcile("default", "test").await.unwrap();
    assert_eq!(
        fleet.calls(),
        vec![
            "network.reconcile",
            "security_groups.reconcile",
            "bastion.reconcile",
            "load_balancer.reconcile",
        ]
    );
}
