//! Shared test utilities for provider-resources integration tests.
//!
//! In-memory stand-ins for the vendor APIs. Every mutation scripts the
//! statuses the object passes through on its next reads before it settles,
//! and every call is logged so tests can assert on the sequence.

#![allow(dead_code)]

use async_trait::async_trait;
use chrono::Utc;
use provider_api::instance::PlacementGroup;
use provider_api::iot::{
    Certificate, CreateDeviceRequest, CreateDeviceResponse, CreateHubRequest, CreateNetworkRequest,
    CreateNetworkResponse, CreateRouteRequest as CreateIotRouteRequest, Device, DeviceStatus,
    GetDeviceCertificateResponse, Hub, HubStatus, Network, Route as IotRoute, RouteType, SetHubCaRequest,
    UpdateDeviceRequest, UpdateHubRequest,
};
use provider_api::k8s::{
    AclRule, AclRuleRequest, Cluster, ClusterStatus, ClusterType, CreateClusterRequest, CreatePoolRequest, Node,
    NodeStatus, Pool, PoolStatus, UpdateClusterRequest, UpdatePoolRequest, UpgradeClusterRequest,
    UpgradePoolRequest, Version,
};
use provider_api::vpc::{
    AclAction, CreatePrivateNetworkRequest, CreateRouteRequest, CreateVpcRequest, GetAclResponse, PrivateNetwork,
    Route, SetAclRequest, Subnet, UpdatePrivateNetworkRequest, UpdateRouteRequest, UpdateVpcRequest, Vpc,
};
use provider_client::{InstanceApi, IotApi, K8sApi, VpcApi};
use provider_core::{
    ApplyRequest, ApplyResult, Block, EngineConfig, Plan, ProviderError, Region, ResourceRegistry, Result,
    Updated, VendorError, Zone,
};
use provider_resources::{registry, Apis};
use serde_json::Value as Json;
use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::sync::CancellationToken;

pub const PROJECT_ID: &str = "11111111-1111-1111-1111-111111111111";
pub const ORGANIZATION_ID: &str = "22222222-2222-2222-2222-222222222222";
pub const MQTT_CA: &str = "-----BEGIN CERTIFICATE-----\nhub-ca\n-----END CERTIFICATE-----\n";

pub fn not_found(kind: &str, id: &str) -> ProviderError {
    VendorError::new(404, "not_found", format!("{kind} {id} not found")).into()
}

fn invalid(message: impl Into<String>) -> ProviderError {
    VendorError::new(400, "invalid_arguments", message).into()
}

fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

fn apply<T: Clone + Default>(field: &mut T, update: &Updated<T>) {
    match update {
        Updated::Unchanged => {}
        Updated::Cleared => *field = T::default(),
        Updated::Set(value) => *field = value.clone(),
    }
}

/// Ordered log of vendor calls
#[derive(Default)]
pub struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    fn push(&self, call: impl Into<String>) {
        if let Ok(mut calls) = self.0.lock() {
            calls.push(call.into());
        }
    }

    pub fn all(&self) -> Vec<String> {
        self.0.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Calls whose name starts with `prefix`
    pub fn matching(&self, prefix: &str) -> Vec<String> {
        self.all().into_iter().filter(|c| c.starts_with(prefix)).collect()
    }

    pub fn count(&self, prefix: &str) -> usize {
        self.matching(prefix).len()
    }
}

/// An object plus the statuses it reports on its next reads.
struct Tracked<T, S> {
    object: T,
    steps: VecDeque<S>,
}

impl<T, S> Tracked<T, S> {
    fn new(object: T, steps: &[S]) -> Self
    where
        S: Copy,
    {
        Self {
            object,
            steps: steps.iter().copied().collect(),
        }
    }

    fn script(&mut self, steps: &[S])
    where
        S: Copy,
    {
        self.steps = steps.iter().copied().collect();
    }
}

// Kubernetes

#[derive(Default)]
struct K8sState {
    clusters: BTreeMap<String, Tracked<Cluster, ClusterStatus>>,
    pools: BTreeMap<String, Tracked<Pool, PoolStatus>>,
    acls: HashMap<String, Vec<AclRule>>,
}

impl K8sState {
    fn settled(&self, cluster_id: &str) -> ClusterStatus {
        if self.pools.values().any(|p| p.object.cluster_id == cluster_id) {
            ClusterStatus::Ready
        } else {
            ClusterStatus::PoolRequired
        }
    }

    fn cluster(&mut self, id: &str) -> Result<&mut Tracked<Cluster, ClusterStatus>> {
        self.clusters.get_mut(id).ok_or_else(|| not_found("cluster", id))
    }

    fn pool(&mut self, id: &str) -> Result<&mut Tracked<Pool, PoolStatus>> {
        self.pools.get_mut(id).ok_or_else(|| not_found("pool", id))
    }
}

pub struct FakeK8s {
    state: Mutex<K8sState>,
    pub calls: CallLog,
    /// Types `set_cluster_type` accepts
    pub migratable_types: Mutex<Vec<String>>,
    pub kubeconfig_forbidden: AtomicBool,
    versions: Vec<&'static str>,
}

impl Default for FakeK8s {
    fn default() -> Self {
        Self {
            state: Mutex::default(),
            calls: CallLog::default(),
            migratable_types: Mutex::new(vec!["kapsule".to_string(), "kapsule-dedicated-4".to_string()]),
            kubeconfig_forbidden: AtomicBool::new(false),
            versions: vec!["1.32.2", "1.33.0", "1.33.1"],
        }
    }
}

impl FakeK8s {
    fn state(&self) -> std::sync::MutexGuard<'_, K8sState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn cluster(&self, id: &str) -> Option<Cluster> {
        self.state().clusters.get(id).map(|c| c.object.clone())
    }

    pub fn pool(&self, id: &str) -> Option<Pool> {
        self.state().pools.get(id).map(|p| p.object.clone())
    }

    pub fn acls(&self, cluster_id: &str) -> Vec<AclRule> {
        self.state().acls.get(cluster_id).cloned().unwrap_or_default()
    }

    fn kubeconfig(cluster: &Cluster) -> String {
        format!(
            "apiVersion: v1\nkind: Config\nclusters:\n- name: {name}\n  cluster:\n    server: {url}\n    certificate-authority-data: Q0EK\nusers:\n- name: admin\n  user:\n    token: token-{id}\n",
            name = cluster.name,
            url = cluster.cluster_url,
            id = cluster.id,
        )
    }
}

#[async_trait]
impl K8sApi for FakeK8s {
    async fn create_cluster(&self, region: &Region, req: &CreateClusterRequest) -> Result<Cluster> {
        let id = new_id();
        self.calls.push(format!("create_cluster {} {}", req.name, req.version));
        let cluster_type = if req.cluster_type.is_empty() {
            "kapsule".to_string()
        } else {
            req.cluster_type.clone()
        };
        let cluster = Cluster {
            id: id.clone(),
            cluster_type,
            name: req.name.clone(),
            status: ClusterStatus::Creating,
            version: req.version.clone(),
            region: region.to_string(),
            organization_id: ORGANIZATION_ID.to_string(),
            project_id: req.project_id.clone(),
            tags: req.tags.clone(),
            cni: req.cni.clone(),
            description: req.description.clone(),
            cluster_url: format!("https://{id}.api.k8s.{region}.scw.cloud:6443"),
            dns_wildcard: format!("*.{id}.nodes.k8s.{region}.scw.cloud"),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            autoscaler_config: req.autoscaler_config.clone().unwrap_or_default(),
            auto_upgrade: req.auto_upgrade.clone().unwrap_or_default(),
            feature_gates: req.feature_gates.clone(),
            admission_plugins: req.admission_plugins.clone(),
            open_id_connect_config: req.open_id_connect_config.clone().unwrap_or_default(),
            apiserver_cert_sans: req.apiserver_cert_sans.clone(),
            private_network_id: req.private_network_id.clone(),
            pod_cidr: req.pod_cidr.clone().unwrap_or_else(|| "100.64.0.0/15".to_string()),
            service_cidr: req.service_cidr.clone().unwrap_or_else(|| "10.32.0.0/20".to_string()),
            service_dns_ip: req.service_dns_ip.clone().unwrap_or_else(|| "10.32.0.10".to_string()),
            ..Default::default()
        };
        let mut state = self.state();
        state
            .clusters
            .insert(id, Tracked::new(cluster.clone(), &[ClusterStatus::Creating, ClusterStatus::Creating]));
        Ok(cluster)
    }

    async fn get_cluster(&self, _region: &Region, cluster_id: &str) -> Result<Cluster> {
        let mut state = self.state();
        let settled = state.settled(cluster_id);
        let tracked = state.cluster(cluster_id)?;
        tracked.object.status = tracked.steps.pop_front().unwrap_or(settled);
        Ok(tracked.object.clone())
    }

    async fn list_clusters(&self, _region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Cluster>> {
        Ok(self
            .state()
            .clusters
            .values()
            .map(|c| c.object.clone())
            .filter(|c| project_id.map_or(true, |p| c.project_id == p))
            .filter(|c| name.map_or(true, |n| c.name.contains(n)))
            .collect())
    }

    async fn update_cluster(&self, _region: &Region, cluster_id: &str, req: &UpdateClusterRequest) -> Result<Cluster> {
        self.calls.push(format!("update_cluster {cluster_id}"));
        let mut state = self.state();
        let tracked = state.cluster(cluster_id)?;
        let cluster = &mut tracked.object;
        apply(&mut cluster.name, &req.name);
        apply(&mut cluster.description, &req.description);
        apply(&mut cluster.tags, &req.tags);
        apply(&mut cluster.autoscaler_config, &req.autoscaler_config);
        apply(&mut cluster.auto_upgrade, &req.auto_upgrade);
        apply(&mut cluster.feature_gates, &req.feature_gates);
        apply(&mut cluster.admission_plugins, &req.admission_plugins);
        apply(&mut cluster.open_id_connect_config, &req.open_id_connect_config);
        apply(&mut cluster.apiserver_cert_sans, &req.apiserver_cert_sans);
        tracked.script(&[ClusterStatus::Updating]);
        Ok(tracked.object.clone())
    }

    async fn upgrade_cluster(&self, _region: &Region, cluster_id: &str, req: &UpgradeClusterRequest) -> Result<Cluster> {
        self.calls.push(format!(
            "upgrade_cluster {cluster_id} {} upgrade_pools={}",
            req.version, req.upgrade_pools
        ));
        let mut state = self.state();
        let tracked = state.cluster(cluster_id)?;
        tracked.object.version = req.version.clone();
        tracked.script(&[ClusterStatus::Upgrading, ClusterStatus::Upgrading]);
        let cluster = tracked.object.clone();
        if req.upgrade_pools {
            for pool in state.pools.values_mut().filter(|p| p.object.cluster_id == cluster_id) {
                pool.object.version = req.version.clone();
                pool.script(&[PoolStatus::Upgrading]);
            }
        }
        Ok(cluster)
    }

    async fn set_cluster_type(&self, _region: &Region, cluster_id: &str, cluster_type: &str) -> Result<Cluster> {
        self.calls.push(format!("set_cluster_type {cluster_id} {cluster_type}"));
        let allowed = self.migratable_types.lock().map(|t| t.clone()).unwrap_or_default();
        if !allowed.iter().any(|t| t == cluster_type) {
            return Err(invalid(format!("cannot migrate to {cluster_type}")));
        }
        let mut state = self.state();
        let tracked = state.cluster(cluster_id)?;
        tracked.object.cluster_type = cluster_type.to_string();
        tracked.script(&[ClusterStatus::Updating]);
        Ok(tracked.object.clone())
    }

    async fn list_cluster_available_types(&self, _region: &Region, cluster_id: &str) -> Result<Vec<ClusterType>> {
        self.state().cluster(cluster_id)?;
        let allowed = self.migratable_types.lock().map(|t| t.clone()).unwrap_or_default();
        Ok(allowed
            .into_iter()
            .map(|name| ClusterType {
                dedicated: name.contains("dedicated"),
                name,
                availability: "available".to_string(),
                max_nodes: 150,
            })
            .collect())
    }

    async fn migrate_to_private_network(&self, _region: &Region, cluster_id: &str, private_network_id: &str) -> Result<Cluster> {
        self.calls.push(format!("migrate_to_private_network {cluster_id} {private_network_id}"));
        let mut state = self.state();
        let tracked = state.cluster(cluster_id)?;
        tracked.object.private_network_id = Some(private_network_id.to_string());
        tracked.script(&[ClusterStatus::Migrating]);
        Ok(tracked.object.clone())
    }

    async fn delete_cluster(&self, _region: &Region, cluster_id: &str, with_additional_resources: bool) -> Result<()> {
        self.calls
            .push(format!("delete_cluster {cluster_id} with_additional_resources={with_additional_resources}"));
        let mut state = self.state();
        state.clusters.remove(cluster_id).ok_or_else(|| not_found("cluster", cluster_id))?;
        state.pools.retain(|_, p| p.object.cluster_id != cluster_id);
        state.acls.remove(cluster_id);
        Ok(())
    }

    async fn get_kubeconfig(&self, _region: &Region, cluster_id: &str) -> Result<String> {
        if self.kubeconfig_forbidden.load(Ordering::SeqCst) {
            return Err(VendorError::new(403, "permissions_denied", "insufficient permissions").into());
        }
        let state = self.state();
        let cluster = state.clusters.get(cluster_id).ok_or_else(|| not_found("cluster", cluster_id))?;
        Ok(Self::kubeconfig(&cluster.object))
    }

    async fn list_versions(&self, region: &Region) -> Result<Vec<Version>> {
        Ok(self
            .versions
            .iter()
            .map(|name| Version {
                name: name.to_string(),
                label: format!("Kubernetes {name}"),
                region: region.to_string(),
                available_cnis: vec!["cilium".to_string(), "calico".to_string()],
                ..Default::default()
            })
            .collect())
    }

    async fn list_cluster_acls(&self, _region: &Region, cluster_id: &str) -> Result<Vec<AclRule>> {
        let state = self.state();
        if !state.clusters.contains_key(cluster_id) {
            return Err(not_found("cluster", cluster_id));
        }
        Ok(state.acls.get(cluster_id).cloned().unwrap_or_default())
    }

    async fn set_cluster_acls(&self, _region: &Region, cluster_id: &str, rules: Vec<AclRuleRequest>) -> Result<Vec<AclRule>> {
        self.calls.push(format!("set_cluster_acls {cluster_id} {}", rules.len()));
        let mut state = self.state();
        state.cluster(cluster_id)?;
        let committed: Vec<AclRule> = rules
            .into_iter()
            .map(|r| AclRule {
                id: new_id(),
                ip: r.ip,
                scaleway_ranges: r.scaleway_ranges,
                description: r.description,
            })
            .collect();
        state.acls.insert(cluster_id.to_string(), committed.clone());
        Ok(committed)
    }

    async fn create_pool(&self, region: &Region, cluster_id: &str, req: &CreatePoolRequest) -> Result<Pool> {
        self.calls.push(format!("create_pool {} size={}", req.name, req.size));
        let mut state = self.state();
        let version = state.cluster(cluster_id)?.object.version.clone();
        let id = new_id();
        let pool = Pool {
            id: id.clone(),
            cluster_id: cluster_id.to_string(),
            name: req.name.clone(),
            status: PoolStatus::Scaling,
            version,
            node_type: req.node_type.to_lowercase(),
            autoscaling: req.autoscaling,
            size: req.size,
            min_size: req.min_size.unwrap_or(req.size),
            max_size: req.max_size.unwrap_or(req.size),
            container_runtime: req.container_runtime.clone().unwrap_or_else(|| "containerd".to_string()),
            autohealing: req.autohealing,
            tags: req.tags.clone(),
            placement_group_id: req.placement_group_id.clone(),
            kubelet_args: req.kubelet_args.clone(),
            upgrade_policy: req.upgrade_policy.clone().unwrap_or_default(),
            zone: req.zone.clone().unwrap_or_else(|| format!("{region}-1")),
            root_volume_type: req.root_volume_type.clone().unwrap_or_else(|| "l_ssd".to_string()),
            root_volume_size: req.root_volume_size,
            public_ip_disabled: req.public_ip_disabled,
            region: region.to_string(),
            security_group_id: req.security_group_id.clone().unwrap_or_default(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        state.pools.insert(id, Tracked::new(pool.clone(), &[PoolStatus::Scaling]));
        if let Some(cluster) = state.clusters.get_mut(cluster_id) {
            cluster.script(&[ClusterStatus::Updating]);
        }
        Ok(pool)
    }

    async fn get_pool(&self, _region: &Region, pool_id: &str) -> Result<Pool> {
        let mut state = self.state();
        let tracked = state.pool(pool_id)?;
        tracked.object.status = tracked.steps.pop_front().unwrap_or(PoolStatus::Ready);
        Ok(tracked.object.clone())
    }

    async fn list_pools(&self, _region: &Region, cluster_id: &str, name: Option<&str>) -> Result<Vec<Pool>> {
        Ok(self
            .state()
            .pools
            .values()
            .map(|p| p.object.clone())
            .filter(|p| p.cluster_id == cluster_id)
            .filter(|p| name.map_or(true, |n| p.name.contains(n)))
            .collect())
    }

    async fn update_pool(&self, _region: &Region, pool_id: &str, req: &UpdatePoolRequest) -> Result<Pool> {
        self.calls.push(format!("update_pool {pool_id}"));
        let mut state = self.state();
        let tracked = state.pool(pool_id)?;
        let pool = &mut tracked.object;
        apply(&mut pool.autoscaling, &req.autoscaling);
        apply(&mut pool.size, &req.size);
        apply(&mut pool.min_size, &req.min_size);
        apply(&mut pool.max_size, &req.max_size);
        apply(&mut pool.autohealing, &req.autohealing);
        apply(&mut pool.tags, &req.tags);
        apply(&mut pool.kubelet_args, &req.kubelet_args);
        apply(&mut pool.upgrade_policy, &req.upgrade_policy);
        tracked.script(&[PoolStatus::Scaling]);
        Ok(tracked.object.clone())
    }

    async fn upgrade_pool(&self, _region: &Region, pool_id: &str, req: &UpgradePoolRequest) -> Result<Pool> {
        self.calls.push(format!("upgrade_pool {pool_id} {}", req.version));
        let mut state = self.state();
        let tracked = state.pool(pool_id)?;
        tracked.object.version = req.version.clone();
        tracked.script(&[PoolStatus::Upgrading]);
        Ok(tracked.object.clone())
    }

    async fn delete_pool(&self, _region: &Region, pool_id: &str) -> Result<()> {
        self.calls.push(format!("delete_pool {pool_id}"));
        let mut state = self.state();
        state.pools.remove(pool_id).ok_or_else(|| not_found("pool", pool_id))?;
        Ok(())
    }

    async fn list_nodes(&self, _region: &Region, cluster_id: &str, pool_id: &str) -> Result<Vec<Node>> {
        let state = self.state();
        let pool = state.pools.get(pool_id).ok_or_else(|| not_found("pool", pool_id))?;
        Ok((0..pool.object.size)
            .map(|i| Node {
                id: format!("{pool_id}-node-{i}"),
                pool_id: pool_id.to_string(),
                cluster_id: cluster_id.to_string(),
                name: format!("scw-{}-{i}", pool.object.name),
                provider_id: String::new(),
                public_ip_v4: Some(format!("51.15.0.{}", i + 10)),
                public_ip_v6: None,
                status: NodeStatus::Ready,
                error_message: None,
            })
            .collect())
    }
}

// VPC

#[derive(Default)]
struct VpcState {
    vpcs: BTreeMap<String, Vpc>,
    private_networks: BTreeMap<String, PrivateNetwork>,
    routes: BTreeMap<String, Route>,
    acls: HashMap<(String, bool), GetAclResponse>,
}

#[derive(Default)]
pub struct FakeVpc {
    state: Mutex<VpcState>,
    pub calls: CallLog,
    /// Deletions of private networks answered with a busy conflict first
    pub busy_deletes: AtomicUsize,
}

impl FakeVpc {
    fn state(&self) -> std::sync::MutexGuard<'_, VpcState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn vpc(&self, id: &str) -> Option<Vpc> {
        self.state().vpcs.get(id).cloned()
    }

    pub fn private_network(&self, id: &str) -> Option<PrivateNetwork> {
        self.state().private_networks.get(id).cloned()
    }

    pub fn acl(&self, vpc_id: &str, is_ipv6: bool) -> Option<GetAclResponse> {
        self.state().acls.get(&(vpc_id.to_string(), is_ipv6)).cloned()
    }

    /// Seed a private network, returning its id.
    pub fn seed_private_network(&self, region: &Region, name: &str, subnet: &str) -> String {
        let id = new_id();
        let pn = PrivateNetwork {
            id: id.clone(),
            name: name.to_string(),
            organization_id: ORGANIZATION_ID.to_string(),
            project_id: PROJECT_ID.to_string(),
            region: region.to_string(),
            subnets: vec![subnet_of(subnet)],
            vpc_id: new_id(),
            dhcp_enabled: true,
            created_at: Some(Utc::now()),
            ..Default::default()
        };
        self.state().private_networks.insert(id.clone(), pn);
        id
    }
}

fn subnet_of(cidr: &str) -> Subnet {
    Subnet {
        id: new_id(),
        subnet: cidr.to_string(),
        created_at: Some(Utc::now()),
        updated_at: Some(Utc::now()),
    }
}

#[async_trait]
impl VpcApi for FakeVpc {
    async fn create_vpc(&self, region: &Region, req: &CreateVpcRequest) -> Result<Vpc> {
        self.calls.push(format!("create_vpc {}", req.name));
        let vpc = Vpc {
            id: new_id(),
            name: if req.name.is_empty() { "vpc-generated".to_string() } else { req.name.clone() },
            organization_id: ORGANIZATION_ID.to_string(),
            project_id: req.project_id.clone(),
            region: region.to_string(),
            tags: req.tags.clone(),
            routing_enabled: req.enable_routing,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        self.state().vpcs.insert(vpc.id.clone(), vpc.clone());
        Ok(vpc)
    }

    async fn get_vpc(&self, _region: &Region, vpc_id: &str) -> Result<Vpc> {
        self.state().vpcs.get(vpc_id).cloned().ok_or_else(|| not_found("vpc", vpc_id))
    }

    async fn list_vpcs(&self, _region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Vpc>> {
        Ok(self
            .state()
            .vpcs
            .values()
            .filter(|v| project_id.map_or(true, |p| v.project_id == p))
            .filter(|v| name.map_or(true, |n| v.name.contains(n)))
            .cloned()
            .collect())
    }

    async fn update_vpc(&self, _region: &Region, vpc_id: &str, req: &UpdateVpcRequest) -> Result<Vpc> {
        self.calls.push(format!("update_vpc {vpc_id}"));
        let mut state = self.state();
        let vpc = state.vpcs.get_mut(vpc_id).ok_or_else(|| not_found("vpc", vpc_id))?;
        apply(&mut vpc.name, &req.name);
        apply(&mut vpc.tags, &req.tags);
        Ok(vpc.clone())
    }

    async fn delete_vpc(&self, _region: &Region, vpc_id: &str) -> Result<()> {
        self.calls.push(format!("delete_vpc {vpc_id}"));
        self.state().vpcs.remove(vpc_id).map(|_| ()).ok_or_else(|| not_found("vpc", vpc_id))
    }

    async fn enable_routing(&self, _region: &Region, vpc_id: &str) -> Result<Vpc> {
        self.calls.push(format!("enable_routing {vpc_id}"));
        let mut state = self.state();
        let vpc = state.vpcs.get_mut(vpc_id).ok_or_else(|| not_found("vpc", vpc_id))?;
        vpc.routing_enabled = true;
        Ok(vpc.clone())
    }

    async fn create_private_network(&self, region: &Region, req: &CreatePrivateNetworkRequest) -> Result<PrivateNetwork> {
        self.calls.push(format!("create_private_network {}", req.name));
        let subnets = if req.subnets.is_empty() {
            vec!["172.16.0.0/22".to_string()]
        } else {
            req.subnets.clone()
        };
        let pn = PrivateNetwork {
            id: new_id(),
            name: req.name.clone(),
            organization_id: ORGANIZATION_ID.to_string(),
            project_id: req.project_id.clone(),
            region: region.to_string(),
            tags: req.tags.clone(),
            subnets: subnets.iter().map(|s| subnet_of(s)).collect(),
            vpc_id: req.vpc_id.clone().unwrap_or_else(new_id),
            dhcp_enabled: true,
            default_route_propagation_enabled: req.default_route_propagation_enabled,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.state().private_networks.insert(pn.id.clone(), pn.clone());
        Ok(pn)
    }

    async fn get_private_network(&self, _region: &Region, private_network_id: &str) -> Result<PrivateNetwork> {
        self.state()
            .private_networks
            .get(private_network_id)
            .cloned()
            .ok_or_else(|| not_found("private network", private_network_id))
    }

    async fn list_private_networks(
        &self,
        _region: &Region,
        project_id: Option<&str>,
        name: Option<&str>,
        vpc_id: Option<&str>,
    ) -> Result<Vec<PrivateNetwork>> {
        Ok(self
            .state()
            .private_networks
            .values()
            .filter(|p| project_id.map_or(true, |id| p.project_id == id))
            .filter(|p| name.map_or(true, |n| p.name.contains(n)))
            .filter(|p| vpc_id.map_or(true, |id| p.vpc_id == id))
            .cloned()
            .collect())
    }

    async fn update_private_network(
        &self,
        _region: &Region,
        private_network_id: &str,
        req: &UpdatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        self.calls.push(format!("update_private_network {private_network_id}"));
        let mut state = self.state();
        let pn = state
            .private_networks
            .get_mut(private_network_id)
            .ok_or_else(|| not_found("private network", private_network_id))?;
        apply(&mut pn.name, &req.name);
        apply(&mut pn.tags, &req.tags);
        apply(&mut pn.default_route_propagation_enabled, &req.default_route_propagation_enabled);
        Ok(pn.clone())
    }

    async fn delete_private_network(&self, _region: &Region, private_network_id: &str) -> Result<()> {
        self.calls.push(format!("delete_private_network {private_network_id}"));
        let busy = self
            .busy_deletes
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if busy {
            return Err(VendorError::new(409, "transient_state", "private network is in use").into());
        }
        self.state()
            .private_networks
            .remove(private_network_id)
            .map(|_| ())
            .ok_or_else(|| not_found("private network", private_network_id))
    }

    async fn add_subnets(&self, _region: &Region, private_network_id: &str, subnets: Vec<String>) -> Result<()> {
        self.calls.push(format!("add_subnets {}", subnets.join(",")));
        let mut state = self.state();
        let pn = state
            .private_networks
            .get_mut(private_network_id)
            .ok_or_else(|| not_found("private network", private_network_id))?;
        pn.subnets.extend(subnets.iter().map(|s| subnet_of(s)));
        Ok(())
    }

    async fn delete_subnets(&self, _region: &Region, private_network_id: &str, subnets: Vec<String>) -> Result<()> {
        self.calls.push(format!("delete_subnets {}", subnets.join(",")));
        let mut state = self.state();
        let pn = state
            .private_networks
            .get_mut(private_network_id)
            .ok_or_else(|| not_found("private network", private_network_id))?;
        pn.subnets.retain(|s| !subnets.contains(&s.subnet));
        Ok(())
    }

    async fn create_route(&self, region: &Region, req: &CreateRouteRequest) -> Result<Route> {
        self.calls.push(format!("create_route {}", req.destination));
        let route = Route {
            id: new_id(),
            description: req.description.clone(),
            tags: req.tags.clone(),
            vpc_id: req.vpc_id.clone(),
            destination: req.destination.clone(),
            nexthop_resource_id: req.nexthop_resource_id.clone(),
            nexthop_private_network_id: req.nexthop_private_network_id.clone(),
            region: region.to_string(),
            is_read_only: false,
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.state().routes.insert(route.id.clone(), route.clone());
        Ok(route)
    }

    async fn get_route(&self, _region: &Region, route_id: &str) -> Result<Route> {
        self.state().routes.get(route_id).cloned().ok_or_else(|| not_found("route", route_id))
    }

    async fn update_route(&self, _region: &Region, route_id: &str, req: &UpdateRouteRequest) -> Result<Route> {
        self.calls.push(format!("update_route {route_id}"));
        let mut state = self.state();
        let route = state.routes.get_mut(route_id).ok_or_else(|| not_found("route", route_id))?;
        apply(&mut route.description, &req.description);
        apply(&mut route.tags, &req.tags);
        apply(&mut route.destination, &req.destination);
        if let Some(id) = req.nexthop_resource_id.as_set() {
            route.nexthop_resource_id = Some(id.clone());
        }
        if let Some(id) = req.nexthop_private_network_id.as_set() {
            route.nexthop_private_network_id = Some(id.clone());
        }
        Ok(route.clone())
    }

    async fn delete_route(&self, _region: &Region, route_id: &str) -> Result<()> {
        self.calls.push(format!("delete_route {route_id}"));
        self.state().routes.remove(route_id).map(|_| ()).ok_or_else(|| not_found("route", route_id))
    }

    async fn get_acl(&self, _region: &Region, vpc_id: &str, is_ipv6: bool) -> Result<GetAclResponse> {
        let state = self.state();
        if !state.vpcs.contains_key(vpc_id) {
            return Err(not_found("vpc", vpc_id));
        }
        Ok(state
            .acls
            .get(&(vpc_id.to_string(), is_ipv6))
            .cloned()
            .unwrap_or(GetAclResponse {
                rules: Vec::new(),
                default_policy: AclAction::Accept,
            }))
    }

    async fn set_acl(&self, _region: &Region, vpc_id: &str, req: &SetAclRequest) -> Result<GetAclResponse> {
        self.calls.push(format!("set_acl {vpc_id} rules={}", req.rules.len()));
        let mut state = self.state();
        if !state.vpcs.contains_key(vpc_id) {
            return Err(not_found("vpc", vpc_id));
        }
        let acl = GetAclResponse {
            rules: req.rules.clone(),
            default_policy: req.default_policy,
        };
        state.acls.insert((vpc_id.to_string(), req.is_ipv6), acl.clone());
        Ok(acl)
    }
}

// IoT

#[derive(Default)]
struct IotState {
    hubs: BTreeMap<String, Tracked<Hub, HubStatus>>,
    devices: BTreeMap<String, (Device, String)>,
    networks: BTreeMap<String, Network>,
    routes: BTreeMap<String, IotRoute>,
}

#[derive(Default)]
pub struct FakeIot {
    state: Mutex<IotState>,
    pub calls: CallLog,
    /// Fail the next `disable_hub` call
    pub fail_disable: AtomicBool,
    /// Accept the next `enable_hub` call but leave the hub disabled
    pub ignore_enable: AtomicBool,
    pub mqtt_ca_unavailable: AtomicBool,
}

impl FakeIot {
    fn state(&self) -> std::sync::MutexGuard<'_, IotState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn hub(&self, id: &str) -> Option<Hub> {
        self.state().hubs.get(id).map(|h| h.object.clone())
    }

    pub fn device_certificate(&self, id: &str) -> Option<String> {
        self.state().devices.get(id).map(|(_, crt)| crt.clone())
    }

    fn hub_mut<'a>(state: &'a mut IotState, id: &str) -> Result<&'a mut Tracked<Hub, HubStatus>> {
        state.hubs.get_mut(id).ok_or_else(|| not_found("hub", id))
    }

    fn settled(hub: &Hub) -> HubStatus {
        if hub.enabled {
            HubStatus::Ready
        } else {
            HubStatus::Disabled
        }
    }
}

#[async_trait]
impl IotApi for FakeIot {
    async fn create_hub(&self, region: &Region, req: &CreateHubRequest) -> Result<Hub> {
        self.calls.push(format!("create_hub {}", req.name));
        let id = new_id();
        let hub = Hub {
            id: id.clone(),
            name: req.name.clone(),
            status: HubStatus::Enabling,
            product_plan: req.product_plan,
            enabled: true,
            endpoint: format!("iot.{region}.scw.cloud"),
            disable_events: req.disable_events,
            events_topic_prefix: req.events_topic_prefix.clone().unwrap_or_else(|| "$SCW/events".to_string()),
            region: region.to_string(),
            project_id: req.project_id.clone(),
            organization_id: ORGANIZATION_ID.to_string(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        self.state()
            .hubs
            .insert(id, Tracked::new(hub.clone(), &[HubStatus::Enabling, HubStatus::Enabling]));
        Ok(hub)
    }

    async fn get_hub(&self, _region: &Region, hub_id: &str) -> Result<Hub> {
        let mut state = self.state();
        let tracked = Self::hub_mut(&mut state, hub_id)?;
        let settled = Self::settled(&tracked.object);
        tracked.object.status = tracked.steps.pop_front().unwrap_or(settled);
        Ok(tracked.object.clone())
    }

    async fn list_hubs(&self, _region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Hub>> {
        Ok(self
            .state()
            .hubs
            .values()
            .map(|h| h.object.clone())
            .filter(|h| project_id.map_or(true, |p| h.project_id == p))
            .filter(|h| name.map_or(true, |n| h.name.contains(n)))
            .collect())
    }

    async fn update_hub(&self, _region: &Region, hub_id: &str, req: &UpdateHubRequest) -> Result<Hub> {
        self.calls.push(format!("update_hub {hub_id}"));
        let mut state = self.state();
        let tracked = Self::hub_mut(&mut state, hub_id)?;
        let hub = &mut tracked.object;
        apply(&mut hub.name, &req.name);
        apply(&mut hub.disable_events, &req.disable_events);
        apply(&mut hub.events_topic_prefix, &req.events_topic_prefix);
        apply(&mut hub.enable_device_auto_provisioning, &req.enable_device_auto_provisioning);
        if let Some(plan) = req.product_plan.as_set() {
            hub.product_plan = *plan;
        }
        Ok(hub.clone())
    }

    async fn enable_hub(&self, _region: &Region, hub_id: &str) -> Result<Hub> {
        self.calls.push(format!("enable_hub {hub_id}"));
        let mut state = self.state();
        let tracked = Self::hub_mut(&mut state, hub_id)?;
        if self.ignore_enable.swap(false, Ordering::SeqCst) {
            return Ok(tracked.object.clone());
        }
        tracked.object.enabled = true;
        tracked.script(&[HubStatus::Enabling]);
        Ok(tracked.object.clone())
    }

    async fn disable_hub(&self, _region: &Region, hub_id: &str) -> Result<Hub> {
        self.calls.push(format!("disable_hub {hub_id}"));
        if self.fail_disable.swap(false, Ordering::SeqCst) {
            return Err(VendorError::new(400, "invalid_request", "hub cannot be disabled").into());
        }
        let mut state = self.state();
        let tracked = Self::hub_mut(&mut state, hub_id)?;
        tracked.object.enabled = false;
        tracked.script(&[HubStatus::Disabling, HubStatus::Disabling]);
        Ok(tracked.object.clone())
    }

    async fn delete_hub(&self, _region: &Region, hub_id: &str, delete_devices: bool) -> Result<()> {
        self.calls.push(format!("delete_hub {hub_id} delete_devices={delete_devices}"));
        let mut state = self.state();
        state.hubs.remove(hub_id).ok_or_else(|| not_found("hub", hub_id))?;
        if delete_devices {
            state.devices.retain(|_, (d, _)| d.hub_id != hub_id);
        }
        Ok(())
    }

    async fn set_hub_ca(&self, _region: &Region, hub_id: &str, req: &SetHubCaRequest) -> Result<Hub> {
        self.calls.push(format!("set_hub_ca {hub_id}"));
        let mut state = self.state();
        let tracked = Self::hub_mut(&mut state, hub_id)?;
        if tracked.object.status != HubStatus::Ready {
            return Err(invalid("hub must be ready to set its CA"));
        }
        if req.challenge_cert_pem.is_empty() {
            return Err(invalid("challenge certificate is required"));
        }
        tracked.object.has_custom_ca = true;
        Ok(tracked.object.clone())
    }

    async fn get_mqtt_ca(&self, url: &str) -> Result<String> {
        self.calls.push(format!("get_mqtt_ca {url}"));
        if self.mqtt_ca_unavailable.load(Ordering::SeqCst) {
            return Err(VendorError::new(503, "unavailable", "bucket unavailable").into());
        }
        Ok(MQTT_CA.to_string())
    }

    async fn create_device(&self, _region: &Region, req: &CreateDeviceRequest) -> Result<CreateDeviceResponse> {
        self.calls.push(format!("create_device {}", req.name));
        let mut state = self.state();
        Self::hub_mut(&mut state, &req.hub_id)?;
        let id = new_id();
        let device = Device {
            id: id.clone(),
            name: req.name.clone(),
            description: req.description.clone(),
            status: DeviceStatus::Enabled,
            hub_id: req.hub_id.clone(),
            allow_insecure: req.allow_insecure,
            allow_multiple_connections: req.allow_multiple_connections,
            message_filters: req.message_filters.clone().unwrap_or_default(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
            ..Default::default()
        };
        let certificate = Certificate {
            crt: format!("generated-crt-{id}"),
            key: format!("generated-key-{id}"),
        };
        state.devices.insert(id, (device.clone(), certificate.crt.clone()));
        Ok(CreateDeviceResponse { device, certificate })
    }

    async fn get_device(&self, _region: &Region, device_id: &str) -> Result<Device> {
        self.state()
            .devices
            .get(device_id)
            .map(|(d, _)| d.clone())
            .ok_or_else(|| not_found("device", device_id))
    }

    async fn list_devices(&self, _region: &Region, hub_id: Option<&str>, name: Option<&str>) -> Result<Vec<Device>> {
        Ok(self
            .state()
            .devices
            .values()
            .map(|(d, _)| d.clone())
            .filter(|d| hub_id.map_or(true, |h| d.hub_id == h))
            .filter(|d| name.map_or(true, |n| d.name.contains(n)))
            .collect())
    }

    async fn update_device(&self, _region: &Region, device_id: &str, req: &UpdateDeviceRequest) -> Result<Device> {
        self.calls.push(format!("update_device {device_id}"));
        let mut state = self.state();
        let (device, _) = state.devices.get_mut(device_id).ok_or_else(|| not_found("device", device_id))?;
        apply(&mut device.description, &req.description);
        apply(&mut device.allow_insecure, &req.allow_insecure);
        apply(&mut device.allow_multiple_connections, &req.allow_multiple_connections);
        apply(&mut device.message_filters, &req.message_filters);
        Ok(device.clone())
    }

    async fn delete_device(&self, _region: &Region, device_id: &str) -> Result<()> {
        self.calls.push(format!("delete_device {device_id}"));
        self.state()
            .devices
            .remove(device_id)
            .map(|_| ())
            .ok_or_else(|| not_found("device", device_id))
    }

    async fn get_device_certificate(&self, _region: &Region, device_id: &str) -> Result<GetDeviceCertificateResponse> {
        let state = self.state();
        let (device, crt) = state.devices.get(device_id).ok_or_else(|| not_found("device", device_id))?;
        Ok(GetDeviceCertificateResponse {
            device: device.clone(),
            certificate_pem: crt.clone(),
        })
    }

    async fn set_device_certificate(&self, _region: &Region, device_id: &str, certificate_pem: &str) -> Result<()> {
        self.calls.push(format!("set_device_certificate {device_id}"));
        let mut state = self.state();
        let (device, crt) = state.devices.get_mut(device_id).ok_or_else(|| not_found("device", device_id))?;
        device.has_custom_certificate = true;
        *crt = certificate_pem.to_string();
        Ok(())
    }

    async fn create_network(&self, region: &Region, req: &CreateNetworkRequest) -> Result<CreateNetworkResponse> {
        self.calls.push(format!("create_network {}", req.name));
        let network = Network {
            id: new_id(),
            name: req.name.clone(),
            network_type: req.network_type,
            endpoint: format!("https://{region}.iot.scw.cloud/networks/{}", req.name),
            hub_id: req.hub_id.clone(),
            topic_prefix: req.topic_prefix.clone(),
            created_at: Some(Utc::now()),
        };
        self.state().networks.insert(network.id.clone(), network.clone());
        Ok(CreateNetworkResponse {
            network,
            secret: "network-secret".to_string(),
        })
    }

    async fn get_network(&self, _region: &Region, network_id: &str) -> Result<Network> {
        self.state()
            .networks
            .get(network_id)
            .cloned()
            .ok_or_else(|| not_found("network", network_id))
    }

    async fn delete_network(&self, _region: &Region, network_id: &str) -> Result<()> {
        self.calls.push(format!("delete_network {network_id}"));
        self.state()
            .networks
            .remove(network_id)
            .map(|_| ())
            .ok_or_else(|| not_found("network", network_id))
    }

    async fn create_route(&self, _region: &Region, req: &CreateIotRouteRequest) -> Result<IotRoute> {
        self.calls.push(format!("create_route {}", req.name));
        let route_type = if req.s3_config.is_some() {
            RouteType::S3
        } else if req.db_config.is_some() {
            RouteType::Database
        } else {
            RouteType::Rest
        };
        let route = IotRoute {
            id: new_id(),
            name: req.name.clone(),
            hub_id: req.hub_id.clone(),
            topic: req.topic.clone(),
            route_type,
            s3_config: req.s3_config.clone(),
            // The vendor never echoes the database password.
            db_config: req.db_config.clone().map(|mut db| {
                db.password = String::new();
                db
            }),
            rest_config: req.rest_config.clone(),
            created_at: Some(Utc::now()),
            updated_at: Some(Utc::now()),
        };
        self.state().routes.insert(route.id.clone(), route.clone());
        Ok(route)
    }

    async fn get_route(&self, _region: &Region, route_id: &str) -> Result<IotRoute> {
        self.state().routes.get(route_id).cloned().ok_or_else(|| not_found("route", route_id))
    }

    async fn delete_route(&self, _region: &Region, route_id: &str) -> Result<()> {
        self.calls.push(format!("delete_route {route_id}"));
        self.state().routes.remove(route_id).map(|_| ()).ok_or_else(|| not_found("route", route_id))
    }
}

// Instance

#[derive(Default)]
pub struct FakeInstance {
    groups: Mutex<HashMap<String, PlacementGroup>>,
}

impl FakeInstance {
    pub fn seed_placement_group(&self, zone: &Zone) -> String {
        let id = new_id();
        let group = PlacementGroup {
            id: id.clone(),
            name: "spread".to_string(),
            policy_type: "max_availability".to_string(),
            policy_mode: "optional".to_string(),
            policy_respected: true,
            zone: zone.to_string(),
        };
        if let Ok(mut groups) = self.groups.lock() {
            groups.insert(id.clone(), group);
        }
        id
    }
}

#[async_trait]
impl InstanceApi for FakeInstance {
    async fn get_placement_group(&self, _zone: &Zone, placement_group_id: &str) -> Result<PlacementGroup> {
        self.groups
            .lock()
            .ok()
            .and_then(|g| g.get(placement_group_id).cloned())
            .ok_or_else(|| not_found("placement group", placement_group_id))
    }
}

/// A registry wired to the fakes, with a short retry interval.
pub struct Harness {
    pub registry: ResourceRegistry,
    pub k8s: Arc<FakeK8s>,
    pub vpc: Arc<FakeVpc>,
    pub iot: Arc<FakeIot>,
    pub instance: Arc<FakeInstance>,
}

impl Harness {
    pub fn new() -> Self {
        let k8s = Arc::new(FakeK8s::default());
        let vpc = Arc::new(FakeVpc::default());
        let iot = Arc::new(FakeIot::default());
        let instance = Arc::new(FakeInstance::default());
        let apis = Apis {
            k8s: k8s.clone(),
            vpc: vpc.clone(),
            iot: iot.clone(),
            instance: instance.clone(),
        };
        let config = EngineConfig::default()
            .with_default_project_id(PROJECT_ID)
            .with_retry_interval(Duration::from_secs(1));
        let registry = registry(Arc::new(config), &apis).expect("registry");
        Self {
            registry,
            k8s,
            vpc,
            iot,
            instance,
        }
    }

    pub fn region() -> Region {
        Region::parse("fr-par").expect("region")
    }

    /// Decode a JSON configuration against the schema of `type_name`.
    pub fn config(&self, type_name: &str, json: Json) -> Block {
        self.registry
            .resource_schema(type_name)
            .expect("schema")
            .decode(&json)
            .expect("config")
    }

    pub async fn plan(&self, type_name: &str, prior: Option<&Block>, config: &Block) -> Plan {
        self.registry
            .plan(type_name, prior, config, CancellationToken::new())
            .await
            .expect("plan")
    }

    /// Plan and apply `config` over `prior`, as the host does.
    pub async fn converge(&self, type_name: &str, prior: Option<Block>, config: &Block) -> ApplyResult {
        let plan = self.plan(type_name, prior.as_ref(), config).await;
        assert!(
            !plan.diagnostics.has_errors(),
            "plan of {type_name} failed: {:?}",
            plan.diagnostics
        );
        self.registry
            .apply(
                type_name,
                ApplyRequest {
                    prior,
                    planned: Some(plan.planned),
                    config: config.clone(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("apply")
    }

    /// Create from `json` and return the resulting state.
    pub async fn create(&self, type_name: &str, json: Json) -> Block {
        let config = self.config(type_name, json);
        let result = self.converge(type_name, None, &config).await;
        assert!(!result.has_errors(), "create of {type_name} failed: {:?}", result.diagnostics);
        result.state.expect("state after create")
    }

    pub async fn destroy(&self, type_name: &str, state: Block) -> ApplyResult {
        self.registry
            .apply(
                type_name,
                ApplyRequest {
                    prior: Some(state),
                    planned: None,
                    config: Block::new(),
                },
                CancellationToken::new(),
            )
            .await
            .expect("apply")
    }
}

/// The bare id of a regional state id.
pub fn bare_id(state: &Block) -> String {
    let id = state.value("id").as_str().unwrap_or_default();
    id.rsplit('/').next().unwrap_or_default().to_string()
}
