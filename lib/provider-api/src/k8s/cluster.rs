use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A Kubernetes Kapsule cluster
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Cluster {
    pub id: String,

    /// Offer type, e.g. `kapsule` or `kapsule-dedicated-8`
    #[serde(rename = "type")]
    pub cluster_type: String,

    pub name: String,

    pub status: ClusterStatus,

    /// Full Kubernetes version (`1.32.2`)
    pub version: String,

    pub region: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub cni: String,

    #[serde(default)]
    pub description: String,

    /// Kubernetes API server URL
    #[serde(default)]
    pub cluster_url: String,

    /// Wildcard DNS pointing to all ready nodes
    #[serde(default)]
    pub dns_wildcard: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub autoscaler_config: AutoscalerConfig,

    #[serde(default)]
    pub auto_upgrade: AutoUpgrade,

    /// Whether a newer patch or minor version is available
    #[serde(default)]
    pub upgrade_available: bool,

    #[serde(default)]
    pub feature_gates: Vec<String>,

    #[serde(default)]
    pub admission_plugins: Vec<String>,

    #[serde(default)]
    pub open_id_connect_config: OpenIdConnectConfig,

    #[serde(default)]
    pub apiserver_cert_sans: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub commitment_ends_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub pod_cidr: String,

    #[serde(default)]
    pub service_cidr: String,

    #[serde(default)]
    pub service_dns_ip: String,
}

/// Cluster lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ClusterStatus {
    Creating,
    PoolRequired,
    Ready,
    Updating,
    Upgrading,
    Autoupgrading,
    Migrating,
    Warning,
    Error,
    Deleting,
    Deleted,
    Locked,
    #[default]
    #[serde(other)]
    Unknown,
}

impl ClusterStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ClusterStatus::Creating => "creating",
            ClusterStatus::PoolRequired => "pool_required",
            ClusterStatus::Ready => "ready",
            ClusterStatus::Updating => "updating",
            ClusterStatus::Upgrading => "upgrading",
            ClusterStatus::Autoupgrading => "autoupgrading",
            ClusterStatus::Migrating => "migrating",
            ClusterStatus::Warning => "warning",
            ClusterStatus::Error => "error",
            ClusterStatus::Deleting => "deleting",
            ClusterStatus::Deleted => "deleted",
            ClusterStatus::Locked => "locked",
            ClusterStatus::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AutoscalerConfig {
    #[serde(default)]
    pub scale_down_disabled: bool,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale_down_delay_after_add: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub estimator: String,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub expander: String,

    #[serde(default)]
    pub ignore_daemonsets_utilization: bool,

    #[serde(default)]
    pub balance_similar_node_groups: bool,

    #[serde(default)]
    pub expendable_pods_priority_cutoff: i64,

    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub scale_down_unneeded_time: String,

    #[serde(default)]
    pub scale_down_utilization_threshold: f64,

    #[serde(default)]
    pub max_graceful_termination_sec: u32,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct AutoUpgrade {
    #[serde(default)]
    pub enable: bool,

    #[serde(default)]
    pub maintenance_window: MaintenanceWindow,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct MaintenanceWindow {
    #[serde(default)]
    pub start_hour: u32,

    /// Day of the week, or `any`
    #[serde(default)]
    pub day: String,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct OpenIdConnectConfig {
    #[serde(default)]
    pub issuer_url: String,

    #[serde(default)]
    pub client_id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_claim: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub username_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_claim: Option<Vec<String>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub groups_prefix: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub required_claim: Option<Vec<String>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListClustersResponse {
    pub total_count: u64,
    pub clusters: Vec<Cluster>,
}

crate::paginated!(ListClustersResponse, clusters, Cluster);

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateClusterRequest {
    pub project_id: String,

    #[serde(rename = "type")]
    pub cluster_type: String,

    pub name: String,

    pub description: String,

    pub tags: Vec<String>,

    pub version: String,

    pub cni: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub autoscaler_config: Option<AutoscalerConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub auto_upgrade: Option<AutoUpgrade>,

    pub feature_gates: Vec<String>,

    pub admission_plugins: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub open_id_connect_config: Option<OpenIdConnectConfig>,

    pub apiserver_cert_sans: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub private_network_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub pod_cidr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_cidr: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub service_dns_ip: Option<String>,
}

/// Cluster patch. Unchanged fields are omitted from the request body.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdateClusterRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub name: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub description: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub tags: Updated<Vec<String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub autoscaler_config: Updated<AutoscalerConfig>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub auto_upgrade: Updated<AutoUpgrade>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub feature_gates: Updated<Vec<String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub admission_plugins: Updated<Vec<String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub open_id_connect_config: Updated<OpenIdConnectConfig>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub apiserver_cert_sans: Updated<Vec<String>>,
}

impl UpdateClusterRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdateClusterRequest::default()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UpgradeClusterRequest {
    pub version: String,
    pub upgrade_pools: bool,
}

#[derive(Clone, Debug, Serialize)]
pub struct SetClusterTypeRequest {
    #[serde(rename = "type")]
    pub cluster_type: String,
}

#[derive(Clone, Debug, Serialize)]
pub struct MigrateToPrivateNetworkRequest {
    pub private_network_id: String,
}

/// A cluster offer type a cluster may be created with or migrated to
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ClusterType {
    pub name: String,

    #[serde(default)]
    pub availability: String,

    #[serde(default)]
    pub max_nodes: u32,

    #[serde(default)]
    pub dedicated: bool,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListClusterTypesResponse {
    pub total_count: u64,
    pub cluster_types: Vec<ClusterType>,
}

crate::paginated!(ListClusterTypesResponse, cluster_types, ClusterType);
