use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A node pool of a Kubernetes cluster
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Pool {
    pub id: String,

    pub cluster_id: String,

    pub name: String,

    pub status: PoolStatus,

    pub version: String,

    pub node_type: String,

    #[serde(default)]
    pub autoscaling: bool,

    pub size: u32,

    #[serde(default)]
    pub min_size: u32,

    #[serde(default)]
    pub max_size: u32,

    #[serde(default)]
    pub container_runtime: String,

    #[serde(default)]
    pub autohealing: bool,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_group_id: Option<String>,

    #[serde(default)]
    pub kubelet_args: BTreeMap<String, String>,

    #[serde(default)]
    pub upgrade_policy: UpgradePolicy,

    pub zone: String,

    #[serde(default)]
    pub root_volume_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_volume_size: Option<u64>,

    #[serde(default)]
    pub public_ip_disabled: bool,

    pub region: String,

    #[serde(default)]
    pub security_group_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Pool lifecycle status
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum PoolStatus {
    Ready,
    Scaling,
    Upgrading,
    Warning,
    Error,
    Locked,
    Deleting,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

impl PoolStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolStatus::Ready => "ready",
            PoolStatus::Scaling => "scaling",
            PoolStatus::Upgrading => "upgrading",
            PoolStatus::Warning => "warning",
            PoolStatus::Error => "error",
            PoolStatus::Locked => "locked",
            PoolStatus::Deleting => "deleting",
            PoolStatus::Deleted => "deleted",
            PoolStatus::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct UpgradePolicy {
    #[serde(default)]
    pub max_unavailable: u32,

    #[serde(default)]
    pub max_surge: u32,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListPoolsResponse {
    pub total_count: u64,
    pub pools: Vec<Pool>,
}

crate::paginated!(ListPoolsResponse, pools, Pool);

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreatePoolRequest {
    pub name: String,

    pub node_type: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub placement_group_id: Option<String>,

    pub autoscaling: bool,

    pub size: u32,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_size: Option<u32>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub container_runtime: Option<String>,

    pub autohealing: bool,

    pub tags: Vec<String>,

    pub kubelet_args: BTreeMap<String, String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub upgrade_policy: Option<UpgradePolicy>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub zone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_volume_type: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub root_volume_size: Option<u64>,

    pub public_ip_disabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub security_group_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdatePoolRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub autoscaling: Updated<bool>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub size: Updated<u32>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub min_size: Updated<u32>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub max_size: Updated<u32>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub autohealing: Updated<bool>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub tags: Updated<Vec<String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub kubelet_args: Updated<BTreeMap<String, String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub upgrade_policy: Updated<UpgradePolicy>,
}

impl UpdatePoolRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdatePoolRequest::default()
    }
}

#[derive(Clone, Debug, Serialize)]
pub struct UpgradePoolRequest {
    pub version: String,
}

/// A node of a pool
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Node {
    pub id: String,

    pub pool_id: String,

    pub cluster_id: String,

    pub name: String,

    #[serde(default)]
    pub provider_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_v4: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub public_ip_v6: Option<String>,

    pub status: NodeStatus,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_message: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeStatus {
    Creating,
    NotReady,
    Ready,
    Deleting,
    Deleted,
    Locked,
    Rebooting,
    CreationError,
    Upgrading,
    Starting,
    Registering,
    #[default]
    #[serde(other)]
    Unknown,
}

impl NodeStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeStatus::Creating => "creating",
            NodeStatus::NotReady => "not_ready",
            NodeStatus::Ready => "ready",
            NodeStatus::Deleting => "deleting",
            NodeStatus::Deleted => "deleted",
            NodeStatus::Locked => "locked",
            NodeStatus::Rebooting => "rebooting",
            NodeStatus::CreationError => "creation_error",
            NodeStatus::Upgrading => "upgrading",
            NodeStatus::Starting => "starting",
            NodeStatus::Registering => "registering",
            NodeStatus::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListNodesResponse {
    pub total_count: u64,
    pub nodes: Vec<Node>,
}

crate::paginated!(ListNodesResponse, nodes, Node);
