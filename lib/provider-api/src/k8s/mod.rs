/// Kubernetes Kapsule API types (`/k8s/v1/regions/{region}`)
pub mod acl;
pub mod cluster;
pub mod kubeconfig;
pub mod pool;
pub mod version;

pub use acl::{AclRule, AclRuleRequest, ListAclRulesResponse, SetAclRulesRequest};
pub use cluster::{
    AutoUpgrade, AutoscalerConfig, Cluster, ClusterStatus, ClusterType, CreateClusterRequest,
    ListClusterTypesResponse, ListClustersResponse, MaintenanceWindow, MigrateToPrivateNetworkRequest,
    OpenIdConnectConfig, SetClusterTypeRequest, UpdateClusterRequest, UpgradeClusterRequest,
};
pub use kubeconfig::Kubeconfig;
pub use pool::{
    CreatePoolRequest, ListNodesResponse, ListPoolsResponse, Node, NodeStatus, Pool, PoolStatus,
    UpdatePoolRequest, UpgradePolicy, UpgradePoolRequest,
};
pub use version::{ListVersionsResponse, Version};
