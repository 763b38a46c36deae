//! Kubernetes Kapsule API

use crate::client::{filters, ScwClient};
use async_trait::async_trait;
use provider_api::k8s::{
    AclRule, AclRuleRequest, Cluster, ClusterType, CreateClusterRequest, CreatePoolRequest,
    ListAclRulesResponse, ListClusterTypesResponse, ListClustersResponse, ListNodesResponse, ListPoolsResponse,
    ListVersionsResponse, MigrateToPrivateNetworkRequest, Node, Pool, SetAclRulesRequest, SetClusterTypeRequest,
    UpdateClusterRequest, UpdatePoolRequest, UpgradeClusterRequest, UpgradePoolRequest, Version,
};
use provider_core::{Region, Result};

#[async_trait]
pub trait K8sApi: Send + Sync {
    async fn create_cluster(&self, region: &Region, req: &CreateClusterRequest) -> Result<Cluster>;
    async fn get_cluster(&self, region: &Region, cluster_id: &str) -> Result<Cluster>;
    async fn list_clusters(&self, region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Cluster>>;
    async fn update_cluster(&self, region: &Region, cluster_id: &str, req: &UpdateClusterRequest) -> Result<Cluster>;
    async fn upgrade_cluster(&self, region: &Region, cluster_id: &str, req: &UpgradeClusterRequest) -> Result<Cluster>;
    async fn set_cluster_type(&self, region: &Region, cluster_id: &str, cluster_type: &str) -> Result<Cluster>;
    /// Types the cluster can be migrated to in place
    async fn list_cluster_available_types(&self, region: &Region, cluster_id: &str) -> Result<Vec<ClusterType>>;
    async fn migrate_to_private_network(&self, region: &Region, cluster_id: &str, private_network_id: &str) -> Result<Cluster>;
    async fn delete_cluster(&self, region: &Region, cluster_id: &str, with_additional_resources: bool) -> Result<()>;
    async fn get_kubeconfig(&self, region: &Region, cluster_id: &str) -> Result<String>;
    async fn list_versions(&self, region: &Region) -> Result<Vec<Version>>;

    async fn list_cluster_acls(&self, region: &Region, cluster_id: &str) -> Result<Vec<AclRule>>;
    /// Replace the whole ACL of a cluster
    async fn set_cluster_acls(&self, region: &Region, cluster_id: &str, rules: Vec<AclRuleRequest>) -> Result<Vec<AclRule>>;

    async fn create_pool(&self, region: &Region, cluster_id: &str, req: &CreatePoolRequest) -> Result<Pool>;
    async fn get_pool(&self, region: &Region, pool_id: &str) -> Result<Pool>;
    async fn list_pools(&self, region: &Region, cluster_id: &str, name: Option<&str>) -> Result<Vec<Pool>>;
    async fn update_pool(&self, region: &Region, pool_id: &str, req: &UpdatePoolRequest) -> Result<Pool>;
    async fn upgrade_pool(&self, region: &Region, pool_id: &str, req: &UpgradePoolRequest) -> Result<Pool>;
    async fn delete_pool(&self, region: &Region, pool_id: &str) -> Result<()>;
    async fn list_nodes(&self, region: &Region, cluster_id: &str, pool_id: &str) -> Result<Vec<Node>>;
}

fn base(region: &Region) -> String {
    format!("/k8s/v1/regions/{}", region)
}

#[async_trait]
impl K8sApi for ScwClient {
    async fn create_cluster(&self, region: &Region, req: &CreateClusterRequest) -> Result<Cluster> {
        self.post(&format!("{}/clusters", base(region)), req).await
    }

    async fn get_cluster(&self, region: &Region, cluster_id: &str) -> Result<Cluster> {
        self.get(&format!("{}/clusters/{}", base(region), cluster_id)).await
    }

    async fn list_clusters(&self, region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Cluster>> {
        let query = filters(&[("project_id", project_id), ("name", name)]);
        self.list_all::<ListClustersResponse>(&format!("{}/clusters", base(region)), &query)
            .await
    }

    async fn update_cluster(&self, region: &Region, cluster_id: &str, req: &UpdateClusterRequest) -> Result<Cluster> {
        self.patch(&format!("{}/clusters/{}", base(region), cluster_id), req).await
    }

    async fn upgrade_cluster(&self, region: &Region, cluster_id: &str, req: &UpgradeClusterRequest) -> Result<Cluster> {
        self.post(&format!("{}/clusters/{}/upgrade", base(region), cluster_id), req)
            .await
    }

    async fn set_cluster_type(&self, region: &Region, cluster_id: &str, cluster_type: &str) -> Result<Cluster> {
        let req = SetClusterTypeRequest {
            cluster_type: cluster_type.to_string(),
        };
        self.post(&format!("{}/clusters/{}/set-type", base(region), cluster_id), &req)
            .await
    }

    async fn list_cluster_available_types(&self, region: &Region, cluster_id: &str) -> Result<Vec<ClusterType>> {
        let response: ListClusterTypesResponse = self
            .get(&format!("{}/clusters/{}/available-types", base(region), cluster_id))
            .await?;
        Ok(response.cluster_types)
    }

    async fn migrate_to_private_network(&self, region: &Region, cluster_id: &str, private_network_id: &str) -> Result<Cluster> {
        let req = MigrateToPrivateNetworkRequest {
            private_network_id: private_network_id.to_string(),
        };
        self.post(
            &format!("{}/clusters/{}/migrate-to-private-network", base(region), cluster_id),
            &req,
        )
        .await
    }

    async fn delete_cluster(&self, region: &Region, cluster_id: &str, with_additional_resources: bool) -> Result<()> {
        self.delete(
            &format!("{}/clusters/{}", base(region), cluster_id),
            &[("with_additional_resources", with_additional_resources.to_string())],
        )
        .await
    }

    async fn get_kubeconfig(&self, region: &Region, cluster_id: &str) -> Result<String> {
        self.get_text(&format!("{}/clusters/{}/kubeconfig?redacted=false", base(region), cluster_id))
            .await
    }

    async fn list_versions(&self, region: &Region) -> Result<Vec<Version>> {
        let response: ListVersionsResponse = self.get(&format!("{}/versions", base(region))).await?;
        Ok(response.versions)
    }

    async fn list_cluster_acls(&self, region: &Region, cluster_id: &str) -> Result<Vec<AclRule>> {
        self.list_all::<ListAclRulesResponse>(&format!("{}/clusters/{}/acls", base(region), cluster_id), &[])
            .await
    }

    async fn set_cluster_acls(&self, region: &Region, cluster_id: &str, rules: Vec<AclRuleRequest>) -> Result<Vec<AclRule>> {
        let response: ListAclRulesResponse = self
            .put(
                &format!("{}/clusters/{}/acls", base(region), cluster_id),
                &SetAclRulesRequest { acls: rules },
            )
            .await?;
        Ok(response.rules)
    }

    async fn create_pool(&self, region: &Region, cluster_id: &str, req: &CreatePoolRequest) -> Result<Pool> {
        self.post(&format!("{}/clusters/{}/pools", base(region), cluster_id), req)
            .await
    }

    async fn get_pool(&self, region: &Region, pool_id: &str) -> Result<Pool> {
        self.get(&format!("{}/pools/{}", base(region), pool_id)).await
    }

    async fn list_pools(&self, region: &Region, cluster_id: &str, name: Option<&str>) -> Result<Vec<Pool>> {
        let query = filters(&[("name", name)]);
        self.list_all::<ListPoolsResponse>(&format!("{}/clusters/{}/pools", base(region), cluster_id), &query)
            .await
    }

    async fn update_pool(&self, region: &Region, pool_id: &str, req: &UpdatePoolRequest) -> Result<Pool> {
        self.patch(&format!("{}/pools/{}", base(region), pool_id), req).await
    }

    async fn upgrade_pool(&self, region: &Region, pool_id: &str, req: &UpgradePoolRequest) -> Result<Pool> {
        self.post(&format!("{}/pools/{}/upgrade", base(region), pool_id), req).await
    }

    async fn delete_pool(&self, region: &Region, pool_id: &str) -> Result<()> {
        self.delete(&format!("{}/pools/{}", base(region), pool_id), &[]).await
    }

    async fn list_nodes(&self, region: &Region, cluster_id: &str, pool_id: &str) -> Result<Vec<Node>> {
        let query = vec![("pool_id", pool_id.to_string())];
        self.list_all::<ListNodesResponse>(&format!("{}/clusters/{}/nodes", base(region), cluster_id), &query)
            .await
    }
}
