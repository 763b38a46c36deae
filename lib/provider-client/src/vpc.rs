//! VPC API

use crate::client::{filters, ScwClient};
use async_trait::async_trait;
use provider_api::vpc::{
    AddSubnetsRequest, CreatePrivateNetworkRequest, CreateRouteRequest, CreateVpcRequest, GetAclResponse,
    ListPrivateNetworksResponse, ListVpcsResponse, PrivateNetwork, Route, SetAclRequest,
    UpdatePrivateNetworkRequest, UpdateRouteRequest, UpdateVpcRequest, Vpc,
};
use provider_core::{Region, Result};
use serde_json::json;

#[async_trait]
pub trait VpcApi: Send + Sync {
    async fn create_vpc(&self, region: &Region, req: &CreateVpcRequest) -> Result<Vpc>;
    async fn get_vpc(&self, region: &Region, vpc_id: &str) -> Result<Vpc>;
    async fn list_vpcs(&self, region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Vpc>>;
    async fn update_vpc(&self, region: &Region, vpc_id: &str, req: &UpdateVpcRequest) -> Result<Vpc>;
    async fn delete_vpc(&self, region: &Region, vpc_id: &str) -> Result<()>;
    /// One-way switch: routing cannot be disabled again
    async fn enable_routing(&self, region: &Region, vpc_id: &str) -> Result<Vpc>;

    async fn create_private_network(&self, region: &Region, req: &CreatePrivateNetworkRequest) -> Result<PrivateNetwork>;
    async fn get_private_network(&self, region: &Region, private_network_id: &str) -> Result<PrivateNetwork>;
    async fn list_private_networks(
        &self,
        region: &Region,
        project_id: Option<&str>,
        name: Option<&str>,
        vpc_id: Option<&str>,
    ) -> Result<Vec<PrivateNetwork>>;
    async fn update_private_network(
        &self,
        region: &Region,
        private_network_id: &str,
        req: &UpdatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork>;
    async fn delete_private_network(&self, region: &Region, private_network_id: &str) -> Result<()>;
    async fn add_subnets(&self, region: &Region, private_network_id: &str, subnets: Vec<String>) -> Result<()>;
    async fn delete_subnets(&self, region: &Region, private_network_id: &str, subnets: Vec<String>) -> Result<()>;

    async fn create_route(&self, region: &Region, req: &CreateRouteRequest) -> Result<Route>;
    async fn get_route(&self, region: &Region, route_id: &str) -> Result<Route>;
    async fn update_route(&self, region: &Region, route_id: &str, req: &UpdateRouteRequest) -> Result<Route>;
    async fn delete_route(&self, region: &Region, route_id: &str) -> Result<()>;

    async fn get_acl(&self, region: &Region, vpc_id: &str, is_ipv6: bool) -> Result<GetAclResponse>;
    /// Replace the rules and default policy of one IP family
    async fn set_acl(&self, region: &Region, vpc_id: &str, req: &SetAclRequest) -> Result<GetAclResponse>;
}

fn base(region: &Region) -> String {
    format!("/vpc/v2/regions/{}", region)
}

#[async_trait]
impl VpcApi for ScwClient {
    async fn create_vpc(&self, region: &Region, req: &CreateVpcRequest) -> Result<Vpc> {
        self.post(&format!("{}/vpcs", base(region)), req).await
    }

    async fn get_vpc(&self, region: &Region, vpc_id: &str) -> Result<Vpc> {
        self.get(&format!("{}/vpcs/{}", base(region), vpc_id)).await
    }

    async fn list_vpcs(&self, region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Vpc>> {
        let query = filters(&[("project_id", project_id), ("name", name)]);
        self.list_all::<ListVpcsResponse>(&format!("{}/vpcs", base(region)), &query)
            .await
    }

    async fn update_vpc(&self, region: &Region, vpc_id: &str, req: &UpdateVpcRequest) -> Result<Vpc> {
        self.patch(&format!("{}/vpcs/{}", base(region), vpc_id), req).await
    }

    async fn delete_vpc(&self, region: &Region, vpc_id: &str) -> Result<()> {
        self.delete(&format!("{}/vpcs/{}", base(region), vpc_id), &[]).await
    }

    async fn enable_routing(&self, region: &Region, vpc_id: &str) -> Result<Vpc> {
        self.post(&format!("{}/vpcs/{}/enable-routing", base(region), vpc_id), &json!({}))
            .await
    }

    async fn create_private_network(&self, region: &Region, req: &CreatePrivateNetworkRequest) -> Result<PrivateNetwork> {
        self.post(&format!("{}/private-networks", base(region)), req).await
    }

    async fn get_private_network(&self, region: &Region, private_network_id: &str) -> Result<PrivateNetwork> {
        self.get(&format!("{}/private-networks/{}", base(region), private_network_id))
            .await
    }

    async fn list_private_networks(
        &self,
        region: &Region,
        project_id: Option<&str>,
        name: Option<&str>,
        vpc_id: Option<&str>,
    ) -> Result<Vec<PrivateNetwork>> {
        let query = filters(&[("project_id", project_id), ("name", name), ("vpc_id", vpc_id)]);
        self.list_all::<ListPrivateNetworksResponse>(&format!("{}/private-networks", base(region)), &query)
            .await
    }

    async fn update_private_network(
        &self,
        region: &Region,
        private_network_id: &str,
        req: &UpdatePrivateNetworkRequest,
    ) -> Result<PrivateNetwork> {
        self.patch(&format!("{}/private-networks/{}", base(region), private_network_id), req)
            .await
    }

    async fn delete_private_network(&self, region: &Region, private_network_id: &str) -> Result<()> {
        self.delete(&format!("{}/private-networks/{}", base(region), private_network_id), &[])
            .await
    }

    async fn add_subnets(&self, region: &Region, private_network_id: &str, subnets: Vec<String>) -> Result<()> {
        let _: serde_json::Value = self
            .post(
                &format!("{}/private-networks/{}/subnets", base(region), private_network_id),
                &AddSubnetsRequest { subnets },
            )
            .await?;
        Ok(())
    }

    async fn delete_subnets(&self, region: &Region, private_network_id: &str, subnets: Vec<String>) -> Result<()> {
        let _: serde_json::Value = self
            .put(
                &format!("{}/private-networks/{}/subnets/delete", base(region), private_network_id),
                &AddSubnetsRequest { subnets },
            )
            .await?;
        Ok(())
    }

    async fn create_route(&self, region: &Region, req: &CreateRouteRequest) -> Result<Route> {
        self.post(&format!("{}/routes", base(region)), req).await
    }

    async fn get_route(&self, region: &Region, route_id: &str) -> Result<Route> {
        self.get(&format!("{}/routes/{}", base(region), route_id)).await
    }

    async fn update_route(&self, region: &Region, route_id: &str, req: &UpdateRouteRequest) -> Result<Route> {
        self.patch(&format!("{}/routes/{}", base(region), route_id), req).await
    }

    async fn delete_route(&self, region: &Region, route_id: &str) -> Result<()> {
        self.delete(&format!("{}/routes/{}", base(region), route_id), &[]).await
    }

    async fn get_acl(&self, region: &Region, vpc_id: &str, is_ipv6: bool) -> Result<GetAclResponse> {
        self.get_query(
            &format!("{}/vpcs/{}/acl-rules", base(region), vpc_id),
            &[("is_ipv6", is_ipv6.to_string())],
        )
        .await
    }

    async fn set_acl(&self, region: &Region, vpc_id: &str, req: &SetAclRequest) -> Result<GetAclResponse> {
        self.put(&format!("{}/vpcs/{}/acl-rules", base(region), vpc_id), req).await
    }
}
