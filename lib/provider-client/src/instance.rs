//! Instance API, limited to what Kubernetes pools reference

use crate::client::ScwClient;
use async_trait::async_trait;
use provider_api::instance::{GetPlacementGroupResponse, PlacementGroup};
use provider_core::{Result, Zone};

#[async_trait]
pub trait InstanceApi: Send + Sync {
    async fn get_placement_group(&self, zone: &Zone, placement_group_id: &str) -> Result<PlacementGroup>;
}

#[async_trait]
impl InstanceApi for ScwClient {
    async fn get_placement_group(&self, zone: &Zone, placement_group_id: &str) -> Result<PlacementGroup> {
        let response: GetPlacementGroupResponse = self
            .get(&format!("/instance/v1/zones/{}/placement_groups/{}", zone, placement_group_id))
            .await?;
        Ok(response.placement_group)
    }
}
