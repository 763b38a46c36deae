//! Instance API types (`/instance/v1/zones/{zone}`)

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A placement group, referenced by Kubernetes pools
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PlacementGroup {
    pub id: String,

    pub name: String,

    /// `low_latency` or `max_availability`
    #[serde(default)]
    pub policy_type: String,

    /// `optional` or `enforced`
    #[serde(default)]
    pub policy_mode: String,

    #[serde(default)]
    pub policy_respected: bool,

    pub zone: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetPlacementGroupResponse {
    pub placement_group: PlacementGroup,
}
