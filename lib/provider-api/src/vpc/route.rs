use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A custom route of a VPC
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Route {
    pub id: String,

    #[serde(default)]
    pub description: String,

    #[serde(default)]
    pub tags: Vec<String>,

    pub vpc_id: String,

    /// Destination CIDR
    pub destination: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nexthop_resource_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nexthop_private_network_id: Option<String>,

    pub region: String,

    #[serde(default)]
    pub is_read_only: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateRouteRequest {
    pub description: String,

    pub tags: Vec<String>,

    pub vpc_id: String,

    pub destination: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nexthop_resource_id: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub nexthop_private_network_id: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdateRouteRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub description: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub tags: Updated<Vec<String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub destination: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub nexthop_resource_id: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub nexthop_private_network_id: Updated<String>,
}

impl UpdateRouteRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdateRouteRequest::default()
    }
}
