use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A VPC
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Vpc {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default)]
    pub project_id: String,

    pub region: String,

    #[serde(default)]
    pub tags: Vec<String>,

    /// Whether this is the project's default VPC in the region
    #[serde(default)]
    pub is_default: bool,

    #[serde(default)]
    pub private_network_count: u32,

    /// Whether traffic is routed between private networks of the VPC
    #[serde(default)]
    pub routing_enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListVpcsResponse {
    pub total_count: u64,
    pub vpcs: Vec<Vpc>,
}

crate::paginated!(ListVpcsResponse, vpcs, Vpc);

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateVpcRequest {
    pub name: String,
    pub project_id: String,
    pub tags: Vec<String>,
    pub enable_routing: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdateVpcRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub name: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub tags: Updated<Vec<String>>,
}

impl UpdateVpcRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdateVpcRequest::default()
    }
}
