use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A regional private network inside a VPC
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct PrivateNetwork {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default)]
    pub project_id: String,

    pub region: String,

    #[serde(default)]
    pub tags: Vec<String>,

    #[serde(default)]
    pub subnets: Vec<Subnet>,

    pub vpc_id: String,

    #[serde(default)]
    pub dhcp_enabled: bool,

    #[serde(default)]
    pub default_route_propagation_enabled: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

/// An IPv4 or IPv6 subnet of a private network
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct Subnet {
    pub id: String,

    /// CIDR notation, e.g. `172.16.4.0/22`
    pub subnet: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListPrivateNetworksResponse {
    pub total_count: u64,
    pub private_networks: Vec<PrivateNetwork>,
}

crate::paginated!(ListPrivateNetworksResponse, private_networks, PrivateNetwork);

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreatePrivateNetworkRequest {
    pub name: String,

    pub project_id: String,

    pub tags: Vec<String>,

    /// Subnets in CIDR notation; the vendor allocates them when empty
    pub subnets: Vec<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub vpc_id: Option<String>,

    pub default_route_propagation_enabled: bool,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdatePrivateNetworkRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub name: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub tags: Updated<Vec<String>>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub default_route_propagation_enabled: Updated<bool>,
}

impl UpdatePrivateNetworkRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdatePrivateNetworkRequest::default()
    }
}

/// Body of the add-subnets and delete-subnets calls
#[derive(Clone, Debug, Default, Serialize)]
pub struct AddSubnetsRequest {
    pub subnets: Vec<String>,
}
