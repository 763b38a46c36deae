use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An IoT hub
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Hub {
    pub id: String,

    pub name: String,

    pub status: HubStatus,

    pub product_plan: ProductPlan,

    #[serde(default)]
    pub enabled: bool,

    #[serde(default)]
    pub device_count: u64,

    #[serde(default)]
    pub connected_device_count: u64,

    /// MQTT endpoint devices connect to
    #[serde(default)]
    pub endpoint: String,

    #[serde(default)]
    pub disable_events: bool,

    #[serde(default)]
    pub events_topic_prefix: String,

    pub region: String,

    #[serde(default)]
    pub project_id: String,

    #[serde(default)]
    pub organization_id: String,

    #[serde(default)]
    pub enable_device_auto_provisioning: bool,

    #[serde(default)]
    pub has_custom_ca: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum HubStatus {
    Enabling,
    Ready,
    Disabling,
    Disabled,
    Error,
    Deleting,
    Deleted,
    #[default]
    #[serde(other)]
    Unknown,
}

impl HubStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            HubStatus::Enabling => "enabling",
            HubStatus::Ready => "ready",
            HubStatus::Disabling => "disabling",
            HubStatus::Disabled => "disabled",
            HubStatus::Error => "error",
            HubStatus::Deleting => "deleting",
            HubStatus::Deleted => "deleted",
            HubStatus::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductPlan {
    PlanShared,
    PlanDedicated,
    PlanHa,
    #[default]
    #[serde(other)]
    PlanUnknown,
}

impl ProductPlan {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProductPlan::PlanShared => "plan_shared",
            ProductPlan::PlanDedicated => "plan_dedicated",
            ProductPlan::PlanHa => "plan_ha",
            ProductPlan::PlanUnknown => "plan_unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "plan_shared" => Some(ProductPlan::PlanShared),
            "plan_dedicated" => Some(ProductPlan::PlanDedicated),
            "plan_ha" => Some(ProductPlan::PlanHa),
            _ => None,
        }
    }

    /// Dedicated and high-availability hubs run behind the vendor's own CA.
    pub fn is_dedicated(&self) -> bool {
        matches!(self, ProductPlan::PlanDedicated | ProductPlan::PlanHa)
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListHubsResponse {
    pub total_count: u64,
    pub hubs: Vec<Hub>,
}

crate::paginated!(ListHubsResponse, hubs, Hub);

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateHubRequest {
    pub name: String,
    pub project_id: String,
    pub product_plan: ProductPlan,
    pub disable_events: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub events_topic_prefix: Option<String>,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdateHubRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub name: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub product_plan: Updated<ProductPlan>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub disable_events: Updated<bool>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub events_topic_prefix: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub enable_device_auto_provisioning: Updated<bool>,
}

impl UpdateHubRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdateHubRequest::default()
    }
}

/// Installs a custom CA. The challenge certificate proves ownership of it.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SetHubCaRequest {
    pub ca_cert_pem: String,
    pub challenge_cert_pem: String,
}
