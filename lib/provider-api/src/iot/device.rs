use chrono::{DateTime, Utc};
use provider_core::Updated;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A device registered on a hub
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Device {
    pub id: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    pub status: DeviceStatus,

    pub hub_id: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_activity_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub is_connected: bool,

    #[serde(default)]
    pub allow_insecure: bool,

    #[serde(default)]
    pub allow_multiple_connections: bool,

    #[serde(default)]
    pub message_filters: MessageFilters,

    #[serde(default)]
    pub has_custom_certificate: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum DeviceStatus {
    Error,
    Enabled,
    Disabled,
    #[default]
    #[serde(other)]
    Unknown,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::Error => "error",
            DeviceStatus::Enabled => "enabled",
            DeviceStatus::Disabled => "disabled",
            DeviceStatus::Unknown => "unknown",
        }
    }
}

/// Topic filters applied to what a device may publish and subscribe to
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessageFilters {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub publish: Option<MessageFilter>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub subscribe: Option<MessageFilter>,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct MessageFilter {
    pub policy: MessageFilterPolicy,

    #[serde(default)]
    pub topics: Vec<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum MessageFilterPolicy {
    #[default]
    Accept,
    Reject,
}

impl MessageFilterPolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            MessageFilterPolicy::Accept => "accept",
            MessageFilterPolicy::Reject => "reject",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(MessageFilterPolicy::Accept),
            "reject" => Some(MessageFilterPolicy::Reject),
            _ => None,
        }
    }
}

/// A device certificate. The private key is only returned at creation.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Certificate {
    pub crt: String,

    #[serde(default)]
    pub key: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListDevicesResponse {
    pub total_count: u64,
    pub devices: Vec<Device>,
}

crate::paginated!(ListDevicesResponse, devices, Device);

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateDeviceRequest {
    pub hub_id: String,
    pub name: String,
    pub description: String,
    pub allow_insecure: bool,
    pub allow_multiple_connections: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message_filters: Option<MessageFilters>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateDeviceResponse {
    pub device: Device,
    pub certificate: Certificate,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct UpdateDeviceRequest {
    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub description: Updated<String>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub allow_insecure: Updated<bool>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub allow_multiple_connections: Updated<bool>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub message_filters: Updated<MessageFilters>,

    #[serde(skip_serializing_if = "Updated::is_unchanged")]
    pub hub_id: Updated<String>,
}

impl UpdateDeviceRequest {
    pub fn is_empty(&self) -> bool {
        *self == UpdateDeviceRequest::default()
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetDeviceCertificateResponse {
    #[serde(default)]
    pub device: Device,
    pub certificate_pem: String,
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct SetDeviceCertificateRequest {
    pub certificate_pem: String,
}
