use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// A network through which non-MQTT devices reach a hub
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Network {
    pub id: String,

    pub name: String,

    #[serde(rename = "type")]
    pub network_type: NetworkType,

    #[serde(default)]
    pub endpoint: String,

    pub hub_id: String,

    #[serde(default)]
    pub topic_prefix: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NetworkType {
    Sigfox,
    Rest,
    #[default]
    #[serde(other)]
    Unknown,
}

impl NetworkType {
    pub fn as_str(&self) -> &'static str {
        match self {
            NetworkType::Sigfox => "sigfox",
            NetworkType::Rest => "rest",
            NetworkType::Unknown => "unknown",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "sigfox" => Some(NetworkType::Sigfox),
            "rest" => Some(NetworkType::Rest),
            _ => None,
        }
    }
}

#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateNetworkRequest {
    pub name: String,

    #[serde(rename = "type")]
    pub network_type: NetworkType,

    pub hub_id: String,

    pub topic_prefix: String,
}

/// The network secret is only returned here.
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct CreateNetworkResponse {
    pub network: Network,
    pub secret: String,
}
