use chrono::{DateTime, Utc};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// A route forwarding hub messages to an external service
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct Route {
    pub id: String,

    pub name: String,

    pub hub_id: String,

    pub topic: String,

    #[serde(rename = "type")]
    pub route_type: RouteType,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub s3_config: Option<S3Config>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub db_config: Option<DatabaseConfig>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rest_config: Option<RestConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum RouteType {
    S3,
    Database,
    Rest,
    #[default]
    #[serde(other)]
    Unknown,
}

impl RouteType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RouteType::S3 => "s3",
            RouteType::Database => "database",
            RouteType::Rest => "rest",
            RouteType::Unknown => "unknown",
        }
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct S3Config {
    pub bucket_region: String,

    pub bucket_name: String,

    #[serde(default)]
    pub object_prefix: String,

    /// `per_topic` or `per_message`
    pub strategy: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct DatabaseConfig {
    pub host: String,

    pub port: u32,

    pub dbname: String,

    pub username: String,

    #[serde(default)]
    pub password: String,

    pub query: String,

    /// `postgresql` or `mysql`
    #[serde(default)]
    pub engine: String,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct RestConfig {
    /// HTTP verb, lowercase
    pub verb: String,

    pub uri: String,

    #[serde(default)]
    pub headers: BTreeMap<String, String>,
}

/// Exactly one of the three configs is set, matching the route type.
#[derive(Clone, Debug, Default, Serialize)]
pub struct CreateRouteRequest {
    pub name: String,

    pub hub_id: String,

    pub topic: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub s3_config: Option<S3Config>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub db_config: Option<DatabaseConfig>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub rest_config: Option<RestConfig>,
}
