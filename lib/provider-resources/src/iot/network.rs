//! `scaleway_iot_network`

use crate::common::*;
use async_trait::async_trait;
use provider_api::iot::{CreateNetworkRequest, NetworkType};
use provider_client::IotApi;
use provider_core::codec::flatten_time;
use provider_core::locality;
use provider_core::{AttrType, Attribute, HookContext, ProviderError, Resource, ResourceData, Result, Schema, Value};
use std::sync::Arc;
use tracing::info;

fn validate_network_type(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if NetworkType::parse(s).is_none() => Err(format!("{s:?} is not one of sigfox, rest")),
        _ => Ok(()),
    }
}

fn network_schema() -> Schema {
    Schema::new()
        .attr(
            "hub_id",
            Attribute::required(AttrType::String)
                .describe("The hub the network forwards messages to")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr("name", Attribute::required(AttrType::String).force_new())
        .attr(
            "type",
            Attribute::required(AttrType::String)
                .describe("sigfox or rest")
                .force_new()
                .validate(validate_network_type),
        )
        .attr(
            "topic_prefix",
            Attribute::optional(AttrType::String)
                .describe("Prefix of the topics messages from this network are published on")
                .force_new(),
        )
        .attr("endpoint", Attribute::computed(AttrType::String))
        .attr(
            "secret",
            Attribute::computed(AttrType::String)
                .describe("The secret authenticating the network to the hub")
                .sensitive(),
        )
        .attr("region", region_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the network"))
}

pub struct NetworkResource {
    api: Arc<dyn IotApi>,
}

impl NetworkResource {
    pub fn new(api: Arc<dyn IotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for NetworkResource {
    fn type_name(&self) -> &'static str {
        "scaleway_iot_network"
    }

    fn schema(&self) -> Schema {
        network_schema().with_timeouts()
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "hub_id")?;
        let network_type = data
            .get_str("type")
            .and_then(NetworkType::parse)
            .ok_or_else(|| ProviderError::invalid_attribute("type", "unknown network type"))?;
        let req = CreateNetworkRequest {
            name: get_string(data, "name"),
            network_type,
            hub_id: locality::expand_id(&get_string(data, "hub_id")),
            topic_prefix: get_string(data, "topic_prefix"),
        };
        let created = self.api.create_network(&region, &req).await?;
        info!(id = %created.network.id, name = %created.network.name, "Created IoT network");
        data.set_id(regional_id(&region, &created.network.id));
        data.set("secret", created.secret);
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let network = self.api.get_network(&region, &id).await?;
        data.set("hub_id", regional_id(&region, &network.hub_id));
        data.set("name", network.name.as_str());
        data.set("type", network.network_type.as_str());
        data.set("topic_prefix", network.topic_prefix.as_str());
        data.set("endpoint", network.endpoint.as_str());
        data.set("region", region.as_str());
        data.set("created_at", flatten_time(network.created_at.as_ref()));
        Ok(())
    }

    /// Every argument forces a new network.
    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        info!(%id, "Deleting IoT network");
        self.api.delete_network(&region, &id).await
    }
}
