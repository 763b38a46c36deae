//! `scaleway_iot_device`

use crate::common::*;
use async_trait::async_trait;
use provider_api::iot::{
    CreateDeviceRequest, Device, MessageFilter, MessageFilterPolicy, MessageFilters, UpdateDeviceRequest,
};
use provider_client::IotApi;
use provider_core::codec::{expand_single_block, expand_strings, flatten_single_block, flatten_strings, flatten_time};
use provider_core::locality;
use provider_core::{
    lookup, AttrType, Attribute, Block, DataSource, HookContext, ProviderError, Region, Resource, ResourceData,
    Result, Schema, Value,
};
use std::sync::Arc;
use tracing::{debug, info};

const CRT: &str = "certificate.0.crt";
const KEY: &str = "certificate.0.key";

fn validate_policy(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if MessageFilterPolicy::parse(s).is_none() => Err(format!("{s:?} is not one of accept, reject")),
        _ => Ok(()),
    }
}

fn filter_schema() -> Schema {
    Schema::new()
        .attr(
            "policy",
            Attribute::optional(AttrType::String)
                .describe("Whether the listed topics are the only ones allowed, or the ones refused")
                .default_value("accept")
                .validate(validate_policy),
        )
        .attr("topics", Attribute::optional(AttrType::list(AttrType::String)))
}

fn filters_schema() -> Schema {
    Schema::new()
        .attr("publish", Attribute::optional(AttrType::blocks(filter_schema())).max_items(1))
        .attr("subscribe", Attribute::optional(AttrType::blocks(filter_schema())).max_items(1))
}

fn certificate_schema() -> Schema {
    Schema::new()
        .attr(
            "crt",
            Attribute::optional_computed(AttrType::String).describe("The device certificate, PEM encoded"),
        )
        .attr(
            "key",
            Attribute::computed(AttrType::String)
                .describe("The private key of a generated certificate")
                .sensitive(),
        )
}

pub(crate) fn device_schema() -> Schema {
    Schema::new()
        .attr(
            "hub_id",
            Attribute::required(AttrType::String)
                .describe("The hub the device is registered on")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr(
            "name",
            Attribute::required(AttrType::String).describe("The name of the device").force_new(),
        )
        .attr("description", Attribute::optional(AttrType::String))
        .attr(
            "allow_insecure",
            Attribute::optional(AttrType::Bool)
                .describe("Allow plain TCP connections")
                .default_value(false),
        )
        .attr(
            "allow_multiple_connections",
            Attribute::optional(AttrType::Bool)
                .describe("Allow several connections with the same certificate")
                .default_value(false),
        )
        .attr("message_filters", Attribute::optional(AttrType::blocks(filters_schema())).max_items(1))
        .attr(
            "certificate",
            Attribute::optional_computed(AttrType::blocks(certificate_schema())).max_items(1),
        )
        .attr("status", Attribute::computed(AttrType::String))
        .attr("is_connected", Attribute::computed(AttrType::Bool))
        .attr("has_custom_certificate", Attribute::computed(AttrType::Bool))
        .attr("last_activity_at", Attribute::computed(AttrType::String))
        .attr("region", region_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the device"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the device"))
}

fn expand_filter(block: &Block) -> MessageFilter {
    MessageFilter {
        policy: block
            .value("policy")
            .as_str()
            .and_then(MessageFilterPolicy::parse)
            .unwrap_or_default(),
        topics: expand_strings(block.value("topics")),
    }
}

fn expand_filters(value: &Value) -> Option<MessageFilters> {
    let block = expand_single_block(value)?;
    Some(MessageFilters {
        publish: expand_single_block(block.value("publish")).map(expand_filter),
        subscribe: expand_single_block(block.value("subscribe")).map(expand_filter),
    })
}

fn flatten_filter(filter: Option<&MessageFilter>) -> Value {
    match filter {
        Some(f) => flatten_single_block(
            Block::new()
                .with("policy", f.policy.as_str())
                .with("topics", flatten_strings(&f.topics)),
        ),
        None => Value::List(Vec::new()),
    }
}

fn flatten_filters(filters: &MessageFilters) -> Value {
    if *filters == MessageFilters::default() {
        return Value::List(Vec::new());
    }
    flatten_single_block(
        Block::new()
            .with("publish", flatten_filter(filters.publish.as_ref()))
            .with("subscribe", flatten_filter(filters.subscribe.as_ref())),
    )
}

pub(crate) fn flatten_device(data: &mut ResourceData, region: &Region, device: &Device) {
    data.set("hub_id", regional_id(region, &device.hub_id));
    data.set("name", device.name.as_str());
    data.set("description", device.description.as_str());
    data.set("allow_insecure", device.allow_insecure);
    data.set("allow_multiple_connections", device.allow_multiple_connections);
    data.set("message_filters", flatten_filters(&device.message_filters));
    data.set("status", device.status.as_str());
    data.set("is_connected", device.is_connected);
    data.set("has_custom_certificate", device.has_custom_certificate);
    data.set("last_activity_at", flatten_time(device.last_activity_at.as_ref()));
    data.set("region", region.as_str());
    data.set("created_at", flatten_time(device.created_at.as_ref()));
    data.set("updated_at", flatten_time(device.updated_at.as_ref()));
}

/// Certificate block, keeping whatever key is already in state.
fn set_certificate(data: &mut ResourceData, crt: &str, key: Option<String>) {
    let key = key.or_else(|| data.get(KEY).as_str().map(str::to_string));
    data.set("certificate", flatten_single_block(Block::new().with("crt", crt).with("key", key)));
}

fn user_certificate(data: &ResourceData) -> Option<String> {
    if !data.is_set_in_config(CRT) {
        return None;
    }
    data.get(CRT).as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

pub struct DeviceResource {
    api: Arc<dyn IotApi>,
}

impl DeviceResource {
    pub fn new(api: Arc<dyn IotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for DeviceResource {
    fn type_name(&self) -> &'static str {
        "scaleway_iot_device"
    }

    fn schema(&self) -> Schema {
        device_schema().with_timeouts()
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "hub_id")?;
        let user_crt = user_certificate(data);
        let req = CreateDeviceRequest {
            hub_id: locality::expand_id(&get_string(data, "hub_id")),
            name: get_string(data, "name"),
            description: get_string(data, "description"),
            allow_insecure: data.get_bool("allow_insecure"),
            allow_multiple_connections: data.get_bool("allow_multiple_connections"),
            message_filters: expand_filters(data.get("message_filters")),
        };
        let created = self.api.create_device(&region, &req).await?;
        let id = created.device.id.clone();
        info!(%id, name = %created.device.name, hub_id = %created.device.hub_id, "Created IoT device");
        data.set_id(regional_id(&region, &id));
        // The generated key is only ever returned here.
        set_certificate(data, &created.certificate.crt, Some(created.certificate.key));
        data.mark_partial();

        if let Some(crt) = user_crt {
            debug!(%id, "Uploading device certificate");
            self.api.set_device_certificate(&region, &id, &crt).await?;
        }
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let device = self.api.get_device(&region, &id).await?;
        flatten_device(data, &region, &device);

        let certificate = self.api.get_device_certificate(&region, &id).await?;
        set_certificate(data, &certificate.certificate_pem, None);
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let req = UpdateDeviceRequest {
            description: data.get_updated("description", value_string),
            allow_insecure: data.get_updated("allow_insecure", |v| v.as_bool().unwrap_or(false)),
            allow_multiple_connections: data
                .get_updated("allow_multiple_connections", |v| v.as_bool().unwrap_or(false)),
            message_filters: data.get_updated("message_filters", |v| expand_filters(v).unwrap_or_default()),
            ..Default::default()
        };
        if !req.is_empty() {
            self.api.update_device(&region, &id, &req).await?;
        }

        if data.has_change(CRT) {
            if let Some(crt) = user_certificate(data) {
                debug!(%id, "Uploading device certificate");
                self.api.set_device_certificate(&region, &id, &crt).await?;
            }
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        info!(%id, "Deleting IoT device");
        self.api.delete_device(&region, &id).await
    }
}

pub struct DeviceDataSource {
    api: Arc<dyn IotApi>,
}

impl DeviceDataSource {
    pub fn new(api: Arc<dyn IotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for DeviceDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_iot_device"
    }

    fn schema(&self) -> Schema {
        device_schema()
            .to_data_source(&["name", "hub_id", "region"])
            .attr(
                "device_id",
                Attribute::optional(AttrType::String)
                    .describe("The id of the device")
                    .validate(validate_reference)
                    .conflicts_with(&["name"]),
            )
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let device_id = data.get_str("device_id").map(str::to_string);
        let (region, device) = match device_id {
            Some(id) => {
                let (region, id) = ctx.region_from_id(&id)?;
                let device = self.api.get_device(&region, &id).await?;
                (region, device)
            }
            None => {
                let region = region_of(ctx, data, "hub_id")?;
                let name = data.get_str("name").map(str::to_string).ok_or_else(|| {
                    ProviderError::invalid_attribute("name", "one of device_id or name must be set")
                })?;
                let hub_id = expand_ref(data, "hub_id");
                let devices = self.api.list_devices(&region, hub_id.as_deref(), Some(&name)).await?;
                let device = lookup::find_exact(devices, "device", &name, |d| d.name.as_str())?;
                (region, device)
            }
        };

        let id = regional_id(&region, &device.id);
        data.set_id(id.as_str());
        data.set("device_id", id);
        flatten_device(data, &region, &device);
        Ok(())
    }
}
