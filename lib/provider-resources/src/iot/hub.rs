//! `scaleway_iot_hub`
//!
//! A hub is created enabled. A custom CA, auto-provisioning and a disabled
//! initial state are each applied by a later call, waiting between them.

use crate::common::*;
use async_trait::async_trait;
use provider_api::iot::{CreateHubRequest, Hub, HubStatus, ProductPlan, SetHubCaRequest, UpdateHubRequest};
use provider_client::IotApi;
use provider_core::codec::flatten_time;
use provider_core::{
    lookup, AttrType, Attribute, DataSource, HookContext, ProviderError, Region, Resource, ResourceData,
    ResourceDiff, Result, Schema, StatusClass, Timeouts, Updated, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const DEFAULT_EVENTS_TOPIC_PREFIX: &str = "$SCW/events";

const AUTO_PROVISIONING: &str = "device_auto_provisioning";
const AUTO_PROVISIONING_ALIAS: &str = "device_autoprovisioning";

pub fn hub_status_class(hub: &Hub) -> StatusClass {
    match hub.status {
        HubStatus::Ready | HubStatus::Disabled => StatusClass::Success,
        HubStatus::Error => StatusClass::Failure,
        HubStatus::Unknown => StatusClass::Pending,
        _ => StatusClass::Transitional,
    }
}

/// Wait until the hub settles in `expected`.
async fn wait_for_hub(
    ctx: &HookContext,
    api: &dyn IotApi,
    region: &Region,
    id: &str,
    expected: HubStatus,
) -> Result<Hub> {
    let hub = ctx
        .waiter("hub", id)
        .wait(
            || api.get_hub(region, id),
            |hub| match hub.status {
                status if status == expected => StatusClass::Success,
                HubStatus::Error => StatusClass::Failure,
                HubStatus::Ready | HubStatus::Disabled => StatusClass::Success,
                _ => StatusClass::Transitional,
            },
        )
        .await?
        .into_terminal()
        .ok_or_else(|| gone("hub", id))?;
    if hub.status != expected {
        return Err(ProviderError::UnexpectedStatus {
            kind: "hub".to_string(),
            id: id.to_string(),
            status: hub.status.as_str().to_string(),
            expected: expected.as_str().to_string(),
        });
    }
    Ok(hub)
}

/// Wait until the hub settles, whatever its status.
async fn wait_for_hub_settled(ctx: &HookContext, api: &dyn IotApi, region: &Region, id: &str) -> Result<Hub> {
    ctx.waiter("hub", id)
        .wait(|| api.get_hub(region, id), hub_status_class)
        .await?
        .into_terminal()
        .ok_or_else(|| gone("hub", id))
}

/// CA bundle location for hubs of a dedicated plan; shared hubs have none.
pub fn mqtt_ca_url(plan: ProductPlan, region: &Region) -> String {
    if plan.is_dedicated() {
        format!("https://iot.s3.nl-ams.scw.cloud/certificates/{region}/iot-hub-ca.pem")
    } else {
        String::new()
    }
}

fn validate_plan(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if ProductPlan::parse(s).is_none() => Err(format!("{s:?} is not a product plan")),
        _ => Ok(()),
    }
}

fn count(n: u64) -> i64 {
    i64::try_from(n).unwrap_or(i64::MAX)
}

pub(crate) fn hub_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::required(AttrType::String).describe("The name of the hub"))
        .attr(
            "product_plan",
            Attribute::required(AttrType::String)
                .describe("plan_shared, plan_dedicated or plan_ha")
                .validate(validate_plan),
        )
        .attr(
            "enabled",
            Attribute::optional(AttrType::Bool)
                .describe("Whether devices may connect to the hub")
                .default_value(true),
        )
        .attr("disable_events", Attribute::optional_computed(AttrType::Bool))
        .attr(
            "events_topic_prefix",
            Attribute::optional(AttrType::String)
                .describe("Topic prefix of the hub's own event messages")
                .default_value(DEFAULT_EVENTS_TOPIC_PREFIX),
        )
        .attr(
            "hub_ca",
            Attribute::optional(AttrType::String).describe("A custom CA certificate, PEM encoded"),
        )
        .attr(
            "hub_ca_challenge",
            Attribute::optional(AttrType::String)
                .describe("A certificate signed by hub_ca whose common name is the hub id"),
        )
        .attr(
            AUTO_PROVISIONING,
            Attribute::optional_computed(AttrType::Bool)
                .describe("Register unknown devices presenting a certificate signed by the hub CA"),
        )
        .attr(
            AUTO_PROVISIONING_ALIAS,
            Attribute::optional(AttrType::Bool)
                .deprecated("use device_auto_provisioning instead")
                .conflicts_with(&[AUTO_PROVISIONING]),
        )
        .attr("status", Attribute::computed(AttrType::String))
        .attr("endpoint", Attribute::computed(AttrType::String).describe("The MQTT endpoint of the hub"))
        .attr("device_count", Attribute::computed(AttrType::Int))
        .attr("connected_device_count", Attribute::computed(AttrType::Int))
        .attr("mqtt_ca_url", Attribute::computed(AttrType::String))
        .attr("mqtt_ca", Attribute::computed(AttrType::String))
        .attr("region", region_attr())
        .attr("project_id", project_id_attr())
        .attr("organization_id", organization_id_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the hub"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the hub"))
}

/// The declared auto-provisioning flag, under either key.
fn auto_provisioning(data: &ResourceData) -> bool {
    if data.is_set_in_config(AUTO_PROVISIONING) {
        data.get_bool(AUTO_PROVISIONING)
    } else {
        data.get_bool(AUTO_PROVISIONING_ALIAS)
    }
}

fn auto_provisioning_update(data: &ResourceData) -> Updated<bool> {
    if data.has_change(AUTO_PROVISIONING) || data.has_change(AUTO_PROVISIONING_ALIAS) {
        Updated::Set(auto_provisioning(data))
    } else {
        Updated::Unchanged
    }
}

fn hub_ca_request(data: &ResourceData) -> Option<SetHubCaRequest> {
    let ca = data.get_str("hub_ca")?;
    Some(SetHubCaRequest {
        ca_cert_pem: ca.to_string(),
        challenge_cert_pem: get_string(data, "hub_ca_challenge"),
    })
}

pub(crate) async fn flatten_hub(data: &mut ResourceData, api: &dyn IotApi, region: &Region, hub: &Hub) {
    data.set("name", hub.name.as_str());
    data.set("product_plan", hub.product_plan.as_str());
    data.set("enabled", hub.enabled);
    data.set("disable_events", hub.disable_events);
    data.set("events_topic_prefix", hub.events_topic_prefix.as_str());
    data.set(AUTO_PROVISIONING, hub.enable_device_auto_provisioning);
    if !data.get(AUTO_PROVISIONING_ALIAS).is_null() {
        data.set(AUTO_PROVISIONING_ALIAS, hub.enable_device_auto_provisioning);
    }
    data.set("status", hub.status.as_str());
    data.set("endpoint", hub.endpoint.as_str());
    data.set("device_count", count(hub.device_count));
    data.set("connected_device_count", count(hub.connected_device_count));
    data.set("region", region.as_str());
    data.set("project_id", hub.project_id.as_str());
    data.set("organization_id", hub.organization_id.as_str());
    data.set("created_at", flatten_time(hub.created_at.as_ref()));
    data.set("updated_at", flatten_time(hub.updated_at.as_ref()));

    let url = mqtt_ca_url(hub.product_plan, region);
    let ca = if url.is_empty() {
        String::new()
    } else {
        match api.get_mqtt_ca(&url).await {
            Ok(ca) => ca,
            Err(err) => {
                data.warn(format!("could not fetch the hub MQTT CA: {err}"), "mqtt_ca");
                String::new()
            }
        }
    };
    data.set("mqtt_ca_url", url);
    data.set("mqtt_ca", ca);
}

pub struct HubResource {
    api: Arc<dyn IotApi>,
}

impl HubResource {
    pub fn new(api: Arc<dyn IotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for HubResource {
    fn type_name(&self) -> &'static str {
        "scaleway_iot_hub"
    }

    fn schema(&self) -> Schema {
        hub_schema().with_timeouts()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::uniform(Duration::from_secs(5 * 60))
    }

    async fn customize_diff(&self, _ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        let ca = diff.get("hub_ca").as_str().is_some_and(|s| !s.is_empty());
        let challenge = diff.get("hub_ca_challenge").as_str().is_some_and(|s| !s.is_empty());
        if ca != challenge {
            return Err(ProviderError::invalid_attribute(
                "hub_ca_challenge",
                "hub_ca and hub_ca_challenge must be set together",
            ));
        }
        if diff.has_change("product_plan") {
            diff.set_new_computed("mqtt_ca_url");
            diff.set_new_computed("mqtt_ca");
            diff.set_new_computed("endpoint");
        }
        Ok(())
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let api = self.api.as_ref();
        let region = ctx.region(data)?;
        let plan = data
            .get_str("product_plan")
            .and_then(ProductPlan::parse)
            .ok_or_else(|| ProviderError::invalid_attribute("product_plan", "unknown product plan"))?;
        let req = CreateHubRequest {
            name: get_string(data, "name"),
            project_id: require_project(ctx, data)?,
            product_plan: plan,
            disable_events: data.get_bool("disable_events"),
            events_topic_prefix: data.get_str("events_topic_prefix").map(str::to_string),
        };
        let hub = api.create_hub(&region, &req).await?;
        let id = hub.id.clone();
        info!(%id, name = %hub.name, plan = plan.as_str(), "Created IoT hub");
        data.set_id(regional_id(&region, &id));

        wait_for_hub(ctx, api, &region, &id, HubStatus::Ready).await?;
        // Every later phase leaves a usable hub behind if it fails.
        data.mark_partial();

        if let Some(ca) = hub_ca_request(data) {
            debug!(%id, "Setting hub CA");
            api.set_hub_ca(&region, &id, &ca).await?;
            wait_for_hub(ctx, api, &region, &id, HubStatus::Ready).await?;
        }

        if auto_provisioning(data) {
            debug!(%id, "Enabling device auto-provisioning");
            let req = UpdateHubRequest {
                enable_device_auto_provisioning: Updated::Set(true),
                ..Default::default()
            };
            api.update_hub(&region, &id, &req).await?;
            wait_for_hub(ctx, api, &region, &id, HubStatus::Ready).await?;
        }

        if !data.get_bool("enabled") {
            info!(%id, "Disabling IoT hub");
            api.disable_hub(&region, &id).await?;
            wait_for_hub(ctx, api, &region, &id, HubStatus::Disabled).await?;
        }

        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let hub = self.api.get_hub(&region, &id).await?;
        flatten_hub(data, self.api.as_ref(), &region, &hub).await;
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let api = self.api.as_ref();
        let (region, id) = regional_state_id(ctx, data)?;
        let mut hub = wait_for_hub_settled(ctx, api, &region, &id).await?;

        let req = UpdateHubRequest {
            name: data.get_updated("name", value_string),
            product_plan: data.get_updated("product_plan", |v| {
                v.as_str().and_then(ProductPlan::parse).unwrap_or_default()
            }),
            disable_events: data.get_updated("disable_events", |v| v.as_bool().unwrap_or(false)),
            events_topic_prefix: data.get_updated("events_topic_prefix", value_string),
            enable_device_auto_provisioning: auto_provisioning_update(data),
        };
        if !req.is_empty() {
            api.update_hub(&region, &id, &req).await?;
            hub = wait_for_hub_settled(ctx, api, &region, &id).await?;
        }

        let enabled = data.get_bool("enabled");
        if data.has_changes(&["hub_ca", "hub_ca_challenge"]) {
            if let Some(ca) = hub_ca_request(data) {
                if hub.status == HubStatus::Disabled {
                    api.enable_hub(&region, &id).await?;
                    wait_for_hub(ctx, api, &region, &id, HubStatus::Ready).await?;
                }
                debug!(%id, "Setting hub CA");
                api.set_hub_ca(&region, &id, &ca).await?;
                hub = wait_for_hub(ctx, api, &region, &id, HubStatus::Ready).await?;
            }
        }

        match (hub.status, enabled) {
            (HubStatus::Disabled, true) => {
                info!(%id, "Enabling IoT hub");
                api.enable_hub(&region, &id).await?;
                wait_for_hub(ctx, api, &region, &id, HubStatus::Ready).await?;
            }
            (HubStatus::Ready, false) => {
                info!(%id, "Disabling IoT hub");
                api.disable_hub(&region, &id).await?;
                wait_for_hub(ctx, api, &region, &id, HubStatus::Disabled).await?;
            }
            _ => {}
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let api = self.api.as_ref();
        let (region, id) = regional_state_id(ctx, data)?;
        wait_for_hub_settled(ctx, api, &region, &id).await?;

        info!(%id, "Deleting IoT hub and its devices");
        api.delete_hub(&region, &id, true).await?;
        ctx.waiter("hub", &id)
            .tolerate_not_found()
            .wait(
                || api.get_hub(&region, &id),
                |hub| match hub.status {
                    HubStatus::Deleted => StatusClass::Success,
                    _ => StatusClass::Transitional,
                },
            )
            .await?;
        Ok(())
    }
}

pub struct HubDataSource {
    api: Arc<dyn IotApi>,
}

impl HubDataSource {
    pub fn new(api: Arc<dyn IotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for HubDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_iot_hub"
    }

    fn schema(&self) -> Schema {
        hub_schema().to_data_source(&["name", "region", "project_id"]).attr(
            "hub_id",
            Attribute::optional(AttrType::String)
                .describe("The id of the hub")
                .validate(validate_reference)
                .conflicts_with(&["name"]),
        )
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let hub_id = data.get_str("hub_id").map(str::to_string);
        let (region, hub) = match hub_id {
            Some(id) => {
                let (region, id) = ctx.region_from_id(&id)?;
                let hub = self.api.get_hub(&region, &id).await?;
                (region, hub)
            }
            None => {
                let region = ctx.region(data)?;
                let name = data
                    .get_str("name")
                    .map(str::to_string)
                    .ok_or_else(|| ProviderError::invalid_attribute("name", "one of hub_id or name must be set"))?;
                let project_id = data.get_str("project_id").map(str::to_string);
                let hubs = self.api.list_hubs(&region, project_id.as_deref(), Some(&name)).await?;
                let hub = lookup::find_exact(hubs, "hub", &name, |h| h.name.as_str())?;
                (region, hub)
            }
        };

        let id = regional_id(&region, &hub.id);
        data.set_id(id.as_str());
        data.set("hub_id", id);
        flatten_hub(data, self.api.as_ref(), &region, &hub).await;
        Ok(())
    }
}
