//! `scaleway_vpc`

use crate::common::*;
use async_trait::async_trait;
use provider_api::vpc::{CreateVpcRequest, UpdateVpcRequest, Vpc};
use provider_client::VpcApi;
use provider_core::codec::{expand_strings, flatten_strings, flatten_time};
use provider_core::{
    lookup, AttrType, Attribute, DataSource, HookContext, ProviderError, Region, Resource, ResourceData,
    ResourceDiff, Result, Schema,
};
use std::sync::Arc;
use tracing::info;

pub(crate) fn vpc_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::optional_computed(AttrType::String).describe("The name of the VPC"))
        .attr("tags", tags_attr())
        .attr(
            "enable_routing",
            Attribute::optional(AttrType::Bool)
                .describe("Route traffic between the private networks of the VPC; cannot be disabled")
                .default_value(false),
        )
        .attr("is_default", Attribute::computed(AttrType::Bool))
        .attr("region", region_attr())
        .attr("project_id", project_id_attr())
        .attr("organization_id", organization_id_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the VPC"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the VPC"))
}

pub(crate) fn flatten_vpc(data: &mut ResourceData, region: &Region, vpc: &Vpc) {
    data.set("name", vpc.name.as_str());
    data.set("tags", flatten_strings(&vpc.tags));
    data.set("enable_routing", vpc.routing_enabled);
    data.set("is_default", vpc.is_default);
    data.set("region", region.as_str());
    data.set("project_id", vpc.project_id.as_str());
    data.set("organization_id", vpc.organization_id.as_str());
    data.set("created_at", flatten_time(vpc.created_at.as_ref()));
    data.set("updated_at", flatten_time(vpc.updated_at.as_ref()));
}

pub struct VpcResource {
    api: Arc<dyn VpcApi>,
}

impl VpcResource {
    pub fn new(api: Arc<dyn VpcApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for VpcResource {
    fn type_name(&self) -> &'static str {
        "scaleway_vpc"
    }

    fn schema(&self) -> Schema {
        vpc_schema().with_timeouts()
    }

    async fn customize_diff(&self, _ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        let was_enabled = diff.get_old("enable_routing").as_bool().unwrap_or(false);
        let enabled = diff.get("enable_routing").as_bool().unwrap_or(false);
        if was_enabled && !enabled {
            return Err(ProviderError::invalid_attribute(
                "enable_routing",
                "routing cannot be disabled once enabled",
            ));
        }
        Ok(())
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = ctx.region(data)?;
        let req = CreateVpcRequest {
            name: get_string(data, "name"),
            project_id: require_project(ctx, data)?,
            tags: expand_strings(data.get("tags")),
            enable_routing: data.get_bool("enable_routing"),
        };
        let vpc = self.api.create_vpc(&region, &req).await?;
        info!(id = %vpc.id, name = %vpc.name, "Created VPC");
        data.set_id(regional_id(&region, &vpc.id));
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let vpc = self.api.get_vpc(&region, &id).await?;
        flatten_vpc(data, &region, &vpc);
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let req = UpdateVpcRequest {
            name: data.get_updated("name", value_string),
            tags: data.get_updated("tags", expand_strings),
        };
        if !req.is_empty() {
            self.api.update_vpc(&region, &id, &req).await?;
        }
        if data.has_change("enable_routing") && data.get_bool("enable_routing") {
            info!(%id, "Enabling VPC routing");
            self.api.enable_routing(&region, &id).await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        info!(%id, "Deleting VPC");
        self.api.delete_vpc(&region, &id).await
    }
}

pub struct VpcDataSource {
    api: Arc<dyn VpcApi>,
}

impl VpcDataSource {
    pub fn new(api: Arc<dyn VpcApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for VpcDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_vpc"
    }

    fn schema(&self) -> Schema {
        vpc_schema().to_data_source(&["name", "region", "project_id"]).attr(
            "vpc_id",
            Attribute::optional(AttrType::String)
                .describe("The id of the VPC")
                .validate(validate_reference)
                .conflicts_with(&["name"]),
        )
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let vpc_id = data.get_str("vpc_id").map(str::to_string);
        let (region, vpc) = match vpc_id {
            Some(id) => {
                let (region, id) = ctx.region_from_id(&id)?;
                let vpc = self.api.get_vpc(&region, &id).await?;
                (region, vpc)
            }
            None => {
                let region = ctx.region(data)?;
                let name = data
                    .get_str("name")
                    .map(str::to_string)
                    .ok_or_else(|| ProviderError::invalid_attribute("name", "one of vpc_id or name must be set"))?;
                let project_id = data.get_str("project_id").map(str::to_string);
                let vpcs = self.api.list_vpcs(&region, project_id.as_deref(), Some(&name)).await?;
                let vpc = lookup::find_exact(vpcs, "VPC", &name, |v| v.name.as_str())?;
                (region, vpc)
            }
        };

        let id = regional_id(&region, &vpc.id);
        data.set_id(id.as_str());
        data.set("vpc_id", id);
        flatten_vpc(data, &region, &vpc);
        Ok(())
    }
}
