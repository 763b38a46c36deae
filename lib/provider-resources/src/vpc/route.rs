//! `scaleway_vpc_route`

use crate::common::*;
use async_trait::async_trait;
use provider_api::vpc::{CreateRouteRequest, Route, UpdateRouteRequest};
use provider_client::VpcApi;
use provider_core::codec::{expand_strings, flatten_strings, flatten_time};
use provider_core::locality;
use provider_core::{AttrType, Attribute, HookContext, Region, Resource, ResourceData, Result, Schema, Value};
use std::sync::Arc;
use tracing::info;

fn route_schema() -> Schema {
    Schema::new()
        .attr(
            "vpc_id",
            Attribute::required(AttrType::String)
                .describe("The VPC the route belongs to")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr("description", Attribute::optional(AttrType::String))
        .attr("tags", tags_attr())
        .attr(
            "destination",
            Attribute::optional(AttrType::String)
                .describe("The destination of the route, in CIDR notation")
                .validate(validate_cidr),
        )
        .attr(
            "nexthop_resource_id",
            reference_attr("The resource traffic to the destination is forwarded to"),
        )
        .attr(
            "nexthop_private_network_id",
            reference_attr("The private network traffic to the destination is forwarded to"),
        )
        .attr("region", region_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the route"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the route"))
}

fn flatten_route(data: &mut ResourceData, region: &Region, route: &Route) {
    data.set("vpc_id", regional_id(region, &route.vpc_id));
    data.set("description", route.description.as_str());
    data.set("tags", flatten_strings(&route.tags));
    data.set("destination", canonical_cidr(&route.destination));
    data.set("nexthop_resource_id", regional_ref(region, route.nexthop_resource_id.as_deref()));
    data.set(
        "nexthop_private_network_id",
        regional_ref(region, route.nexthop_private_network_id.as_deref()),
    );
    data.set("region", region.as_str());
    data.set("created_at", flatten_time(route.created_at.as_ref()));
    data.set("updated_at", flatten_time(route.updated_at.as_ref()));
}

fn bare_ref(value: &Value) -> String {
    value.as_str().map(locality::expand_id).unwrap_or_default()
}

pub struct RouteResource {
    api: Arc<dyn VpcApi>,
}

impl RouteResource {
    pub fn new(api: Arc<dyn VpcApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for RouteResource {
    fn type_name(&self) -> &'static str {
        "scaleway_vpc_route"
    }

    fn schema(&self) -> Schema {
        route_schema().with_timeouts()
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "vpc_id")?;
        let req = CreateRouteRequest {
            description: get_string(data, "description"),
            tags: expand_strings(data.get("tags")),
            vpc_id: locality::expand_id(&get_string(data, "vpc_id")),
            destination: get_string(data, "destination"),
            nexthop_resource_id: expand_ref(data, "nexthop_resource_id"),
            nexthop_private_network_id: expand_ref(data, "nexthop_private_network_id"),
        };
        let route = self.api.create_route(&region, &req).await?;
        info!(id = %route.id, destination = %route.destination, "Created VPC route");
        data.set_id(regional_id(&region, &route.id));
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let route = self.api.get_route(&region, &id).await?;
        flatten_route(data, &region, &route);
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let req = UpdateRouteRequest {
            description: data.get_updated("description", value_string),
            tags: data.get_updated("tags", expand_strings),
            destination: data.get_updated("destination", value_string),
            nexthop_resource_id: data.get_updated("nexthop_resource_id", bare_ref),
            nexthop_private_network_id: data.get_updated("nexthop_private_network_id", bare_ref),
        };
        if !req.is_empty() {
            self.api.update_route(&region, &id, &req).await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        info!(%id, "Deleting VPC route");
        self.api.delete_route(&region, &id).await
    }
}
