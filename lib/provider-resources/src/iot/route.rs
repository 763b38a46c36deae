//! `scaleway_iot_route`
//!
//! A route forwards the messages of a topic to exactly one of an S3 bucket,
//! a database or a REST endpoint. Routes cannot be modified.

use crate::common::*;
use async_trait::async_trait;
use provider_api::iot::{CreateRouteRequest, DatabaseConfig, RestConfig, Route, S3Config};
use provider_client::IotApi;
use provider_core::codec::{expand_single_block, expand_string_map, flatten_single_block, flatten_string_map, flatten_time};
use provider_core::locality;
use provider_core::{
    AttrType, Attribute, Block, HookContext, ProviderError, Resource, ResourceData, ResourceDiff, Result, Schema,
    Value,
};
use std::sync::Arc;
use tracing::info;

const TARGETS: [&str; 3] = ["s3", "database", "rest"];

fn required() -> Attribute {
    Attribute::required(AttrType::String).force_new()
}

fn s3_schema() -> Schema {
    Schema::new()
        .attr("bucket_region", required())
        .attr("bucket_name", required())
        .attr("object_prefix", Attribute::optional(AttrType::String).force_new())
        .attr("strategy", required().describe("per_topic or per_message"))
}

fn database_schema() -> Schema {
    Schema::new()
        .attr("host", required())
        .attr("port", Attribute::required(AttrType::Int).force_new())
        .attr("dbname", required())
        .attr("username", required())
        .attr("password", required().sensitive())
        .attr("query", required().describe("SQL query run for every message"))
        .attr("engine", Attribute::optional_computed(AttrType::String).force_new())
}

fn rest_schema() -> Schema {
    Schema::new()
        .attr("verb", required().describe("HTTP verb, lowercase"))
        .attr("uri", required())
        .attr("headers", Attribute::optional(AttrType::map(AttrType::String)).force_new())
}

fn route_schema() -> Schema {
    let target = |schema: Schema| {
        Attribute::optional(AttrType::blocks(schema))
            .force_new()
            .max_items(1)
    };
    Schema::new()
        .attr(
            "hub_id",
            Attribute::required(AttrType::String)
                .describe("The hub whose messages are routed")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr("name", required())
        .attr("topic", required().describe("The topic filter selecting the routed messages"))
        .attr("s3", target(s3_schema()).conflicts_with(&["database", "rest"]))
        .attr("database", target(database_schema()).conflicts_with(&["s3", "rest"]))
        .attr("rest", target(rest_schema()).conflicts_with(&["s3", "database"]))
        .attr("region", region_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the route"))
}

fn expand_s3(block: &Block) -> S3Config {
    S3Config {
        bucket_region: block_str(block, "bucket_region"),
        bucket_name: block_str(block, "bucket_name"),
        object_prefix: block_str(block, "object_prefix"),
        strategy: block_str(block, "strategy"),
    }
}

fn expand_database(block: &Block) -> DatabaseConfig {
    DatabaseConfig {
        host: block_str(block, "host"),
        port: block_u32(block, "port"),
        dbname: block_str(block, "dbname"),
        username: block_str(block, "username"),
        password: block_str(block, "password"),
        query: block_str(block, "query"),
        engine: block_str(block, "engine"),
    }
}

fn expand_rest(block: &Block) -> RestConfig {
    RestConfig {
        verb: block_str(block, "verb"),
        uri: block_str(block, "uri"),
        headers: expand_string_map(block.value("headers")),
    }
}

fn flatten_s3(config: &S3Config) -> Value {
    flatten_single_block(
        Block::new()
            .with("bucket_region", config.bucket_region.as_str())
            .with("bucket_name", config.bucket_name.as_str())
            .with("object_prefix", config.object_prefix.as_str())
            .with("strategy", config.strategy.as_str()),
    )
}

/// The vendor never returns the password; the one in state is kept.
fn flatten_database(config: &DatabaseConfig, password: Value) -> Value {
    flatten_single_block(
        Block::new()
            .with("host", config.host.as_str())
            .with("port", i64::from(config.port))
            .with("dbname", config.dbname.as_str())
            .with("username", config.username.as_str())
            .with("password", password)
            .with("query", config.query.as_str())
            .with("engine", config.engine.as_str()),
    )
}

fn flatten_rest(config: &RestConfig) -> Value {
    flatten_single_block(
        Block::new()
            .with("verb", config.verb.as_str())
            .with("uri", config.uri.as_str())
            .with("headers", flatten_string_map(&config.headers)),
    )
}

fn flatten_targets(data: &mut ResourceData, route: &Route) {
    let empty = || Value::List(Vec::new());
    let password = data.get("database.0.password").clone();
    data.set("s3", route.s3_config.as_ref().map(flatten_s3).unwrap_or_else(empty));
    data.set(
        "database",
        route
            .db_config
            .as_ref()
            .map(|db| flatten_database(db, password))
            .unwrap_or_else(empty),
    );
    data.set("rest", route.rest_config.as_ref().map(flatten_rest).unwrap_or_else(empty));
}

fn check_single_target(diff: &ResourceDiff<'_>) -> Result<()> {
    let declared = TARGETS
        .iter()
        .filter(|key| expand_single_block(diff.get(key)).is_some())
        .count();
    if declared != 1 {
        return Err(ProviderError::invalid_attribute(
            "s3",
            "exactly one of s3, database or rest must be declared",
        ));
    }
    Ok(())
}

pub struct IotRouteResource {
    api: Arc<dyn IotApi>,
}

impl IotRouteResource {
    pub fn new(api: Arc<dyn IotApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for IotRouteResource {
    fn type_name(&self) -> &'static str {
        "scaleway_iot_route"
    }

    fn schema(&self) -> Schema {
        route_schema().with_timeouts()
    }

    async fn customize_diff(&self, _ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        check_single_target(diff)
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "hub_id")?;
        let req = CreateRouteRequest {
            name: get_string(data, "name"),
            hub_id: locality::expand_id(&get_string(data, "hub_id")),
            topic: get_string(data, "topic"),
            s3_config: expand_single_block(data.get("s3")).map(expand_s3),
            db_config: expand_single_block(data.get("database")).map(expand_database),
            rest_config: expand_single_block(data.get("rest")).map(expand_rest),
        };
        let route = self.api.create_route(&region, &req).await?;
        info!(id = %route.id, name = %route.name, target = route.route_type.as_str(), "Created IoT route");
        data.set_id(regional_id(&region, &route.id));
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let route = self.api.get_route(&region, &id).await?;
        data.set("hub_id", regional_id(&region, &route.hub_id));
        data.set("name", route.name.as_str());
        data.set("topic", route.topic.as_str());
        flatten_targets(data, &route);
        data.set("region", region.as_str());
        data.set("created_at", flatten_time(route.created_at.as_ref()));
        Ok(())
    }

    /// Every argument forces a new route.
    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        info!(%id, "Deleting IoT route");
        self.api.delete_route(&region, &id).await
    }
}
