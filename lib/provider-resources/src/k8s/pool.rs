//! `scaleway_k8s_pool`

use super::waiters::{wait_for_cluster, wait_for_pool, wait_for_pool_deleted, wait_for_pool_ready};
use crate::common::*;
use async_trait::async_trait;
use provider_api::k8s::{CreatePoolRequest, Node, Pool, UpdatePoolRequest, UpgradePolicy, UpgradePoolRequest};
use provider_client::{InstanceApi, K8sApi};
use provider_core::codec::{
    expand_single_block, expand_string_map, expand_strings, flatten_single_block, flatten_string_map,
    flatten_strings, flatten_time,
};
use provider_core::locality;
use provider_core::{
    lookup, version, AttrType, Attribute, Block, DataSource, HookContext, ProviderError, Region, Resource,
    ResourceData, ResourceDiff, Result, Schema, Timeouts, Value, Zone,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

const BYTES_PER_GB: u64 = 1_000_000_000;

fn upgrade_policy_schema() -> Schema {
    Schema::new()
        .attr(
            "max_unavailable",
            Attribute::optional_computed(AttrType::Int).describe("Nodes that may be unavailable during an upgrade"),
        )
        .attr(
            "max_surge",
            Attribute::optional_computed(AttrType::Int).describe("Nodes that may be created above the pool size during an upgrade"),
        )
}

fn node_schema() -> Schema {
    Schema::new()
        .attr("id", Attribute::computed(AttrType::String))
        .attr("name", Attribute::computed(AttrType::String))
        .attr("status", Attribute::computed(AttrType::String))
        .attr("public_ip", Attribute::computed(AttrType::String))
        .attr("public_ip_v6", Attribute::computed(AttrType::String))
}

pub(crate) fn pool_schema() -> Schema {
    Schema::new()
        .attr(
            "cluster_id",
            Attribute::required(AttrType::String)
                .describe("The cluster the pool belongs to")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr("name", Attribute::required(AttrType::String).force_new())
        .attr(
            "node_type",
            Attribute::required(AttrType::String)
                .describe("The commercial type of the pool nodes")
                .force_new()
                .diff_suppress(suppress_case),
        )
        .attr("size", Attribute::required(AttrType::Int).describe("The number of nodes"))
        .attr("min_size", Attribute::optional_computed(AttrType::Int))
        .attr("max_size", Attribute::optional_computed(AttrType::Int))
        .attr("autoscaling", Attribute::optional(AttrType::Bool).default_value(false))
        .attr("autohealing", Attribute::optional(AttrType::Bool).default_value(false))
        .attr("tags", tags_attr())
        .attr(
            "placement_group_id",
            reference_attr("The placement group the nodes are spread with").force_new(),
        )
        .attr("container_runtime", Attribute::optional_computed(AttrType::String).force_new())
        .attr("kubelet_args", Attribute::optional(AttrType::map(AttrType::String)))
        .attr(
            "upgrade_policy",
            Attribute::optional_computed(AttrType::blocks(upgrade_policy_schema())).max_items(1),
        )
        .attr("zone", zone_attr())
        .attr("region", region_attr())
        .attr("root_volume_type", Attribute::optional_computed(AttrType::String).force_new())
        .attr("root_volume_size_in_gb", Attribute::optional_computed(AttrType::Int).force_new())
        .attr(
            "public_ip_disabled",
            Attribute::optional(AttrType::Bool).force_new().default_value(false),
        )
        .attr("security_group_id", Attribute::optional_computed(AttrType::String).force_new())
        .attr(
            "wait_for_pool_ready",
            Attribute::optional(AttrType::Bool)
                .describe("Wait for the pool to be ready")
                .default_value(true),
        )
        .attr("version", Attribute::optional_computed(AttrType::String))
        .attr("nodes", Attribute::computed(AttrType::blocks(node_schema())))
        .attr("status", Attribute::computed(AttrType::String))
        .attr("created_at", timestamp_attr("The date and time of the creation of the pool"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the pool"))
}

fn expand_upgrade_policy(value: &Value) -> UpgradePolicy {
    expand_single_block(value)
        .map(|b| UpgradePolicy {
            max_unavailable: block_u32(b, "max_unavailable"),
            max_surge: block_u32(b, "max_surge"),
        })
        .unwrap_or_default()
}

fn flatten_node(node: &Node) -> Value {
    Value::Block(
        Block::new()
            .with("id", node.id.as_str())
            .with("name", node.name.as_str())
            .with("status", node.status.as_str())
            .with("public_ip", node.public_ip_v4.clone())
            .with("public_ip_v6", node.public_ip_v6.clone()),
    )
}

pub(crate) fn flatten_pool(data: &mut ResourceData, region: &Region, pool: &Pool, nodes: &[Node]) {
    let zone = Zone::parse(&pool.zone).ok();
    let placement_group = match (pool.placement_group_id.as_deref(), zone.as_ref()) {
        (Some(id), Some(zone)) if !id.is_empty() => Value::String(zonal_id(zone, id)),
        (Some(id), None) if !id.is_empty() => Value::String(id.to_string()),
        _ => Value::Null,
    };

    data.set("cluster_id", regional_id(region, &pool.cluster_id));
    data.set("name", pool.name.as_str());
    data.set("node_type", pool.node_type.as_str());
    data.set("size", pool.size);
    data.set("min_size", pool.min_size);
    data.set("max_size", pool.max_size);
    data.set("autoscaling", pool.autoscaling);
    data.set("autohealing", pool.autohealing);
    data.set("tags", flatten_strings(&pool.tags));
    data.set("placement_group_id", placement_group);
    data.set("container_runtime", pool.container_runtime.as_str());
    data.set("kubelet_args", flatten_string_map(&pool.kubelet_args));
    data.set(
        "upgrade_policy",
        flatten_single_block(
            Block::new()
                .with("max_unavailable", pool.upgrade_policy.max_unavailable)
                .with("max_surge", pool.upgrade_policy.max_surge),
        ),
    );
    data.set("zone", pool.zone.as_str());
    data.set("region", region.as_str());
    data.set("root_volume_type", pool.root_volume_type.as_str());
    data.set(
        "root_volume_size_in_gb",
        pool.root_volume_size.map(|bytes| (bytes / BYTES_PER_GB) as i64),
    );
    data.set("public_ip_disabled", pool.public_ip_disabled);
    data.set("security_group_id", pool.security_group_id.as_str());
    data.set("version", pool.version.as_str());
    data.set("status", pool.status.as_str());
    data.set("nodes", Value::List(nodes.iter().map(flatten_node).collect()));
    data.set("created_at", flatten_time(pool.created_at.as_ref()));
    data.set("updated_at", flatten_time(pool.updated_at.as_ref()));
}

pub struct PoolResource {
    api: Arc<dyn K8sApi>,
    instance: Arc<dyn InstanceApi>,
}

impl PoolResource {
    pub fn new(api: Arc<dyn K8sApi>, instance: Arc<dyn InstanceApi>) -> Self {
        Self { api, instance }
    }

    /// Reject a pool zone that contradicts the zone of its placement group.
    async fn check_placement_group(&self, ctx: &HookContext, diff: &ResourceDiff<'_>) -> Result<()> {
        let Some(reference) = diff.get("placement_group_id").as_str().filter(|s| !s.is_empty()) else {
            return Ok(());
        };
        let (zone, id) = ctx.zone_from_id(reference)?;
        let group = self.instance.get_placement_group(&zone, &id).await?;
        if group.zone.is_empty() || !diff.is_set_in_config("zone") {
            return Ok(());
        }
        match diff.get("zone").as_str() {
            Some(pool_zone) if pool_zone != group.zone => Err(ProviderError::invalid_attribute(
                "zone",
                format!("pool zone {pool_zone} differs from zone {} of placement group {id}", group.zone),
            )),
            _ => Ok(()),
        }
    }
}

#[async_trait]
impl Resource for PoolResource {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_pool"
    }

    fn schema(&self) -> Schema {
        pool_schema().with_timeouts()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::uniform(Duration::from_secs(30 * 60))
    }

    async fn customize_diff(&self, ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        if let (Some(min), Some(max)) = (diff.get("min_size").as_int(), diff.get("max_size").as_int()) {
            if min > max {
                return Err(ProviderError::invalid_attribute(
                    "min_size",
                    format!("min_size ({min}) must not exceed max_size ({max})"),
                ));
            }
        }

        self.check_placement_group(ctx, diff).await?;

        if diff.is_new_resource() || diff.is_set_in_config("version") {
            return Ok(());
        }
        // The cluster upgrades its pools: follow its version.
        let cluster = diff.get("cluster_id").as_str().map(str::to_string);
        let old_version = diff.get_old("version").as_str().map(str::to_string);
        if let (Some(cluster), Some(old_version)) = (cluster, old_version) {
            let (region, cluster_id) = ctx.region_from_id(&cluster)?;
            let cluster = self.api.get_cluster(&region, &cluster_id).await?;
            if !version::same_version(&cluster.version, &old_version) {
                diff.set_new_computed("version");
            }
        }
        Ok(())
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "cluster_id")?;
        let cluster_id = locality::expand_id(&get_string(data, "cluster_id"));
        let api = self.api.as_ref();
        wait_for_cluster(ctx, api, &region, &cluster_id).await?;

        let req = CreatePoolRequest {
            name: get_string(data, "name"),
            node_type: get_string(data, "node_type"),
            placement_group_id: expand_ref(data, "placement_group_id"),
            autoscaling: data.get_bool("autoscaling"),
            size: get_u32(data, "size").unwrap_or(1),
            min_size: get_u32(data, "min_size"),
            max_size: get_u32(data, "max_size"),
            container_runtime: data.get_str("container_runtime").map(str::to_string),
            autohealing: data.get_bool("autohealing"),
            tags: expand_strings(data.get("tags")),
            kubelet_args: expand_string_map(data.get("kubelet_args")),
            upgrade_policy: data
                .get_ok("upgrade_policy")
                .map(expand_upgrade_policy),
            zone: data.get_str("zone").map(str::to_string),
            root_volume_type: data.get_str("root_volume_type").map(str::to_string),
            root_volume_size: get_u32(data, "root_volume_size_in_gb").map(|gb| u64::from(gb) * BYTES_PER_GB),
            public_ip_disabled: data.get_bool("public_ip_disabled"),
            security_group_id: data.get_str("security_group_id").map(str::to_string),
        };

        let pool = api.create_pool(&region, &cluster_id, &req).await?;
        info!(id = %pool.id, %cluster_id, node_type = %req.node_type, size = req.size, "Created pool");
        data.set_id(regional_id(&region, &pool.id));

        if data.get_bool("wait_for_pool_ready") {
            wait_for_pool_ready(ctx, api, &region, &pool.id).await?;
        }
        wait_for_cluster(ctx, api, &region, &cluster_id).await?;
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let pool = self.api.get_pool(&region, &id).await?;
        let nodes = self.api.list_nodes(&region, &pool.cluster_id, &pool.id).await?;
        flatten_pool(data, &region, &pool, &nodes);
        if data.get("wait_for_pool_ready").is_null() {
            data.set("wait_for_pool_ready", true);
        }
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let api = self.api.as_ref();
        wait_for_pool(ctx, api, &region, &id).await?;

        let req = UpdatePoolRequest {
            autoscaling: data.get_updated("autoscaling", |v| v.as_bool().unwrap_or(false)),
            size: data.get_updated("size", value_u32),
            min_size: data.get_updated("min_size", value_u32),
            max_size: data.get_updated("max_size", value_u32),
            autohealing: data.get_updated("autohealing", |v| v.as_bool().unwrap_or(false)),
            tags: data.get_updated("tags", expand_strings),
            kubelet_args: data.get_updated("kubelet_args", expand_string_map),
            upgrade_policy: data.get_updated("upgrade_policy", expand_upgrade_policy),
        };
        if !req.is_empty() {
            info!(%id, "Updating pool");
            api.update_pool(&region, &id, &req).await?;
        }

        if data.is_set_in_config("version") && data.has_change("version") {
            let version = get_string(data, "version");
            info!(%id, %version, "Upgrading pool");
            api.upgrade_pool(&region, &id, &UpgradePoolRequest { version }).await?;
        }

        if data.get_bool("wait_for_pool_ready") {
            wait_for_pool_ready(ctx, api, &region, &id).await?;
        } else {
            wait_for_pool(ctx, api, &region, &id).await?;
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        info!(%id, "Deleting pool");
        self.api.delete_pool(&region, &id).await?;
        wait_for_pool_deleted(ctx, self.api.as_ref(), &region, &id).await
    }
}

pub struct PoolDataSource {
    api: Arc<dyn K8sApi>,
}

impl PoolDataSource {
    pub fn new(api: Arc<dyn K8sApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for PoolDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_pool"
    }

    fn schema(&self) -> Schema {
        pool_schema().to_data_source(&["name", "cluster_id", "region"]).attr(
            "pool_id",
            Attribute::optional(AttrType::String)
                .describe("The id of the pool")
                .validate(validate_reference)
                .conflicts_with(&["name"]),
        )
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let pool_id = data.get_str("pool_id").map(str::to_string);
        let (region, pool) = match pool_id {
            Some(id) => {
                let (region, id) = ctx.region_from_id(&id)?;
                let pool = self.api.get_pool(&region, &id).await?;
                (region, pool)
            }
            None => {
                let name = data
                    .get_str("name")
                    .map(str::to_string)
                    .ok_or_else(|| ProviderError::invalid_attribute("name", "one of pool_id or name must be set"))?;
                let cluster = data
                    .get_str("cluster_id")
                    .map(str::to_string)
                    .ok_or_else(|| ProviderError::invalid_attribute("cluster_id", "required to look a pool up by name"))?;
                let region = region_of(ctx, data, "cluster_id")?;
                let cluster_id = locality::expand_id(&cluster);
                let pools = self.api.list_pools(&region, &cluster_id, Some(&name)).await?;
                let pool = lookup::find_exact(pools, "pool", &name, |p| p.name.as_str())?;
                (region, pool)
            }
        };

        let nodes = self.api.list_nodes(&region, &pool.cluster_id, &pool.id).await?;
        let id = regional_id(&region, &pool.id);
        data.set_id(id.as_str());
        data.set("pool_id", id);
        flatten_pool(data, &region, &pool, &nodes);
        Ok(())
    }
}
