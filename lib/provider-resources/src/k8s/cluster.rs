//! `scaleway_k8s_cluster`

use super::waiters::{wait_for_cluster, wait_for_cluster_and_pools, wait_for_cluster_deleted};
use crate::common::*;
use async_trait::async_trait;
use provider_api::k8s::{
    AutoUpgrade, AutoscalerConfig, Cluster, CreateClusterRequest, Kubeconfig, MaintenanceWindow,
    OpenIdConnectConfig, UpdateClusterRequest, UpgradeClusterRequest,
};
use provider_client::K8sApi;
use provider_core::codec::{
    expand_single_block, expand_string_set, expand_strings, flatten_single_block, flatten_string_set,
    flatten_strings, flatten_time,
};
use provider_core::locality::{self, Locality};
use provider_core::{
    lookup, version, AttrType, Attribute, Block, DataSource, HookContext, ProviderError, Region, Resource,
    ResourceData, ResourceDiff, Result, Schema, Timeouts, Value,
};
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};

/// Network settings the vendor applies when a cluster does not set them
const NETWORK_DEFAULTS: [(&str, &str); 3] = [
    ("pod_cidr", "100.64.0.0/15"),
    ("service_cidr", "10.32.0.0/20"),
    ("service_dns_ip", "10.32.0.10"),
];

fn autoscaler_schema() -> Schema {
    let string = || Attribute::optional_computed(AttrType::String);
    let flag = || Attribute::optional_computed(AttrType::Bool);
    Schema::new()
        .attr("disable_scale_down", flag().describe("Disable the cluster autoscaler"))
        .attr(
            "scale_down_delay_after_add",
            string().describe("How long after scale up that scale down evaluation resumes"),
        )
        .attr("scale_down_unneeded_time", string().describe("How long a node should be unneeded before it is eligible for scale down"))
        .attr("estimator", string().describe("Type of resource estimator to be used in scale up"))
        .attr("expander", string().describe("Type of node group expander to be used in scale up"))
        .attr("ignore_daemonsets_utilization", flag())
        .attr("balance_similar_node_groups", flag())
        .attr("expendable_pods_priority_cutoff", Attribute::optional_computed(AttrType::Int))
        .attr("scale_down_utilization_threshold", Attribute::optional_computed(AttrType::Float))
        .attr("max_graceful_termination_sec", Attribute::optional_computed(AttrType::Int))
}

fn auto_upgrade_schema() -> Schema {
    Schema::new()
        .attr(
            "enable",
            Attribute::required(AttrType::Bool).describe("Enables the Kubernetes patch version auto upgrade"),
        )
        .attr(
            "maintenance_window_start_hour",
            Attribute::required(AttrType::Int).describe("Start hour of the 2-hour maintenance window"),
        )
        .attr(
            "maintenance_window_day",
            Attribute::required(AttrType::String).describe("Day of the maintenance window, or `any`"),
        )
}

fn open_id_connect_schema() -> Schema {
    Schema::new()
        .attr("issuer_url", Attribute::required(AttrType::String))
        .attr("client_id", Attribute::required(AttrType::String))
        .attr("username_claim", Attribute::optional(AttrType::String))
        .attr("username_prefix", Attribute::optional(AttrType::String))
        .attr("groups_claim", Attribute::optional(AttrType::list(AttrType::String)))
        .attr("groups_prefix", Attribute::optional(AttrType::String))
        .attr("required_claim", Attribute::optional(AttrType::list(AttrType::String)))
}

fn kubeconfig_schema() -> Schema {
    Schema::new()
        .attr("config_file", Attribute::computed(AttrType::String).sensitive())
        .attr("host", Attribute::computed(AttrType::String).sensitive())
        .attr("cluster_ca_certificate", Attribute::computed(AttrType::String).sensitive())
        .attr("token", Attribute::computed(AttrType::String).sensitive())
}

pub(crate) fn cluster_schema() -> Schema {
    Schema::new()
        .attr("name", Attribute::required(AttrType::String).describe("The name of the cluster"))
        .attr(
            "type",
            Attribute::optional_computed(AttrType::String).describe("The offer type of the cluster"),
        )
        .attr("description", Attribute::optional(AttrType::String))
        .attr(
            "version",
            Attribute::required(AttrType::String).describe("The Kubernetes version, full or minor with auto upgrade"),
        )
        .attr(
            "cni",
            Attribute::required(AttrType::String)
                .describe("The Container Network Interface of the cluster")
                .force_new(),
        )
        .attr("tags", tags_attr())
        .attr(
            "autoscaler_config",
            Attribute::optional_computed(AttrType::blocks(autoscaler_schema())).max_items(1),
        )
        .attr(
            "auto_upgrade",
            Attribute::optional_computed(AttrType::blocks(auto_upgrade_schema())).max_items(1),
        )
        .attr("feature_gates", Attribute::optional(AttrType::set(AttrType::String)))
        .attr("admission_plugins", Attribute::optional(AttrType::set(AttrType::String)))
        .attr(
            "apiserver_cert_sans",
            Attribute::optional(AttrType::set(AttrType::String))
                .describe("Additional Subject Alternative Names for the API server certificate"),
        )
        .attr(
            "open_id_connect_config",
            Attribute::optional(AttrType::blocks(open_id_connect_schema())).max_items(1),
        )
        .attr(
            "private_network_id",
            reference_attr("The private network the cluster nodes are attached to"),
        )
        .attr(
            "pod_cidr",
            Attribute::optional_computed(AttrType::String).force_new().validate(validate_cidr),
        )
        .attr(
            "service_cidr",
            Attribute::optional_computed(AttrType::String).force_new().validate(validate_cidr),
        )
        .attr(
            "service_dns_ip",
            Attribute::optional_computed(AttrType::String).force_new().validate(validate_ip),
        )
        .attr(
            "delete_additional_resources",
            Attribute::optional(AttrType::Bool)
                .describe("Delete the volumes and load balancers created by the cluster on deletion")
                .default_value(false),
        )
        .attr("region", region_attr())
        .attr("project_id", project_id_attr())
        .attr("organization_id", organization_id_attr())
        .attr("apiserver_url", Attribute::computed(AttrType::String))
        .attr("wildcard_dns", Attribute::computed(AttrType::String))
        .attr(
            "kubeconfig",
            Attribute::computed(AttrType::blocks(kubeconfig_schema())).sensitive(),
        )
        .attr("status", Attribute::computed(AttrType::String))
        .attr("upgrade_available", Attribute::computed(AttrType::Bool))
        .attr("created_at", timestamp_attr("The date and time of the creation of the cluster"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the cluster"))
}

fn expand_autoscaler(block: &Block) -> AutoscalerConfig {
    AutoscalerConfig {
        scale_down_disabled: block_bool(block, "disable_scale_down"),
        scale_down_delay_after_add: block_str(block, "scale_down_delay_after_add"),
        estimator: block_str(block, "estimator"),
        expander: block_str(block, "expander"),
        ignore_daemonsets_utilization: block_bool(block, "ignore_daemonsets_utilization"),
        balance_similar_node_groups: block_bool(block, "balance_similar_node_groups"),
        expendable_pods_priority_cutoff: block.value("expendable_pods_priority_cutoff").as_int().unwrap_or(0),
        scale_down_unneeded_time: block_str(block, "scale_down_unneeded_time"),
        scale_down_utilization_threshold: block
            .value("scale_down_utilization_threshold")
            .as_float()
            .unwrap_or(0.0),
        max_graceful_termination_sec: block_u32(block, "max_graceful_termination_sec"),
    }
}

fn flatten_autoscaler(config: &AutoscalerConfig) -> Value {
    flatten_single_block(
        Block::new()
            .with("disable_scale_down", config.scale_down_disabled)
            .with("scale_down_delay_after_add", config.scale_down_delay_after_add.as_str())
            .with("scale_down_unneeded_time", config.scale_down_unneeded_time.as_str())
            .with("estimator", config.estimator.as_str())
            .with("expander", config.expander.as_str())
            .with("ignore_daemonsets_utilization", config.ignore_daemonsets_utilization)
            .with("balance_similar_node_groups", config.balance_similar_node_groups)
            .with("expendable_pods_priority_cutoff", config.expendable_pods_priority_cutoff)
            .with("scale_down_utilization_threshold", config.scale_down_utilization_threshold)
            .with("max_graceful_termination_sec", config.max_graceful_termination_sec),
    )
}

fn expand_auto_upgrade(block: &Block) -> AutoUpgrade {
    AutoUpgrade {
        enable: block_bool(block, "enable"),
        maintenance_window: MaintenanceWindow {
            start_hour: block_u32(block, "maintenance_window_start_hour"),
            day: block_str(block, "maintenance_window_day"),
        },
    }
}

fn flatten_auto_upgrade(auto_upgrade: &AutoUpgrade) -> Value {
    flatten_single_block(
        Block::new()
            .with("enable", auto_upgrade.enable)
            .with("maintenance_window_start_hour", auto_upgrade.maintenance_window.start_hour)
            .with("maintenance_window_day", auto_upgrade.maintenance_window.day.as_str()),
    )
}

fn expand_open_id_connect(block: &Block) -> OpenIdConnectConfig {
    let list = |key: &str| Some(expand_strings(block.value(key))).filter(|l| !l.is_empty());
    OpenIdConnectConfig {
        issuer_url: block_str(block, "issuer_url"),
        client_id: block_str(block, "client_id"),
        username_claim: block_opt(block, "username_claim"),
        username_prefix: block_opt(block, "username_prefix"),
        groups_claim: list("groups_claim"),
        groups_prefix: block_opt(block, "groups_prefix"),
        required_claim: list("required_claim"),
    }
}

fn flatten_open_id_connect(config: &OpenIdConnectConfig) -> Value {
    if config.issuer_url.is_empty() {
        return Value::List(Vec::new());
    }
    flatten_single_block(
        Block::new()
            .with("issuer_url", config.issuer_url.as_str())
            .with("client_id", config.client_id.as_str())
            .with("username_claim", config.username_claim.clone())
            .with("username_prefix", config.username_prefix.clone())
            .with("groups_claim", flatten_strings(config.groups_claim.as_deref().unwrap_or_default()))
            .with("groups_prefix", config.groups_prefix.clone())
            .with("required_claim", flatten_strings(config.required_claim.as_deref().unwrap_or_default())),
    )
}

/// Write every vendor-owned field of `cluster` into `data`.
pub(crate) fn flatten_cluster(data: &mut ResourceData, region: &Region, cluster: &Cluster) {
    let auto_upgrade = cluster.auto_upgrade.enable;
    data.set("name", cluster.name.as_str());
    data.set("type", cluster.cluster_type.as_str());
    data.set("description", cluster.description.as_str());
    data.set("version", version::state_form(&cluster.version, auto_upgrade));
    data.set("cni", cluster.cni.as_str());
    data.set("tags", flatten_strings(&cluster.tags));
    data.set("autoscaler_config", flatten_autoscaler(&cluster.autoscaler_config));
    data.set("auto_upgrade", flatten_auto_upgrade(&cluster.auto_upgrade));
    data.set("feature_gates", flatten_string_set(&cluster.feature_gates));
    data.set("admission_plugins", flatten_string_set(&cluster.admission_plugins));
    data.set("apiserver_cert_sans", flatten_string_set(&cluster.apiserver_cert_sans));
    data.set("open_id_connect_config", flatten_open_id_connect(&cluster.open_id_connect_config));
    data.set("private_network_id", regional_ref(region, cluster.private_network_id.as_deref()));
    data.set("pod_cidr", cluster.pod_cidr.as_str());
    data.set("service_cidr", cluster.service_cidr.as_str());
    data.set("service_dns_ip", cluster.service_dns_ip.as_str());
    data.set("region", region.as_str());
    data.set("project_id", cluster.project_id.as_str());
    data.set("organization_id", cluster.organization_id.as_str());
    data.set("apiserver_url", cluster.cluster_url.as_str());
    data.set("wildcard_dns", cluster.dns_wildcard.as_str());
    data.set("status", cluster.status.as_str());
    data.set("upgrade_available", cluster.upgrade_available);
    data.set("created_at", flatten_time(cluster.created_at.as_ref()));
    data.set("updated_at", flatten_time(cluster.updated_at.as_ref()));
}

/// Fetch the admin kubeconfig. Missing permissions only cost a warning.
pub(crate) async fn read_kubeconfig(
    api: &dyn K8sApi,
    region: &Region,
    cluster_id: &str,
    data: &mut ResourceData,
) -> Result<()> {
    match api.get_kubeconfig(region, cluster_id).await {
        Ok(raw) => {
            let kubeconfig = Kubeconfig::parse(&raw)
                .map_err(|e| ProviderError::Internal(format!("decoding kubeconfig of cluster {cluster_id}: {e}")))?;
            data.set(
                "kubeconfig",
                flatten_single_block(
                    Block::new()
                        .with("config_file", kubeconfig.config_file)
                        .with("host", kubeconfig.host)
                        .with("cluster_ca_certificate", kubeconfig.cluster_ca_certificate)
                        .with("token", kubeconfig.token),
                ),
            );
            Ok(())
        }
        Err(err) if err.is_forbidden() => {
            warn!(cluster_id, "Not allowed to read the cluster kubeconfig");
            data.warn(format!("Cannot read the kubeconfig of cluster {cluster_id}: {err}"), "kubeconfig");
            Ok(())
        }
        Err(err) => Err(err),
    }
}

async fn available_versions(api: &dyn K8sApi, region: &Region) -> Result<Vec<String>> {
    Ok(api.list_versions(region).await?.into_iter().map(|v| v.name).collect())
}

pub struct ClusterResource {
    api: Arc<dyn K8sApi>,
}

impl ClusterResource {
    pub fn new(api: Arc<dyn K8sApi>) -> Self {
        Self { api }
    }

    fn update_request(data: &ResourceData) -> UpdateClusterRequest {
        UpdateClusterRequest {
            name: data.get_updated("name", value_string),
            description: data.get_updated("description", value_string),
            tags: data.get_updated("tags", expand_strings),
            autoscaler_config: data.get_updated("autoscaler_config", |v| {
                expand_single_block(v).map(expand_autoscaler).unwrap_or_default()
            }),
            auto_upgrade: data.get_updated("auto_upgrade", |v| {
                expand_single_block(v).map(expand_auto_upgrade).unwrap_or_default()
            }),
            feature_gates: data.get_updated("feature_gates", expand_string_set),
            admission_plugins: data.get_updated("admission_plugins", expand_string_set),
            open_id_connect_config: data.get_updated("open_id_connect_config", |v| {
                expand_single_block(v).map(expand_open_id_connect).unwrap_or_default()
            }),
            apiserver_cert_sans: data.get_updated("apiserver_cert_sans", expand_string_set),
        }
    }
}

#[async_trait]
impl Resource for ClusterResource {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_cluster"
    }

    fn schema(&self) -> Schema {
        cluster_schema().with_timeouts()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::uniform(Duration::from_secs(15 * 60))
    }

    async fn customize_diff(&self, ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        if let Some(requested) = diff.get("version").as_str() {
            let auto_upgrade = diff.get("auto_upgrade.0.enable").as_bool().unwrap_or(false);
            version::check_auto_upgrade(requested, auto_upgrade)?;
        }

        let region = match diff.get("region").as_str() {
            Some(region) => Region::parse(region)?,
            None => ctx.config.default_region.clone(),
        };
        if let Some(private_network) = diff.get("private_network_id").as_str() {
            locality::check_locality("private_network_id", &Locality::Region(region.clone()), private_network)?;
        }

        if diff.is_new_resource() {
            return Ok(());
        }

        // Attaching a first private network migrates in place; any other change recreates.
        if diff.has_change("private_network_id") && !diff.get_old("private_network_id").is_zero() {
            diff.force_new("private_network_id");
        }

        if diff.has_change("type") {
            let id = diff.id().map(str::to_string);
            let new_type = diff.get("type").as_str().map(str::to_string);
            if let (Some(id), Some(new_type)) = (id, new_type) {
                let (_, cluster_id) = ctx.region_from_id(&id)?;
                let types = self.api.list_cluster_available_types(&region, &cluster_id).await?;
                if !types.iter().any(|t| t.name == new_type) {
                    info!(%cluster_id, %new_type, "Cluster cannot migrate to this type, it will be replaced");
                    diff.force_new("type");
                }
            }
        }

        for (key, default) in NETWORK_DEFAULTS {
            if diff.is_set_in_config(key) {
                continue;
            }
            let old = diff.get_old(key).as_str().map(str::to_string);
            if let Some(old) = old.filter(|v| !v.is_empty() && v != default) {
                diff.warn(
                    format!("{key} is {old} while the default is {default}; declare it to keep it if the cluster is replaced"),
                    key,
                );
            }
        }

        if diff.has_change("version") || diff.has_change("type") {
            diff.set_new_computed("status");
            diff.set_new_computed("upgrade_available");
        }
        Ok(())
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = ctx.region(data)?;
        let project_id = require_project(ctx, data)?;
        let available = available_versions(self.api.as_ref(), &region).await?;
        let target = version::resolve(&get_string(data, "version"), &available)?;

        let req = CreateClusterRequest {
            project_id,
            cluster_type: get_string(data, "type"),
            name: get_string(data, "name"),
            description: get_string(data, "description"),
            tags: expand_strings(data.get("tags")),
            version: target,
            cni: get_string(data, "cni"),
            autoscaler_config: expand_single_block(data.get("autoscaler_config")).map(expand_autoscaler),
            auto_upgrade: expand_single_block(data.get("auto_upgrade")).map(expand_auto_upgrade),
            feature_gates: expand_string_set(data.get("feature_gates")),
            admission_plugins: expand_string_set(data.get("admission_plugins")),
            open_id_connect_config: expand_single_block(data.get("open_id_connect_config")).map(expand_open_id_connect),
            apiserver_cert_sans: expand_string_set(data.get("apiserver_cert_sans")),
            private_network_id: expand_ref(data, "private_network_id"),
            pod_cidr: data.get_str("pod_cidr").map(str::to_string),
            service_cidr: data.get_str("service_cidr").map(str::to_string),
            service_dns_ip: data.get_str("service_dns_ip").map(str::to_string),
        };

        let cluster = self.api.create_cluster(&region, &req).await?;
        info!(id = %cluster.id, region = %region, version = %req.version, "Created cluster");
        data.set_id(regional_id(&region, &cluster.id));

        wait_for_cluster(ctx, self.api.as_ref(), &region, &cluster.id).await?;
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let cluster = self.api.get_cluster(&region, &id).await?;
        flatten_cluster(data, &region, &cluster);
        if data.get("delete_additional_resources").is_null() {
            data.set("delete_additional_resources", false);
        }
        read_kubeconfig(self.api.as_ref(), &region, &id, data).await
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let api = self.api.as_ref();
        wait_for_cluster(ctx, api, &region, &id).await?;

        let req = Self::update_request(data);
        if !req.is_empty() {
            info!(%id, "Updating cluster settings");
            api.update_cluster(&region, &id, &req).await?;
            wait_for_cluster(ctx, api, &region, &id).await?;
        }

        let attach = data.has_change("private_network_id") && data.get_change("private_network_id").0.is_zero();
        if let Some(private_network_id) = expand_ref(data, "private_network_id").filter(|_| attach) {
            info!(%id, %private_network_id, "Migrating cluster to a private network");
            api.migrate_to_private_network(&region, &id, &private_network_id).await?;
            wait_for_cluster(ctx, api, &region, &id).await?;
        }

        if data.has_change("type") {
            let cluster_type = get_string(data, "type");
            info!(%id, %cluster_type, "Changing cluster type");
            api.set_cluster_type(&region, &id, &cluster_type).await?;
            wait_for_cluster_and_pools(ctx, api, &region, &id).await?;
        }

        if data.has_change("version") {
            let available = available_versions(api, &region).await?;
            let target = version::resolve(&get_string(data, "version"), &available)?;
            let current = api.get_cluster(&region, &id).await?;
            if current.version != target {
                info!(%id, from = %current.version, to = %target, "Upgrading cluster");
                let req = UpgradeClusterRequest {
                    version: target,
                    upgrade_pools: true,
                };
                api.upgrade_cluster(&region, &id, &req).await?;
                wait_for_cluster_and_pools(ctx, api, &region, &id).await?;
            }
        }

        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let api = self.api.as_ref();
        wait_for_cluster(ctx, api, &region, &id).await?;
        let with_additional_resources = data.get_bool("delete_additional_resources");
        info!(%id, with_additional_resources, "Deleting cluster");
        api.delete_cluster(&region, &id, with_additional_resources).await?;
        wait_for_cluster_deleted(ctx, api, &region, &id).await
    }
}

pub struct ClusterDataSource {
    api: Arc<dyn K8sApi>,
}

impl ClusterDataSource {
    pub fn new(api: Arc<dyn K8sApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for ClusterDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_cluster"
    }

    fn schema(&self) -> Schema {
        cluster_schema()
            .to_data_source(&["name", "region", "project_id"])
            .attr(
                "cluster_id",
                Attribute::optional(AttrType::String)
                    .describe("The id of the cluster")
                    .validate(validate_reference)
                    .conflicts_with(&["name"]),
            )
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let cluster_id = data.get_str("cluster_id").map(str::to_string);
        let (region, cluster) = match cluster_id {
            Some(id) => {
                let (region, id) = ctx.region_from_id(&id)?;
                let cluster = self.api.get_cluster(&region, &id).await?;
                (region, cluster)
            }
            None => {
                let region = ctx.region(data)?;
                let name = data
                    .get_str("name")
                    .map(str::to_string)
                    .ok_or_else(|| ProviderError::invalid_attribute("name", "one of cluster_id or name must be set"))?;
                let project_id = data.get_str("project_id").map(str::to_string);
                let clusters = self
                    .api
                    .list_clusters(&region, project_id.as_deref(), Some(&name))
                    .await?;
                let cluster = lookup::find_exact(clusters, "cluster", &name, |c| c.name.as_str())?;
                (region, cluster)
            }
        };

        let id = regional_id(&region, &cluster.id);
        data.set_id(id.as_str());
        data.set("cluster_id", id);
        flatten_cluster(data, &region, &cluster);
        read_kubeconfig(self.api.as_ref(), &region, &cluster.id, data).await
    }
}
