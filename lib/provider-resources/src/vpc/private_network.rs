//! `scaleway_vpc_private_network`

use crate::common::*;
use async_trait::async_trait;
use ipnetwork::IpNetwork;
use provider_api::vpc::{CreatePrivateNetworkRequest, PrivateNetwork, Subnet, UpdatePrivateNetworkRequest};
use provider_client::VpcApi;
use provider_core::codec::{expand_blocks, expand_single_block, expand_strings, flatten_strings, flatten_time};
use provider_core::{
    lookup, AttrType, Attribute, Block, DataSource, HookContext, ProviderError, Region, Resource, ResourceData,
    Result, Schema, StatusClass, Value,
};
use std::collections::BTreeSet;
use std::sync::Arc;
use tracing::{debug, info};

fn subnet_schema(force_new: bool) -> Schema {
    let mut subnet = Attribute::optional_computed(AttrType::String)
        .describe("The subnet in CIDR notation")
        .validate(validate_cidr);
    if force_new {
        subnet = subnet.force_new();
    }
    Schema::new()
        .attr("id", Attribute::computed(AttrType::String))
        .attr("subnet", subnet)
        .attr("address", Attribute::computed(AttrType::String).describe("The network address"))
        .attr("subnet_mask", Attribute::computed(AttrType::String))
        .attr("prefix_length", Attribute::computed(AttrType::Int))
        .attr("created_at", Attribute::computed(AttrType::String))
        .attr("updated_at", Attribute::computed(AttrType::String))
}

pub(crate) fn private_network_schema() -> Schema {
    Schema::new()
        .attr(
            "name",
            Attribute::optional_computed(AttrType::String).describe("The name of the private network"),
        )
        .attr("tags", tags_attr())
        .attr(
            "vpc_id",
            Attribute::optional_computed(AttrType::String)
                .describe("The VPC the private network belongs to; the default VPC when unset")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr(
            "ipv4_subnet",
            Attribute::optional_computed(AttrType::blocks(subnet_schema(true)))
                .describe("The IPv4 subnet; allocated by the vendor when unset")
                .max_items(1),
        )
        .attr(
            "ipv6_subnets",
            Attribute::optional_computed(AttrType::block_set(subnet_schema(false)))
                .describe("The IPv6 subnets"),
        )
        .attr(
            "enable_default_route_propagation",
            Attribute::optional_computed(AttrType::Bool)
                .describe("Propagate the default route to the resources attached to the network"),
        )
        .attr("dhcp_enabled", Attribute::computed(AttrType::Bool))
        .attr("region", region_attr())
        .attr("project_id", project_id_attr())
        .attr("organization_id", organization_id_attr())
        .attr("created_at", timestamp_attr("The date and time of the creation of the private network"))
        .attr("updated_at", timestamp_attr("The date and time of the last update of the private network"))
}

fn is_ipv6(cidr: &str) -> bool {
    cidr.contains(':')
}

fn flatten_subnet(subnet: &Subnet) -> Block {
    let mut block = Block::new()
        .with("id", subnet.id.as_str())
        .with("subnet", subnet.subnet.as_str())
        .with("created_at", flatten_time(subnet.created_at.as_ref()))
        .with("updated_at", flatten_time(subnet.updated_at.as_ref()));
    if let Ok(net) = subnet.subnet.parse::<IpNetwork>() {
        block.insert("address", net.network().to_string());
        block.insert("subnet_mask", net.mask().to_string());
        block.insert("prefix_length", i64::from(net.prefix()));
    }
    block
}

/// Split vendor subnets into the IPv4 block list and the IPv6 block set.
fn flatten_subnets(subnets: &[Subnet]) -> (Value, Value) {
    let (v6, v4): (Vec<&Subnet>, Vec<&Subnet>) = subnets.iter().partition(|s| is_ipv6(&s.subnet));
    let ipv4 = Value::List(v4.first().map(|s| Value::Block(flatten_subnet(s))).into_iter().collect());
    let mut v6: Vec<Block> = v6.into_iter().map(flatten_subnet).collect();
    v6.sort_by(|a, b| block_str(a, "subnet").cmp(&block_str(b, "subnet")));
    (ipv4, Value::Set(v6.into_iter().map(Value::Block).collect()))
}

/// Declared subnets of both families, in CIDR notation
fn expand_subnets(data: &ResourceData) -> Vec<String> {
    let ipv4 = expand_single_block(data.get("ipv4_subnet")).and_then(|b| block_opt(b, "subnet"));
    ipv4.into_iter().chain(declared_ipv6(data.get("ipv6_subnets"))).collect()
}

fn declared_ipv6(value: &Value) -> BTreeSet<String> {
    expand_blocks(value)
        .into_iter()
        .filter_map(|b| block_opt(b, "subnet"))
        .map(|s| canonical_cidr(&s))
        .collect()
}

/// Subnets to add and to remove to move from `old` to `new`.
fn subnet_delta(old: &Value, new: &Value) -> (Vec<String>, Vec<String>) {
    let old = declared_ipv6(old);
    let new = declared_ipv6(new);
    let added = new.difference(&old).cloned().collect();
    let removed = old.difference(&new).cloned().collect();
    (added, removed)
}

pub(crate) fn flatten_private_network(data: &mut ResourceData, region: &Region, pn: &PrivateNetwork) {
    let (ipv4, ipv6) = flatten_subnets(&pn.subnets);
    data.set("name", pn.name.as_str());
    data.set("tags", flatten_strings(&pn.tags));
    data.set("vpc_id", regional_ref(region, Some(&pn.vpc_id)));
    data.set("ipv4_subnet", ipv4);
    data.set("ipv6_subnets", ipv6);
    data.set("enable_default_route_propagation", pn.default_route_propagation_enabled);
    data.set("dhcp_enabled", pn.dhcp_enabled);
    data.set("region", region.as_str());
    data.set("project_id", pn.project_id.as_str());
    data.set("organization_id", pn.organization_id.as_str());
    data.set("created_at", flatten_time(pn.created_at.as_ref()));
    data.set("updated_at", flatten_time(pn.updated_at.as_ref()));
}

pub struct PrivateNetworkResource {
    api: Arc<dyn VpcApi>,
}

impl PrivateNetworkResource {
    pub fn new(api: Arc<dyn VpcApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl Resource for PrivateNetworkResource {
    fn type_name(&self) -> &'static str {
        "scaleway_vpc_private_network"
    }

    fn schema(&self) -> Schema {
        private_network_schema().with_timeouts()
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "vpc_id")?;
        let req = CreatePrivateNetworkRequest {
            name: get_string(data, "name"),
            project_id: require_project(ctx, data)?,
            tags: expand_strings(data.get("tags")),
            subnets: expand_subnets(data),
            vpc_id: expand_ref(data, "vpc_id"),
            default_route_propagation_enabled: data.get_bool("enable_default_route_propagation"),
        };
        let pn = self.api.create_private_network(&region, &req).await?;
        info!(id = %pn.id, name = %pn.name, vpc_id = %pn.vpc_id, "Created private network");
        data.set_id(regional_id(&region, &pn.id));
        self.read(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let pn = self.api.get_private_network(&region, &id).await?;
        flatten_private_network(data, &region, &pn);
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let req = UpdatePrivateNetworkRequest {
            name: data.get_updated("name", value_string),
            tags: data.get_updated("tags", expand_strings),
            default_route_propagation_enabled: data
                .get_updated("enable_default_route_propagation", |v| v.as_bool().unwrap_or(false)),
        };
        if !req.is_empty() {
            self.api.update_private_network(&region, &id, &req).await?;
        }

        if data.has_change("ipv6_subnets") {
            let (old, new) = data.get_change("ipv6_subnets");
            let (added, removed) = subnet_delta(old, new);
            if !added.is_empty() {
                info!(%id, subnets = ?added, "Adding subnets to private network");
                self.api.add_subnets(&region, &id, added).await?;
            }
            if !removed.is_empty() {
                info!(%id, subnets = ?removed, "Removing subnets from private network");
                self.api.delete_subnets(&region, &id, removed).await?;
            }
        }
        self.read(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, id) = regional_state_id(ctx, data)?;
        let api = self.api.as_ref();
        info!(%id, "Deleting private network");
        // Deletion is refused while attached resources are still detaching,
        // so the call itself is retried until accepted.
        ctx.waiter("private network", &id)
            .tolerate_not_found()
            .wait(|| api.delete_private_network(&region, &id), |_| StatusClass::Success)
            .await?;
        debug!(%id, "Private network deleted");
        Ok(())
    }
}

pub struct PrivateNetworkDataSource {
    api: Arc<dyn VpcApi>,
}

impl PrivateNetworkDataSource {
    pub fn new(api: Arc<dyn VpcApi>) -> Self {
        Self { api }
    }
}

#[async_trait]
impl DataSource for PrivateNetworkDataSource {
    fn type_name(&self) -> &'static str {
        "scaleway_vpc_private_network"
    }

    fn schema(&self) -> Schema {
        private_network_schema()
            .to_data_source(&["name", "vpc_id", "region", "project_id"])
            .attr(
                "private_network_id",
                Attribute::optional(AttrType::String)
                    .describe("The id of the private network")
                    .validate(validate_reference)
                    .conflicts_with(&["name"]),
            )
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let pn_id = data.get_str("private_network_id").map(str::to_string);
        let (region, pn) = match pn_id {
            Some(id) => {
                let (region, id) = ctx.region_from_id(&id)?;
                let pn = self.api.get_private_network(&region, &id).await?;
                (region, pn)
            }
            None => {
                let region = region_of(ctx, data, "vpc_id")?;
                let name = data.get_str("name").map(str::to_string).ok_or_else(|| {
                    ProviderError::invalid_attribute("name", "one of private_network_id or name must be set")
                })?;
                let project_id = data.get_str("project_id").map(str::to_string);
                let vpc_id = expand_ref(data, "vpc_id");
                let networks = self
                    .api
                    .list_private_networks(&region, project_id.as_deref(), Some(&name), vpc_id.as_deref())
                    .await?;
                let pn = lookup::find_exact(networks, "private network", &name, |p| p.name.as_str())?;
                (region, pn)
            }
        };

        let id = regional_id(&region, &pn.id);
        data.set_id(id.as_str());
        data.set("private_network_id", id);
        flatten_private_network(data, &region, &pn);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn subnet(cidr: &str) -> Subnet {
        Subnet {
            id: format!("id-{cidr}"),
            subnet: cidr.to_string(),
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_subnets_split_by_family() {
        let (ipv4, ipv6) = flatten_subnets(&[
            subnet("fd46:78ab:30b8:177c::/64"),
            subnet("172.16.32.0/22"),
            subnet("fd46:78ab:30b8:1111::/64"),
        ]);
        let v4 = expand_single_block(&ipv4).expect("one ipv4 block");
        assert_eq!(block_str(v4, "subnet"), "172.16.32.0/22");
        assert_eq!(block_str(v4, "address"), "172.16.32.0");
        assert_eq!(block_str(v4, "subnet_mask"), "255.255.252.0");
        assert_eq!(v4.value("prefix_length").as_int(), Some(22));

        let v6: Vec<String> = expand_blocks(&ipv6).into_iter().map(|b| block_str(b, "subnet")).collect();
        assert_eq!(v6, vec!["fd46:78ab:30b8:1111::/64", "fd46:78ab:30b8:177c::/64"]);
    }

    #[test]
    fn test_ipv6_delta() {
        let set = |cidrs: &[&str]| {
            Value::Set(
                cidrs
                    .iter()
                    .map(|c| Value::Block(Block::new().with("subnet", *c)))
                    .collect(),
            )
        };
        let (added, removed) = subnet_delta(
            &set(&["fd00:1::/64", "fd00:2::/64"]),
            &set(&["fd00:2::/64", "fd00:3::/64"]),
        );
        assert_eq!(added, vec!["fd00:3::/64"]);
        assert_eq!(removed, vec!["fd00:1::/64"]);

        let (added, removed) = subnet_delta(&Value::Null, &Value::Null);
        assert!(added.is_empty() && removed.is_empty());
    }
}
