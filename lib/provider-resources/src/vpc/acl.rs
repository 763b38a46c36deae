//! `scaleway_vpc_acl`
//!
//! Like the cluster ACL, the rules of one IP family of a VPC can only be
//! replaced as a whole. Rules are ordered here: the first match wins.

use crate::common::*;
use async_trait::async_trait;
use provider_api::vpc::{AclAction, AclProtocol, AclRule, GetAclResponse, SetAclRequest};
use provider_client::VpcApi;
use provider_core::codec::expand_blocks;
use provider_core::locality;
use provider_core::{
    AttrType, Attribute, Block, HookContext, ProviderError, Region, Resource, ResourceData, ResourceDiff, Result,
    Schema, Value,
};
use std::sync::Arc;
use tracing::info;

fn validate_protocol(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if AclProtocol::parse(s).is_none() => Err(format!("{s:?} is not one of ANY, TCP, UDP, ICMP")),
        _ => Ok(()),
    }
}

fn validate_action(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if AclAction::parse(s).is_none() => Err(format!("{s:?} is not one of accept, drop")),
        _ => Ok(()),
    }
}

fn rule_schema() -> Schema {
    let port = || Attribute::optional(AttrType::Int);
    Schema::new()
        .attr(
            "protocol",
            Attribute::optional(AttrType::String)
                .default_value("ANY")
                .validate(validate_protocol),
        )
        .attr(
            "source",
            Attribute::required(AttrType::String)
                .describe("Source CIDR")
                .validate(validate_cidr),
        )
        .attr("src_port_low", port())
        .attr("src_port_high", port())
        .attr(
            "destination",
            Attribute::required(AttrType::String)
                .describe("Destination CIDR")
                .validate(validate_cidr),
        )
        .attr("dst_port_low", port())
        .attr("dst_port_high", port())
        .attr(
            "action",
            Attribute::required(AttrType::String)
                .describe("What happens to matching traffic: accept or drop")
                .validate(validate_action),
        )
        .attr("description", Attribute::optional(AttrType::String))
}

fn vpc_acl_schema() -> Schema {
    Schema::new()
        .attr(
            "vpc_id",
            Attribute::required(AttrType::String)
                .describe("The VPC the rules apply to")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr(
            "is_ipv6",
            Attribute::optional(AttrType::Bool)
                .describe("Whether the rules apply to IPv6 traffic")
                .default_value(false)
                .force_new(),
        )
        .attr(
            "default_policy",
            Attribute::required(AttrType::String)
                .describe("The action for traffic no rule matches: accept or drop")
                .validate(validate_action),
        )
        .attr("rules", Attribute::optional(AttrType::blocks(rule_schema())))
        .attr("region", region_attr())
}

fn expand_rule(block: &Block) -> AclRule {
    AclRule {
        protocol: block.value("protocol").as_str().and_then(AclProtocol::parse).unwrap_or_default(),
        source: block_str(block, "source"),
        src_port_low: block_u32(block, "src_port_low"),
        src_port_high: block_u32(block, "src_port_high"),
        destination: block_str(block, "destination"),
        dst_port_low: block_u32(block, "dst_port_low"),
        dst_port_high: block_u32(block, "dst_port_high"),
        action: block.value("action").as_str().and_then(AclAction::parse).unwrap_or_default(),
        description: block_opt(block, "description"),
    }
}

fn flatten_rule(rule: &AclRule) -> Value {
    Value::Block(
        Block::new()
            .with("protocol", rule.protocol.as_str())
            .with("source", canonical_cidr(&rule.source))
            .with("src_port_low", i64::from(rule.src_port_low))
            .with("src_port_high", i64::from(rule.src_port_high))
            .with("destination", canonical_cidr(&rule.destination))
            .with("dst_port_low", i64::from(rule.dst_port_low))
            .with("dst_port_high", i64::from(rule.dst_port_high))
            .with("action", rule.action.as_str())
            .with("description", rule.description.clone()),
    )
}

fn check_ports(diff: &ResourceDiff<'_>) -> Result<()> {
    let rules = diff.get("rules");
    for (i, block) in expand_blocks(rules).into_iter().enumerate() {
        for (low, high) in [("src_port_low", "src_port_high"), ("dst_port_low", "dst_port_high")] {
            let (lo, hi) = (block.value(low).as_int(), block.value(high).as_int());
            if let (Some(lo), Some(hi)) = (lo, hi) {
                if lo > hi {
                    return Err(ProviderError::invalid_attribute(
                        format!("rules.{i}.{low}"),
                        format!("{low} ({lo}) is above {high} ({hi})"),
                    ));
                }
            }
        }
    }
    Ok(())
}

pub struct VpcAclResource {
    api: Arc<dyn VpcApi>,
}

impl VpcAclResource {
    pub fn new(api: Arc<dyn VpcApi>) -> Self {
        Self { api }
    }

    async fn commit(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "vpc_id")?;
        let vpc_id = locality::expand_id(&get_string(data, "vpc_id"));
        let req = SetAclRequest {
            rules: expand_blocks(data.get("rules")).into_iter().map(expand_rule).collect(),
            is_ipv6: data.get_bool("is_ipv6"),
            default_policy: data
                .get_str("default_policy")
                .and_then(AclAction::parse)
                .unwrap_or_default(),
        };
        info!(%vpc_id, rules = req.rules.len(), is_ipv6 = req.is_ipv6, "Replacing VPC ACL rules");
        self.api.set_acl(&region, &vpc_id, &req).await?;

        data.set_id(regional_id(&region, &vpc_id));
        self.read(ctx, data).await
    }
}

fn flatten_acl(data: &mut ResourceData, region: &Region, vpc_id: &str, acl: &GetAclResponse) {
    data.set("vpc_id", regional_id(region, vpc_id));
    data.set("default_policy", acl.default_policy.as_str());
    data.set("rules", Value::List(acl.rules.iter().map(flatten_rule).collect()));
    data.set("region", region.as_str());
}

#[async_trait]
impl Resource for VpcAclResource {
    fn type_name(&self) -> &'static str {
        "scaleway_vpc_acl"
    }

    fn schema(&self) -> Schema {
        vpc_acl_schema().with_timeouts()
    }

    async fn customize_diff(&self, _ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        check_ports(diff)
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.commit(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, vpc_id) = regional_state_id(ctx, data)?;
        let acl = self.api.get_acl(&region, &vpc_id, data.get_bool("is_ipv6")).await?;
        flatten_acl(data, &region, &vpc_id, &acl);
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.commit(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, vpc_id) = regional_state_id(ctx, data)?;
        let req = SetAclRequest {
            rules: Vec::new(),
            is_ipv6: data.get_bool("is_ipv6"),
            default_policy: AclAction::Accept,
        };
        info!(%vpc_id, "Clearing VPC ACL rules");
        self.api.set_acl(&region, &vpc_id, &req).await?;
        Ok(())
    }
}
