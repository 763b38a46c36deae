//! `scaleway_k8s_acl`
//!
//! The vendor only exposes "replace every rule" for a cluster's API server
//! ACL, so create and update both commit the whole declared set at once.
//! Deleting the resource reopens the API server to every address.

use super::waiters::wait_for_cluster;
use crate::common::*;
use async_trait::async_trait;
use provider_api::k8s::{AclRule, AclRuleRequest};
use provider_client::K8sApi;
use provider_core::codec::expand_blocks;
use provider_core::locality;
use provider_core::{
    AttrType, Attribute, Block, HookContext, ProviderError, Resource, ResourceData, ResourceDiff, Result, Schema,
    Timeouts, Value,
};
use std::cmp::Ordering;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Description of the open rule left behind when the resource is deleted
pub const OPEN_RULE_DESCRIPTION: &str = "Automatically generated after scaleway_k8s_acl resource deletion";

const OPEN_CIDR: &str = "0.0.0.0/0";

fn rule_schema() -> Schema {
    Schema::new()
        .attr("id", Attribute::computed(AttrType::String).describe("The id of the rule"))
        .attr(
            "ip",
            Attribute::optional(AttrType::String)
                .describe("The IP range allowed to reach the API server, in CIDR notation")
                .validate(validate_cidr),
        )
        .attr(
            "scaleway_ranges",
            Attribute::optional(AttrType::Bool).describe("Allow the vendor's own address ranges"),
        )
        .attr("description", Attribute::optional(AttrType::String))
}

fn acl_schema() -> Schema {
    Schema::new()
        .attr(
            "cluster_id",
            Attribute::required(AttrType::String)
                .describe("The cluster whose API server the rules protect")
                .force_new()
                .validate(validate_reference)
                .diff_suppress(suppress_locality),
        )
        .attr("region", region_attr())
        .attr("acl_rules", Attribute::optional(AttrType::block_set(rule_schema())))
        .attr(
            "no_ip_allowed",
            Attribute::optional(AttrType::Bool)
                .describe("Refuse every address; no rule may be declared")
                .default_value(false)
                .conflicts_with(&["acl_rules"]),
        )
}

fn expand_rule(block: &Block) -> AclRuleRequest {
    AclRuleRequest {
        ip: block_opt(block, "ip"),
        scaleway_ranges: block.value("scaleway_ranges").as_bool().filter(|b| *b),
        description: block_str(block, "description"),
    }
}

/// The rule list to commit: empty when no address is allowed.
fn expand_rules(data: &ResourceData) -> Vec<AclRuleRequest> {
    if data.get_bool("no_ip_allowed") {
        return Vec::new();
    }
    expand_blocks(data.get("acl_rules")).into_iter().map(expand_rule).collect()
}

fn compare_rules(a: &AclRule, b: &AclRule) -> Ordering {
    let key = |r: &AclRule| {
        (
            r.ip.as_deref().map(canonical_cidr).unwrap_or_default(),
            r.scaleway_ranges.unwrap_or(false),
            r.description.clone(),
        )
    };
    key(a).cmp(&key(b))
}

fn flatten_rule(rule: &AclRule) -> Value {
    Value::Block(
        Block::new()
            .with("id", rule.id.as_str())
            .with("ip", rule.ip.clone())
            .with("scaleway_ranges", rule.scaleway_ranges.unwrap_or(false))
            .with("description", rule.description.as_str()),
    )
}

fn check_rules(diff: &ResourceDiff<'_>) -> Result<()> {
    let rules = diff.get("acl_rules");
    let items = rules.as_items().unwrap_or(&[]);
    for (i, item) in items.iter().enumerate() {
        let Some(block) = item.as_block() else { continue };
        if block.value("ip").is_unknown() || block.value("scaleway_ranges").is_unknown() {
            continue;
        }
        let has_ip = block_opt(block, "ip").is_some();
        let has_ranges = block_bool(block, "scaleway_ranges");
        if has_ip == has_ranges {
            return Err(ProviderError::invalid_attribute(
                format!("acl_rules.{i}"),
                "a rule sets exactly one of ip and scaleway_ranges",
            ));
        }
    }
    let no_ip_allowed = diff.get("no_ip_allowed").as_bool().unwrap_or(false);
    if items.is_empty() && !no_ip_allowed && !rules.is_unknown() {
        return Err(ProviderError::invalid_attribute(
            "acl_rules",
            "declare at least one rule, or set no_ip_allowed",
        ));
    }
    Ok(())
}

pub struct AclResource {
    api: Arc<dyn K8sApi>,
}

impl AclResource {
    pub fn new(api: Arc<dyn K8sApi>) -> Self {
        Self { api }
    }

    async fn commit(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let region = region_of(ctx, data, "cluster_id")?;
        let cluster_id = locality::expand_id(&get_string(data, "cluster_id"));
        let rules = expand_rules(data);

        wait_for_cluster(ctx, self.api.as_ref(), &region, &cluster_id).await?;
        info!(%cluster_id, rules = rules.len(), "Replacing cluster ACL rules");
        self.api.set_cluster_acls(&region, &cluster_id, rules).await?;

        data.set_id(regional_id(&region, &cluster_id));
        self.read(ctx, data).await
    }
}

#[async_trait]
impl Resource for AclResource {
    fn type_name(&self) -> &'static str {
        "scaleway_k8s_acl"
    }

    fn schema(&self) -> Schema {
        acl_schema().with_timeouts()
    }

    fn timeouts(&self) -> Timeouts {
        Timeouts::uniform(Duration::from_secs(15 * 60))
    }

    async fn customize_diff(&self, _ctx: &HookContext, diff: &mut ResourceDiff<'_>) -> Result<()> {
        check_rules(diff)
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.commit(ctx, data).await
    }

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, cluster_id) = regional_state_id(ctx, data)?;
        let mut rules = self.api.list_cluster_acls(&region, &cluster_id).await?;
        rules.sort_by(compare_rules);

        data.set("cluster_id", regional_id(&region, &cluster_id));
        data.set("region", region.as_str());
        data.set("no_ip_allowed", rules.is_empty());
        data.set("acl_rules", Value::Set(rules.iter().map(flatten_rule).collect()));
        Ok(())
    }

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.commit(ctx, data).await
    }

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        let (region, cluster_id) = regional_state_id(ctx, data)?;
        let api = self.api.as_ref();
        wait_for_cluster(ctx, api, &region, &cluster_id).await?;

        let open = AclRuleRequest {
            ip: Some(OPEN_CIDR.to_string()),
            scaleway_ranges: None,
            description: OPEN_RULE_DESCRIPTION.to_string(),
        };
        info!(%cluster_id, "Reopening cluster API server to every address");
        api.set_cluster_acls(&region, &cluster_id, vec![open]).await?;
        wait_for_cluster(ctx, api, &region, &cluster_id).await?;
        Ok(())
    }
}
