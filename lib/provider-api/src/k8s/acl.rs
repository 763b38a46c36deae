use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// An ACL rule of a cluster's API server as returned by the vendor
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AclRule {
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    /// Expands server-side to the vendor's own address ranges
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleway_ranges: Option<bool>,

    #[serde(default)]
    pub description: String,
}

/// An ACL rule to commit. Exactly one of `ip` and `scaleway_ranges` is set.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AclRuleRequest {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ip: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scaleway_ranges: Option<bool>,

    #[serde(default)]
    pub description: String,
}

/// Replaces the whole rule list of a cluster.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SetAclRulesRequest {
    pub acls: Vec<AclRuleRequest>,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct ListAclRulesResponse {
    #[serde(default)]
    pub total_count: u64,
    pub rules: Vec<AclRule>,
}

crate::paginated!(ListAclRulesResponse, rules, AclRule);
