use schemars::JsonSchema;
use serde::{Deserialize, Serialize};

/// One rule of a VPC ACL
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub struct AclRule {
    pub protocol: AclProtocol,

    /// Source CIDR
    pub source: String,

    #[serde(default)]
    pub src_port_low: u32,

    #[serde(default)]
    pub src_port_high: u32,

    /// Destination CIDR
    pub destination: String,

    #[serde(default)]
    pub dst_port_low: u32,

    #[serde(default)]
    pub dst_port_high: u32,

    pub action: AclAction,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "UPPERCASE")]
pub enum AclProtocol {
    #[default]
    Any,
    Tcp,
    Udp,
    Icmp,
}

impl AclProtocol {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclProtocol::Any => "ANY",
            AclProtocol::Tcp => "TCP",
            AclProtocol::Udp => "UDP",
            AclProtocol::Icmp => "ICMP",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_uppercase().as_str() {
            "ANY" => Some(AclProtocol::Any),
            "TCP" => Some(AclProtocol::Tcp),
            "UDP" => Some(AclProtocol::Udp),
            "ICMP" => Some(AclProtocol::Icmp),
            _ => None,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum AclAction {
    #[default]
    Accept,
    Drop,
}

impl AclAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            AclAction::Accept => "accept",
            AclAction::Drop => "drop",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "accept" => Some(AclAction::Accept),
            "drop" => Some(AclAction::Drop),
            _ => None,
        }
    }
}

/// The ACL of one IP family of a VPC
#[derive(Clone, Debug, Default, Serialize, Deserialize, JsonSchema)]
pub struct GetAclResponse {
    #[serde(default)]
    pub rules: Vec<AclRule>,

    #[serde(default)]
    pub default_policy: AclAction,
}

/// Replaces the rules and default policy of one IP family.
#[derive(Clone, Debug, Default, Serialize)]
pub struct SetAclRequest {
    pub rules: Vec<AclRule>,
    pub is_ipv6: bool,
    pub default_policy: AclAction,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rule_wire_format() {
        let rule: AclRule = serde_json::from_value(serde_json::json!({
            "protocol": "TCP",
            "source": "0.0.0.0/0",
            "src_port_low": 0,
            "src_port_high": 0,
            "destination": "10.0.0.0/24",
            "dst_port_low": 22,
            "dst_port_high": 22,
            "action": "drop"
        }))
        .unwrap();
        assert_eq!(rule.protocol, AclProtocol::Tcp);
        assert_eq!(rule.action, AclAction::Drop);
        assert_eq!(AclProtocol::parse("icmp"), Some(AclProtocol::Icmp));
    }
}
