//! Attributes and helpers shared by every binding

use ipnetwork::IpNetwork;
use provider_core::locality::{self, Locality, Region, Zone};
use provider_core::{AttrType, Attribute, Block, HookContext, ProviderError, ResourceData, Result, Value, VendorError};

pub type Validation = std::result::Result<(), String>;

pub fn region_attr() -> Attribute {
    Attribute::optional_computed(AttrType::String)
        .describe("The region of the resource")
        .force_new()
        .validate(validate_region)
}

pub fn zone_attr() -> Attribute {
    Attribute::optional_computed(AttrType::String)
        .describe("The zone of the resource")
        .force_new()
        .validate(validate_zone)
}

pub fn project_id_attr() -> Attribute {
    Attribute::optional_computed(AttrType::String)
        .describe("The project the resource belongs to")
        .force_new()
        .validate(validate_uuid)
}

pub fn organization_id_attr() -> Attribute {
    Attribute::computed(AttrType::String).describe("The organization the resource belongs to")
}

pub fn tags_attr() -> Attribute {
    Attribute::optional(AttrType::list(AttrType::String)).describe("Tags associated with the resource")
}

pub fn timestamp_attr(description: &'static str) -> Attribute {
    Attribute::computed(AttrType::String).describe(description)
}

/// A reference to another resource, by bare or scoped id
pub fn reference_attr(description: &'static str) -> Attribute {
    Attribute::optional(AttrType::String)
        .describe(description)
        .validate(validate_reference)
        .diff_suppress(suppress_locality)
}

pub fn validate_region(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) => Region::parse(s).map(|_| ()).map_err(|_| format!("{s:?} is not a region")),
        None => Ok(()),
    }
}

pub fn validate_zone(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) => Zone::parse(s).map(|_| ()).map_err(|_| format!("{s:?} is not a zone")),
        None => Ok(()),
    }
}

pub fn validate_uuid(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if !locality::is_uuid(s) => Err(format!("{s:?} is not a UUID")),
        _ => Ok(()),
    }
}

pub fn validate_reference(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if !s.is_empty() => locality::parse(s).map(|_| ()).map_err(|e| e.to_string()),
        _ => Ok(()),
    }
}

pub fn validate_cidr(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if !s.is_empty() => s
            .parse::<IpNetwork>()
            .map(|_| ())
            .map_err(|e| format!("{s:?} is not a CIDR: {e}")),
        _ => Ok(()),
    }
}

pub fn validate_ip(value: &Value) -> Validation {
    match value.as_str() {
        Some(s) if !s.is_empty() => s
            .parse::<std::net::IpAddr>()
            .map(|_| ())
            .map_err(|_| format!("{s:?} is not an IP address")),
        _ => Ok(()),
    }
}

/// Ignore scope prefix churn on id references.
pub fn suppress_locality(_: &str, old: &Value, new: &Value) -> bool {
    match (old.as_str(), new.as_str()) {
        (Some(a), Some(b)) => locality::diff_suppress(a, b),
        _ => false,
    }
}

pub fn suppress_case(_: &str, old: &Value, new: &Value) -> bool {
    match (old.as_str(), new.as_str()) {
        (Some(a), Some(b)) => a.eq_ignore_ascii_case(b),
        _ => false,
    }
}

/// Canonical text of a CIDR (`1.2.3.4` becomes `1.2.3.4/32`).
pub fn canonical_cidr(cidr: &str) -> String {
    cidr.parse::<IpNetwork>()
        .map(|net| net.to_string())
        .unwrap_or_else(|_| cidr.to_string())
}

pub fn regional_id(region: &Region, id: &str) -> String {
    locality::build(&Locality::Region(region.clone()), id)
}

pub fn zonal_id(zone: &Zone, id: &str) -> String {
    locality::build(&Locality::Zone(zone.clone()), id)
}

/// Scoped id of an optional reference, or null
pub fn regional_ref(region: &Region, id: Option<&str>) -> Value {
    match id.filter(|id| !id.is_empty()) {
        Some(id) => Value::String(regional_id(region, id)),
        None => Value::Null,
    }
}

/// Bare id of a reference attribute, if set
pub fn expand_ref(data: &ResourceData, key: &str) -> Option<String> {
    data.get_str(key).map(locality::expand_id)
}

pub fn require_project(ctx: &HookContext, data: &ResourceData) -> Result<String> {
    ctx.project_id(data).ok_or_else(|| {
        ProviderError::invalid_attribute(
            "project_id",
            "must be set on the resource or through SCW_DEFAULT_PROJECT_ID",
        )
    })
}

/// The bare id stored in state, split from its region.
pub fn regional_state_id(ctx: &HookContext, data: &ResourceData) -> Result<(Region, String)> {
    let id = data
        .id()
        .ok_or_else(|| ProviderError::Internal("resource has no id".to_string()))?;
    ctx.region_from_id(id)
}

/// Region of the resource: the `region` attribute when set, else the scope
/// of a referenced id, else the provider default.
pub fn region_of(ctx: &HookContext, data: &ResourceData, reference: &str) -> Result<Region> {
    if data.get_str("region").is_some() {
        return ctx.region(data);
    }
    match data.get_str(reference) {
        Some(id) => Ok(ctx.region_from_id(id)?.0),
        None => ctx.region(data),
    }
}

/// String attribute, empty when unset
pub fn get_string(data: &ResourceData, key: &str) -> String {
    data.get_str(key).unwrap_or_default().to_string()
}

pub fn get_u32(data: &ResourceData, key: &str) -> Option<u32> {
    data.get_ok(key).and_then(|v| v.as_int()).and_then(|v| u32::try_from(v).ok())
}

pub fn value_u32(value: &Value) -> u32 {
    value.as_int().and_then(|v| u32::try_from(v).ok()).unwrap_or(0)
}

pub fn value_string(value: &Value) -> String {
    value.as_str().unwrap_or_default().to_string()
}

pub fn block_str(block: &Block, key: &str) -> String {
    value_string(block.value(key))
}

pub fn block_bool(block: &Block, key: &str) -> bool {
    block.value(key).as_bool().unwrap_or(false)
}

pub fn block_u32(block: &Block, key: &str) -> u32 {
    value_u32(block.value(key))
}

/// Non-empty optional string field of a nested block
pub fn block_opt(block: &Block, key: &str) -> Option<String> {
    block.value(key).as_str().filter(|s| !s.is_empty()).map(str::to_string)
}

/// Error standing for a resource that vanished while being waited on
pub fn gone(kind: &str, id: &str) -> ProviderError {
    VendorError::new(404, "not_found", format!("{kind} {id} disappeared")).into()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cidr_canonical_form() {
        assert_eq!(canonical_cidr("1.2.3.4"), "1.2.3.4/32");
        assert_eq!(canonical_cidr("5.6.7.0/30"), "5.6.7.0/30");
        assert_eq!(canonical_cidr("not-an-ip"), "not-an-ip");
    }

    #[test]
    fn test_validators() {
        assert!(validate_cidr(&"10.0.0.0/8".into()).is_ok());
        assert!(validate_cidr(&"10.0.0.0/33".into()).is_err());
        assert!(validate_region(&"fr-par".into()).is_ok());
        assert!(validate_region(&"fr-par-1".into()).is_err());
        assert!(validate_zone(&"fr-par-1".into()).is_ok());
        assert!(validate_reference(&"fr-par/11111111-2222-3333-4444-555555555555".into()).is_ok());
        assert!(validate_reference(&"private-network".into()).is_err());
        assert!(validate_ip(&"10.32.0.10".into()).is_ok());
    }

    #[test]
    fn test_reference_suppression() {
        let bare = "11111111-2222-3333-4444-555555555555";
        let scoped = format!("fr-par/{bare}");
        assert!(suppress_locality("private_network_id", &scoped.as_str().into(), &bare.into()));
        assert!(!suppress_locality("private_network_id", &scoped.as_str().into(), &Value::Null));
    }
}
