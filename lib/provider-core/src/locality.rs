//! Region and zone scoped identifiers
//!
//! Every vendor resource lives in a region (`fr-par`) or a zone (`fr-par-1`).
//! Identifiers stored in state carry that scope as a prefix
//! (`fr-par/11111111-2222-3333-4444-555555555555`) so lookups can be routed
//! without extra configuration.

use crate::{ProviderError, Result};
use regex::Regex;
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;

static REGION_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z]{2}-[a-z]{3}$").expect("region pattern"));
static ZONE_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z]{2}-[a-z]{3})-[0-9]+$").expect("zone pattern"));
static UUID_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^[0-9a-f]{8}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{4}-[0-9a-f]{12}$")
        .expect("uuid pattern")
});

/// A region token such as `fr-par`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Region(String);

/// A zone token such as `fr-par-1`
#[derive(Clone, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Zone(String);

/// Region used when neither the environment nor a resource names one
pub(crate) const DEFAULT_REGION: &str = "fr-par";

impl Region {
    pub(crate) fn fallback() -> Self {
        Region(DEFAULT_REGION.to_string())
    }

    pub fn parse(s: &str) -> Result<Self> {
        if REGION_RE.is_match(s) {
            Ok(Region(s.to_string()))
        } else {
            Err(ProviderError::IdFormat(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The first zone of the region, used when only a region is configured.
    pub fn first_zone(&self) -> Zone {
        Zone(format!("{}-1", self.0))
    }
}

impl Zone {
    pub fn parse(s: &str) -> Result<Self> {
        if ZONE_RE.is_match(s) {
            Ok(Zone(s.to_string()))
        } else {
            Err(ProviderError::IdFormat(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// The region that contains this zone.
    pub fn region(&self) -> Region {
        // `parse` guarantees a trailing `-N` segment
        let cut = self.0.rfind('-').unwrap_or(self.0.len());
        Region(self.0[..cut].to_string())
    }
}

/// Either scope kind
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub enum Locality {
    Region(Region),
    Zone(Zone),
}

impl Locality {
    pub fn parse(s: &str) -> Result<Self> {
        if REGION_RE.is_match(s) {
            Ok(Locality::Region(Region(s.to_string())))
        } else if ZONE_RE.is_match(s) {
            Ok(Locality::Zone(Zone(s.to_string())))
        } else {
            Err(ProviderError::IdFormat(s.to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Locality::Region(r) => r.as_str(),
            Locality::Zone(z) => z.as_str(),
        }
    }

    pub fn region(&self) -> Region {
        match self {
            Locality::Region(r) => r.clone(),
            Locality::Zone(z) => z.region(),
        }
    }

    /// Two scopes are compatible when they are equal, or when one is a
    /// region and the other a zone inside it.
    pub fn is_compatible_with(&self, other: &Locality) -> bool {
        match (self, other) {
            (Locality::Zone(a), Locality::Zone(b)) => a == b,
            _ => self.region() == other.region(),
        }
    }
}

macro_rules! impl_token {
    ($ty:ty) => {
        impl fmt::Display for $ty {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl FromStr for $ty {
            type Err = ProviderError;

            fn from_str(s: &str) -> Result<Self> {
                Self::parse(s)
            }
        }
    };
}

impl_token!(Region);
impl_token!(Zone);
impl_token!(Locality);

impl From<Region> for Locality {
    fn from(region: Region) -> Self {
        Locality::Region(region)
    }
}

impl From<Zone> for Locality {
    fn from(zone: Zone) -> Self {
        Locality::Zone(zone)
    }
}

/// A parsed identifier: optional scope, the resource uuid, and for nested
/// resources the inner uuid.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ScopedId {
    pub locality: Option<Locality>,
    pub id: String,
    pub sub_id: Option<String>,
}

impl ScopedId {
    /// The scope, falling back to `default` for bare identifiers.
    pub fn locality_or(&self, default: &Locality) -> Locality {
        self.locality.clone().unwrap_or_else(|| default.clone())
    }

    /// The region of the identifier, or `default` when it carries no scope.
    pub fn region_or(&self, default: &Region) -> Region {
        self.locality
            .as_ref()
            .map(Locality::region)
            .unwrap_or_else(|| default.clone())
    }
}

impl fmt::Display for ScopedId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if let Some(locality) = &self.locality {
            write!(f, "{}/", locality)?;
        }
        f.write_str(&self.id)?;
        if let Some(sub) = &self.sub_id {
            write!(f, "/{}", sub)?;
        }
        Ok(())
    }
}

pub fn is_uuid(s: &str) -> bool {
    UUID_RE.is_match(s)
}

/// Parse `<scope>/<uuid>`, `<scope>/<uuid>/<uuid>` or a bare `<uuid>`.
pub fn parse(id: &str) -> Result<ScopedId> {
    let malformed = || ProviderError::IdFormat(id.to_string());
    let parts: Vec<&str> = id.split('/').collect();

    let (locality, id_part, sub_part) = match parts.as_slice() {
        [bare] => (None, *bare, None),
        [scope, bare] => (Some(Locality::parse(scope).map_err(|_| malformed())?), *bare, None),
        [scope, bare, sub] => (
            Some(Locality::parse(scope).map_err(|_| malformed())?),
            *bare,
            Some(*sub),
        ),
        _ => return Err(malformed()),
    };

    if !is_uuid(id_part) {
        return Err(malformed());
    }
    if let Some(sub) = sub_part {
        if !is_uuid(sub) {
            return Err(malformed());
        }
    }

    Ok(ScopedId {
        locality,
        id: id_part.to_string(),
        sub_id: sub_part.map(str::to_string),
    })
}

/// Build `<scope>/<id>`. An id that already carries a scope is reduced to
/// its bare part first so scopes never stack.
pub fn build(locality: &Locality, id: &str) -> String {
    format!("{}/{}", locality, expand_id(id))
}

/// Build `<scope>/<id>/<sub_id>` for nested resources.
pub fn build_nested(locality: &Locality, id: &str, sub_id: &str) -> String {
    format!("{}/{}/{}", locality, expand_id(id), expand_id(sub_id))
}

/// The region a zone token belongs to.
pub fn zone_to_region(zone: &str) -> Result<Region> {
    Ok(Zone::parse(zone)?.region())
}

/// Strip any scope prefix. Values that do not parse are returned unchanged.
pub fn expand_id(id: &str) -> String {
    match parse(id) {
        Ok(scoped) => scoped.id,
        Err(_) => id.rsplit('/').next().unwrap_or(id).to_string(),
    }
}

/// True when two identifiers name the same resource regardless of scope prefix.
pub fn diff_suppress(a: &str, b: &str) -> bool {
    match (parse(a), parse(b)) {
        (Ok(left), Ok(right)) => left.id == right.id && left.sub_id == right.sub_id,
        _ => a == b,
    }
}

/// Reject a reference to a resource living in another scope than the
/// declaring resource. Bare identifiers are assumed to be local.
pub fn check_locality(attribute: &str, declared: &Locality, referenced_id: &str) -> Result<()> {
    if referenced_id.is_empty() {
        return Ok(());
    }
    let referenced = parse(referenced_id)?;
    match referenced.locality {
        Some(locality) if !declared.is_compatible_with(&locality) => {
            Err(ProviderError::LocalityMismatch {
                attribute: attribute.to_string(),
                declared: declared.to_string(),
                referenced: locality.to_string(),
            })
        }
        _ => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const UUID: &str = "11111111-2222-3333-4444-555555555555";
    const OTHER: &str = "aaaaaaaa-bbbb-cccc-dddd-eeeeeeeeeeee";

    #[test]
    fn test_parse_regional() {
        let parsed = parse(&format!("fr-par/{}", UUID)).unwrap();
        assert_eq!(parsed.locality, Some(Locality::parse("fr-par").unwrap()));
        assert_eq!(parsed.id, UUID);
        assert_eq!(parsed.sub_id, None);
    }

    #[test]
    fn test_parse_zonal_and_nested() {
        let parsed = parse(&format!("nl-ams-2/{}/{}", UUID, OTHER)).unwrap();
        assert!(matches!(parsed.locality, Some(Locality::Zone(_))));
        assert_eq!(parsed.id, UUID);
        assert_eq!(parsed.sub_id.as_deref(), Some(OTHER));
    }

    #[test]
    fn test_parse_bare_uuid_has_no_scope() {
        let parsed = parse(UUID).unwrap();
        assert_eq!(parsed.locality, None);
        assert_eq!(parsed.id, UUID);
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in [
            "",
            "fr-par",
            "fr-par/",
            "/11111111-2222-3333-4444-555555555555",
            "FR-PAR/11111111-2222-3333-4444-555555555555",
            "fr-paris/11111111-2222-3333-4444-555555555555",
            "fr-par-x/11111111-2222-3333-4444-555555555555",
            "fr-par/11111111-2222-3333-4444-55555555555",
            "fr-par/11111111-2222-3333-4444-55555555555G",
            "fr-par/11111111-2222-3333-4444-555555555555/x",
            "a/b/c/d",
        ] {
            assert!(
                matches!(parse(bad), Err(ProviderError::IdFormat(_))),
                "expected IdFormat for {:?}",
                bad
            );
        }
    }

    #[test]
    fn test_build_round_trips() {
        for scope in ["fr-par", "nl-ams", "pl-waw-3", "fr-par-1"] {
            let locality = Locality::parse(scope).unwrap();
            let built = build(&locality, UUID);
            let parsed = parse(&built).unwrap();
            assert_eq!(parsed.locality, Some(locality));
            assert_eq!(parsed.id, UUID);
        }
    }

    #[test]
    fn test_build_does_not_stack_scopes() {
        let locality = Locality::parse("fr-par").unwrap();
        let built = build(&locality, &format!("nl-ams/{}", UUID));
        assert_eq!(built, format!("fr-par/{}", UUID));
    }

    #[test]
    fn test_zone_to_region() {
        assert_eq!(zone_to_region("fr-par-1").unwrap().as_str(), "fr-par");
        assert_eq!(zone_to_region("pl-waw-3").unwrap().as_str(), "pl-waw");
        assert_eq!(zone_to_region("nl-ams-12").unwrap().as_str(), "nl-ams");
        assert!(zone_to_region("fr-par").is_err());
    }

    #[test]
    fn test_diff_suppress_ignores_scope() {
        let scoped = format!("fr-par/{}", UUID);
        assert!(diff_suppress(&scoped, UUID));
        assert!(diff_suppress(&scoped, &format!("nl-ams/{}", UUID)));
        assert!(!diff_suppress(&scoped, OTHER));
        assert!(diff_suppress("same-name", "same-name"));
    }

    #[test]
    fn test_locality_check() {
        let declared = Locality::parse("fr-par").unwrap();
        assert!(check_locality("private_network_id", &declared, UUID).is_ok());
        assert!(check_locality("private_network_id", &declared, &format!("fr-par/{}", UUID)).is_ok());
        assert!(check_locality("private_network_id", &declared, &format!("fr-par-2/{}", UUID)).is_ok());
        let err = check_locality("private_network_id", &declared, &format!("nl-ams/{}", UUID))
            .unwrap_err();
        assert!(matches!(err, ProviderError::LocalityMismatch { .. }));

        let zonal = Locality::parse("fr-par-1").unwrap();
        assert!(check_locality("placement_group_id", &zonal, &format!("fr-par-2/{}", UUID)).is_err());
    }
}
