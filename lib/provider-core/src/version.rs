//! Kubernetes version inputs
//!
//! A version is either full (`1.32.2`) or minor (`1.32`). A minor version
//! follows the latest patch release and is only allowed with auto-upgrade.

use crate::{ProviderError, Result};
use std::fmt;

#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum Version {
    Minor(u32, u32),
    Full(u32, u32, u32),
}

impl Version {
    pub fn parse(input: &str) -> Result<Self> {
        let invalid = || ProviderError::invalid_attribute("version", format!("{input:?} is not a version"));
        let parts = input
            .split('.')
            .map(|p| p.parse::<u32>().map_err(|_| invalid()))
            .collect::<Result<Vec<u32>>>()?;
        match parts.as_slice() {
            [major, minor] => Ok(Version::Minor(*major, *minor)),
            [major, minor, patch] => Ok(Version::Full(*major, *minor, *patch)),
            _ => Err(invalid()),
        }
    }

    pub fn is_minor(&self) -> bool {
        matches!(self, Version::Minor(..))
    }

    pub fn major_minor(&self) -> (u32, u32) {
        match *self {
            Version::Minor(major, minor) | Version::Full(major, minor, _) => (major, minor),
        }
    }

    /// The `x.y` form of this version.
    pub fn to_minor(&self) -> Version {
        let (major, minor) = self.major_minor();
        Version::Minor(major, minor)
    }
}

impl fmt::Display for Version {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Version::Minor(major, minor) => write!(f, "{major}.{minor}"),
            Version::Full(major, minor, patch) => write!(f, "{major}.{minor}.{patch}"),
        }
    }
}

/// A minor version requires auto-upgrade; a full version forbids it.
pub fn check_auto_upgrade(version: &str, auto_upgrade: bool) -> Result<()> {
    match (Version::parse(version)?, auto_upgrade) {
        (Version::Minor(..), false) => Err(ProviderError::VersionRequiresAutoUpgrade(version.to_string())),
        (Version::Full(..), true) => Err(ProviderError::AutoUpgradeRequiresMinorVersion(version.to_string())),
        _ => Ok(()),
    }
}

/// The full version to send to the vendor: a minor version resolves to the
/// latest available patch of that minor.
pub fn resolve(requested: &str, available: &[String]) -> Result<String> {
    let version = Version::parse(requested)?;
    if !version.is_minor() {
        return Ok(requested.to_string());
    }
    let wanted = version.major_minor();
    available
        .iter()
        .filter_map(|v| Version::parse(v).ok())
        .filter(|v| !v.is_minor() && v.major_minor() == wanted)
        .max()
        .map(|v| v.to_string())
        .ok_or_else(|| {
            ProviderError::invalid_attribute("version", format!("no available version matches {requested:?}"))
        })
}

/// The version as stored in state: minor with auto-upgrade, full otherwise.
pub fn state_form(full: &str, auto_upgrade: bool) -> String {
    match Version::parse(full) {
        Ok(version) if auto_upgrade => version.to_minor().to_string(),
        _ => full.to_string(),
    }
}

/// True when `a` and `b` denote the same release line for plan purposes:
/// equal, or a minor that the full version belongs to.
pub fn same_version(a: &str, b: &str) -> bool {
    match (Version::parse(a), Version::parse(b)) {
        (Ok(x), Ok(y)) if x.is_minor() || y.is_minor() => x.major_minor() == y.major_minor(),
        (Ok(x), Ok(y)) => x == y,
        _ => a == b,
    }
}
