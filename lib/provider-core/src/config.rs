//! Process-wide engine configuration and per-operation timeouts

use crate::locality::{Region, Zone};
use crate::{ProviderError, Result};
use std::time::Duration;

/// Default interval between two polls of a waiter
pub const DEFAULT_RETRY_INTERVAL: Duration = Duration::from_secs(5);

/// Engine configuration, built once at startup and shared read-only
#[derive(Clone, Debug)]
pub struct EngineConfig {
    /// Interval between waiter polls, for every waiter in the process
    pub retry_interval: Duration,
    /// Project used when a resource does not set `project_id`
    pub default_project_id: Option<String>,
    /// Region used when a resource does not set `region`
    pub default_region: Region,
    /// Zone used when a resource does not set `zone`
    pub default_zone: Zone,
}

impl Default for EngineConfig {
    fn default() -> Self {
        let region = Region::fallback();
        Self {
            retry_interval: DEFAULT_RETRY_INTERVAL,
            default_project_id: None,
            default_zone: region.first_zone(),
            default_region: region,
        }
    }
}

impl EngineConfig {
    /// Load the configuration from `SCW_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`EngineConfig::from_env`] with an injectable lookup.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let mut config = EngineConfig::default();

        if let Some(region) = lookup("SCW_DEFAULT_REGION").filter(|v| !v.is_empty()) {
            config.default_region = Region::parse(&region)
                .map_err(|_| ProviderError::invalid_attribute("SCW_DEFAULT_REGION", region))?;
            config.default_zone = config.default_region.first_zone();
        }
        if let Some(zone) = lookup("SCW_DEFAULT_ZONE").filter(|v| !v.is_empty()) {
            config.default_zone = Zone::parse(&zone)
                .map_err(|_| ProviderError::invalid_attribute("SCW_DEFAULT_ZONE", zone))?;
        }
        if let Some(interval) = lookup("SCW_RETRY_INTERVAL").filter(|v| !v.is_empty()) {
            config.retry_interval = parse_duration(&interval)?;
        }
        config.default_project_id = lookup("SCW_DEFAULT_PROJECT_ID").filter(|v| !v.is_empty());

        Ok(config)
    }

    pub fn with_retry_interval(mut self, interval: Duration) -> Self {
        self.retry_interval = interval;
        self
    }

    pub fn with_default_project_id(mut self, project_id: impl Into<String>) -> Self {
        self.default_project_id = Some(project_id.into());
        self
    }
}

/// The four lifecycle operations a deadline applies to
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Operation {
    Create,
    Read,
    Update,
    Delete,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Read => "read",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Deadlines for each lifecycle hook of a resource
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Timeouts {
    pub create: Duration,
    pub read: Duration,
    pub update: Duration,
    pub delete: Duration,
}

impl Default for Timeouts {
    fn default() -> Self {
        Self::uniform(Duration::from_secs(5 * 60))
    }
}

impl Timeouts {
    pub fn uniform(timeout: Duration) -> Self {
        Self {
            create: timeout,
            read: timeout,
            update: timeout,
            delete: timeout,
        }
    }

    pub fn for_operation(&self, op: Operation) -> Duration {
        match op {
            Operation::Create => self.create,
            Operation::Read => self.read,
            Operation::Update => self.update,
            Operation::Delete => self.delete,
        }
    }

    pub fn set(&mut self, op: Operation, timeout: Duration) {
        match op {
            Operation::Create => self.create = timeout,
            Operation::Read => self.read = timeout,
            Operation::Update => self.update = timeout,
            Operation::Delete => self.delete = timeout,
        }
    }
}

/// Parse durations such as `5s`, `500ms`, `20m`, `1h30m`.
pub fn parse_duration(input: &str) -> Result<Duration> {
    let invalid = || ProviderError::invalid_attribute("duration", format!("{:?} is not a duration", input));
    let s = input.trim();
    if s.is_empty() {
        return Err(invalid());
    }

    let mut total = Duration::ZERO;
    let mut rest = s;
    while !rest.is_empty() {
        let digits = rest
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        if digits == 0 {
            return Err(invalid());
        }
        let amount: u64 = rest[..digits].parse().map_err(|_| invalid())?;
        rest = &rest[digits..];

        let unit_len = rest
            .find(|c: char| c.is_ascii_digit())
            .unwrap_or(rest.len());
        let unit = &rest[..unit_len];
        rest = &rest[unit_len..];

        total += match unit {
            "ms" => Duration::from_millis(amount),
            "s" => Duration::from_secs(amount),
            "m" => Duration::from_secs(amount * 60),
            "h" => Duration::from_secs(amount * 3600),
            _ => return Err(invalid()),
        };
    }
    Ok(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn test_default_config() {
        let config = EngineConfig::default();
        assert_eq!(config.retry_interval, Duration::from_secs(5));
        assert_eq!(config.default_region.as_str(), "fr-par");
        assert_eq!(config.default_zone.as_str(), "fr-par-1");
        assert!(config.default_project_id.is_none());
    }

    #[test]
    fn test_from_lookup() {
        let env: HashMap<&str, &str> = HashMap::from([
            ("SCW_DEFAULT_REGION", "nl-ams"),
            ("SCW_RETRY_INTERVAL", "500ms"),
            ("SCW_DEFAULT_PROJECT_ID", "proj"),
        ]);
        let config = EngineConfig::from_lookup(|k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(config.default_region.as_str(), "nl-ams");
        assert_eq!(config.default_zone.as_str(), "nl-ams-1");
        assert_eq!(config.retry_interval, Duration::from_millis(500));
        assert_eq!(config.default_project_id.as_deref(), Some("proj"));
    }

    #[test]
    fn test_from_lookup_rejects_bad_region() {
        let result = EngineConfig::from_lookup(|k| {
            (k == "SCW_DEFAULT_REGION").then(|| "paris".to_string())
        });
        assert!(result.is_err());
    }

    #[test]
    fn test_parse_duration() {
        assert_eq!(parse_duration("5s").unwrap(), Duration::from_secs(5));
        assert_eq!(parse_duration("250ms").unwrap(), Duration::from_millis(250));
        assert_eq!(parse_duration("20m").unwrap(), Duration::from_secs(1200));
        assert_eq!(parse_duration("1h30m").unwrap(), Duration::from_secs(5400));
        assert!(parse_duration("").is_err());
        assert!(parse_duration("10").is_err());
        assert!(parse_duration("m").is_err());
        assert!(parse_duration("3d").is_err());
    }
}
