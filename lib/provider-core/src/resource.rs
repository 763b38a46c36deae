//! Lifecycle hook traits implemented by every resource binding

use crate::config::{EngineConfig, Operation, Timeouts};
use crate::data::ResourceData;
use crate::diff::ResourceDiff;
use crate::locality::{Locality, Region, Zone};
use crate::schema::Schema;
use crate::waiter::Waiter;
use crate::{ProviderError, Result};
use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

/// Everything a hook needs besides the resource data: engine defaults,
/// the deadline of the current operation, and the host's cancellation.
#[derive(Clone, Debug)]
pub struct HookContext {
    pub config: Arc<EngineConfig>,
    pub op: Operation,
    pub deadline: Instant,
    pub cancel: CancellationToken,
}

impl HookContext {
    pub fn new(config: Arc<EngineConfig>, op: Operation, timeout: Duration, cancel: CancellationToken) -> Self {
        Self {
            config,
            op,
            deadline: Instant::now() + timeout,
            cancel,
        }
    }

    /// Waiter bound to this operation's deadline and cancellation.
    pub fn waiter(&self, kind: &str, id: &str) -> Waiter {
        Waiter::new(kind, id, self.config.retry_interval, self.deadline, self.cancel.clone())
    }

    pub fn remaining(&self) -> Duration {
        self.deadline.saturating_duration_since(Instant::now())
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Region of the resource: the `region` attribute, else the default.
    pub fn region(&self, data: &ResourceData) -> Result<Region> {
        match data.get_str("region") {
            Some(region) => Region::parse(region)
                .map_err(|_| ProviderError::invalid_attribute("region", format!("{region:?} is not a region"))),
            None => Ok(self.config.default_region.clone()),
        }
    }

    /// Zone of the resource: the `zone` attribute, else the default.
    pub fn zone(&self, data: &ResourceData) -> Result<Zone> {
        match data.get_str("zone") {
            Some(zone) => {
                Zone::parse(zone).map_err(|_| ProviderError::invalid_attribute("zone", format!("{zone:?} is not a zone")))
            }
            None => Ok(self.config.default_zone.clone()),
        }
    }

    pub fn project_id(&self, data: &ResourceData) -> Option<String> {
        data.get_str("project_id")
            .map(str::to_string)
            .or_else(|| self.config.default_project_id.clone())
    }

    /// Region of an existing resource, taken from its scoped id.
    pub fn region_from_id(&self, id: &str) -> Result<(Region, String)> {
        let scoped = crate::locality::parse(id)?;
        let region = scoped.region_or(&self.config.default_region);
        Ok((region, scoped.id))
    }

    /// Zone of an existing zonal resource, taken from its scoped id.
    pub fn zone_from_id(&self, id: &str) -> Result<(Zone, String)> {
        let scoped = crate::locality::parse(id)?;
        match scoped.locality_or(&Locality::Zone(self.config.default_zone.clone())) {
            Locality::Zone(zone) => Ok((zone, scoped.id)),
            Locality::Region(_) => Err(ProviderError::IdFormat(id.to_string())),
        }
    }
}

/// A managed resource type.
///
/// The registry calls one hook per host request. Hooks for the same
/// resource instance are never called concurrently.
#[async_trait]
pub trait Resource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    fn timeouts(&self) -> Timeouts {
        Timeouts::default()
    }

    /// Refine the computed plan. Runs at plan time, without vendor access
    /// unless the resource holds its own client.
    async fn customize_diff(&self, _ctx: &HookContext, _diff: &mut ResourceDiff<'_>) -> Result<()> {
        Ok(())
    }

    async fn create(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()>;

    /// Refresh `data` from the vendor. Clears the id when the resource is gone.
    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()>;

    async fn update(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()>;

    async fn delete(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()>;

    async fn import(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()> {
        self.read(ctx, data).await
    }
}

/// A read-only lookup exposed to the host.
#[async_trait]
pub trait DataSource: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn schema(&self) -> Schema;

    async fn read(&self, ctx: &HookContext, data: &mut ResourceData) -> Result<()>;
}
