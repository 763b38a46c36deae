//! Cluster and pool wait policies

use crate::common::gone;
use provider_api::k8s::{Cluster, ClusterStatus, Pool, PoolStatus};
use provider_client::K8sApi;
use provider_core::{HookContext, ProviderError, Region, Result, StatusClass, WaitOutcome};
use tracing::debug;

pub fn cluster_status_class(cluster: &Cluster) -> StatusClass {
    match cluster.status {
        ClusterStatus::Ready | ClusterStatus::PoolRequired | ClusterStatus::Warning => StatusClass::Success,
        ClusterStatus::Error | ClusterStatus::Locked => StatusClass::Failure,
        ClusterStatus::Unknown => StatusClass::Pending,
        _ => StatusClass::Transitional,
    }
}

pub fn pool_status_class(pool: &Pool) -> StatusClass {
    match pool.status {
        PoolStatus::Ready => StatusClass::Success,
        PoolStatus::Warning | PoolStatus::Error | PoolStatus::Locked => StatusClass::Failure,
        PoolStatus::Unknown => StatusClass::Pending,
        _ => StatusClass::Transitional,
    }
}

/// Wait until the cluster settles.
pub async fn wait_for_cluster(ctx: &HookContext, api: &dyn K8sApi, region: &Region, id: &str) -> Result<Cluster> {
    ctx.waiter("cluster", id)
        .wait(|| api.get_cluster(region, id), cluster_status_class)
        .await?
        .into_terminal()
        .ok_or_else(|| gone("cluster", id))
}

pub async fn wait_for_cluster_deleted(ctx: &HookContext, api: &dyn K8sApi, region: &Region, id: &str) -> Result<()> {
    let outcome = ctx
        .waiter("cluster", id)
        .tolerate_not_found()
        .wait(
            || api.get_cluster(region, id),
            |c| match c.status {
                ClusterStatus::Deleted => StatusClass::Success,
                _ => StatusClass::Transitional,
            },
        )
        .await?;
    if let WaitOutcome::Terminal(cluster) = outcome {
        debug!(id, status = cluster.status.as_str(), "Cluster deleted");
    }
    Ok(())
}

/// Wait until the pool settles, whatever its final status.
pub async fn wait_for_pool(ctx: &HookContext, api: &dyn K8sApi, region: &Region, id: &str) -> Result<Pool> {
    ctx.waiter("pool", id)
        .wait(|| api.get_pool(region, id), pool_status_class)
        .await?
        .into_terminal()
        .ok_or_else(|| gone("pool", id))
}

/// Wait until the pool settles and require it to be ready.
pub async fn wait_for_pool_ready(ctx: &HookContext, api: &dyn K8sApi, region: &Region, id: &str) -> Result<Pool> {
    let pool = wait_for_pool(ctx, api, region, id).await?;
    if pool.status != PoolStatus::Ready {
        return Err(ProviderError::PoolNotReady {
            id: id.to_string(),
            status: pool.status.as_str().to_string(),
        });
    }
    Ok(pool)
}

pub async fn wait_for_pool_deleted(ctx: &HookContext, api: &dyn K8sApi, region: &Region, id: &str) -> Result<()> {
    ctx.waiter("pool", id)
        .tolerate_not_found()
        .wait(
            || api.get_pool(region, id),
            |p| match p.status {
                PoolStatus::Deleted => StatusClass::Success,
                _ => StatusClass::Transitional,
            },
        )
        .await?;
    Ok(())
}

/// Wait for the cluster, then for each of its pools, so callers never
/// return while the cluster still reports `pool_required`.
pub async fn wait_for_cluster_and_pools(
    ctx: &HookContext,
    api: &dyn K8sApi,
    region: &Region,
    id: &str,
) -> Result<Cluster> {
    let cluster = wait_for_cluster(ctx, api, region, id).await?;
    let pools = api.list_pools(region, id, None).await?;
    for pool in &pools {
        wait_for_pool(ctx, api, region, &pool.id).await?;
    }
    if pools.is_empty() {
        return Ok(cluster);
    }
    wait_for_cluster(ctx, api, region, id).await
}
