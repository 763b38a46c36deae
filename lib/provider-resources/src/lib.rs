//! Scaleway resource bindings
//!
//! This library maps each managed resource and data source onto the vendor
//! API traits of `provider-client`:
//! - k8s: Kapsule clusters, pools and API server ACLs
//! - vpc: VPCs, private networks, routes and VPC ACLs
//! - iot: IoT hubs, devices, networks and routes
//!
//! [`registry`] builds the registry the plugin serves.

pub mod common;
pub mod iot;
pub mod k8s;
pub mod vpc;

use provider_client::{InstanceApi, IotApi, K8sApi, ScwClient, VpcApi};
use provider_core::{EngineConfig, ResourceRegistry, Result};
use std::sync::Arc;

/// Vendor API handles shared by every binding
#[derive(Clone)]
pub struct Apis {
    pub k8s: Arc<dyn K8sApi>,
    pub vpc: Arc<dyn VpcApi>,
    pub iot: Arc<dyn IotApi>,
    pub instance: Arc<dyn InstanceApi>,
}

impl Apis {
    /// Serve every API from one HTTP client.
    pub fn from_client(client: ScwClient) -> Self {
        let client = Arc::new(client);
        Self {
            k8s: client.clone(),
            vpc: client.clone(),
            iot: client.clone(),
            instance: client,
        }
    }
}

/// Build the registry of every resource and data source type.
pub fn registry(config: Arc<EngineConfig>, apis: &Apis) -> Result<ResourceRegistry> {
    let mut registry = ResourceRegistry::new(config);

    registry.register_resource(Arc::new(k8s::ClusterResource::new(apis.k8s.clone())))?;
    registry.register_resource(Arc::new(k8s::PoolResource::new(apis.k8s.clone(), apis.instance.clone())))?;
    registry.register_resource(Arc::new(k8s::AclResource::new(apis.k8s.clone())))?;
    registry.register_resource(Arc::new(vpc::VpcResource::new(apis.vpc.clone())))?;
    registry.register_resource(Arc::new(vpc::PrivateNetworkResource::new(apis.vpc.clone())))?;
    registry.register_resource(Arc::new(vpc::RouteResource::new(apis.vpc.clone())))?;
    registry.register_resource(Arc::new(vpc::VpcAclResource::new(apis.vpc.clone())))?;
    registry.register_resource(Arc::new(iot::HubResource::new(apis.iot.clone())))?;
    registry.register_resource(Arc::new(iot::DeviceResource::new(apis.iot.clone())))?;
    registry.register_resource(Arc::new(iot::NetworkResource::new(apis.iot.clone())))?;
    registry.register_resource(Arc::new(iot::IotRouteResource::new(apis.iot.clone())))?;

    registry.register_data_source(Arc::new(k8s::ClusterDataSource::new(apis.k8s.clone())))?;
    registry.register_data_source(Arc::new(k8s::PoolDataSource::new(apis.k8s.clone())))?;
    registry.register_data_source(Arc::new(vpc::VpcDataSource::new(apis.vpc.clone())))?;
    registry.register_data_source(Arc::new(vpc::PrivateNetworkDataSource::new(apis.vpc.clone())))?;
    registry.register_data_source(Arc::new(iot::HubDataSource::new(apis.iot.clone())))?;
    registry.register_data_source(Arc::new(iot::DeviceDataSource::new(apis.iot.clone())))?;

    Ok(registry)
}
