//! IoT Hub bindings

pub mod device;
pub mod hub;
pub mod network;
pub mod route;

pub use device::{DeviceDataSource, DeviceResource};
pub use hub::{HubDataSource, HubResource};
pub use network::NetworkResource;
pub use route::IotRouteResource;
