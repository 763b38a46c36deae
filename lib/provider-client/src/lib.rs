//! Scaleway API client
//!
//! One async trait per vendor API, implemented over HTTP by [`ScwClient`].
//! Resources depend on the traits so tests can substitute in-memory fakes.

pub mod client;
pub mod instance;
pub mod iot;
pub mod k8s;
pub mod vpc;

pub use client::{ClientConfig, ScwClient};
pub use instance::InstanceApi;
pub use iot::IotApi;
pub use k8s::K8sApi;
pub use vpc::VpcApi;
