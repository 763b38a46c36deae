//! VPC bindings

pub mod acl;
pub mod private_network;
pub mod route;
#[allow(clippy::module_inception)]
pub mod vpc;

pub use acl::VpcAclResource;
pub use private_network::{PrivateNetworkDataSource, PrivateNetworkResource};
pub use route::RouteResource;
pub use vpc::{VpcDataSource, VpcResource};
