//! Kubernetes Kapsule bindings

pub mod acl;
pub mod cluster;
pub mod pool;
pub mod waiters;

pub use acl::AclResource;
pub use cluster::{ClusterDataSource, ClusterResource};
pub use pool::{PoolDataSource, PoolResource};
