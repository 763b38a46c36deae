//! Scaleway API request and response types
//!
//! This library defines the wire types of the vendor APIs the provider
//! manages:
//! - k8s: Kubernetes clusters, pools, nodes, ACLs and versions
//! - vpc: VPCs, private networks, routes and VPC ACLs
//! - iot: IoT hubs, devices, networks and routes
//! - instance: placement groups referenced by Kubernetes pools

pub mod instance;
pub mod iot;
pub mod k8s;
pub mod vpc;

use serde::Deserialize;

/// Common shape of paginated list responses
pub trait Paginated: for<'de> Deserialize<'de> {
    type Item;

    fn total_count(&self) -> u64;

    fn into_items(self) -> Vec<Self::Item>;
}

/// Implement [`Paginated`] for a list response holding its items in `$field`.
#[macro_export]
macro_rules! paginated {
    ($response:ty, $field:ident, $item:ty) => {
        impl $crate::Paginated for $response {
            type Item = $item;

            fn total_count(&self) -> u64 {
                self.total_count
            }

            fn into_items(self) -> Vec<$item> {
                self.$field
            }
        }
    };
}
