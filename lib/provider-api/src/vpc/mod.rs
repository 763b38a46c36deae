/// VPC API types (`/vpc/v2/regions/{region}`)
pub mod acl;
pub mod private_network;
pub mod route;
pub mod vpc;

pub use acl::{AclAction, AclProtocol, AclRule, GetAclResponse, SetAclRequest};
pub use private_network::{
    AddSubnetsRequest, CreatePrivateNetworkRequest, ListPrivateNetworksResponse, PrivateNetwork, Subnet,
    UpdatePrivateNetworkRequest,
};
pub use route::{CreateRouteRequest, Route, UpdateRouteRequest};
pub use vpc::{CreateVpcRequest, ListVpcsResponse, UpdateVpcRequest, Vpc};
