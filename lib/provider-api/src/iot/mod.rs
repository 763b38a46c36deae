/// IoT Hub API types (`/iot/v1/regions/{region}`)
pub mod device;
pub mod hub;
pub mod network;
pub mod route;

pub use device::{
    Certificate, CreateDeviceRequest, CreateDeviceResponse, Device, DeviceStatus, GetDeviceCertificateResponse,
    ListDevicesResponse, MessageFilter, MessageFilterPolicy, MessageFilters, SetDeviceCertificateRequest,
    UpdateDeviceRequest,
};
pub use hub::{
    CreateHubRequest, Hub, HubStatus, ListHubsResponse, ProductPlan, SetHubCaRequest, UpdateHubRequest,
};
pub use network::{CreateNetworkRequest, CreateNetworkResponse, Network, NetworkType};
pub use route::{
    CreateRouteRequest, DatabaseConfig, RestConfig, Route, RouteType, S3Config,
};
