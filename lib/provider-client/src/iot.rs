//! IoT Hub API

use crate::client::{filters, ScwClient};
use async_trait::async_trait;
use provider_api::iot::{
    CreateDeviceRequest, CreateDeviceResponse, CreateHubRequest, CreateNetworkRequest, CreateNetworkResponse,
    CreateRouteRequest, Device, GetDeviceCertificateResponse, Hub, ListDevicesResponse, ListHubsResponse, Network,
    Route, SetDeviceCertificateRequest, SetHubCaRequest, UpdateDeviceRequest, UpdateHubRequest,
};
use provider_core::{Region, Result};
use serde_json::json;

#[async_trait]
pub trait IotApi: Send + Sync {
    async fn create_hub(&self, region: &Region, req: &CreateHubRequest) -> Result<Hub>;
    async fn get_hub(&self, region: &Region, hub_id: &str) -> Result<Hub>;
    async fn list_hubs(&self, region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Hub>>;
    async fn update_hub(&self, region: &Region, hub_id: &str, req: &UpdateHubRequest) -> Result<Hub>;
    async fn enable_hub(&self, region: &Region, hub_id: &str) -> Result<Hub>;
    async fn disable_hub(&self, region: &Region, hub_id: &str) -> Result<Hub>;
    async fn delete_hub(&self, region: &Region, hub_id: &str, delete_devices: bool) -> Result<()>;
    /// Only accepted while the hub is ready
    async fn set_hub_ca(&self, region: &Region, hub_id: &str, req: &SetHubCaRequest) -> Result<Hub>;
    /// Download the CA certificate published for dedicated hubs
    async fn get_mqtt_ca(&self, url: &str) -> Result<String>;

    async fn create_device(&self, region: &Region, req: &CreateDeviceRequest) -> Result<CreateDeviceResponse>;
    async fn get_device(&self, region: &Region, device_id: &str) -> Result<Device>;
    async fn list_devices(&self, region: &Region, hub_id: Option<&str>, name: Option<&str>) -> Result<Vec<Device>>;
    async fn update_device(&self, region: &Region, device_id: &str, req: &UpdateDeviceRequest) -> Result<Device>;
    async fn delete_device(&self, region: &Region, device_id: &str) -> Result<()>;
    async fn get_device_certificate(&self, region: &Region, device_id: &str) -> Result<GetDeviceCertificateResponse>;
    async fn set_device_certificate(&self, region: &Region, device_id: &str, certificate_pem: &str) -> Result<()>;

    async fn create_network(&self, region: &Region, req: &CreateNetworkRequest) -> Result<CreateNetworkResponse>;
    async fn get_network(&self, region: &Region, network_id: &str) -> Result<Network>;
    async fn delete_network(&self, region: &Region, network_id: &str) -> Result<()>;

    async fn create_route(&self, region: &Region, req: &CreateRouteRequest) -> Result<Route>;
    async fn get_route(&self, region: &Region, route_id: &str) -> Result<Route>;
    async fn delete_route(&self, region: &Region, route_id: &str) -> Result<()>;
}

fn base(region: &Region) -> String {
    format!("/iot/v1/regions/{}", region)
}

#[async_trait]
impl IotApi for ScwClient {
    async fn create_hub(&self, region: &Region, req: &CreateHubRequest) -> Result<Hub> {
        self.post(&format!("{}/hubs", base(region)), req).await
    }

    async fn get_hub(&self, region: &Region, hub_id: &str) -> Result<Hub> {
        self.get(&format!("{}/hubs/{}", base(region), hub_id)).await
    }

    async fn list_hubs(&self, region: &Region, project_id: Option<&str>, name: Option<&str>) -> Result<Vec<Hub>> {
        let query = filters(&[("project_id", project_id), ("name", name)]);
        self.list_all::<ListHubsResponse>(&format!("{}/hubs", base(region)), &query)
            .await
    }

    async fn update_hub(&self, region: &Region, hub_id: &str, req: &UpdateHubRequest) -> Result<Hub> {
        self.patch(&format!("{}/hubs/{}", base(region), hub_id), req).await
    }

    async fn enable_hub(&self, region: &Region, hub_id: &str) -> Result<Hub> {
        self.post(&format!("{}/hubs/{}/enable", base(region), hub_id), &json!({}))
            .await
    }

    async fn disable_hub(&self, region: &Region, hub_id: &str) -> Result<Hub> {
        self.post(&format!("{}/hubs/{}/disable", base(region), hub_id), &json!({}))
            .await
    }

    async fn delete_hub(&self, region: &Region, hub_id: &str, delete_devices: bool) -> Result<()> {
        self.delete(
            &format!("{}/hubs/{}", base(region), hub_id),
            &[("delete_devices", delete_devices.to_string())],
        )
        .await
    }

    async fn set_hub_ca(&self, region: &Region, hub_id: &str, req: &SetHubCaRequest) -> Result<Hub> {
        self.post(&format!("{}/hubs/{}/ca", base(region), hub_id), req).await
    }

    async fn get_mqtt_ca(&self, url: &str) -> Result<String> {
        self.fetch_public(url).await
    }

    async fn create_device(&self, region: &Region, req: &CreateDeviceRequest) -> Result<CreateDeviceResponse> {
        self.post(&format!("{}/devices", base(region)), req).await
    }

    async fn get_device(&self, region: &Region, device_id: &str) -> Result<Device> {
        self.get(&format!("{}/devices/{}", base(region), device_id)).await
    }

    async fn list_devices(&self, region: &Region, hub_id: Option<&str>, name: Option<&str>) -> Result<Vec<Device>> {
        let query = filters(&[("hub_id", hub_id), ("name", name)]);
        self.list_all::<ListDevicesResponse>(&format!("{}/devices", base(region)), &query)
            .await
    }

    async fn update_device(&self, region: &Region, device_id: &str, req: &UpdateDeviceRequest) -> Result<Device> {
        self.patch(&format!("{}/devices/{}", base(region), device_id), req).await
    }

    async fn delete_device(&self, region: &Region, device_id: &str) -> Result<()> {
        self.delete(&format!("{}/devices/{}", base(region), device_id), &[]).await
    }

    async fn get_device_certificate(&self, region: &Region, device_id: &str) -> Result<GetDeviceCertificateResponse> {
        self.get(&format!("{}/devices/{}/certificate", base(region), device_id))
            .await
    }

    async fn set_device_certificate(&self, region: &Region, device_id: &str, certificate_pem: &str) -> Result<()> {
        let _: serde_json::Value = self
            .put(
                &format!("{}/devices/{}/certificate", base(region), device_id),
                &SetDeviceCertificateRequest {
                    certificate_pem: certificate_pem.to_string(),
                },
            )
            .await?;
        Ok(())
    }

    async fn create_network(&self, region: &Region, req: &CreateNetworkRequest) -> Result<CreateNetworkResponse> {
        self.post(&format!("{}/networks", base(region)), req).await
    }

    async fn get_network(&self, region: &Region, network_id: &str) -> Result<Network> {
        self.get(&format!("{}/networks/{}", base(region), network_id)).await
    }

    async fn delete_network(&self, region: &Region, network_id: &str) -> Result<()> {
        self.delete(&format!("{}/networks/{}", base(region), network_id), &[]).await
    }

    async fn create_route(&self, region: &Region, req: &CreateRouteRequest) -> Result<Route> {
        self.post(&format!("{}/routes", base(region)), req).await
    }

    async fn get_route(&self, region: &Region, route_id: &str) -> Result<Route> {
        self.get(&format!("{}/routes/{}", base(region), route_id)).await
    }

    async fn delete_route(&self, region: &Region, route_id: &str) -> Result<()> {
        self.delete(&format!("{}/routes/{}", base(region), route_id), &[]).await
    }
}
