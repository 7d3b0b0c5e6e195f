use super::probe::{build_http_client, extract_xml_content, fetch_bytes, http_reachable, post_soap};
use super::{basic_auth_header, ensure_addressable, http_base_url, ConnectionStrategy};
use crate::connection_info::ConnectionInfo;
use crate::error::{ConnectionError, ConnectionResult};
use crate::types::{Camera, CameraType, NetworkAddress, StreamQuality};
use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;
use tracing::debug;

pub const ONVIF_STRATEGY_NAME: &str = "ONVIF";
pub const ONVIF_DEFAULT_PRIORITY: i32 = 10;
pub const ONVIF_DEVICE_SERVICE_PATH: &str = "/onvif/device_service";
pub const ONVIF_SNAPSHOT_PATH: &str = "/onvif/media_service/snapshot";

const GET_DEVICE_INFORMATION: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<s:Envelope xmlns:s="http://www.w3.org/2003/05/soap-envelope">
  <s:Body xmlns:tds="http://www.onvif.org/ver10/device/wsdl">
    <tds:GetDeviceInformation/>
  </s:Body>
</s:Envelope>"#;

/// (response element, additional_info key)
const DEVICE_INFORMATION_FIELDS: [(&str, &str); 5] = [
    ("Manufacturer", "manufacturer"),
    ("Model", "model"),
    ("FirmwareVersion", "firmware_version"),
    ("SerialNumber", "serial_number"),
    ("HardwareId", "hardware_id"),
];

pub fn device_service_url(address: &NetworkAddress) -> String {
    format!("{}{}", http_base_url(address), ONVIF_DEVICE_SERVICE_PATH)
}

/// `http://host:port/onvif/media_service/streaming/channels/{1|2|3}`
pub fn templated_stream_url(address: &NetworkAddress, quality: StreamQuality) -> String {
    format!(
        "{}/onvif/media_service/streaming/channels/{}",
        http_base_url(address),
        quality.channel()
    )
}

pub fn templated_snapshot_url(address: &NetworkAddress) -> String {
    format!("{}{}", http_base_url(address), ONVIF_SNAPSHOT_PATH)
}

/// ONVIF-capable cameras; credentials are mandatory
pub struct OnvifStrategy {
    name: String,
    priority: i32,
    brand: Option<String>,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl OnvifStrategy {
    pub fn new(request_timeout: Duration) -> ConnectionResult<Self> {
        Ok(Self {
            name: ONVIF_STRATEGY_NAME.to_string(),
            priority: ONVIF_DEFAULT_PRIORITY,
            brand: None,
            request_timeout,
            client: build_http_client(request_timeout)?,
        })
    }

    /// Strategy named `{Brand}ONVIF`, applicable only to that brand
    pub fn for_brand(brand: &str, request_timeout: Duration) -> ConnectionResult<Self> {
        let brand = brand.trim();
        if brand.is_empty() {
            return Err(ConnectionError::Validation(vec![
                "brand-scoped ONVIF strategy requires a brand".to_string(),
            ]));
        }
        Ok(Self {
            name: format!("{}{}", brand, ONVIF_STRATEGY_NAME),
            brand: Some(brand.to_string()),
            ..Self::new(request_timeout)?
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    /// GetDeviceInformation, keyed by `additional_info` names
    pub async fn device_information(&self, camera: &Camera) -> ConnectionResult<BTreeMap<String, String>> {
        ensure_addressable(camera)?;
        let url = device_service_url(camera.address());
        let response = post_soap(
            &self.client,
            &url,
            GET_DEVICE_INFORMATION,
            camera.credentials(),
            self.request_timeout,
        )
        .await?;

        Ok(parse_device_information(&response))
    }
}

fn parse_device_information(xml: &str) -> BTreeMap<String, String> {
    DEVICE_INFORMATION_FIELDS
        .iter()
        .filter_map(|(element, key)| {
            extract_xml_content(xml, element).map(|value| (key.to_string(), value))
        })
        .collect()
}

#[async_trait]
impl ConnectionStrategy for OnvifStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports_camera(&self, camera: &Camera) -> bool {
        if camera.camera_type() != CameraType::Onvif || !camera.has_credentials() {
            return false;
        }
        match &self.brand {
            Some(brand) => camera.brand().is_some_and(|b| b.eq_ignore_ascii_case(brand)),
            None => true,
        }
    }

    fn snapshot_url(&self, camera: &Camera) -> Option<String> {
        Some(
            camera
                .snapshot_url()
                .map(str::to_string)
                .unwrap_or_else(|| templated_snapshot_url(camera.address())),
        )
    }

    fn auth_header(&self, camera: &Camera) -> Option<String> {
        camera.credentials().map(basic_auth_header)
    }

    async fn test_connection(&self, camera: &Camera, timeout: Duration) -> ConnectionResult<bool> {
        ensure_addressable(camera)?;
        let url = device_service_url(camera.address());
        Ok(http_reachable(&self.client, &url, camera.credentials(), timeout).await)
    }

    async fn stream_url(&self, camera: &Camera, quality: StreamQuality) -> ConnectionResult<String> {
        ensure_addressable(camera)?;
        if let Some(url) = camera.stream_url() {
            return Ok(url.to_string());
        }
        Ok(templated_stream_url(camera.address(), quality))
    }

    async fn capture_snapshot(&self, camera: &Camera) -> ConnectionResult<Vec<u8>> {
        ensure_addressable(camera)?;
        let url = self
            .snapshot_url(camera)
            .unwrap_or_else(|| templated_snapshot_url(camera.address()));
        fetch_bytes(&self.client, &url, camera.credentials(), self.request_timeout).await
    }

    async fn enrich_connection_info(&self, camera: &Camera, info: ConnectionInfo) -> ConnectionInfo {
        match self.device_information(camera).await {
            Ok(details) => details
                .into_iter()
                .fold(info, |info, (key, value)| info.add_info(key, value)),
            Err(e) => {
                debug!(camera_id = %camera.id(), error = %e, "ONVIF device information unavailable");
                info
            }
        }
    }
}
