use super::probe::tcp_reachable;
use super::{ensure_addressable, ConnectionStrategy};
use crate::error::{ConnectionError, ConnectionResult};
use crate::types::{Camera, CameraType, NetworkAddress, StreamQuality};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;
use url::Url;

pub const RTSP_STRATEGY_NAME: &str = "RTSP";
pub const RTSP_DEFAULT_PRIORITY: i32 = 20;
pub const RTSP_VENDOR_PRIORITY: i32 = 15;
pub const RTSP_DEFAULT_PORT: u16 = 554;

/// Vendor RTSP path layouts; unlike the generic layout these define a
/// low-quality tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VendorProfile {
    Hikvision,
    Dahua,
}

impl VendorProfile {
    pub const ALL: [VendorProfile; 2] = [VendorProfile::Hikvision, VendorProfile::Dahua];

    pub fn brand(&self) -> &'static str {
        match self {
            VendorProfile::Hikvision => "Hikvision",
            VendorProfile::Dahua => "Dahua",
        }
    }

    pub fn matches_brand(&self, brand: &str) -> bool {
        brand.trim().eq_ignore_ascii_case(self.brand())
    }

    pub fn stream_path(&self, quality: StreamQuality) -> String {
        match self {
            VendorProfile::Hikvision => format!("/Streaming/Channels/10{}", quality.channel()),
            VendorProfile::Dahua => format!(
                "/cam/realmonitor?channel=1&subtype={}",
                quality.channel() - 1
            ),
        }
    }
}

/// `rtsp://[user:pass@]host:port{path}`, with credentials percent-encoded
pub fn rtsp_url(camera: &Camera, address: &NetworkAddress, path: &str) -> String {
    let base = format!("rtsp://{}{}", address.authority(), path);
    let Some(creds) = camera.credentials() else {
        return base;
    };

    match Url::parse(&base) {
        Ok(mut url) => {
            if url.set_username(&creds.username).is_err() || url.set_password(Some(&creds.password)).is_err() {
                return base;
            }
            url.to_string()
        }
        Err(e) => {
            debug!(url = %base, error = %e, "RTSP URL not parseable, credentials omitted");
            base
        }
    }
}

/// Generic `/stream{1|2}` layout; there is no conventional low tier
pub fn templated_stream_path(quality: StreamQuality) -> Option<String> {
    match quality {
        StreamQuality::High | StreamQuality::Medium => Some(format!("/stream{}", quality.channel())),
        StreamQuality::Low => None,
    }
}

/// RTSP streaming devices, optionally scoped to one vendor
pub struct RtspStrategy {
    name: String,
    priority: i32,
    vendor: Option<VendorProfile>,
}

impl RtspStrategy {
    pub fn new() -> Self {
        Self {
            name: RTSP_STRATEGY_NAME.to_string(),
            priority: RTSP_DEFAULT_PRIORITY,
            vendor: None,
        }
    }

    /// Strategy named `{Brand}RTSP`, applicable only to that brand
    pub fn for_vendor(vendor: VendorProfile) -> Self {
        Self {
            name: format!("{}{}", vendor.brand(), RTSP_STRATEGY_NAME),
            priority: RTSP_VENDOR_PRIORITY,
            vendor: Some(vendor),
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    fn stream_path(&self, quality: StreamQuality) -> ConnectionResult<String> {
        match self.vendor {
            Some(vendor) => Ok(vendor.stream_path(quality)),
            None => templated_stream_path(quality).ok_or_else(|| {
                ConnectionError::unsupported(&self.name, "low-quality stream without a vendor profile")
            }),
        }
    }
}

impl Default for RtspStrategy {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl ConnectionStrategy for RtspStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports_camera(&self, camera: &Camera) -> bool {
        if camera.camera_type() != CameraType::Rtsp {
            return false;
        }
        match self.vendor {
            Some(vendor) => camera.brand().is_some_and(|b| vendor.matches_brand(b)),
            None => true,
        }
    }

    async fn test_connection(&self, camera: &Camera, timeout: Duration) -> ConnectionResult<bool> {
        ensure_addressable(camera)?;
        Ok(tcp_reachable(camera.address(), timeout).await)
    }

    async fn stream_url(&self, camera: &Camera, quality: StreamQuality) -> ConnectionResult<String> {
        ensure_addressable(camera)?;
        if let Some(url) = camera.stream_url() {
            return Ok(url.to_string());
        }
        let path = self.stream_path(quality)?;
        Ok(rtsp_url(camera, camera.address(), &path))
    }

    async fn capture_snapshot(&self, _camera: &Camera) -> ConnectionResult<Vec<u8>> {
        Err(ConnectionError::unsupported(&self.name, "snapshot capture"))
    }
}
