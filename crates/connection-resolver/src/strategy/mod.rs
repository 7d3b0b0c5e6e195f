pub mod http;
pub mod onvif;
mod probe;
pub mod rtsp;
#[cfg(test)]
pub(crate) mod scripted;

pub use http::HttpStrategy;
pub use onvif::OnvifStrategy;
pub use rtsp::{RtspStrategy, VendorProfile};

pub(crate) use probe::duration_ms;

use crate::connection_info::ConnectionInfo;
use crate::error::{ConnectionError, ConnectionResult};
use crate::types::{Camera, Credentials, NetworkAddress, StreamQuality};
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::time::Duration;

/// A pluggable implementation of one camera protocol family.
///
/// `supports_camera` must stay free of I/O: the registry calls it while
/// filtering and the resolver calls it again before connecting through a
/// named strategy. Network operations always honour the supplied timeout
/// and report ordinary connectivity failures as `Ok(false)`.
#[async_trait]
pub trait ConnectionStrategy: Send + Sync {
    /// Unique strategy name, e.g. "RTSP" or "HikvisionONVIF"
    fn name(&self) -> &str;

    /// Lower values are tried first
    fn priority(&self) -> i32;

    fn supports_camera(&self, camera: &Camera) -> bool;

    /// Snapshot endpoint, if the protocol has one
    fn snapshot_url(&self, _camera: &Camera) -> Option<String> {
        None
    }

    /// `Authorization` header value for HTTP-based protocols
    fn auth_header(&self, _camera: &Camera) -> Option<String> {
        None
    }

    async fn test_connection(&self, camera: &Camera, timeout: Duration) -> ConnectionResult<bool>;

    async fn stream_url(&self, camera: &Camera, quality: StreamQuality) -> ConnectionResult<String>;

    async fn capture_snapshot(&self, camera: &Camera) -> ConnectionResult<Vec<u8>>;

    /// Compose URLs into a `ConnectionInfo` without touching the network
    async fn connection_info(&self, camera: &Camera, connected: bool) -> ConnectionResult<ConnectionInfo> {
        let stream_url = self.stream_url(camera, StreamQuality::High).await?;
        let backup_stream_url = match self.stream_url(camera, StreamQuality::Medium).await {
            Ok(url) if url != stream_url => Some(url),
            _ => None,
        };

        let mut info = ConnectionInfo::new(stream_url, self.name(), connected)?
            .with_snapshot_url(self.snapshot_url(camera))
            .with_backup_stream_url(backup_stream_url)
            .add_info("camera_id", camera.id())
            .add_info("address", camera.address().authority());

        if self.auth_header(camera).is_some() {
            info = info.add_info("auth", "basic");
        }

        Ok(info)
    }

    /// Protocol-specific enrichment after a confirmed connection.
    ///
    /// Best-effort: implementations must not fail the connection here.
    async fn enrich_connection_info(&self, _camera: &Camera, info: ConnectionInfo) -> ConnectionInfo {
        info
    }

    async fn connect(&self, camera: &Camera, timeout: Duration) -> ConnectionResult<ConnectionInfo> {
        if !self.test_connection(camera, timeout).await? {
            return Err(ConnectionError::Unreachable {
                strategy: self.name().to_string(),
                camera_id: camera.id().to_string(),
            });
        }

        let info = self.connection_info(camera, true).await?;
        Ok(self.enrich_connection_info(camera, info).await)
    }
}

/// Fails when the camera lacks the fields every network strategy needs
pub(crate) fn ensure_addressable(camera: &Camera) -> ConnectionResult<()> {
    let mut errors = Vec::new();
    if camera.host().is_empty() {
        errors.push(format!("camera {} has no network host", camera.id()));
    }
    if camera.port() == 0 {
        errors.push(format!("camera {} has no network port", camera.id()));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConnectionError::Validation(errors))
    }
}

pub(crate) fn http_base_url(address: &NetworkAddress) -> String {
    format!("http://{}", address.authority())
}

pub(crate) fn basic_auth_header(credentials: &Credentials) -> String {
    let token = STANDARD.encode(format!("{}:{}", credentials.username, credentials.password));
    format!("Basic {}", token)
}
