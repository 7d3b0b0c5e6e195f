use super::probe::{build_http_client, fetch_bytes, http_reachable};
use super::{basic_auth_header, ensure_addressable, http_base_url, ConnectionStrategy};
use crate::error::ConnectionResult;
use crate::types::{Camera, CameraType, NetworkAddress, StreamQuality};
use async_trait::async_trait;
use std::time::Duration;
use tracing::debug;

pub const HTTP_STRATEGY_NAME: &str = "HTTP";
pub const HTTP_DEFAULT_PRIORITY: i32 = 30;
pub const DEFAULT_SNAPSHOT_PATH: &str = "/snapshot.jpg";

/// `http://host:port/video{1|2|3}`
pub fn templated_stream_url(address: &NetworkAddress, quality: StreamQuality) -> String {
    format!("{}/video{}", http_base_url(address), quality.channel())
}

pub fn templated_snapshot_url(address: &NetworkAddress) -> String {
    format!("{}{}", http_base_url(address), DEFAULT_SNAPSHOT_PATH)
}

/// Plain HTTP/MJPEG cameras
pub struct HttpStrategy {
    priority: i32,
    request_timeout: Duration,
    client: reqwest::Client,
}

impl HttpStrategy {
    pub fn new(request_timeout: Duration) -> ConnectionResult<Self> {
        Ok(Self {
            priority: HTTP_DEFAULT_PRIORITY,
            request_timeout,
            client: build_http_client(request_timeout)?,
        })
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }
}

#[async_trait]
impl ConnectionStrategy for HttpStrategy {
    fn name(&self) -> &str {
        HTTP_STRATEGY_NAME
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports_camera(&self, camera: &Camera) -> bool {
        camera.camera_type() == CameraType::Ip
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
        let url = http_base_url(camera.address());
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
        debug!(camera_id = %camera.id(), url = %url, "capturing HTTP snapshot");
        fetch_bytes(&self.client, &url, camera.credentials(), self.request_timeout).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::strategy::scripted::spawn_mock_camera;
    use axum::{http::StatusCode, routing::get, Router};
    use std::collections::HashSet;

    fn camera(port: u16) -> Camera {
        Camera::builder("Parking", "127.0.0.1", port, CameraType::Ip)
            .build()
            .unwrap()
    }

    fn strategy() -> HttpStrategy {
        HttpStrategy::new(Duration::from_secs(2)).unwrap()
    }

    #[tokio::test]
    async fn test_quality_tiers_yield_distinct_urls() {
        let strategy = strategy();
        let camera = camera(8080);

        let mut urls = HashSet::new();
        for quality in [StreamQuality::High, StreamQuality::Medium, StreamQuality::Low] {
            let url = strategy.stream_url(&camera, quality).await.unwrap();
            assert!(url.starts_with("http://127.0.0.1:8080/video"));
            urls.insert(url);
        }
        assert_eq!(urls.len(), 3);
        assert!(urls.contains("http://127.0.0.1:8080/video1"));
        assert!(urls.contains("http://127.0.0.1:8080/video3"));
    }

    #[tokio::test]
    async fn test_stored_urls_take_precedence() {
        let camera = Camera::builder("Parking", "10.1.1.1", 80, CameraType::Ip)
            .stream_url("http://10.1.1.1/mjpg/video.mjpg")
            .snapshot_url("http://10.1.1.1/jpg/image.jpg")
            .build()
            .unwrap();
        let strategy = strategy();

        assert_eq!(
            strategy.stream_url(&camera, StreamQuality::Low).await.unwrap(),
            "http://10.1.1.1/mjpg/video.mjpg"
        );
        assert_eq!(
            strategy.snapshot_url(&camera).as_deref(),
            Some("http://10.1.1.1/jpg/image.jpg")
        );
    }

    #[test]
    fn test_auth_header_only_with_credentials() {
        let strategy = strategy();
        assert!(strategy.auth_header(&camera(80)).is_none());

        let camera = Camera::builder("Parking", "10.1.1.1", 80, CameraType::Ip)
            .credentials("admin", "12345")
            .build()
            .unwrap();
        assert_eq!(
            strategy.auth_header(&camera).as_deref(),
            Some("Basic YWRtaW46MTIzNDU=")
        );
    }

    #[test]
    fn test_supports_only_ip_cameras() {
        let strategy = strategy();
        assert!(strategy.supports_camera(&camera(80)));

        let rtsp = Camera::builder("Dock", "10.1.1.1", 554, CameraType::Rtsp)
            .build()
            .unwrap();
        assert!(!strategy.supports_camera(&rtsp));
    }

    #[tokio::test]
    async fn test_connection_accepts_redirects() {
        let app = Router::new().route(
            "/",
            get(|| async { (StatusCode::FOUND, [("location", "/index.html")]) }),
        );
        let port = spawn_mock_camera(app).await;

        let passed = strategy()
            .test_connection(&camera(port), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(passed);
    }

    #[tokio::test]
    async fn test_connection_fails_on_server_error() {
        let app = Router::new().route("/", get(|| async { StatusCode::INTERNAL_SERVER_ERROR }));
        let port = spawn_mock_camera(app).await;

        let passed = strategy()
            .test_connection(&camera(port), Duration::from_secs(2))
            .await
            .unwrap();
        assert!(!passed);
    }

    #[tokio::test]
    async fn test_connection_respects_timeout() {
        // Accepts the socket but never answers
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        tokio::spawn(async move {
            let mut held = Vec::new();
            while let Ok((socket, _)) = listener.accept().await {
                held.push(socket);
            }
        });

        let start = std::time::Instant::now();
        let passed = strategy()
            .test_connection(&camera(port), Duration::from_millis(200))
            .await
            .unwrap();
        assert!(!passed);
        assert!(start.elapsed() < Duration::from_secs(2));
    }

    #[tokio::test]
    async fn test_capture_snapshot_returns_body() {
        let app = Router::new().route(
            DEFAULT_SNAPSHOT_PATH,
            get(|| async { ([("content-type", "image/jpeg")], vec![0xFFu8, 0xD8, 0xFF]) }),
        );
        let port = spawn_mock_camera(app).await;

        let bytes = strategy().capture_snapshot(&camera(port)).await.unwrap();
        assert_eq!(bytes, vec![0xFF, 0xD8, 0xFF]);
    }

    #[tokio::test]
    async fn test_capture_snapshot_reports_missing_endpoint() {
        let port = spawn_mock_camera(Router::new()).await;
        let result = strategy().capture_snapshot(&camera(port)).await;
        assert!(matches!(result, Err(crate::error::ConnectionError::Transport(_))));
    }
}
