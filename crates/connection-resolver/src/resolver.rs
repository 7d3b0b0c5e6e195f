use crate::config::{FallbackMode, ResolverConfig};
use crate::connection_info::ConnectionInfo;
use crate::error::{ConnectionError, ConnectionResult};
use crate::registry::StrategyRegistry;
use crate::strategy::rtsp::{rtsp_url, templated_stream_path, RTSP_DEFAULT_PORT};
use crate::strategy::{duration_ms, http, onvif, ConnectionStrategy};
use crate::types::{Camera, CameraType, NetworkAddress, StreamQuality};
use common::validation;
use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tokio::task::{AbortHandle, JoinSet};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Extra time a strategy gets past its own timeout before it is abandoned
const PROBE_GRACE: Duration = Duration::from_millis(250);

/// Ports that hint an "ip" camera may also speak ONVIF
const ONVIF_AFFINITY_PORTS: [u16; 3] = [80, 8080, 554];

/// Keys of the map returned by [`ConnectionResolver::generate_default_urls`]
pub mod url_keys {
    pub const RTSP_MAIN: &str = "rtsp_main";
    pub const RTSP_SUB: &str = "rtsp_sub";
    pub const HTTP_STREAM: &str = "http_stream";
    pub const SNAPSHOT: &str = "snapshot";
    pub const DEVICE: &str = "device";
    pub const FALLBACK_DEVICE: &str = "fallback_device";
    pub const ONVIF_STREAM: &str = "onvif_stream";
    pub const STORED_STREAM: &str = "stored_stream";
    pub const STORED_SNAPSHOT: &str = "stored_snapshot";
}

type Strategy = Arc<dyn ConnectionStrategy>;

fn collect(errors: &mut Vec<String>, result: anyhow::Result<()>) {
    if let Err(e) = result {
        errors.push(e.to_string());
    }
}

/// Check every connection-relevant attribute and report all violations at once
pub fn validate_camera(camera: &Camera) -> ConnectionResult<()> {
    let mut errors = Vec::new();

    collect(&mut errors, validation::validate_name(camera.name(), "camera name"));
    collect(&mut errors, validation::validate_host(camera.host(), "network address"));
    collect(&mut errors, validation::validate_port(camera.port()));

    if let Some(url) = camera.stream_url() {
        collect(&mut errors, validation::validate_uri(url, "stream URL"));
    }
    if let Some(url) = camera.snapshot_url() {
        collect(&mut errors, validation::validate_uri(url, "snapshot URL"));
    }

    if let Some(creds) = camera.raw_credentials() {
        let has_user = !creds.username.trim().is_empty();
        let has_password = !creds.password.trim().is_empty();
        if has_user != has_password {
            errors.push("credentials must include both a username and a password".to_string());
        }
    }

    if camera.camera_type() == CameraType::Onvif && !camera.has_credentials() {
        errors.push("ONVIF cameras require a username and password".to_string());
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(ConnectionError::Validation(errors))
    }
}

fn onvif_affinity(camera: &Camera) -> bool {
    camera.camera_type().as_str().contains("ip") && ONVIF_AFFINITY_PORTS.contains(&camera.port())
}

/// Apply the secondary heuristics to a priority-ordered candidate list.
///
/// Brand affinity wins over the ONVIF port heuristic; at most one strategy
/// is moved to the front.
pub fn rank(camera: &Camera, mut candidates: Vec<Strategy>) -> Vec<Strategy> {
    let brand_match = camera.brand().and_then(|brand| {
        let brand = brand.to_lowercase();
        candidates
            .iter()
            .position(|s| s.name().to_lowercase().contains(&brand))
    });

    let promoted = brand_match.or_else(|| {
        if onvif_affinity(camera) {
            candidates
                .iter()
                .position(|s| s.name().to_lowercase().contains("onvif"))
        } else {
            None
        }
    });

    if let Some(index) = promoted.filter(|&i| i > 0) {
        let strategy = candidates.remove(index);
        candidates.insert(0, strategy);
    }
    candidates
}

struct AbortOnDrop(AbortHandle);

impl Drop for AbortOnDrop {
    fn drop(&mut self) {
        self.0.abort();
    }
}

/// Test one candidate in its own task so faults and panics stay contained.
/// Dropping the returned future abandons the probe.
async fn probe_candidate(strategy: Strategy, camera: Camera, limit: Duration) -> bool {
    let name = strategy.name().to_string();
    let camera_id = camera.id().to_string();
    let start = Instant::now();

    let task = tokio::spawn(async move { strategy.test_connection(&camera, limit).await });
    let _guard = AbortOnDrop(task.abort_handle());
    let result = tokio::time::timeout(limit + PROBE_GRACE, task).await;

    let (passed, outcome) = match result {
        Ok(Ok(Ok(true))) => (true, "passed"),
        Ok(Ok(Ok(false))) => (false, "failed"),
        Ok(Ok(Err(e))) => {
            warn!(camera_id = %camera_id, strategy = %name, error = %e, "connection test faulted");
            (false, "error")
        }
        Ok(Err(e)) => {
            warn!(camera_id = %camera_id, strategy = %name, error = %e, "connection test task aborted");
            (false, "error")
        }
        Err(_) => {
            warn!(camera_id = %camera_id, strategy = %name, timeout_ms = duration_ms(limit), "connection test timeout");
            (false, "timeout")
        }
    };

    let elapsed = start.elapsed();
    telemetry::metrics::record_probe(&name, outcome, elapsed.as_secs_f64());
    debug!(
        camera_id = %camera_id,
        strategy = %name,
        outcome,
        elapsed_ms = duration_ms(elapsed),
        "connection test finished"
    );
    passed
}

/// Lowest rank that passed, once every better rank has reported
fn decided_winner(outcomes: &[Option<bool>]) -> Option<usize> {
    for (rank, outcome) in outcomes.iter().enumerate() {
        match outcome {
            Some(true) => return Some(rank),
            Some(false) => continue,
            None => return None,
        }
    }
    None
}

fn outcome_label<T>(result: &ConnectionResult<T>) -> &'static str {
    match result {
        Ok(_) => "success",
        Err(e) => e.kind(),
    }
}

/// Chooses a connection strategy for a camera and produces its `ConnectionInfo`.
///
/// Stateless between calls; the registry is the only shared state.
#[derive(Clone)]
pub struct ConnectionResolver {
    registry: StrategyRegistry,
    config: ResolverConfig,
}

impl ConnectionResolver {
    pub fn new(registry: StrategyRegistry, config: ResolverConfig) -> Self {
        Self { registry, config }
    }

    pub fn registry(&self) -> &StrategyRegistry {
        &self.registry
    }

    pub fn config(&self) -> &ResolverConfig {
        &self.config
    }

    pub fn validate_camera(&self, camera: &Camera) -> ConnectionResult<()> {
        validate_camera(camera)
    }

    /// Supported strategies after heuristics; `NoCandidate` when none match
    pub async fn rank_candidates(&self, camera: &Camera) -> ConnectionResult<Vec<Strategy>> {
        let supported = self.registry.supported(camera).await;
        if supported.is_empty() {
            return Err(ConnectionError::NoCandidate(camera.id().to_string()));
        }
        Ok(rank(camera, supported))
    }

    /// Best-ranked candidate, without any network verification
    pub async fn select_optimal_strategy(&self, camera: &Camera) -> ConnectionResult<Strategy> {
        let result: ConnectionResult<_> = async {
            validate_camera(camera)?;
            let candidates = self.rank_candidates(camera).await?;
            candidates
                .into_iter()
                .next()
                .ok_or_else(|| ConnectionError::NoCandidate(camera.id().to_string()))
        }
        .await;

        telemetry::metrics::record_resolution("select_optimal", outcome_label(&result));
        result
    }

    /// First ranked candidate whose connection test passes
    pub async fn test_and_select_best_strategy(
        &self,
        camera: &Camera,
        cancel: &CancellationToken,
    ) -> ConnectionResult<Strategy> {
        let result = self.select_by_testing(camera, cancel).await;
        telemetry::metrics::record_resolution("test_and_select", outcome_label(&result));
        result
    }

    /// Fallback selection followed by `ConnectionInfo` production
    pub async fn resolve(
        &self,
        camera: &Camera,
        cancel: &CancellationToken,
    ) -> ConnectionResult<ConnectionInfo> {
        let result: ConnectionResult<_> = async {
            let strategy = self.select_by_testing(camera, cancel).await?;
            let info = strategy.connection_info(camera, true).await?;

            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
                info = strategy.enrich_connection_info(camera, info) => Ok(info),
            }
        }
        .await;

        match &result {
            Ok(info) => info!(
                camera_id = %camera.id(),
                connection_type = %info.connection_type(),
                stream_url_scheme = %info.stream_url().split("://").next().unwrap_or_default(),
                "camera connection resolved"
            ),
            Err(e) => warn!(camera_id = %camera.id(), error = %e, "camera connection resolution failed"),
        }
        telemetry::metrics::record_resolution("resolve", outcome_label(&result));
        result
    }

    /// Connect through a named strategy after re-checking it supports the camera
    pub async fn connect_with_strategy(
        &self,
        name: &str,
        camera: &Camera,
        cancel: &CancellationToken,
    ) -> ConnectionResult<ConnectionInfo> {
        let result: ConnectionResult<_> = async {
            validate_camera(camera)?;
            let strategy = self.registry.get(name).await?;
            if !strategy.supports_camera(camera) {
                return Err(ConnectionError::unsupported(
                    strategy.name(),
                    format!("connecting camera {}", camera.id()),
                ));
            }

            let limit = self.config.probe_timeout + self.config.request_timeout + PROBE_GRACE;
            tokio::select! {
                biased;
                _ = cancel.cancelled() => Err(ConnectionError::Cancelled),
                outcome = tokio::time::timeout(limit, strategy.connect(camera, self.config.probe_timeout)) => {
                    outcome.unwrap_or_else(|_| Err(ConnectionError::Unreachable {
                        strategy: strategy.name().to_string(),
                        camera_id: camera.id().to_string(),
                    }))
                }
            }
        }
        .await;

        telemetry::metrics::record_resolution("connect_with_strategy", outcome_label(&result));
        result
    }

    async fn select_by_testing(
        &self,
        camera: &Camera,
        cancel: &CancellationToken,
    ) -> ConnectionResult<Strategy> {
        validate_camera(camera)?;
        let candidates = self.rank_candidates(camera).await?;
        if cancel.is_cancelled() {
            return Err(ConnectionError::Cancelled);
        }

        debug!(
            camera_id = %camera.id(),
            candidates = ?candidates.iter().map(|s| s.name()).collect::<Vec<_>>(),
            "testing ranked candidates"
        );

        let winner = match self.config.fallback {
            FallbackMode::Sequential => self.test_sequentially(camera, &candidates, cancel).await?,
            FallbackMode::Concurrent { max_in_flight } => {
                self.test_concurrently(camera, &candidates, max_in_flight, cancel)
                    .await?
            }
        };

        match winner {
            Some(strategy) => {
                info!(camera_id = %camera.id(), strategy = %strategy.name(), "strategy passed connection test");
                Ok(strategy)
            }
            None => Err(ConnectionError::AllCandidatesFailed {
                camera_id: camera.id().to_string(),
                tried: candidates.iter().map(|s| s.name().to_string()).collect(),
            }),
        }
    }

    async fn test_sequentially(
        &self,
        camera: &Camera,
        candidates: &[Strategy],
        cancel: &CancellationToken,
    ) -> ConnectionResult<Option<Strategy>> {
        for strategy in candidates {
            let probe = probe_candidate(
                Arc::clone(strategy),
                camera.clone(),
                self.config.probe_timeout,
            );

            let passed = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    info!(camera_id = %camera.id(), strategy = %strategy.name(), "resolution cancelled");
                    return Err(ConnectionError::Cancelled);
                }
                passed = probe => passed,
            };

            if passed {
                return Ok(Some(Arc::clone(strategy)));
            }
        }
        Ok(None)
    }

    async fn test_concurrently(
        &self,
        camera: &Camera,
        candidates: &[Strategy],
        max_in_flight: usize,
        cancel: &CancellationToken,
    ) -> ConnectionResult<Option<Strategy>> {
        let semaphore = Arc::new(Semaphore::new(max_in_flight.max(1)));
        let mut tasks = JoinSet::new();

        for (rank, strategy) in candidates.iter().enumerate() {
            let semaphore = Arc::clone(&semaphore);
            let strategy = Arc::clone(strategy);
            let camera = camera.clone();
            let limit = self.config.probe_timeout;

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                (rank, probe_candidate(strategy, camera, limit).await)
            });
        }

        let mut outcomes = vec![None; candidates.len()];
        loop {
            let next = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    tasks.abort_all();
                    info!(camera_id = %camera.id(), "resolution cancelled");
                    return Err(ConnectionError::Cancelled);
                }
                next = tasks.join_next() => next,
            };

            match next {
                Some(Ok((rank, passed))) => outcomes[rank] = Some(passed),
                Some(Err(e)) => {
                    // probe_candidate contains strategy faults; only aborts land here
                    debug!(error = %e, "candidate task ended without a result");
                }
                None => break,
            }

            if let Some(rank) = decided_winner(&outcomes) {
                tasks.abort_all();
                return Ok(Some(Arc::clone(&candidates[rank])));
            }
        }

        Ok(None)
    }

    /// Plausible URLs for every protocol family consistent with the camera's
    /// declared type, keyed by [`url_keys`]
    pub fn generate_default_urls(&self, camera: &Camera) -> ConnectionResult<BTreeMap<String, String>> {
        validate_camera(camera)?;

        let address = camera.address();
        let mut urls = BTreeMap::new();
        let mut put = |key: &str, value: String| {
            urls.insert(key.to_string(), value);
        };

        let rtsp_address = match camera.camera_type() {
            CameraType::Rtsp => address.clone(),
            _ => NetworkAddress::new(address.host.clone(), RTSP_DEFAULT_PORT),
        };
        let fallback_address =
            NetworkAddress::new(address.host.clone(), if address.port == 80 { 8080 } else { 80 });

        let rtsp = |quality: StreamQuality| {
            templated_stream_path(quality)
                .map(|path| rtsp_url(camera, &rtsp_address, &path))
                .unwrap_or_default()
        };

        match camera.camera_type() {
            CameraType::Ip => {
                put(url_keys::RTSP_MAIN, rtsp(StreamQuality::High));
                put(url_keys::RTSP_SUB, rtsp(StreamQuality::Medium));
                put(url_keys::HTTP_STREAM, http::templated_stream_url(address, StreamQuality::High));
                put(url_keys::SNAPSHOT, http::templated_snapshot_url(address));
                put(url_keys::DEVICE, onvif::device_service_url(address));
                put(url_keys::FALLBACK_DEVICE, onvif::device_service_url(&fallback_address));
            }
            CameraType::Rtsp => {
                put(url_keys::RTSP_MAIN, rtsp(StreamQuality::High));
                put(url_keys::RTSP_SUB, rtsp(StreamQuality::Medium));
            }
            CameraType::Onvif => {
                put(url_keys::DEVICE, onvif::device_service_url(address));
                put(url_keys::FALLBACK_DEVICE, onvif::device_service_url(&fallback_address));
                put(url_keys::ONVIF_STREAM, onvif::templated_stream_url(address, StreamQuality::High));
                put(url_keys::SNAPSHOT, onvif::templated_snapshot_url(address));
                put(url_keys::RTSP_MAIN, rtsp(StreamQuality::High));
                put(url_keys::RTSP_SUB, rtsp(StreamQuality::Medium));
            }
            CameraType::Webcam => {
                put(url_keys::HTTP_STREAM, http::templated_stream_url(address, StreamQuality::High));
                put(url_keys::SNAPSHOT, http::templated_snapshot_url(address));
            }
            CameraType::Usb | CameraType::Analog => {}
        }

        if let Some(url) = camera.stream_url() {
            put(url_keys::STORED_STREAM, url.to_string());
        }
        if let Some(url) = camera.snapshot_url() {
            put(url_keys::STORED_SNAPSHOT, url.to_string());
        }

        Ok(urls)
    }
}
