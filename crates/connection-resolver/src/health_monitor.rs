use crate::connection_info::ConnectionInfo;
use crate::error::ConnectionError;
use crate::resolver::ConnectionResolver;
use crate::types::Camera;
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

/// Result of one monitoring check for a camera
#[derive(Debug, Clone)]
pub enum MonitorOutcome {
    Connected(ConnectionInfo),
    /// A previously connected camera can no longer be reached
    Disconnected(ConnectionInfo),
    /// Resolution failed with no prior connection to fall back on
    Failed(Vec<String>),
}

/// Where monitored cameras come from and where outcomes go
#[async_trait]
pub trait CameraSource: Send + Sync {
    /// Cameras monitored this cycle; an id missing from the list is no
    /// longer monitored and its last known connection is dropped
    async fn cameras_due(&self) -> anyhow::Result<Vec<Camera>>;

    async fn record_outcome(&self, camera_id: &str, outcome: &MonitorOutcome) -> anyhow::Result<()>;
}

/// Periodically re-resolves cameras, keeping the last known connection per camera
#[derive(Clone)]
pub struct ConnectionMonitor {
    resolver: ConnectionResolver,
    source: Arc<dyn CameraSource>,
    known: Arc<RwLock<HashMap<String, ConnectionInfo>>>,
    check_interval: Duration,
    max_concurrency: usize,
}

impl ConnectionMonitor {
    pub fn new(resolver: ConnectionResolver, source: Arc<dyn CameraSource>) -> Self {
        let check_interval = resolver.config().monitor_interval;
        let max_concurrency = resolver.config().monitor_max_concurrency.max(1);
        Self {
            resolver,
            source,
            known: Arc::new(RwLock::new(HashMap::new())),
            check_interval,
            max_concurrency,
        }
    }

    pub async fn last_known(&self, camera_id: &str) -> Option<ConnectionInfo> {
        self.known.read().await.get(camera_id).cloned()
    }

    /// Run check cycles until `cancel` fires
    pub async fn start(&self, cancel: CancellationToken) {
        info!(
            interval_secs = self.check_interval.as_secs(),
            max_concurrency = self.max_concurrency,
            "connection monitor started"
        );

        loop {
            if let Err(e) = self.run_cycle(&cancel).await {
                error!("connection check cycle failed: {}", e);
            }

            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(self.check_interval) => {}
            }
        }

        info!("connection monitor stopped");
    }

    /// Check every due camera once; returns how many outcomes were recorded
    pub async fn run_cycle(&self, cancel: &CancellationToken) -> anyhow::Result<usize> {
        let cameras = self.source.cameras_due().await?;
        self.forget_missing(&cameras).await;
        if cameras.is_empty() {
            return Ok(0);
        }

        info!("checking connections for {} cameras", cameras.len());

        let mut recorded = 0;
        for batch in cameras.chunks(self.max_concurrency) {
            if cancel.is_cancelled() {
                break;
            }

            let mut tasks = JoinSet::new();
            for camera in batch {
                let monitor = self.clone();
                let camera = camera.clone();
                let cancel = cancel.clone();
                tasks.spawn(async move { monitor.check_and_record(camera, cancel).await });
            }

            while let Some(joined) = tasks.join_next().await {
                match joined {
                    Ok(Ok(true)) => recorded += 1,
                    Ok(Ok(false)) => {}
                    Ok(Err(e)) => error!("failed to record connection outcome: {}", e),
                    Err(e) => error!("connection check task failed: {}", e),
                }
            }
        }

        Ok(recorded)
    }

    async fn forget_missing(&self, cameras: &[Camera]) {
        let monitored: HashSet<&str> = cameras.iter().map(|c| c.id()).collect();
        let mut known = self.known.write().await;
        let before = known.len();
        known.retain(|id, _| monitored.contains(id.as_str()));

        let dropped = before - known.len();
        if dropped > 0 {
            debug!(dropped, "forgot cameras no longer monitored");
        }
    }

    async fn check_and_record(&self, camera: Camera, cancel: CancellationToken) -> anyhow::Result<bool> {
        let Some(outcome) = self.check_camera(&camera, &cancel).await else {
            return Ok(false);
        };

        match &outcome {
            MonitorOutcome::Connected(info) | MonitorOutcome::Disconnected(info) => {
                self.known
                    .write()
                    .await
                    .insert(camera.id().to_string(), info.clone());
            }
            MonitorOutcome::Failed(_) => {}
        }

        self.source.record_outcome(camera.id(), &outcome).await?;
        Ok(true)
    }

    /// Try the last working strategy first, then fall back to full resolution.
    ///
    /// `None` when cancelled.
    async fn check_camera(&self, camera: &Camera, cancel: &CancellationToken) -> Option<MonitorOutcome> {
        let previous = self.last_known(camera.id()).await;

        if let Some(prev) = previous.as_ref().filter(|p| p.is_connected()) {
            match self
                .resolver
                .connect_with_strategy(prev.connection_type(), camera, cancel)
                .await
            {
                Ok(info) if info == *prev => return Some(MonitorOutcome::Connected(prev.update_heartbeat())),
                Ok(info) => return Some(MonitorOutcome::Connected(info)),
                Err(ConnectionError::Cancelled) => return None,
                Err(e) => debug!(
                    camera_id = %camera.id(),
                    strategy = %prev.connection_type(),
                    error = %e,
                    "last known strategy failed, re-resolving"
                ),
            }
        }

        match self.resolver.resolve(camera, cancel).await {
            Ok(info) => {
                if previous.as_ref().map_or(true, |p| !p.is_connected()) {
                    info!(
                        camera_id = %camera.id(),
                        camera_name = %camera.name(),
                        connection_type = %info.connection_type(),
                        "camera came online"
                    );
                }
                Some(MonitorOutcome::Connected(info))
            }
            Err(ConnectionError::Cancelled) => None,
            Err(e) => match previous {
                Some(prev) if prev.is_connected() => {
                    warn!(
                        camera_id = %camera.id(),
                        camera_name = %camera.name(),
                        error = %e,
                        "camera disconnected"
                    );
                    Some(MonitorOutcome::Disconnected(prev.set_as_disconnected()))
                }
                _ => {
                    warn!(
                        camera_id = %camera.id(),
                        camera_name = %camera.name(),
                        error = %e,
                        "camera connection check failed"
                    );
                    Some(MonitorOutcome::Failed(e.messages()))
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ResolverConfig;
    use crate::registry::StrategyRegistry;
    use crate::strategy::scripted::{ProbeBehavior, ScriptedStrategy};
    use crate::types::CameraType;
    use std::sync::Mutex;

    struct InMemorySource {
        cameras: Mutex<Vec<Camera>>,
        outcomes: Mutex<Vec<(String, MonitorOutcome)>>,
    }

    impl InMemorySource {
        fn with_cameras(cameras: Vec<Camera>) -> Arc<Self> {
            Arc::new(Self {
                cameras: Mutex::new(cameras),
                outcomes: Mutex::new(Vec::new()),
            })
        }

        fn set_cameras(&self, cameras: Vec<Camera>) {
            *self.cameras.lock().unwrap() = cameras;
        }

        fn take(&self) -> Vec<(String, MonitorOutcome)> {
            std::mem::take(&mut *self.outcomes.lock().unwrap())
        }
    }

    #[async_trait]
    impl CameraSource for InMemorySource {
        async fn cameras_due(&self) -> anyhow::Result<Vec<Camera>> {
            Ok(self.cameras.lock().unwrap().clone())
        }

        async fn record_outcome(&self, camera_id: &str, outcome: &MonitorOutcome) -> anyhow::Result<()> {
            self.outcomes
                .lock()
                .unwrap()
                .push((camera_id.to_string(), outcome.clone()));
            Ok(())
        }
    }

    fn camera(id: &str) -> Camera {
        Camera::builder("Yard", "10.0.0.8", 9000, CameraType::Ip)
            .id(id)
            .build()
            .unwrap()
    }

    fn config() -> ResolverConfig {
        ResolverConfig::default()
            .with_probe_timeout(Duration::from_millis(200))
            .with_monitor_interval(Duration::from_millis(20))
            .with_monitor_max_concurrency(2)
    }

    async fn monitor(
        registry: &StrategyRegistry,
        source: Arc<InMemorySource>,
    ) -> ConnectionMonitor {
        ConnectionMonitor::new(ConnectionResolver::new(registry.clone(), config()), source)
    }

    #[tokio::test]
    async fn test_connected_then_disconnected_then_failed() {
        let registry = StrategyRegistry::new();
        registry
            .register(Arc::new(ScriptedStrategy::new("Primary", 10, ProbeBehavior::Pass)))
            .await
            .unwrap();
        let source = InMemorySource::with_cameras(vec![camera("cam-1")]);
        let monitor = monitor(&registry, Arc::clone(&source)).await;
        let cancel = CancellationToken::new();

        assert_eq!(monitor.run_cycle(&cancel).await.unwrap(), 1);
        let outcomes = source.take();
        assert!(matches!(&outcomes[0].1, MonitorOutcome::Connected(info) if info.connection_type() == "Primary"));

        registry.unregister("Primary").await;
        registry
            .register(Arc::new(ScriptedStrategy::new("Primary", 10, ProbeBehavior::Fail)))
            .await
            .unwrap();

        monitor.run_cycle(&cancel).await.unwrap();
        let outcomes = source.take();
        match &outcomes[0].1 {
            MonitorOutcome::Disconnected(info) => {
                assert!(!info.is_connected());
                assert!(info.last_heartbeat().is_some());
            }
            other => panic!("expected disconnect, got {:?}", other),
        }

        monitor.run_cycle(&cancel).await.unwrap();
        let outcomes = source.take();
        assert!(matches!(&outcomes[0].1, MonitorOutcome::Failed(messages) if !messages.is_empty()));
        assert!(!monitor.last_known("cam-1").await.unwrap().is_connected());
    }

    #[tokio::test]
    async fn test_known_strategy_is_reused() {
        let registry = StrategyRegistry::new();
        let preferred = ScriptedStrategy::new("Preferred", 10, ProbeBehavior::Fail);
        let backup = ScriptedStrategy::new("Backup", 20, ProbeBehavior::Pass);
        let preferred_calls = preferred.calls();
        registry.register(Arc::new(preferred)).await.unwrap();
        registry.register(Arc::new(backup)).await.unwrap();

        let source = InMemorySource::with_cameras(vec![camera("cam-1")]);
        let monitor = monitor(&registry, Arc::clone(&source)).await;
        let cancel = CancellationToken::new();

        monitor.run_cycle(&cancel).await.unwrap();
        let first = monitor.last_known("cam-1").await.unwrap();
        assert_eq!(first.connection_type(), "Backup");
        assert_eq!(preferred_calls.load(std::sync::atomic::Ordering::SeqCst), 1);

        monitor.run_cycle(&cancel).await.unwrap();
        let second = monitor.last_known("cam-1").await.unwrap();
        assert_eq!(second.connection_type(), "Backup");
        assert_eq!(second.connected_at(), first.connected_at());
        assert!(second.last_heartbeat() >= first.last_heartbeat());
        // Fast path skipped the failing preferred strategy
        assert_eq!(preferred_calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_cycle_covers_every_camera_in_batches() {
        let registry = StrategyRegistry::new();
        registry
            .register(Arc::new(ScriptedStrategy::new("Primary", 10, ProbeBehavior::Pass)))
            .await
            .unwrap();
        let cameras = (0..5).map(|i| camera(&format!("cam-{}", i))).collect();
        let source = InMemorySource::with_cameras(cameras);
        let monitor = monitor(&registry, Arc::clone(&source)).await;

        assert_eq!(monitor.run_cycle(&CancellationToken::new()).await.unwrap(), 5);
        let mut ids: Vec<_> = source.take().into_iter().map(|(id, _)| id).collect();
        ids.sort();
        assert_eq!(ids, vec!["cam-0", "cam-1", "cam-2", "cam-3", "cam-4"]);
    }

    #[tokio::test]
    async fn test_cameras_no_longer_due_are_forgotten() {
        let registry = StrategyRegistry::new();
        registry
            .register(Arc::new(ScriptedStrategy::new("Primary", 10, ProbeBehavior::Pass)))
            .await
            .unwrap();
        let source = InMemorySource::with_cameras(vec![camera("cam-1"), camera("cam-2")]);
        let monitor = monitor(&registry, Arc::clone(&source)).await;
        let cancel = CancellationToken::new();

        monitor.run_cycle(&cancel).await.unwrap();
        assert!(monitor.last_known("cam-1").await.is_some());
        assert!(monitor.last_known("cam-2").await.is_some());

        source.set_cameras(vec![camera("cam-2")]);
        assert_eq!(monitor.run_cycle(&cancel).await.unwrap(), 1);
        assert!(monitor.last_known("cam-1").await.is_none());
        assert!(monitor.last_known("cam-2").await.is_some());

        source.set_cameras(Vec::new());
        assert_eq!(monitor.run_cycle(&cancel).await.unwrap(), 0);
        assert!(monitor.last_known("cam-2").await.is_none());
    }

    #[tokio::test]
    async fn test_start_stops_on_cancel() {
        let registry = StrategyRegistry::new();
        let source = InMemorySource::with_cameras(Vec::new());
        let monitor = monitor(&registry, source).await;

        let cancel = CancellationToken::new();
        let handle = {
            let cancel = cancel.clone();
            tokio::spawn(async move { monitor.start(cancel).await })
        };

        tokio::time::sleep(Duration::from_millis(50)).await;
        cancel.cancel();
        tokio::time::timeout(Duration::from_secs(2), handle)
            .await
            .unwrap()
            .unwrap();
    }
}
