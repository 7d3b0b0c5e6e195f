use crate::config::ResolverConfig;
use crate::error::{ConnectionError, ConnectionResult};
use crate::strategy::{ConnectionStrategy, HttpStrategy, OnvifStrategy, RtspStrategy, VendorProfile};
use crate::types::Camera;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::info;

pub const DEFAULT_REGISTRY_LABEL: &str = "default";

/// Shared set of connection strategies, kept in registration order.
///
/// Cloning yields another handle to the same registry. The strategy count
/// gauge is keyed by `label`; registries sharing a label share the series.
#[derive(Clone)]
pub struct StrategyRegistry {
    label: Arc<str>,
    strategies: Arc<RwLock<Vec<Arc<dyn ConnectionStrategy>>>>,
}

impl StrategyRegistry {
    /// Create a new empty registry
    pub fn new() -> Self {
        Self::with_label(DEFAULT_REGISTRY_LABEL)
    }

    /// Empty registry reporting its metrics under `label`
    pub fn with_label(label: &str) -> Self {
        Self {
            label: Arc::from(label),
            strategies: Arc::new(RwLock::new(Vec::new())),
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Registry holding the built-in ONVIF, RTSP, vendor RTSP and HTTP strategies
    pub async fn with_defaults(config: &ResolverConfig) -> ConnectionResult<Self> {
        let registry = Self::new();
        registry
            .register(Arc::new(OnvifStrategy::new(config.request_timeout)?))
            .await?;
        registry.register(Arc::new(RtspStrategy::new())).await?;
        for vendor in VendorProfile::ALL {
            registry
                .register(Arc::new(RtspStrategy::for_vendor(vendor)))
                .await?;
        }
        registry
            .register(Arc::new(HttpStrategy::new(config.request_timeout)?))
            .await?;
        Ok(registry)
    }

    /// Register a strategy; names are unique, ignoring case
    pub async fn register(&self, strategy: Arc<dyn ConnectionStrategy>) -> ConnectionResult<()> {
        let mut strategies = self.strategies.write().await;
        let name = strategy.name().to_string();

        if strategies
            .iter()
            .any(|s| s.name().eq_ignore_ascii_case(&name))
        {
            return Err(ConnectionError::DuplicateStrategy(name));
        }

        let priority = strategy.priority();
        strategies.push(strategy);
        telemetry::metrics::set_registered_strategies(&self.label, strategies.len());
        info!(strategy = %name, priority, "registered connection strategy");
        Ok(())
    }

    /// Remove a strategy by name; returns whether one was removed
    pub async fn unregister(&self, name: &str) -> bool {
        let mut strategies = self.strategies.write().await;
        let before = strategies.len();
        strategies.retain(|s| !s.name().eq_ignore_ascii_case(name));
        let removed = strategies.len() != before;

        if removed {
            telemetry::metrics::set_registered_strategies(&self.label, strategies.len());
            info!(strategy = %name, "unregistered connection strategy");
        }
        removed
    }

    pub async fn get(&self, name: &str) -> ConnectionResult<Arc<dyn ConnectionStrategy>> {
        let strategies = self.strategies.read().await;
        strategies
            .iter()
            .find(|s| s.name().eq_ignore_ascii_case(name))
            .cloned()
            .ok_or_else(|| ConnectionError::StrategyNotFound(name.to_string()))
    }

    /// Strategies claiming support for `camera`, ascending by priority.
    ///
    /// Equal priorities keep registration order. An empty list is not an error.
    pub async fn supported(&self, camera: &Camera) -> Vec<Arc<dyn ConnectionStrategy>> {
        let strategies = self.strategies.read().await;
        let mut supported: Vec<_> = strategies
            .iter()
            .filter(|s| s.supports_camera(camera))
            .cloned()
            .collect();
        supported.sort_by_key(|s| s.priority());
        supported
    }

    /// Registered names in priority order
    pub async fn names(&self) -> Vec<String> {
        let strategies = self.strategies.read().await;
        let mut ordered: Vec<_> = strategies.iter().collect();
        ordered.sort_by_key(|s| s.priority());
        ordered.into_iter().map(|s| s.name().to_string()).collect()
    }

    pub async fn count(&self) -> usize {
        self.strategies.read().await.len()
    }
}

impl Default for StrategyRegistry {
    fn default() -> Self {
        Self::new()
    }
}
