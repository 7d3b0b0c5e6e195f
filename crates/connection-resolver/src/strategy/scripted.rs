//! Test doubles shared by the crate's unit tests

use super::ConnectionStrategy;
use crate::error::{ConnectionError, ConnectionResult};
use crate::types::{Camera, CameraType, StreamQuality};
use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, Clone, Copy)]
pub(crate) enum ProbeBehavior {
    Pass,
    Fail,
    Error,
    Panic,
    /// Resolve after the delay with the given outcome
    Delayed(Duration, bool),
    /// Never resolve
    Hang,
}

pub(crate) struct ScriptedStrategy {
    name: String,
    priority: i32,
    types: Vec<CameraType>,
    behavior: ProbeBehavior,
    calls: Arc<AtomicUsize>,
}

impl ScriptedStrategy {
    pub(crate) fn new(name: &str, priority: i32, behavior: ProbeBehavior) -> Self {
        Self {
            name: name.to_string(),
            priority,
            types: CameraType::ALL.to_vec(),
            behavior,
            calls: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub(crate) fn for_types(mut self, types: &[CameraType]) -> Self {
        self.types = types.to_vec();
        self
    }

    /// Shared probe counter, readable after the strategy moves into a registry
    pub(crate) fn calls(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.calls)
    }
}

#[async_trait]
impl ConnectionStrategy for ScriptedStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    fn priority(&self) -> i32 {
        self.priority
    }

    fn supports_camera(&self, camera: &Camera) -> bool {
        self.types.contains(&camera.camera_type())
    }

    async fn test_connection(&self, _camera: &Camera, _timeout: Duration) -> ConnectionResult<bool> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.behavior {
            ProbeBehavior::Pass => Ok(true),
            ProbeBehavior::Fail => Ok(false),
            ProbeBehavior::Error => Err(ConnectionError::transport("scripted fault")),
            ProbeBehavior::Panic => panic!("scripted panic"),
            ProbeBehavior::Delayed(delay, outcome) => {
                tokio::time::sleep(delay).await;
                Ok(outcome)
            }
            ProbeBehavior::Hang => {
                std::future::pending::<()>().await;
                Ok(false)
            }
        }
    }

    async fn stream_url(&self, camera: &Camera, quality: StreamQuality) -> ConnectionResult<String> {
        Ok(format!(
            "{}://{}/{}",
            self.name.to_lowercase(),
            camera.address().authority(),
            quality.as_str()
        ))
    }

    async fn capture_snapshot(&self, _camera: &Camera) -> ConnectionResult<Vec<u8>> {
        Err(ConnectionError::unsupported(&self.name, "snapshot capture"))
    }
}

/// Serve `router` on an ephemeral localhost port
pub(crate) async fn spawn_mock_camera(router: axum::Router) -> u16 {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let port = listener.local_addr().unwrap().port();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    port
}
