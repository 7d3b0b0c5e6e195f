use anyhow::{Context, Result};
use connection_resolver::{Camera, ConnectionResolver, ResolverConfig, StrategyRegistry};
use serde_json::{json, Value};
use tokio_util::sync::CancellationToken;
use tracing::info;

#[tokio::main]
async fn main() -> Result<()> {
    telemetry::init_with_service("camera-connect");

    let config = ResolverConfig::from_env();

    let camera_file = std::env::args()
        .nth(1)
        .or_else(|| std::env::var("CAMERA_FILE").ok())
        .context("usage: camera-connect <cameras.json> (or set CAMERA_FILE)")?;

    let raw = tokio::fs::read_to_string(&camera_file)
        .await
        .with_context(|| format!("failed to read {}", camera_file))?;
    let cameras: Vec<Camera> =
        serde_json::from_str(&raw).with_context(|| format!("invalid camera list in {}", camera_file))?;

    let registry = StrategyRegistry::with_defaults(&config).await?;
    let resolver = ConnectionResolver::new(registry, config);

    let cancel = CancellationToken::new();
    tokio::spawn({
        let cancel = cancel.clone();
        async move {
            shutdown_signal().await;
            cancel.cancel();
        }
    });

    info!(cameras = cameras.len(), "resolving camera connections");

    let mut report = Vec::with_capacity(cameras.len());
    for camera in &cameras {
        if cancel.is_cancelled() {
            break;
        }

        let default_urls = match resolver.generate_default_urls(camera) {
            Ok(urls) => json!(urls),
            Err(e) => json!({ "errors": e.messages() }),
        };
        let resolution = match resolver.resolve(camera, &cancel).await {
            Ok(info) => serde_json::to_value(&info)?,
            Err(e) => json!({ "error": e.kind(), "messages": e.messages() }),
        };

        report.push(json!({
            "camera_id": camera.id(),
            "name": camera.name(),
            "default_urls": default_urls,
            "connection": resolution,
        }));
    }

    println!("{}", serde_json::to_string_pretty(&Value::Array(report))?);
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        let _ = tokio::signal::ctrl_c().await;
    };

    #[cfg(unix)]
    let terminate = async {
        use tokio::signal::unix::{signal, SignalKind};
        if let Ok(mut sigterm) = signal(SignalKind::terminate()) {
            let _ = sigterm.recv().await;
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("shutdown signal received, cancelling resolution");
}
