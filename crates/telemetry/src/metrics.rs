use lazy_static::lazy_static;
use prometheus::{Encoder, HistogramOpts, HistogramVec, IntCounterVec, IntGaugeVec, Opts, Registry, TextEncoder};

lazy_static! {
    pub static ref REGISTRY: Registry = Registry::new();

    // ==== Connection probes ====
    pub static ref CONNECTION_PROBES: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "camera_connect_probes_total",
                "Total number of strategy connectivity probes",
            ),
            &["strategy", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref CONNECTION_PROBE_DURATION: HistogramVec = {
        let metric = HistogramVec::new(
            HistogramOpts::new(
                "camera_connect_probe_duration_seconds",
                "Duration of strategy connectivity probes",
            )
            .buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0]),
            &["strategy"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    // ==== Resolution ====
    pub static ref RESOLUTIONS: IntCounterVec = {
        let metric = IntCounterVec::new(
            Opts::new(
                "camera_connect_resolutions_total",
                "Total number of connection resolutions",
            ),
            &["operation", "outcome"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };

    pub static ref REGISTERED_STRATEGIES: IntGaugeVec = {
        let metric = IntGaugeVec::new(
            Opts::new(
                "camera_connect_registered_strategies",
                "Number of registered connection strategies per registry",
            ),
            &["registry"],
        )
        .expect("metric can be created");
        REGISTRY.register(Box::new(metric.clone())).ok();
        metric
    };
}

/// Record the outcome of a single strategy probe
pub fn record_probe(strategy: &str, outcome: &str, elapsed_secs: f64) {
    CONNECTION_PROBES
        .with_label_values(&[strategy, outcome])
        .inc();
    CONNECTION_PROBE_DURATION
        .with_label_values(&[strategy])
        .observe(elapsed_secs);
}

/// Set the strategy count reported for one registry
pub fn set_registered_strategies(registry: &str, count: usize) {
    REGISTERED_STRATEGIES
        .with_label_values(&[registry])
        .set(i64::try_from(count).unwrap_or(i64::MAX));
}

/// Record the outcome of a resolver operation
pub fn record_resolution(operation: &str, outcome: &str) {
    RESOLUTIONS.with_label_values(&[operation, outcome]).inc();
}

/// Encode all registered metrics in the prometheus text format
pub fn encode_metrics() -> anyhow::Result<String> {
    let encoder = TextEncoder::new();
    let metric_families = REGISTRY.gather();
    let mut buffer = Vec::new();
    encoder.encode(&metric_families, &mut buffer)?;
    Ok(String::from_utf8(buffer)?)
}
