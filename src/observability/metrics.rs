use prometheus::{Histogram, HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry};
use tracing::info;
use std::sync::Arc;
use tokio::sync::OnceCell;


// Declare the static OnceCell to hold the Metrics.
static METRICS_INSTANCE: OnceCell<Arc<Metrics>> = OnceCell::const_new();

/// Asynchronously initializes and gets a reference to the static `Metrics`.
pub async fn get_metrics() -> &'static Arc<Metrics> {
    METRICS_INSTANCE.get_or_init(|| async {
        info!("Initializing Metrics ...");
        Metrics::new()}
    ).await
}


#[derive(Clone)]
pub struct Metrics {
    pub registry: Registry,

    // Token store metrics
    pub token_refresh_requests: IntCounter,
    pub token_refresh_failures: IntCounterVec,
    pub token_refresh_duration: Histogram,
    pub token_invalidations: IntCounter,
    pub token_valid_until_unix: IntGauge,

    // Search metrics
    pub search_attempts: IntCounterVec,
    pub search_duration: HistogramVec,
    pub search_retries_exceeded: IntCounter,

    // Config/runtime
    pub parse_failures: IntCounter,
    pub config_validation_errors: IntCounter,
    pub up: IntGauge,
}

impl Metrics {
    fn new() -> Arc<Self> {
        let registry = Registry::new_custom(Some("marketsearch".into()), None).unwrap();

        let metrics: Arc<Metrics> = Arc::new(Self {
            // Token store
            token_refresh_requests: IntCounter::new("token_refresh_requests_total", "Identity endpoint round trips").unwrap(),
            token_refresh_failures: IntCounterVec::new(Opts::new("token_refresh_failures_total", "Token refresh failures by reason"),&["reason"],).unwrap(),
            token_refresh_duration: Histogram::with_opts(HistogramOpts::new("token_refresh_duration_seconds", "Token refresh duration seconds").buckets(vec![0.01, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0])).unwrap(),
            token_invalidations: IntCounter::new("token_invalidations_total", "Forced credential invalidations").unwrap(),
            token_valid_until_unix: IntGauge::new("token_valid_until_unix_seconds", "Local expiry of the cached credential").unwrap(),

            // Search
            search_attempts: IntCounterVec::new(Opts::new("search_attempts_total", "Search attempts by outcome"),&["outcome"],).unwrap(),
            search_duration: HistogramVec::new(HistogramOpts::new("search_duration_seconds", "Search execution duration seconds").buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 15.0]),&["outcome"],).unwrap(),
            search_retries_exceeded: IntCounter::new("search_retries_exceeded_total", "Searches that exhausted every attempt").unwrap(),

            // Config/runtime
            parse_failures: IntCounter::new("config_parse_failures_total", "Config parse failures").unwrap(),
            config_validation_errors: IntCounter::new("config_validation_errors_total","Validation errors during startup",).unwrap(),
            up: IntGauge::new("up", "1 if service is healthy").unwrap(),

            registry,
        });

        // Register all metrics in the registry
        let reg = &metrics.registry;
        reg.register(Box::new(metrics.token_refresh_requests.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_failures.clone())).unwrap();
        reg.register(Box::new(metrics.token_refresh_duration.clone())).unwrap();
        reg.register(Box::new(metrics.token_invalidations.clone())).unwrap();
        reg.register(Box::new(metrics.token_valid_until_unix.clone())).unwrap();
        reg.register(Box::new(metrics.search_attempts.clone())).unwrap();
        reg.register(Box::new(metrics.search_duration.clone())).unwrap();
        reg.register(Box::new(metrics.search_retries_exceeded.clone())).unwrap();
        reg.register(Box::new(metrics.parse_failures.clone())).unwrap();
        reg.register(Box::new(metrics.config_validation_errors.clone())).unwrap();
        reg.register(Box::new(metrics.up.clone())).unwrap();

        metrics
    }
}
