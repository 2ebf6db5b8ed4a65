//! Prometheus metrics exposition
//!
//! - `auth_logins_total` (counter)
//! - `auth_callbacks_total` (counter): label `outcome` (`success` or an error code)
//! - `spotify_api_requests_total` (counter): labels `endpoint`, `outcome`
//! - `spotify_api_request_duration_seconds` (histogram): label `endpoint`

use metrics_exporter_prometheus::{Matcher, PrometheusBuilder, PrometheusHandle};

const DURATION_METRIC: &str = "spotify_api_request_duration_seconds";

/// Spotify calls are bounded by the reqwest timeout, so 30s tops out the range.
const DURATION_BUCKETS: &[f64] = &[0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0];

fn builder() -> PrometheusBuilder {
    PrometheusBuilder::new()
        .set_buckets_for_metric(Matcher::Full(DURATION_METRIC.to_string()), DURATION_BUCKETS)
        .expect("failed to set histogram buckets")
}

/// Install the global Prometheus recorder and return a handle for `/metrics`.
pub fn install_recorder() -> PrometheusHandle {
    builder()
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// A participant started the sign-in flow.
pub fn record_login() {
    metrics::counter!("auth_logins_total").increment(1);
}

/// A callback finished. `outcome` is `success` or the failure's error code.
pub fn record_callback(outcome: &'static str) {
    metrics::counter!("auth_callbacks_total", "outcome" => outcome).increment(1);
}

/// A proxied Spotify Web API call finished.
pub fn record_api_call(endpoint: &'static str, outcome: &'static str, duration_secs: f64) {
    metrics::counter!("spotify_api_requests_total", "endpoint" => endpoint, "outcome" => outcome)
        .increment(1);
    metrics::histogram!(DURATION_METRIC, "endpoint" => endpoint).record(duration_secs);
}
