//! Prometheus metrics exposition
//!
//! HTTP-side metrics recorded by the relay:
//!
//! - `relay_requests_total` (counter): labels `route`, `status`
//! - `relay_request_duration_seconds` (histogram): label `route`
//! - `relay_lookup_errors_total` (counter): label `kind`
//!
//! The session layer records `relay_reauth_attempts_total` and
//! `relay_gate_rejections_total` itself; they share the recorder installed
//! here.

use metrics_exporter_prometheus::{PrometheusBuilder, PrometheusHandle};

/// Install the Prometheus recorder and return a handle for rendering metrics.
///
/// Configures `relay_request_duration_seconds` with explicit buckets so it
/// renders as a histogram (with `_bucket` lines for `histogram_quantile()`
/// queries) rather than the default summary. A gated search makes up to two
/// upstream round-trips, so the buckets run from 5ms to 60s, past the 30s
/// default upstream timeout.
pub fn install_recorder() -> PrometheusHandle {
    PrometheusBuilder::new()
        .set_buckets_for_metric(
            metrics_exporter_prometheus::Matcher::Full(
                "relay_request_duration_seconds".to_string(),
            ),
            &[
                0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
            ],
        )
        .expect("failed to set histogram buckets")
        .install_recorder()
        .expect("failed to install Prometheus recorder")
}

/// Record a completed request with route and status labels.
pub fn record_request(route: &str, status: u16, duration_secs: f64) {
    metrics::counter!("relay_requests_total", "route" => route.to_string(), "status" => status.to_string())
        .increment(1);
    metrics::histogram!("relay_request_duration_seconds", "route" => route.to_string())
        .record(duration_secs);
}

/// Record a failed driver lookup with a classification label.
pub fn record_lookup_error(kind: &str) {
    metrics::counter!("relay_lookup_errors_total", "kind" => kind.to_string()).increment(1);
}

#[cfg(test)]
mod tests {
    use super::*;
    use metrics_exporter_prometheus::PrometheusRecorder;

    #[test]
    fn record_functions_do_not_panic_without_recorder() {
        // When no recorder is installed, metrics calls are no-ops.
        record_request("/api/health", 200, 0.05);
        record_lookup_error("transport");
    }

    /// Create an isolated recorder/handle pair for unit tests.
    /// Uses build_recorder() instead of install_recorder() to avoid the
    /// global recorder singleton constraint: only one global recorder can
    /// exist per process, and install_recorder() panics on a second call.
    fn isolated_recorder() -> (PrometheusRecorder, PrometheusHandle) {
        let recorder = PrometheusBuilder::new()
            .set_buckets_for_metric(
                metrics_exporter_prometheus::Matcher::Full(
                    "relay_request_duration_seconds".to_string(),
                ),
                &[
                    0.005, 0.01, 0.025, 0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0,
                ],
            )
            .expect("failed to set histogram buckets")
            .build_recorder();
        let handle = recorder.handle();
        (recorder, handle)
    }

    #[test]
    fn record_request_increments_counter_and_histogram() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("/api/search-iracing-name", 200, 0.042);
        record_request("/api/search-iracing-name", 500, 1.5);

        let output = handle.render();
        assert!(
            output.contains("relay_requests_total"),
            "rendered output must contain relay_requests_total counter"
        );
        assert!(
            output.contains("route=\"/api/search-iracing-name\""),
            "counter must carry route label"
        );
        assert!(
            output.contains("status=\"200\""),
            "counter must carry status label"
        );
        assert!(
            output.contains("status=\"500\""),
            "second request status label must appear"
        );
        assert!(
            output.contains("relay_request_duration_seconds_bucket"),
            "histogram must render _bucket lines for histogram_quantile() queries"
        );
    }

    #[test]
    fn record_lookup_error_increments_counter_with_label() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_lookup_error("transport");
        record_lookup_error("upstream_status");

        let output = handle.render();
        assert!(
            output.contains("relay_lookup_errors_total"),
            "rendered output must contain relay_lookup_errors_total counter"
        );
        assert!(
            output.contains("kind=\"transport\""),
            "kind label must be recorded"
        );
        assert!(
            output.contains("kind=\"upstream_status\""),
            "distinct kind values must appear separately"
        );
    }

    #[test]
    fn histogram_buckets_cover_timeout_range() {
        let (recorder, handle) = isolated_recorder();
        let _guard = metrics::set_default_local_recorder(&recorder);

        record_request("/api/health", 200, 0.003); // 3ms, below lowest bucket

        let output = handle.render();
        assert!(output.contains("le=\"0.005\""), "5ms bucket must exist");
        assert!(
            output.contains("le=\"60\""),
            "60s bucket must exist past the default upstream timeout"
        );
        assert!(
            output.contains("le=\"+Inf\""),
            "+Inf bucket must exist (Prometheus convention)"
        );
    }
}
