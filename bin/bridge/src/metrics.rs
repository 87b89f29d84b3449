//! Prometheus metrics for the bridge.

use metrics::{counter, describe_counter, describe_histogram, histogram};
use session::SessionEvent;
use std::time::Duration;

/// Aggregated metrics for the bridge.
///
/// Metrics are registered with the global metrics registry on creation.
#[derive(Debug, Clone)]
pub struct Metrics {
    _private: (),
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

impl Metrics {
    pub fn new() -> Self {
        Self::register_descriptions();
        Self { _private: () }
    }

    fn register_descriptions() {
        describe_counter!(
            "bridge_rpc_requests_total",
            "Total number of JSON-RPC requests by method"
        );
        describe_counter!(
            "bridge_rpc_failures_total",
            "Total number of failed JSON-RPC requests by method"
        );
        describe_histogram!(
            "bridge_rpc_request_duration_seconds",
            "Duration of JSON-RPC requests in seconds"
        );
        describe_counter!(
            "bridge_session_transitions_total",
            "Session lifecycle transitions by kind"
        );
    }

    /// Record a served request.
    pub fn record_request(&self, method: &str, success: bool, duration: Duration) {
        counter!("bridge_rpc_requests_total", "method" => method.to_string()).increment(1);
        histogram!("bridge_rpc_request_duration_seconds", "method" => method.to_string())
            .record(duration.as_secs_f64());

        if !success {
            counter!("bridge_rpc_failures_total", "method" => method.to_string()).increment(1);
        }
    }

    pub fn record_session_event(&self, event: &SessionEvent) {
        let kind = match event {
            SessionEvent::LoggedIn { .. } => "login",
            SessionEvent::Idle => "idle",
            SessionEvent::LoggedOut { .. } => "logout",
        };
        counter!("bridge_session_transitions_total", "kind" => kind).increment(1);
    }
}

/// Install the Prometheus metrics exporter and start the HTTP server.
pub fn install_prometheus_exporter(port: u16) -> eyre::Result<()> {
    use metrics_exporter_prometheus::PrometheusBuilder;
    use std::net::SocketAddr;

    let addr = SocketAddr::from(([0, 0, 0, 0], port));

    PrometheusBuilder::new()
        .with_http_listener(addr)
        .install()
        .map_err(|e| eyre::eyre!("Failed to install Prometheus exporter: {}", e))?;

    Ok(())
}
