//! Built-in endpoints served next to the image routes:
//! - `/health` - liveness with uptime and version
//! - `/metrics` - Prometheus text export

use std::time::Instant;

use crate::metrics::export_prometheus;

pub const HEALTH_PATH: &str = "/health";
pub const METRICS_PATH: &str = "/metrics";

/// Response from a special endpoint handler
#[derive(Debug, Clone)]
pub struct EndpointResponse {
    pub status: u16,
    pub content_type: &'static str,
    pub body: String,
}

impl EndpointResponse {
    pub fn json(status: u16, body: String) -> Self {
        Self {
            status,
            content_type: "application/json",
            body,
        }
    }

    pub fn prometheus(body: String) -> Self {
        Self {
            status: 200,
            content_type: "text/plain; version=0.0.4",
            body,
        }
    }
}

pub fn handle_health(start_time: Instant, route_prefixes: &[String]) -> EndpointResponse {
    let body = serde_json::json!({
        "status": "healthy",
        "uptime_seconds": start_time.elapsed().as_secs(),
        "version": env!("CARGO_PKG_VERSION"),
        "handlers": route_prefixes,
    })
    .to_string();

    EndpointResponse::json(200, body)
}

pub fn handle_metrics() -> EndpointResponse {
    EndpointResponse::prometheus(export_prometheus())
}
