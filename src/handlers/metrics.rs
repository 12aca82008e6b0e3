use axum::{
    extract::State,
    http::{header, HeaderValue},
    response::IntoResponse,
    Json,
};
use std::fmt::Write as _;

use crate::metrics::MetricsStats;
use crate::state::AppState;

const CACHE_CONTROL_NO_CACHE: &str = "no-cache, no-store, must-revalidate";
const PROMETHEUS_CONTENT_TYPE: &str = "text/plain; version=0.0.4; charset=utf-8";
const METRIC_PREFIX: &str = "book_api_";

#[derive(Clone, Copy)]
enum Kind {
    Counter,
    Gauge,
}

impl Kind {
    fn as_str(self) -> &'static str {
        match self {
            Kind::Counter => "counter",
            Kind::Gauge => "gauge",
        }
    }
}

/// Finite, non-negative values only; anything else is exported as 0.
fn sanitize_value(value: f64) -> f64 {
    if value.is_finite() && value >= 0.0 {
        value
    } else {
        0.0
    }
}

fn push_metric(out: &mut String, name: &str, help: &str, kind: Kind, value: &str) {
    let _ = write!(
        out,
        "# HELP {METRIC_PREFIX}{name} {help}\n# TYPE {METRIC_PREFIX}{name} {kind}\n{METRIC_PREFIX}{name} {value}\n",
        kind = kind.as_str()
    );
}

fn render_prometheus(stats: &MetricsStats, active_keys: usize) -> String {
    let counters: [(&str, &str, u64); 4] = [
        ("requests_total", "Total number of requests", stats.total_requests),
        ("client_errors_total", "Responses with a 4xx status", stats.client_errors),
        ("server_errors_total", "Responses with a 5xx status", stats.server_errors),
        ("rate_limited_total", "Requests rejected by the rate limiter", stats.rate_limited),
    ];
    let gauges: [(&str, &str, String); 6] = [
        (
            "request_success_rate",
            "Request success rate percentage",
            format!("{:.2}", sanitize_value(stats.success_rate)),
        ),
        (
            "request_latency_ms",
            "Average request latency in milliseconds",
            format!("{:.2}", sanitize_value(stats.avg_latency_ms)),
        ),
        (
            "request_latency_p50_ms",
            "50th percentile request latency in milliseconds",
            stats.p50_latency_ms.to_string(),
        ),
        (
            "request_latency_p95_ms",
            "95th percentile request latency in milliseconds",
            stats.p95_latency_ms.to_string(),
        ),
        (
            "request_latency_p99_ms",
            "99th percentile request latency in milliseconds",
            stats.p99_latency_ms.to_string(),
        ),
        (
            "rate_limit_active_keys",
            "Client keys tracked by the rate limiters",
            active_keys.to_string(),
        ),
    ];

    let mut out = String::with_capacity(2048);
    for (name, help, value) in counters {
        push_metric(&mut out, name, help, Kind::Counter, &value.to_string());
    }
    for (name, help, value) in gauges {
        push_metric(&mut out, name, help, Kind::Gauge, &value);
    }
    out
}

async fn active_keys(state: &AppState) -> usize {
    let mut total = 0;
    for (_, limiter) in state.limiters.named() {
        total += limiter.tracked_keys().await;
    }
    total
}

pub async fn metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.metrics.get_stats().await;
    (
        [(
            header::CACHE_CONTROL,
            HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
        )],
        Json(stats),
    )
}

pub async fn prometheus_metrics_handler(State(state): State<AppState>) -> impl IntoResponse {
    let stats = state.metrics.get_stats().await;
    let body = render_prometheus(&stats, active_keys(&state).await);
    (
        [
            (
                header::CONTENT_TYPE,
                HeaderValue::from_static(PROMETHEUS_CONTENT_TYPE),
            ),
            (
                header::CACHE_CONTROL,
                HeaderValue::from_static(CACHE_CONTROL_NO_CACHE),
            ),
        ],
        body,
    )
}
