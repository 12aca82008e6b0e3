use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};
use num_traits::ToPrimitive;
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::RwLock;

const MAX_LATENCY_HISTORY: usize = 1000;

fn to_f64(value: u64) -> f64 {
    value.to_f64().unwrap_or(f64::MAX)
}

/// Nearest-rank percentile of already sorted samples.
pub fn percentile(sorted_data: &[u64], p: u8) -> u64 {
    if sorted_data.is_empty() {
        return 0;
    }

    let clamped = u128::from(p.min(100));
    let len = sorted_data.len() as u128;
    let raw_index = (len * clamped).div_ceil(100);
    let safe_index = raw_index.saturating_sub(1).min(len.saturating_sub(1));
    let index = usize::try_from(safe_index).unwrap_or(sorted_data.len().saturating_sub(1));

    sorted_data.get(index).copied().unwrap_or_default()
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MetricsStats {
    pub total_requests: u64,
    pub client_errors: u64,
    pub server_errors: u64,
    pub rate_limited: u64,
    pub success_rate: f64,
    pub avg_latency_ms: f64,
    pub p50_latency_ms: u64,
    pub p95_latency_ms: u64,
    pub p99_latency_ms: u64,
    pub uptime_seconds: u64,
}

#[derive(Default)]
struct Counters {
    total: u64,
    client_errors: u64,
    server_errors: u64,
    rate_limited: u64,
    durations_ms: VecDeque<u64>,
}

/// Request counters and a bounded latency window shared by all handlers.
#[derive(Clone)]
pub struct Metrics {
    counters: Arc<RwLock<Counters>>,
    started: Instant,
}

impl Metrics {
    #[must_use]
    pub fn new() -> Self {
        Self {
            counters: Arc::new(RwLock::new(Counters::default())),
            started: Instant::now(),
        }
    }

    pub async fn record(&self, status: u16, duration_ms: u64) {
        let mut counters = self.counters.write().await;
        counters.total += 1;
        match status {
            429 => {
                counters.rate_limited += 1;
                counters.client_errors += 1;
            }
            400..=499 => counters.client_errors += 1,
            500..=599 => counters.server_errors += 1,
            _ => {}
        }
        counters.durations_ms.push_back(duration_ms);
        if counters.durations_ms.len() > MAX_LATENCY_HISTORY {
            counters.durations_ms.pop_front();
        }
    }

    pub async fn get_stats(&self) -> MetricsStats {
        let counters = self.counters.read().await;

        let mut sorted: Vec<u64> = counters.durations_ms.iter().copied().collect();
        sorted.sort_unstable();
        let avg_latency_ms = if sorted.is_empty() {
            0.0
        } else {
            let total: f64 = sorted.iter().map(|&x| to_f64(x)).sum();
            total / to_f64(sorted.len() as u64)
        };

        let failed = counters.client_errors + counters.server_errors;
        let success_rate = if counters.total > 0 {
            to_f64(counters.total.saturating_sub(failed)) / to_f64(counters.total) * 100.0
        } else {
            0.0
        };

        MetricsStats {
            total_requests: counters.total,
            client_errors: counters.client_errors,
            server_errors: counters.server_errors,
            rate_limited: counters.rate_limited,
            success_rate,
            avg_latency_ms,
            p50_latency_ms: percentile(&sorted, 50),
            p95_latency_ms: percentile(&sorted, 95),
            p99_latency_ms: percentile(&sorted, 99),
            uptime_seconds: self.started.elapsed().as_secs(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

pub async fn track_metrics(
    State(metrics): State<Metrics>,
    request: Request,
    next: Next,
) -> Response {
    let start = Instant::now();
    let response = next.run(request).await;
    let elapsed_ms = u64::try_from(start.elapsed().as_millis()).unwrap_or(u64::MAX);
    metrics.record(response.status().as_u16(), elapsed_ms).await;
    response
}
