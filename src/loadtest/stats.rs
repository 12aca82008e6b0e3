use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use serde::Serialize;
use tokio::sync::Mutex;

use crate::metrics::percentile;

#[derive(Debug, Default)]
struct Entry {
    failures: u64,
    latencies_ms: Vec<u64>,
}

/// Per-request-name latency and failure counts shared by all simulated users.
#[derive(Clone)]
pub struct StatsCollector {
    entries: Arc<Mutex<HashMap<String, Entry>>>,
    started: Instant,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestSummary {
    pub name: String,
    pub count: u64,
    pub failures: u64,
    pub avg_ms: f64,
    pub min_ms: u64,
    pub max_ms: u64,
    pub p50_ms: u64,
    pub p95_ms: u64,
    pub p99_ms: u64,
    pub rps: f64,
}

impl RequestSummary {
    fn from_entry(name: &str, entry: &Entry, elapsed: Duration) -> Self {
        let mut sorted = entry.latencies_ms.clone();
        sorted.sort_unstable();
        let count = sorted.len() as u64;
        let avg_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };
        let secs = elapsed.as_secs_f64();

        Self {
            name: name.to_string(),
            count,
            failures: entry.failures,
            avg_ms,
            min_ms: sorted.first().copied().unwrap_or(0),
            max_ms: sorted.last().copied().unwrap_or(0),
            p50_ms: percentile(&sorted, 50),
            p95_ms: percentile(&sorted, 95),
            p99_ms: percentile(&sorted, 99),
            rps: if secs > 0.0 { count as f64 / secs } else { 0.0 },
        }
    }

    pub fn fail_ratio(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            self.failures as f64 / self.count as f64
        }
    }
}

impl Default for StatsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl StatsCollector {
    pub fn new() -> Self {
        Self {
            entries: Arc::new(Mutex::new(HashMap::new())),
            started: Instant::now(),
        }
    }

    pub async fn record(&self, name: &str, latency: Duration, failed: bool) {
        let mut entries = self.entries.lock().await;
        let entry = entries.entry(name.to_string()).or_default();
        entry.latencies_ms.push(latency.as_millis() as u64);
        if failed {
            entry.failures += 1;
        }
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }

    /// Summaries sorted by name, followed by the aggregate row.
    pub async fn snapshot(&self) -> (Vec<RequestSummary>, RequestSummary) {
        let entries = self.entries.lock().await;
        let elapsed = self.elapsed();

        let mut rows: Vec<RequestSummary> = entries
            .iter()
            .map(|(name, entry)| RequestSummary::from_entry(name, entry, elapsed))
            .collect();
        rows.sort_by(|a, b| a.name.cmp(&b.name));

        let mut all = Entry::default();
        for entry in entries.values() {
            all.failures += entry.failures;
            all.latencies_ms.extend_from_slice(&entry.latencies_ms);
        }
        (rows, RequestSummary::from_entry("Aggregated", &all, elapsed))
    }
}

/// Renders summaries in a fixed-width table.
pub fn render_table(rows: &[RequestSummary], total: &RequestSummary) -> String {
    let header = format!(
        "{:<32} {:>8} {:>8} {:>9} {:>7} {:>7} {:>7} {:>7} {:>7} {:>8}",
        "Name", "Reqs", "Fails", "Avg(ms)", "Min", "Max", "p50", "p95", "p99", "req/s"
    );
    let line = |r: &RequestSummary| {
        format!(
            "{:<32} {:>8} {:>8} {:>9.1} {:>7} {:>7} {:>7} {:>7} {:>7} {:>8.2}",
            r.name, r.count, r.failures, r.avg_ms, r.min_ms, r.max_ms, r.p50_ms, r.p95_ms, r.p99_ms, r.rps
        )
    };

    let mut out = vec![header.clone(), "-".repeat(header.len())];
    out.extend(rows.iter().map(line));
    out.push("-".repeat(header.len()));
    out.push(line(total));
    out.join("\n")
}
