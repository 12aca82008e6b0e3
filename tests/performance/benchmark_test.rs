// Performance testing: Latency benchmarks
// Run with: cargo test --release --test performance -- --ignored --nocapture

#[cfg(test)]
mod tests {
    use crate::test_utils::{TestServer, API};
    use book_collection_api::metrics::percentile;
    use std::time::Instant;

    async fn seeded_server() -> (TestServer, String) {
        let server = TestServer::new().await;
        let token = server.register_user("bench").await;
        let author = server.create_author(&token, "Bench Author").await["id"]
            .as_i64()
            .unwrap();
        for i in 0..100 {
            server
                .create_book(&token, &format!("Book {i}"), author, &format!("Genre {}", i % 5), 2000 + i % 20)
                .await;
        }
        (server, token)
    }

    fn report(label: &str, latencies: &mut [u64]) -> u64 {
        latencies.sort_unstable();
        let p50 = percentile(latencies, 50);
        let p95 = percentile(latencies, 95);
        let p99 = percentile(latencies, 99);
        let avg = latencies.iter().sum::<u64>() / latencies.len() as u64;

        eprintln!("{label} ({} samples):", latencies.len());
        eprintln!("  Min: {}us", latencies[0]);
        eprintln!("  P50: {}us", p50);
        eprintln!("  P95: {}us", p95);
        eprintln!("  P99: {}us", p99);
        eprintln!("  Max: {}us", latencies[latencies.len() - 1]);
        eprintln!("  Avg: {}us", avg);
        p95
    }

    #[tokio::test]
    #[ignore]
    async fn test_list_books_latency() {
        let (server, token) = seeded_server().await;
        let mut latencies = Vec::new();

        for i in 0..200 {
            let uri = format!("{API}/books/?skip={}&limit=20", (i % 5) * 20);
            let start = Instant::now();
            let response = server
                .call(server.make_request("GET", &uri, None, Some(&token)))
                .await;
            let elapsed = start.elapsed();
            assert!(response.status().is_success());
            latencies.push(elapsed.as_micros() as u64);
        }

        let p95 = report("List books latency", &mut latencies);
        assert!(p95 < 100_000, "P95 latency too high: {}us", p95);
    }

    #[tokio::test]
    #[ignore]
    async fn test_search_latency() {
        let (server, token) = seeded_server().await;
        let mut latencies = Vec::new();

        for i in 0..200 {
            let uri = format!("{API}/books/search?q=book%20{}", i % 100);
            let start = Instant::now();
            let response = server
                .call(server.make_request("GET", &uri, None, Some(&token)))
                .await;
            let elapsed = start.elapsed();
            assert!(response.status().is_success());
            latencies.push(elapsed.as_micros() as u64);
        }

        let p95 = report("Search latency", &mut latencies);
        assert!(p95 < 100_000, "P95 latency too high: {}us", p95);
    }

    #[tokio::test]
    #[ignore]
    async fn test_health_throughput() {
        let server = TestServer::new().await;
        let iterations = 1000;

        let start = Instant::now();
        for _ in 0..iterations {
            let response = server
                .call(server.make_request("GET", "/health", None, None))
                .await;
            assert!(response.status().is_success());
        }
        let elapsed = start.elapsed();

        let rps = iterations as f64 / elapsed.as_secs_f64();
        eprintln!("Health throughput: {rps:.0} req/s over {iterations} requests");
        assert!(rps > 100.0, "Throughput too low: {rps:.0} req/s");
    }
}
