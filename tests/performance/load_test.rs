// Performance testing: Load testing against a real listener
// Run with: cargo test --release --test performance -- --ignored --nocapture

#[cfg(test)]
mod tests {
    use crate::test_utils::API;
    use book_collection_api::app::{create_app_router, serve};
    use book_collection_api::config::AppConfig;
    use book_collection_api::db::Database;
    use book_collection_api::loadtest::{run, LoadShape, RunConfig};
    use book_collection_api::state::AppState;
    use std::sync::Arc;
    use std::time::{Duration, Instant};
    use tokio::sync::{oneshot, Semaphore};

    /// Starts the full server on an ephemeral port. Dropping the sender stops it.
    async fn spawn_server() -> (String, oneshot::Sender<()>) {
        let db = Database::open_in_memory().await.unwrap();
        let state = AppState::new(AppConfig::for_tests(), db).unwrap();
        let app = create_app_router(state);

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = oneshot::channel::<()>();
        tokio::spawn(async move {
            let shutdown = async move {
                let _ = rx.await;
            };
            serve(listener, app, shutdown).await.unwrap();
        });
        (format!("http://{addr}"), tx)
    }

    #[tokio::test]
    #[ignore]
    async fn test_load_generator_against_live_server() {
        let (host, _shutdown) = spawn_server().await;

        let report = run(RunConfig {
            host,
            shape: LoadShape {
                users: 6,
                spawn_rate: 6.0,
                run_time: Duration::from_secs(8),
            },
            fail_ratio: Some(0.5),
            report_interval: Duration::from_secs(2),
        })
        .await
        .unwrap();

        eprintln!("{}", report.table());
        assert!(report.total.count > 0);
        // Random id probes may miss, and invalid logins always fail.
        assert!(!report.exceeded_fail_ratio(), "fail ratio {}", report.total.fail_ratio());
        assert!(report.rows.iter().any(|r| r.name == "POST /books/" && r.failures == 0));
    }

    #[tokio::test]
    #[ignore]
    async fn test_concurrent_requests() {
        let (host, _shutdown) = spawn_server().await;
        let client = reqwest::Client::new();

        let registered: serde_json::Value = client
            .post(format!("{host}{API}/auth/register"))
            .json(&serde_json::json!({
                "email": "load@example.com",
                "username": "load",
                "password": "s3cure-pass",
            }))
            .send()
            .await
            .unwrap()
            .json()
            .await
            .unwrap();
        let token = registered["access_token"].as_str().unwrap().to_string();

        let concurrency = 20;
        let total = 400;
        let semaphore = Arc::new(Semaphore::new(concurrency));
        let mut handles = Vec::new();
        let start = Instant::now();

        for i in 0..total {
            let permit = semaphore.clone().acquire_owned().await.unwrap();
            let client = client.clone();
            let url = if i % 2 == 0 {
                format!("{host}{API}/books/")
            } else {
                format!("{host}{API}/authors/")
            };
            let token = token.clone();
            handles.push(tokio::spawn(async move {
                let status = client
                    .get(url)
                    .bearer_auth(token)
                    .send()
                    .await
                    .map(|r| r.status().as_u16());
                drop(permit);
                status
            }));
        }

        let mut success_count = 0;
        let mut error_count = 0;
        for handle in handles {
            match tokio::time::timeout(Duration::from_secs(30), handle).await {
                Ok(Ok(Ok(status))) if status < 400 => success_count += 1,
                _ => error_count += 1,
            }
        }

        let elapsed = start.elapsed();
        eprintln!(
            "Concurrent load: {} ok, {} errors in {:.2}s ({:.0} req/s)",
            success_count,
            error_count,
            elapsed.as_secs_f64(),
            total as f64 / elapsed.as_secs_f64()
        );
        assert_eq!(error_count, 0);
    }
}
