// @critical: Metrics endpoint tests
use super::test_utils::{read_json, TestServer, API};
use axum::http::StatusCode;

#[tokio::test]
async fn test_metrics_endpoint_returns_json() {
    let server = TestServer::new().await;

    let response = server.call(server.make_request("GET", "/metrics", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK, "Metrics endpoint must return 200 OK");

    let json = read_json(response).await;
    assert!(json.get("total_requests").is_some());
    assert!(json.get("uptime_seconds").is_some());
    assert!(json.get("p95_latency_ms").is_some());
}

#[tokio::test]
async fn test_metrics_count_requests_by_class() {
    let server = TestServer::new().await;

    server.send("GET", "/health", None, None).await;
    server.send("GET", &format!("{API}/auth/me"), None, None).await;
    server.login("nobody", "wrong-password").await;

    let (_, json) = server.send("GET", "/metrics", None, None).await;
    // The metrics request itself is recorded after its response is built.
    assert_eq!(json["total_requests"], 3);
    assert_eq!(json["client_errors"], 2);
    assert_eq!(json["server_errors"], 0);
}

#[tokio::test]
async fn test_metrics_prometheus_format() {
    let server = TestServer::new().await;
    server.send("GET", "/", None, None).await;

    let response = server
        .call(server.make_request("GET", "/metrics/prometheus", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default()
        .to_string();
    assert!(content_type.starts_with("text/plain"), "got {content_type}");

    let text = read_json(response).await;
    let text = text.as_str().expect("prometheus output is plain text");
    assert!(text.contains("# TYPE book_api_requests_total counter"));
    assert!(text.contains("book_api_requests_total 1\n"));
    assert!(text.contains("book_api_rate_limit_active_keys 0\n"));
}
