// @critical: Public endpoints
use super::test_utils::{read_json, TestServer, API};
use axum::http::StatusCode;

#[tokio::test]
async fn test_root_welcome_message() {
    let server = TestServer::new().await;
    let (status, body) = server.send("GET", "/", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Welcome to Book Collection API");
}

#[tokio::test]
async fn test_health_endpoint() {
    let server = TestServer::new().await;

    let response = server.call(server.make_request("GET", "/health", None, None)).await;
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(
        response.headers().get("cache-control").unwrap(),
        "no-cache, no-store, must-revalidate"
    );

    let json = read_json(response).await;
    assert_eq!(json["status"], "healthy");
    assert_eq!(json["version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(json["database"], "ok");
    let timestamp = json["timestamp"].as_str().expect("timestamp should be a string");
    assert!(chrono::DateTime::parse_from_rfc3339(timestamp).is_ok());
}

#[tokio::test]
async fn test_openapi_document() {
    let server = TestServer::new().await;
    let (status, doc) = server.send("GET", &format!("{API}/openapi.json"), None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert!(doc["openapi"].as_str().unwrap().starts_with('3'));
    assert_eq!(doc["info"]["title"], "Book Collection API");
    assert!(doc["paths"].get("/api/v1/books/").is_some());
}

#[tokio::test]
async fn test_unknown_route_is_404() {
    let server = TestServer::new().await;
    let response = server
        .call(server.make_request("GET", "/definitely/not/here", None, None))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}
