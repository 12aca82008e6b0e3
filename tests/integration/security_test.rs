// @critical: Security boundary tests - headers, tokens and request hardening
use super::test_utils::{read_json, TestServer, API};
use axum::body::Body;
use axum::http::{Request, StatusCode};

#[tokio::test]
async fn test_security_headers_present() {
    let server = TestServer::new().await;
    let response = server.call(server.make_request("GET", "/health", None, None)).await;

    let headers = response.headers();
    assert_eq!(headers.get("x-content-type-options").unwrap(), "nosniff");
    assert_eq!(headers.get("x-frame-options").unwrap(), "DENY");
    assert_eq!(headers.get("content-security-policy").unwrap(), "default-src 'none'");
    assert!(headers.get("referrer-policy").is_some());
    assert_eq!(headers.get("x-api-version").unwrap(), env!("CARGO_PKG_VERSION"));
    assert!(headers.get("strict-transport-security").is_none());
}

#[tokio::test]
async fn test_hsts_behind_https_proxy() {
    let server = TestServer::new().await;
    let req = Request::builder()
        .uri("/health")
        .header("X-Forwarded-Proto", "https")
        .body(Body::empty())
        .unwrap();
    let response = server.call(req).await;
    assert!(response.headers().get("strict-transport-security").is_some());
}

#[tokio::test]
async fn test_cors_allows_configured_origin() {
    let server = TestServer::new().await;

    let preflight = Request::builder()
        .method("OPTIONS")
        .uri(format!("{API}/books/"))
        .header("Origin", "http://localhost:3000")
        .header("Access-Control-Request-Method", "GET")
        .header("Access-Control-Request-Headers", "authorization")
        .body(Body::empty())
        .unwrap();
    let response = server.call(preflight).await;
    assert_eq!(
        response.headers().get("access-control-allow-origin").unwrap(),
        "http://localhost:3000"
    );
    assert_eq!(
        response.headers().get("access-control-allow-credentials").unwrap(),
        "true"
    );

    let foreign = Request::builder()
        .uri("/health")
        .header("Origin", "https://evil.example.com")
        .body(Body::empty())
        .unwrap();
    let response = server.call(foreign).await;
    assert!(response.headers().get("access-control-allow-origin").is_none());
}

#[tokio::test]
async fn test_expired_token_rejected() {
    let server = TestServer::new().await;
    server.register_user("alice").await;

    let expired = server
        .state
        .tokens
        .create_access_token("alice@example.com", Some(chrono::Duration::seconds(-60)))
        .unwrap();
    let response = server
        .call(server.make_request("GET", &format!("{API}/auth/me"), None, Some(&expired)))
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(response.headers().get("www-authenticate").unwrap(), "Bearer");
}

#[tokio::test]
async fn test_token_for_unknown_user_rejected() {
    let server = TestServer::new().await;
    let token = server
        .state
        .tokens
        .create_access_token("ghost@example.com", None)
        .unwrap();
    let (status, body) = server
        .send("GET", &format!("{API}/auth/me"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);
    assert_eq!(body["detail"], "Could not validate credentials");
}

#[tokio::test]
async fn test_oversized_body_rejected() {
    let server = TestServer::new().await;
    let big = format!(r#"{{"email":"a@example.com","username":"{}","password":"x"}}"#, "a".repeat(2 * 1024 * 1024));
    let response = server
        .call(server.make_request("POST", &format!("{API}/auth/register"), Some(&big), None))
        .await;
    assert_eq!(response.status(), StatusCode::PAYLOAD_TOO_LARGE);
}

#[tokio::test]
async fn test_responses_never_expose_password_hash() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;

    let response = server
        .call(server.make_request("GET", &format!("{API}/auth/me"), None, Some(&token)))
        .await;
    let body = read_json(response).await.to_string();
    assert!(!body.contains("hashed_password"));
    assert!(!body.contains("$argon2"));
}
