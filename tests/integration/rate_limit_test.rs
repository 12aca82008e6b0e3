// @critical: Rate limiting tests - verify 429 responses and headers
use super::test_utils::{TestServer, API, PASSWORD};
use axum::http::StatusCode;

#[tokio::test]
async fn test_rate_limit_disabled_by_default_in_tests() {
    let server = TestServer::new().await;

    for i in 0..40 {
        let response = server.call(server.make_request("GET", "/health", None, None)).await;
        assert_eq!(response.status(), StatusCode::OK, "request {} was limited", i + 1);
        assert!(response.headers().get("x-ratelimit-limit").is_none());
    }
}

#[tokio::test]
async fn test_register_quota_returns_429() {
    let server = TestServer::with_rate_limits(2, 10, 30).await;

    for i in 0..2 {
        let (status, body) = server
            .register(&format!("user{i}@example.com"), &format!("user{i}"), PASSWORD)
            .await;
        assert_eq!(status, StatusCode::OK, "{body}");
    }

    let req = server.make_request(
        "POST",
        &format!("{API}/auth/register"),
        Some(r#"{"email":"late@example.com","username":"late","password":"s3cure-pass"}"#),
        None,
    );
    let response = server.call(req).await;
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);

    let headers = response.headers();
    assert_eq!(headers.get("x-ratelimit-limit").unwrap(), "2");
    assert_eq!(headers.get("x-ratelimit-remaining").unwrap(), "0");
    assert!(headers.get("x-ratelimit-reset").is_some());
    let retry_after: u64 = headers
        .get("retry-after")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse().ok())
        .expect("Retry-After should be numeric");
    assert!(retry_after >= 1);

    let body = super::test_utils::read_json(response).await;
    assert_eq!(body["detail"], "Rate limit exceeded: 2 per 1 minute");
}

#[tokio::test]
async fn test_successful_responses_carry_quota_headers() {
    let server = TestServer::with_rate_limits(5, 3, 30).await;

    let (status, _) = server.login("nobody", PASSWORD).await;
    assert_eq!(status, StatusCode::UNAUTHORIZED);

    let req = server.make_form_request(&format!("{API}/auth/login"), "username=nobody&password=x");
    let response = server.call(req).await;
    assert_eq!(response.headers().get("x-ratelimit-limit").unwrap(), "3");
    assert_eq!(response.headers().get("x-ratelimit-remaining").unwrap(), "1");
}

#[tokio::test]
async fn test_quotas_are_keyed_per_client() {
    let server = TestServer::with_rate_limits(5, 10, 1).await;
    let alice = server.register_user("alice").await;
    let bob = server.register_user("bob").await;

    let (status, _) = server.send("GET", &format!("{API}/books/"), None, Some(&alice)).await;
    assert_eq!(status, StatusCode::OK);
    let (status, _) = server.send("GET", &format!("{API}/books/"), None, Some(&alice)).await;
    assert_eq!(status, StatusCode::TOO_MANY_REQUESTS);

    // A different bearer token is a different bucket.
    let (status, _) = server.send("GET", &format!("{API}/books/"), None, Some(&bob)).await;
    assert_eq!(status, StatusCode::OK);
}

#[tokio::test]
async fn test_junk_authorization_does_not_reset_login_quota() {
    let server = TestServer::with_rate_limits(5, 2, 30).await;

    let mut statuses = Vec::new();
    for i in 0..6 {
        let req = axum::http::Request::builder()
            .method("POST")
            .uri(format!("{API}/auth/login"))
            .header("Content-Type", "application/x-www-form-urlencoded")
            .header("X-Forwarded-For", "203.0.113.9")
            .header("Authorization", format!("Bearer junk{i}"))
            .body(axum::body::Body::from("username=victim&password=guess"))
            .unwrap();
        statuses.push(server.call(req).await.status());
    }

    assert_eq!(&statuses[..2], &[StatusCode::UNAUTHORIZED, StatusCode::UNAUTHORIZED]);
    assert!(
        statuses[2..].iter().all(|s| *s == StatusCode::TOO_MANY_REQUESTS),
        "statuses={statuses:?}"
    );
}

#[tokio::test]
async fn test_forwarded_for_keys_anonymous_clients() {
    let server = TestServer::with_rate_limits(5, 10, 30).await;

    let get_root = |ip: &str| {
        axum::http::Request::builder()
            .uri("/")
            .header("X-Forwarded-For", ip)
            .body(axum::body::Body::empty())
            .unwrap()
    };

    // `root` allows 10 per minute.
    for _ in 0..10 {
        assert_eq!(server.call(get_root("203.0.113.7")).await.status(), StatusCode::OK);
    }
    assert_eq!(
        server.call(get_root("203.0.113.7")).await.status(),
        StatusCode::TOO_MANY_REQUESTS
    );
    assert_eq!(server.call(get_root("198.51.100.2")).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_unthrottled_routes_have_no_quota() {
    let server = TestServer::with_rate_limits(1, 1, 1).await;
    let token = server.register_user("alice").await;

    for _ in 0..5 {
        let (status, _) = server.send("GET", &format!("{API}/authors/"), None, Some(&token)).await;
        assert_eq!(status, StatusCode::OK);
    }
}
