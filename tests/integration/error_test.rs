// @critical: Error handling tests - verify `{"detail": ...}` error bodies
use super::test_utils::{read_json, TestServer, API};
use axum::http::StatusCode;

#[tokio::test]
async fn test_malformed_json_is_422() {
    let server = TestServer::new().await;
    let response = server
        .call(server.make_request("POST", &format!("{API}/auth/register"), Some("{not json"), None))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);

    let json = read_json(response).await;
    assert!(json["detail"].as_str().is_some_and(|d| !d.is_empty()));
}

#[tokio::test]
async fn test_validation_error_names_field() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;
    let (status, body) = server
        .send(
            "POST",
            &format!("{API}/authors/"),
            Some(serde_json::json!({ "name": "", "biography": "bio" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    let detail = body["detail"].as_str().unwrap();
    assert!(detail.contains("name"), "detail was {detail}");
}

#[tokio::test]
async fn test_not_found_error_format() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;
    let (status, body) = server
        .send("GET", &format!("{API}/authors/12345"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body, serde_json::json!({ "detail": "Author not found" }));
}

#[tokio::test]
async fn test_wrong_method_is_405() {
    let server = TestServer::new().await;
    let response = server
        .call(server.make_request("PATCH", &format!("{API}/auth/login"), None, None))
        .await;
    assert_eq!(response.status(), StatusCode::METHOD_NOT_ALLOWED);
}
