// @smoke: Fast sanity checks
// These run on git push and must be green to proceed
use super::test_utils::{TestServer, API, PASSWORD};
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn smoke_health_check() {
    let server = TestServer::new().await;
    let (status, json) = server.send("GET", "/health", None, None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(json["status"], "healthy");
}

#[tokio::test]
async fn smoke_full_collection_flow() {
    let server = TestServer::new().await;

    let (status, _) = server.register("reader@example.com", "reader", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    let (status, tokens) = server.login("reader", PASSWORD).await;
    assert_eq!(status, StatusCode::OK);
    let token = tokens["access_token"].as_str().unwrap().to_string();

    let author = server.create_author(&token, "Iain M. Banks").await;
    let author_id = author["id"].as_i64().unwrap();
    let book = server
        .create_book(&token, "Consider Phlebas", author_id, "Science Fiction", 1987)
        .await;
    let book_id = book["id"].as_i64().unwrap();

    let (status, updated) = server
        .send(
            "PUT",
            &format!("{API}/books/{book_id}"),
            Some(json!({ "description": "The first Culture novel" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(updated["title"], "Consider Phlebas");
    assert_eq!(updated["description"], "The first Culture novel");

    let (_, found) = server
        .send("GET", &format!("{API}/books/search?q=culture"), None, Some(&token))
        .await;
    assert_eq!(found.as_array().unwrap().len(), 1);

    let (status, _) = server
        .send("DELETE", &format!("{API}/books/{book_id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let (_, page) = server.send("GET", &format!("{API}/books/"), None, Some(&token)).await;
    assert_eq!(page["total"], 0);
}
