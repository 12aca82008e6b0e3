// @critical: Author CRUD and per-user isolation
use super::test_utils::{TestServer, API};
use axum::http::StatusCode;
use serde_json::json;

#[tokio::test]
async fn test_create_and_get_author() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;

    let created = server.create_author(&token, "Octavia Butler").await;
    assert_eq!(created["name"], "Octavia Butler");
    assert_eq!(created["biography"], "Biography of Octavia Butler");
    let id = created["id"].as_i64().unwrap();

    let (status, body) = server
        .send("GET", &format!("{API}/authors/{id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, created);
}

#[tokio::test]
async fn test_create_author_requires_fields() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;

    for body in [
        json!({ "name": "", "biography": "bio" }),
        json!({ "name": "Name", "biography": "" }),
        json!({ "name": "Name" }),
    ] {
        let (status, _) = server
            .send("POST", &format!("{API}/authors/"), Some(body), Some(&token))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
    }
}

#[tokio::test]
async fn test_list_authors_pagination() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;
    for i in 0..5 {
        server.create_author(&token, &format!("Author {i}")).await;
    }

    let (status, body) = server
        .send("GET", &format!("{API}/authors/?skip=1&limit=2"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    let names: Vec<&str> = body
        .as_array()
        .unwrap()
        .iter()
        .map(|a| a["name"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["Author 1", "Author 2"]);

    // Both collection spellings are served.
    let (status, body) = server
        .send("GET", &format!("{API}/authors"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body.as_array().unwrap().len(), 5);
}

#[tokio::test]
async fn test_list_authors_rejects_bad_paging() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;

    for query in ["skip=-1", "limit=0", "limit=101"] {
        let (status, _) = server
            .send("GET", &format!("{API}/authors/?{query}"), None, Some(&token))
            .await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY, "{query}");
    }
}

#[tokio::test]
async fn test_update_author_partial() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;
    let id = server.create_author(&token, "Original").await["id"].as_i64().unwrap();

    let (status, body) = server
        .send(
            "PUT",
            &format!("{API}/authors/{id}"),
            Some(json!({ "name": "Renamed" })),
            Some(&token),
        )
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Renamed");
    assert_eq!(body["biography"], "Biography of Original");
    assert!(!body["updated_at"].is_null());

    let (status, body) = server
        .send("PUT", &format!("{API}/authors/999"), Some(json!({ "name": "X" })), Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["detail"], "Author not found");
}

#[tokio::test]
async fn test_delete_author_cascades_books() {
    let server = TestServer::new().await;
    let token = server.register_user("alice").await;
    let id = server.create_author(&token, "Doomed").await["id"].as_i64().unwrap();
    let book = server.create_book(&token, "Orphan", id, "Fiction", 2001).await;
    let book_id = book["id"].as_i64().unwrap();

    let (status, body) = server
        .send("DELETE", &format!("{API}/authors/{id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["message"], "Author deleted successfully");

    let (status, _) = server
        .send("GET", &format!("{API}/books/{book_id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (status, _) = server
        .send("DELETE", &format!("{API}/authors/{id}"), None, Some(&token))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_authors_are_isolated_per_user() {
    let server = TestServer::new().await;
    let alice = server.register_user("alice").await;
    let bob = server.register_user("bob").await;
    let id = server.create_author(&alice, "Private").await["id"].as_i64().unwrap();

    for method in ["GET", "DELETE"] {
        let (status, _) = server
            .send(method, &format!("{API}/authors/{id}"), None, Some(&bob))
            .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }
    let (status, _) = server
        .send("PUT", &format!("{API}/authors/{id}"), Some(json!({ "name": "Stolen" })), Some(&bob))
        .await;
    assert_eq!(status, StatusCode::NOT_FOUND);

    let (_, listed) = server.send("GET", &format!("{API}/authors/"), None, Some(&bob)).await;
    assert!(listed.as_array().unwrap().is_empty());

    let (status, body) = server
        .send("GET", &format!("{API}/authors/{id}"), None, Some(&alice))
        .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["name"], "Private");
}

#[tokio::test]
async fn test_authors_require_authentication() {
    let server = TestServer::new().await;
    let (status, _) = server.send("GET", &format!("{API}/authors/"), None, None).await;
    assert_eq!(status, StatusCode::FORBIDDEN);
}
