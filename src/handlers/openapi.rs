use axum::{extract::State, Json};
use serde_json::{json, Map, Value};

use crate::state::AppState;

/// (path below the API prefix, method, summary, needs a bearer token)
const OPERATIONS: &[(&str, &str, &str, bool)] = &[
    ("/auth/register", "post", "Register a new user", false),
    ("/auth/login", "post", "Log in with username or email", false),
    ("/auth/refresh", "post", "Exchange a refresh token for new tokens", false),
    ("/auth/me", "get", "Current user", true),
    ("/auth/me", "put", "Update the current user", true),
    ("/auth/me", "delete", "Delete the current user and their data", true),
    ("/authors/", "get", "List authors", true),
    ("/authors/", "post", "Create an author", true),
    ("/authors/{author_id}", "get", "Get an author", true),
    ("/authors/{author_id}", "put", "Update an author", true),
    ("/authors/{author_id}", "delete", "Delete an author and their books", true),
    ("/books/", "get", "List books with pagination and filters", true),
    ("/books/", "post", "Create a book", true),
    ("/books/search", "get", "Search books by title or description", true),
    ("/books/{book_id}", "get", "Get a book", true),
    ("/books/{book_id}", "put", "Update a book", true),
    ("/books/{book_id}", "delete", "Delete a book", true),
];

pub fn document(project_name: &str, api_prefix: &str) -> Value {
    let mut paths = Map::new();
    paths.insert(
        "/".into(),
        json!({ "get": { "summary": "Welcome message", "responses": { "200": { "description": "OK" } } } }),
    );
    paths.insert(
        "/health".into(),
        json!({ "get": { "summary": "Health check", "responses": { "200": { "description": "OK" } } } }),
    );

    for (path, method, summary, secured) in OPERATIONS {
        let mut operation = json!({
            "summary": summary,
            "responses": { "200": { "description": "Successful response" } },
        });
        if *secured {
            operation["security"] = json!([{ "bearerAuth": [] }]);
        }
        let entry = paths
            .entry(format!("{api_prefix}{path}"))
            .or_insert_with(|| Value::Object(Map::new()));
        if let Value::Object(methods) = entry {
            methods.insert((*method).to_string(), operation);
        }
    }

    json!({
        "openapi": "3.1.0",
        "info": {
            "title": project_name,
            "version": env!("CARGO_PKG_VERSION"),
            "description": "A REST API for managing personal book collections",
        },
        "paths": paths,
        "components": {
            "securitySchemes": {
                "bearerAuth": { "type": "http", "scheme": "bearer", "bearerFormat": "JWT" }
            }
        }
    })
}

pub async fn openapi_json(State(state): State<AppState>) -> Json<Value> {
    Json(document(
        &state.config.app.project_name,
        &state.config.app.api_v1_str,
    ))
}
