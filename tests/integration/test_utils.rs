// Test utilities: an in-process server over an in-memory database
use axum::{
    body::{to_bytes, Body},
    http::{Request, StatusCode},
    response::Response,
    Router,
};
use serde_json::{json, Value};
use tower::util::ServiceExt;

use book_collection_api::app::create_app_router;
use book_collection_api::config::AppConfig;
use book_collection_api::db::Database;
use book_collection_api::state::AppState;

/// Reasonable body size limit for tests (1MB)
pub const TEST_BODY_LIMIT: usize = 1024 * 1024;

pub const API: &str = "/api/v1";
pub const PASSWORD: &str = "s3cure-pass";

pub struct TestServer {
    pub app: Router,
    pub state: AppState,
}

impl TestServer {
    pub async fn new() -> Self {
        Self::with_config(AppConfig::for_tests()).await
    }

    pub async fn with_config(config: AppConfig) -> Self {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to open in-memory database");
        let state = AppState::new(config, db).expect("Failed to build app state");
        let app = create_app_router(state.clone());
        Self { app, state }
    }

    /// Rate limiting on, with small per-minute quotas.
    pub async fn with_rate_limits(register: u32, login: u32, list_books: u32) -> Self {
        let mut config = AppConfig::for_tests();
        config.rate_limit.enabled = Some(true);
        config.rate_limit.register_per_minute = register;
        config.rate_limit.login_per_minute = login;
        config.rate_limit.list_books_per_minute = list_books;
        Self::with_config(config).await
    }

    pub async fn call(&self, req: Request<Body>) -> Response {
        self.app.clone().oneshot(req).await.unwrap()
    }

    pub fn make_request(
        &self,
        method: &str,
        uri: &str,
        body: Option<&str>,
        auth: Option<&str>,
    ) -> Request<Body> {
        let mut builder = Request::builder().method(method).uri(uri);

        if let Some(token) = auth {
            builder = builder.header("Authorization", format!("Bearer {}", token));
        }

        if let Some(body_str) = body {
            builder = builder.header("Content-Type", "application/json");
            builder.body(Body::from(body_str.to_string())).unwrap()
        } else {
            builder.body(Body::empty()).unwrap()
        }
    }

    pub fn make_form_request(&self, uri: &str, form: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body(Body::from(form.to_string()))
            .unwrap()
    }

    /// Sends a JSON request and returns the status and decoded body.
    pub async fn send(
        &self,
        method: &str,
        uri: &str,
        body: Option<Value>,
        token: Option<&str>,
    ) -> (StatusCode, Value) {
        let body = body.map(|b| b.to_string());
        let req = self.make_request(method, uri, body.as_deref(), token);
        let response = self.call(req).await;
        let status = response.status();
        (status, read_json(response).await)
    }

    pub async fn register(&self, email: &str, username: &str, password: &str) -> (StatusCode, Value) {
        self.send(
            "POST",
            &format!("{API}/auth/register"),
            Some(json!({ "email": email, "username": username, "password": password })),
            None,
        )
        .await
    }

    pub async fn login(&self, username: &str, password: &str) -> (StatusCode, Value) {
        let form = format!(
            "username={}&password={}",
            urlencode(username),
            urlencode(password)
        );
        let response = self
            .call(self.make_form_request(&format!("{API}/auth/login"), &form))
            .await;
        let status = response.status();
        (status, read_json(response).await)
    }

    /// Registers `<name>@example.com` and returns its access token.
    pub async fn register_user(&self, name: &str) -> String {
        let (status, body) = self
            .register(&format!("{name}@example.com"), name, PASSWORD)
            .await;
        assert_eq!(status, StatusCode::OK, "register {name} failed: {body}");
        body["access_token"].as_str().unwrap().to_string()
    }

    pub async fn create_author(&self, token: &str, name: &str) -> Value {
        let (status, body) = self
            .send(
                "POST",
                &format!("{API}/authors/"),
                Some(json!({ "name": name, "biography": format!("Biography of {name}") })),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create author failed: {body}");
        body
    }

    pub async fn create_book(&self, token: &str, title: &str, author_id: i64, genre: &str, year: i32) -> Value {
        let (status, body) = self
            .send(
                "POST",
                &format!("{API}/books/"),
                Some(json!({
                    "title": title,
                    "description": format!("About {title}"),
                    "genre": genre,
                    "publication_year": year,
                    "author_id": author_id,
                })),
                Some(token),
            )
            .await;
        assert_eq!(status, StatusCode::OK, "create book failed: {body}");
        body
    }
}

pub async fn read_json(response: Response) -> Value {
    let bytes = to_bytes(response.into_body(), TEST_BODY_LIMIT)
        .await
        .expect("Failed to read response body");
    if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or_else(|_| Value::String(String::from_utf8_lossy(&bytes).into_owned()))
    }
}

/// Minimal form encoding for the characters test credentials use.
pub fn urlencode(value: &str) -> String {
    value
        .bytes()
        .map(|b| match b {
            b'A'..=b'Z' | b'a'..=b'z' | b'0'..=b'9' | b'-' | b'_' | b'.' | b'~' => (b as char).to_string(),
            _ => format!("%{b:02X}"),
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_urlencode_escapes_reserved() {
        assert_eq!(urlencode("a@b.com"), "a%40b.com");
        assert_eq!(urlencode("p&ss word"), "p%26ss%20word");
    }
}
