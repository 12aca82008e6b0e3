use axum::{
    extract::Request,
    http::{HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

pub const API_VERSION_HEADER: HeaderName = HeaderName::from_static("x-api-version");
const API_VERSION: HeaderValue = HeaderValue::from_static(env!("CARGO_PKG_VERSION"));

/// Tags every response with the crate version so clients can tell deployments apart.
pub async fn api_version_middleware(request: Request, next: Next) -> Response {
    let mut response = next.run(request).await;
    response
        .headers_mut()
        .insert(API_VERSION_HEADER, API_VERSION);
    response
}
