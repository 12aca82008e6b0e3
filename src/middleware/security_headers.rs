use axum::{
    extract::Request,
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::Response,
};

const HSTS: &str = "max-age=31536000; includeSubDomains";

/// Headers sent with every response. The API serves JSON only, so the CSP
/// blocks every resource type.
const STATIC_HEADERS: [(HeaderName, &str); 5] = [
    (header::CONTENT_SECURITY_POLICY, "default-src 'none'"),
    (header::X_FRAME_OPTIONS, "DENY"),
    (header::X_CONTENT_TYPE_OPTIONS, "nosniff"),
    (header::REFERRER_POLICY, "strict-origin-when-cross-origin"),
    (
        HeaderName::from_static("permissions-policy"),
        "geolocation=(), microphone=(), camera=()",
    ),
];

fn is_https(request: &Request) -> bool {
    match request
        .headers()
        .get("x-forwarded-proto")
        .and_then(|h| h.to_str().ok())
    {
        Some(proto) => proto.eq_ignore_ascii_case("https"),
        None => request.uri().scheme_str() == Some("https"),
    }
}

fn apply(headers: &mut HeaderMap, https: bool) {
    for (name, value) in STATIC_HEADERS {
        headers.insert(name, HeaderValue::from_static(value));
    }
    if https {
        headers.insert(header::STRICT_TRANSPORT_SECURITY, HeaderValue::from_static(HSTS));
    }
}

pub async fn security_headers_middleware(request: Request, next: Next) -> Response {
    let https = is_https(&request);
    let mut response = next.run(request).await;
    apply(response.headers_mut(), https);
    response
}
