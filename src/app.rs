use axum::{
    http::{HeaderValue, Method},
    middleware,
    routing::{get, post, MethodRouter},
    Router,
};
use std::future::Future;
use std::net::SocketAddr;
use tokio::net::TcpListener;
use tower_http::cors::{AllowHeaders, CorsLayer};
use tracing::{info, warn};

use crate::config::AppConfig;
use crate::handlers::{auth, authors, books, health, metrics, openapi};
use crate::metrics::track_metrics;
use crate::middleware::{
    api_version::api_version_middleware,
    auth::auth_middleware,
    rate_limit::{rate_limit_middleware, RateLimiter},
    security_headers::security_headers_middleware,
};
use crate::state::AppState;

/// Wraps `route` in the limiter's quota when rate limiting is on.
fn throttled(
    route: MethodRouter<AppState>,
    limiter: &RateLimiter,
    enabled: bool,
) -> MethodRouter<AppState> {
    if enabled {
        route.layer(middleware::from_fn_with_state(
            limiter.clone(),
            rate_limit_middleware,
        ))
    } else {
        route
    }
}

fn cors_layer(config: &AppConfig) -> CorsLayer {
    let origins: Vec<HeaderValue> = config
        .cors
        .origins()
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(e) => {
                warn!("Ignoring invalid CORS origin '{}': {}", origin, e);
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(origins)
        .allow_credentials(true)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
            Method::OPTIONS,
        ])
        .allow_headers(AllowHeaders::mirror_request())
}

fn api_router(state: &AppState) -> Router<AppState> {
    let limits = &state.limiters;
    let on = limits.enabled;

    let public = Router::new()
        .route("/openapi.json", get(openapi::openapi_json))
        .route(
            "/auth/register",
            throttled(post(auth::register), &limits.register, on),
        )
        .route("/auth/login", throttled(post(auth::login), &limits.login, on))
        .route("/auth/refresh", post(auth::refresh));

    let author_collection = get(authors::list_authors).post(authors::create_author);
    // Runs inside `auth_middleware`, so the quota is keyed on the user.
    let book_collection =
        throttled(get(books::list_books), &limits.list_books, on).post(books::create_book);

    let protected = Router::new()
        .route(
            "/auth/me",
            get(auth::me).put(auth::update_me).delete(auth::delete_me),
        )
        .route("/authors", author_collection.clone())
        .route("/authors/", author_collection)
        .route(
            "/authors/:author_id",
            get(authors::get_author)
                .put(authors::update_author)
                .delete(authors::delete_author),
        )
        .route("/books", book_collection.clone())
        .route("/books/", book_collection)
        .route("/books/search", get(books::search_books))
        .route(
            "/books/:book_id",
            get(books::get_book)
                .put(books::update_book)
                .delete(books::delete_book),
        )
        .route_layer(middleware::from_fn_with_state(
            state.clone(),
            auth_middleware,
        ));

    public.merge(protected)
}

pub fn create_app_router(state: AppState) -> Router {
    let config = state.config.clone();
    let limits = &state.limiters;
    let on = limits.enabled;

    Router::new()
        .route("/", throttled(get(health::root), &limits.root, on))
        .route(
            "/health",
            throttled(get(health::health_check), &limits.health, on),
        )
        .route("/metrics", get(metrics::metrics_handler))
        .route(
            "/metrics/prometheus",
            get(metrics::prometheus_metrics_handler),
        )
        .nest(&config.app.api_v1_str, api_router(&state))
        .layer(tower_http::limit::RequestBodyLimitLayer::new(
            config.server.max_request_size,
        ))
        .layer(tower_http::compression::CompressionLayer::new())
        .layer(cors_layer(&config))
        .layer(middleware::from_fn(security_headers_middleware))
        .layer(middleware::from_fn(api_version_middleware))
        .layer(middleware::from_fn_with_state(
            state.metrics.clone(),
            track_metrics,
        ))
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}

/// Serves `app` on `listener` until `shutdown` resolves. Peer addresses are
/// exposed to the rate limiter through `ConnectInfo`.
pub async fn serve<F>(listener: TcpListener, app: Router, shutdown: F) -> anyhow::Result<()>
where
    F: Future<Output = ()> + Send + 'static,
{
    let addr = listener.local_addr()?;
    info!("Listening on {addr}");

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown)
    .await
    .map_err(|e| anyhow::anyhow!("Server failed: {e}"))?;

    info!("Server shutdown complete");
    Ok(())
}
