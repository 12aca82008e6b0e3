use axum::{
    extract::{ConnectInfo, Request, State},
    http::{header, HeaderMap, HeaderName, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use std::{
    collections::HashMap,
    net::{IpAddr, SocketAddr},
    sync::Arc,
    time::{Duration, Instant, SystemTime, UNIX_EPOCH},
};
use tokio::sync::RwLock;
use tracing::warn;

use crate::config::RateLimitConfig;
use crate::errors::ApiError;
use crate::middleware::auth::CurrentUser;

const CLEANUP_INTERVAL: Duration = Duration::from_secs(300);
const MAX_BUCKETS: usize = 10_000;
const UNKNOWN_KEY: &str = "unknown";
const WINDOW: Duration = Duration::from_secs(60);

fn is_valid_ip(ip_str: &str) -> bool {
    ip_str.parse::<IpAddr>().is_ok()
}

/// Client identity for quota accounting: the authenticated user when
/// [`auth_middleware`](super::auth::auth_middleware) has already run, else the
/// first valid forwarded IP, else the peer address. Raw `Authorization`
/// headers are never a key, so anonymous callers cannot mint fresh buckets.
fn extract_rate_limit_key(request: &Request) -> String {
    if let Some(CurrentUser(user)) = request.extensions().get::<CurrentUser>() {
        return format!("user:{}", user.id);
    }

    if let Some(forwarded) = request
        .headers()
        .get("x-forwarded-for")
        .and_then(|h| h.to_str().ok())
    {
        let first_valid = forwarded
            .split(',')
            .map(|candidate| candidate.trim().trim_matches('"').trim())
            .find(|candidate| !candidate.is_empty() && is_valid_ip(candidate));
        if let Some(ip) = first_valid {
            return ip.to_string();
        }
        warn!(
            "x-forwarded-for header contains no valid IP addresses: {}",
            forwarded
        );
    }

    if let Some(real_ip) = request
        .headers()
        .get("x-real-ip")
        .and_then(|h| h.to_str().ok())
        .map(str::trim)
    {
        if is_valid_ip(real_ip) {
            return real_ip.to_string();
        }
    }

    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    UNKNOWN_KEY.to_string()
}

#[derive(Clone)]
struct TokenBucket {
    tokens: u32,
    last_refill: Instant,
    last_access: Instant,
}

#[derive(Debug, Clone, Serialize)]
pub struct RateLimitInfo {
    pub limit: u32,
    pub remaining: u32,
    /// Unix timestamp at which the bucket is full again.
    pub reset: u64,
    /// Seconds until the next request would be admitted.
    pub retry_after: u64,
}

/// Token bucket allowing `per_minute` requests per key, refilled evenly
/// across the minute.
#[derive(Clone)]
pub struct RateLimiter {
    buckets: Arc<RwLock<HashMap<String, TokenBucket>>>,
    capacity: u32,
    refill_interval: Duration,
    last_cleanup: Arc<RwLock<Instant>>,
}

impl RateLimiter {
    pub fn per_minute(per_minute: u32) -> Self {
        let capacity = per_minute.max(1);
        Self {
            buckets: Arc::new(RwLock::new(HashMap::new())),
            capacity,
            refill_interval: WINDOW / capacity,
            last_cleanup: Arc::new(RwLock::new(Instant::now())),
        }
    }

    pub fn limit(&self) -> u32 {
        self.capacity
    }

    pub async fn tracked_keys(&self) -> usize {
        self.buckets.read().await.len()
    }

    fn tokens_to_add(&self, elapsed: Duration) -> u32 {
        let elapsed_nanos = elapsed.as_nanos();
        let refill_nanos = self.refill_interval.as_nanos().max(1);
        u32::try_from(elapsed_nanos / refill_nanos).unwrap_or(u32::MAX)
    }

    async fn cleanup_if_needed(&self) {
        let mut last_cleanup = self.last_cleanup.write().await;
        if last_cleanup.elapsed() < CLEANUP_INTERVAL {
            return;
        }

        let mut buckets = self.buckets.write().await;
        let initial_size = buckets.len();
        let now = Instant::now();
        let expiration_threshold = CLEANUP_INTERVAL * 2;
        buckets.retain(|_, bucket| now.duration_since(bucket.last_access) <= expiration_threshold);

        if buckets.len() > MAX_BUCKETS {
            let to_remove = buckets.len() - MAX_BUCKETS;
            let mut by_access: Vec<(String, Instant)> = buckets
                .iter()
                .map(|(k, v)| (k.clone(), v.last_access))
                .collect();
            by_access.sort_by_key(|(_, access)| *access);
            for (key, _) in by_access.into_iter().take(to_remove) {
                buckets.remove(&key);
            }
            warn!(
                "Rate limiter: removed {} least recently used buckets to enforce size limit",
                to_remove
            );
        }

        *last_cleanup = Instant::now();
        let removed = initial_size.saturating_sub(buckets.len());
        if removed > 0 {
            warn!("Rate limiter cleanup: {} expired buckets removed", removed);
        }
    }

    /// Takes one token for `key` when available and reports the bucket state
    /// after the attempt.
    pub async fn check(&self, key: &str) -> (bool, RateLimitInfo) {
        self.cleanup_if_needed().await;

        let mut buckets = self.buckets.write().await;
        let now = Instant::now();
        let bucket = buckets
            .entry(key.to_string())
            .or_insert_with(|| TokenBucket {
                tokens: self.capacity,
                last_refill: now,
                last_access: now,
            });
        bucket.last_access = now;

        let to_add = self.tokens_to_add(now.duration_since(bucket.last_refill));
        if to_add > 0 {
            bucket.tokens = bucket.tokens.saturating_add(to_add).min(self.capacity);
            bucket.last_refill = now;
        }

        let allowed = bucket.tokens > 0;
        if allowed {
            bucket.tokens -= 1;
        }

        let info = self.info_for(bucket, now);
        (allowed, info)
    }

    fn info_for(&self, bucket: &TokenBucket, now: Instant) -> RateLimitInfo {
        let since_refill = now.duration_since(bucket.last_refill);
        let until_next = self.refill_interval.saturating_sub(since_refill);
        let missing = self.capacity.saturating_sub(bucket.tokens);
        let until_full = if missing == 0 {
            Duration::ZERO
        } else {
            until_next + self.refill_interval * (missing - 1)
        };

        let now_unix = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or(Duration::ZERO)
            .as_secs();

        RateLimitInfo {
            limit: self.capacity,
            remaining: bucket.tokens,
            reset: now_unix + until_full.as_secs_f64().ceil() as u64,
            retry_after: if bucket.tokens > 0 {
                0
            } else {
                (until_next.as_secs_f64().ceil() as u64).max(1)
            },
        }
    }

    /// Bucket state for `key` without consuming a token.
    pub async fn get_info(&self, key: &str) -> RateLimitInfo {
        let now = Instant::now();
        let buckets = self.buckets.read().await;
        let mut bucket = buckets.get(key).cloned().unwrap_or(TokenBucket {
            tokens: self.capacity,
            last_refill: now,
            last_access: now,
        });
        let to_add = self.tokens_to_add(now.duration_since(bucket.last_refill));
        if to_add > 0 {
            bucket.tokens = bucket.tokens.saturating_add(to_add).min(self.capacity);
            bucket.last_refill = now;
        }
        self.info_for(&bucket, now)
    }
}

/// One limiter per throttled route, plus the switch that disables them all.
#[derive(Clone)]
pub struct RateLimiters {
    pub enabled: bool,
    pub root: RateLimiter,
    pub health: RateLimiter,
    pub register: RateLimiter,
    pub login: RateLimiter,
    pub list_books: RateLimiter,
}

impl RateLimiters {
    pub fn from_config(config: &RateLimitConfig, enabled: bool) -> Self {
        Self {
            enabled,
            root: RateLimiter::per_minute(config.root_per_minute),
            health: RateLimiter::per_minute(config.health_per_minute),
            register: RateLimiter::per_minute(config.register_per_minute),
            login: RateLimiter::per_minute(config.login_per_minute),
            list_books: RateLimiter::per_minute(config.list_books_per_minute),
        }
    }

    pub fn named(&self) -> [(&'static str, &RateLimiter); 5] {
        [
            ("root", &self.root),
            ("health", &self.health),
            ("register", &self.register),
            ("login", &self.login),
            ("list_books", &self.list_books),
        ]
    }
}

fn apply_headers(headers: &mut HeaderMap, info: &RateLimitInfo) {
    let pairs = [
        (HeaderName::from_static("x-ratelimit-limit"), info.limit.to_string()),
        (
            HeaderName::from_static("x-ratelimit-remaining"),
            info.remaining.to_string(),
        ),
        (HeaderName::from_static("x-ratelimit-reset"), info.reset.to_string()),
    ];
    for (name, value) in pairs {
        // Decimal digits are always valid header values.
        if let Ok(value) = HeaderValue::from_str(&value) {
            headers.insert(name, value);
        }
    }
}

/// Route middleware; the limiter comes from `from_fn_with_state`.
pub async fn rate_limit_middleware(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let key = extract_rate_limit_key(&request);
    let (allowed, info) = limiter.check(&key).await;

    if !allowed {
        warn!("Rate limit exceeded for key: {} on {}", key, request.uri().path());
        let mut response = ApiError::RateLimited(limiter.limit()).into_response();
        apply_headers(response.headers_mut(), &info);
        if let Ok(value) = HeaderValue::from_str(&info.retry_after.to_string()) {
            response.headers_mut().insert(header::RETRY_AFTER, value);
        }
        return response;
    }

    let mut response = next.run(request).await;
    apply_headers(response.headers_mut(), &info);
    response
}
