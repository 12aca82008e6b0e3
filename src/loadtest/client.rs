use std::time::{Duration, Instant};

use reqwest::{Method, RequestBuilder};
use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use super::{LoadTestError, StatsCollector};

/// Outcome of one timed request. `status` is `None` on transport errors.
#[derive(Debug, Clone, Default)]
pub struct Reply {
    pub status: Option<u16>,
    pub body: Option<Value>,
}

impl Reply {
    pub fn is_success(&self) -> bool {
        self.status.is_some_and(|s| s < 400)
    }

    pub fn field(&self, pointer: &str) -> Option<&Value> {
        self.body.as_ref()?.pointer(pointer)
    }
}

/// HTTP client that times every request and records it under a name.
#[derive(Clone)]
pub struct ApiClient {
    http: reqwest::Client,
    base_url: String,
    stats: StatsCollector,
}

impl ApiClient {
    pub fn new(base_url: &str, stats: StatsCollector) -> Result<Self, LoadTestError> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(30))
            .pool_max_idle_per_host(32)
            .build()?;
        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            stats,
        })
    }

    pub fn stats(&self) -> &StatsCollector {
        &self.stats
    }

    fn builder(&self, method: Method, path: &str, token: Option<&str>) -> RequestBuilder {
        let req = self.http.request(method, format!("{}{path}", self.base_url));
        match token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }

    async fn send(&self, name: &str, req: RequestBuilder) -> Reply {
        let started = Instant::now();
        let reply = match req.send().await {
            Ok(res) => {
                let status = res.status().as_u16();
                let body = res.json::<Value>().await.ok();
                Reply {
                    status: Some(status),
                    body,
                }
            }
            Err(e) => {
                debug!("{name} failed: {e}");
                Reply::default()
            }
        };
        self.stats
            .record(name, started.elapsed(), !reply.is_success())
            .await;
        reply
    }

    pub async fn get(&self, name: &str, path: &str, token: Option<&str>) -> Reply {
        self.send(name, self.builder(Method::GET, path, token)).await
    }

    pub async fn get_query<Q: Serialize + ?Sized>(
        &self,
        name: &str,
        path: &str,
        query: &Q,
        token: Option<&str>,
    ) -> Reply {
        self.send(name, self.builder(Method::GET, path, token).query(query))
            .await
    }

    pub async fn post_json<B: Serialize + ?Sized>(
        &self,
        name: &str,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Reply {
        self.send(name, self.builder(Method::POST, path, token).json(body))
            .await
    }

    pub async fn post_form<B: Serialize + ?Sized>(&self, name: &str, path: &str, form: &B) -> Reply {
        self.send(name, self.builder(Method::POST, path, None).form(form))
            .await
    }

    pub async fn put_json<B: Serialize + ?Sized>(
        &self,
        name: &str,
        path: &str,
        body: &B,
        token: Option<&str>,
    ) -> Reply {
        self.send(name, self.builder(Method::PUT, path, token).json(body))
            .await
    }

    pub async fn delete(&self, name: &str, path: &str, token: Option<&str>) -> Reply {
        self.send(name, self.builder(Method::DELETE, path, token)).await
    }
}
