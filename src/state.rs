use anyhow::Context;
use std::sync::Arc;

use crate::config::AppConfig;
use crate::db::Database;
use crate::metrics::Metrics;
use crate::middleware::rate_limit::RateLimiters;
use crate::services::auth::TokenManager;
use crate::services::books::BookService;
use crate::services::users::UserService;

#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub db: Database,
    pub tokens: TokenManager,
    pub users: UserService,
    pub books: BookService,
    pub metrics: Metrics,
    pub limiters: RateLimiters,
}

impl AppState {
    pub fn new(config: AppConfig, db: Database) -> anyhow::Result<Self> {
        let tokens = TokenManager::new(&config.jwt).context("TokenManager initialization failed")?;
        let limiters = RateLimiters::from_config(&config.rate_limit, config.rate_limit_enabled());
        Ok(Self {
            users: UserService::new(db.clone()),
            books: BookService::new(db.clone()),
            config: Arc::new(config),
            db,
            tokens,
            metrics: Metrics::new(),
            limiters,
        })
    }

    /// Connects to `config.database.url` and builds the state around it.
    pub async fn connect(config: AppConfig) -> anyhow::Result<Self> {
        let db = Database::connect(&config.database.url)
            .await
            .with_context(|| format!("Failed to open database '{}'", config.database.url))?;
        Self::new(config, db)
    }
}
