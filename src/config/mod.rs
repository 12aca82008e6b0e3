use config::{Config, ConfigError};
use serde::Deserialize;
use std::env;
use validator::Validate;

const DEFAULT_MAX_REQUEST_SIZE: usize = 1024 * 1024;
const DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES: u64 = 30;
const DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS: u64 = 7;
const DEFAULT_ALLOWED_ORIGINS: &str = "http://localhost:3000,http://localhost:8080";
const SUPPORTED_ALGORITHMS: [&str; 3] = ["HS256", "HS384", "HS512"];

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ServerConfig {
    #[validate(length(min = 1))]
    pub host: String,
    pub port: u16,
    #[serde(default = "default_max_request_size")]
    #[validate(range(min = 1024))]
    pub max_request_size: usize,
    #[serde(default = "default_interactive")]
    pub interactive: bool,
}

fn default_max_request_size() -> usize {
    DEFAULT_MAX_REQUEST_SIZE
}

fn default_interactive() -> bool {
    true
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct DatabaseConfig {
    #[validate(length(min = 1))]
    pub url: String,
    #[validate(length(min = 1))]
    pub test_url: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct JwtConfig {
    pub secret_key: Option<String>,
    pub algorithm: String,
    #[validate(range(min = 1))]
    pub access_token_expire_minutes: u64,
    #[validate(range(min = 1))]
    pub refresh_token_expire_days: u64,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct ApplicationConfig {
    pub debug: bool,
    #[validate(length(min = 2))]
    pub api_v1_str: String,
    #[validate(length(min = 1))]
    pub project_name: String,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct CorsConfig {
    pub allowed_origins: String,
    #[serde(default)]
    pub cors_origins: String,
}

impl CorsConfig {
    /// Explicit `cors_origins` win over the development defaults.
    pub fn origins(&self) -> Vec<String> {
        let source = if self.cors_origins.trim().is_empty() {
            &self.allowed_origins
        } else {
            &self.cors_origins
        };
        source
            .split(',')
            .map(str::trim)
            .filter(|origin| !origin.is_empty())
            .map(str::to_string)
            .collect()
    }
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct RateLimitConfig {
    pub enabled: Option<bool>,
    #[validate(range(min = 1))]
    pub root_per_minute: u32,
    #[validate(range(min = 1))]
    pub health_per_minute: u32,
    #[validate(range(min = 1))]
    pub register_per_minute: u32,
    #[validate(range(min = 1))]
    pub login_per_minute: u32,
    #[validate(range(min = 1))]
    pub list_books_per_minute: u32,
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct LogConfig {
    pub level: String,
    #[serde(default = "default_log_format")]
    pub format: String,
}

fn default_log_format() -> String {
    "pretty".to_string()
}

#[derive(Debug, Deserialize, Clone, Validate)]
pub struct AppConfig {
    #[validate(nested)]
    pub server: ServerConfig,
    #[validate(nested)]
    pub database: DatabaseConfig,
    #[validate(nested)]
    pub jwt: JwtConfig,
    #[validate(nested)]
    pub app: ApplicationConfig,
    #[validate(nested)]
    pub cors: CorsConfig,
    #[validate(nested)]
    pub rate_limit: RateLimitConfig,
    #[validate(nested)]
    pub log: LogConfig,
}

fn parse_bool(value: &str) -> bool {
    let lower = value.to_lowercase();
    matches!(lower.as_str(), "true" | "1" | "yes" | "on")
}

fn parse_port(value: &str) -> Result<i64, ConfigError> {
    value.parse::<i64>().map_err(|e| {
        ConfigError::Message(format!(
            "Invalid port value '{}': {}. Port must be a number between 1 and 65535.",
            value, e
        ))
    })
}

impl AppConfig {
    pub fn new() -> Result<Self, ConfigError> {
        dotenvy::dotenv().ok();

        let s = Config::builder()
            .set_default("server.host", "127.0.0.1")?
            .set_default("server.port", 8000)?
            .set_default("server.max_request_size", DEFAULT_MAX_REQUEST_SIZE as i64)?
            .set_default("server.interactive", true)?
            .set_default("database.url", "sqlite://book_collection.db")?
            .set_default("database.test_url", "sqlite::memory:")?
            .set_default("jwt.algorithm", "HS256")?
            .set_default(
                "jwt.access_token_expire_minutes",
                DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
            )?
            .set_default(
                "jwt.refresh_token_expire_days",
                DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS,
            )?
            .set_default("app.debug", true)?
            .set_default("app.api_v1_str", "/api/v1")?
            .set_default("app.project_name", "Book Collection API")?
            .set_default("cors.allowed_origins", DEFAULT_ALLOWED_ORIGINS)?
            .set_default("cors.cors_origins", "")?
            .set_default("rate_limit.root_per_minute", 10)?
            .set_default("rate_limit.health_per_minute", 30)?
            .set_default("rate_limit.register_per_minute", 5)?
            .set_default("rate_limit.login_per_minute", 10)?
            .set_default("rate_limit.list_books_per_minute", 30)?
            .set_default("log.level", "info")?
            .set_default("log.format", "pretty")?
            .add_source(
                config::Environment::with_prefix("APP")
                    .separator("__")
                    .try_parsing(true),
            )
            .set_override_option("server.host", env::var("APP_SERVER__HOST").ok())?
            .set_override_option(
                "server.port",
                env::var("APP_SERVER__PORT")
                    .ok()
                    .map(|v| parse_port(&v))
                    .transpose()?,
            )?
            .set_override_option("database.url", env::var("DATABASE_URL").ok())?
            .set_override_option("database.test_url", env::var("TEST_DATABASE_URL").ok())?
            .set_override_option("jwt.secret_key", env::var("SECRET_KEY").ok())?
            .set_override_option(
                "app.debug",
                env::var("DEBUG").ok().map(|v| parse_bool(&v)),
            )?
            .set_override_option("cors.cors_origins", env::var("CORS_ORIGINS").ok())?
            .build()?;

        let mut config: AppConfig = s.try_deserialize()?;
        // A blank key counts as unset and gets a generated one.
        config.jwt.secret_key = config.jwt.secret_key.filter(|key| !key.trim().is_empty());
        config.check()?;
        Ok(config)
    }

    /// Field validation plus the cross-field rules `validator` cannot express.
    pub fn check(&self) -> Result<(), ConfigError> {
        if let Err(e) = self.validate() {
            return Err(ConfigError::Message(format!("Validation error: {}", e)));
        }

        if !SUPPORTED_ALGORITHMS.contains(&self.jwt.algorithm.as_str()) {
            return Err(ConfigError::Message(format!(
                "Unsupported JWT algorithm '{}': expected one of {}",
                self.jwt.algorithm,
                SUPPORTED_ALGORITHMS.join(", ")
            )));
        }

        if !self.app.api_v1_str.starts_with('/') || self.app.api_v1_str.ends_with('/') {
            return Err(ConfigError::Message(format!(
                "app.api_v1_str must start with '/' and not end with one, got '{}'",
                self.app.api_v1_str
            )));
        }

        Ok(())
    }

    pub fn is_production(&self) -> bool {
        !self.app.debug
    }

    /// Rate limiting follows `debug` unless explicitly configured.
    pub fn rate_limit_enabled(&self) -> bool {
        self.rate_limit.enabled.unwrap_or(!self.app.debug)
    }

    /// Settings used by unit and integration tests: in-memory database,
    /// fixed secret, quiet logs.
    pub fn for_tests() -> Self {
        Self {
            server: ServerConfig {
                host: "127.0.0.1".to_string(),
                port: 0,
                max_request_size: DEFAULT_MAX_REQUEST_SIZE,
                interactive: false,
            },
            database: DatabaseConfig {
                url: "sqlite::memory:".to_string(),
                test_url: "sqlite::memory:".to_string(),
            },
            jwt: JwtConfig {
                secret_key: Some("test-secret-key-for-isolated-testing".to_string()),
                algorithm: "HS256".to_string(),
                access_token_expire_minutes: DEFAULT_ACCESS_TOKEN_EXPIRE_MINUTES,
                refresh_token_expire_days: DEFAULT_REFRESH_TOKEN_EXPIRE_DAYS,
            },
            app: ApplicationConfig {
                debug: true,
                api_v1_str: "/api/v1".to_string(),
                project_name: "Book Collection API".to_string(),
            },
            cors: CorsConfig {
                allowed_origins: DEFAULT_ALLOWED_ORIGINS.to_string(),
                cors_origins: String::new(),
            },
            rate_limit: RateLimitConfig {
                enabled: Some(false),
                root_per_minute: 10,
                health_per_minute: 30,
                register_per_minute: 5,
                login_per_minute: 10,
                list_books_per_minute: 30,
            },
            log: LogConfig {
                level: "error".to_string(),
                format: "pretty".to_string(),
            },
        }
    }
}
