use anyhow::{Context, Result};
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::config::JwtConfig;

pub const ACCESS_TOKEN_TYPE: &str = "access";
pub const REFRESH_TOKEN_TYPE: &str = "refresh";
const GENERATED_SECRET_BYTES: usize = 32;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Claims {
    /// User email.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sub: Option<String>,
    pub exp: i64,
    #[serde(default)]
    pub iat: i64,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
}

impl Claims {
    pub fn is_refresh(&self) -> bool {
        self.token_type.as_deref() == Some(REFRESH_TOKEN_TYPE)
    }
}

struct Keys {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

/// Issues and verifies the HMAC-signed access and refresh tokens.
#[derive(Clone)]
pub struct TokenManager {
    keys: Arc<Keys>,
    algorithm: Algorithm,
    access_ttl: Duration,
    refresh_ttl: Duration,
}

fn generate_secret() -> String {
    let mut bytes = [0u8; GENERATED_SECRET_BYTES];
    rand::thread_rng().fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

impl TokenManager {
    pub fn new(config: &JwtConfig) -> Result<Self> {
        let algorithm = Algorithm::from_str(&config.algorithm)
            .with_context(|| format!("Unknown JWT algorithm '{}'", config.algorithm))?;
        if !matches!(algorithm, Algorithm::HS256 | Algorithm::HS384 | Algorithm::HS512) {
            anyhow::bail!("JWT algorithm '{}' is not an HMAC algorithm", config.algorithm);
        }

        let secret = match config.secret_key.as_deref().filter(|key| !key.trim().is_empty()) {
            Some(secret) => secret.to_string(),
            None => {
                warn!("SECRET_KEY not set; generated a random key, tokens will not survive a restart");
                generate_secret()
            }
        };

        let access_minutes = i64::try_from(config.access_token_expire_minutes)
            .context("access_token_expire_minutes is too large")?;
        let refresh_days = i64::try_from(config.refresh_token_expire_days)
            .context("refresh_token_expire_days is too large")?;

        Ok(Self {
            keys: Arc::new(Keys {
                encoding: EncodingKey::from_secret(secret.as_bytes()),
                decoding: DecodingKey::from_secret(secret.as_bytes()),
            }),
            algorithm,
            access_ttl: Duration::minutes(access_minutes),
            refresh_ttl: Duration::days(refresh_days),
        })
    }

    fn issue(&self, subject: &str, ttl: Duration, token_type: &str) -> Result<String> {
        let now = Utc::now();
        let claims = Claims {
            sub: Some(subject.to_string()),
            exp: (now + ttl).timestamp(),
            iat: now.timestamp(),
            token_type: Some(token_type.to_string()),
        };
        encode(&Header::new(self.algorithm), &claims, &self.keys.encoding)
            .context("Failed to sign token")
    }

    /// `expires_in` overrides the configured access token lifetime.
    pub fn create_access_token(&self, subject: &str, expires_in: Option<Duration>) -> Result<String> {
        self.issue(
            subject,
            expires_in.unwrap_or(self.access_ttl),
            ACCESS_TOKEN_TYPE,
        )
    }

    pub fn create_refresh_token(&self, subject: &str) -> Result<String> {
        self.issue(subject, self.refresh_ttl, REFRESH_TOKEN_TYPE)
    }

    /// Claims of a token with a valid signature that has not expired.
    pub fn verify_token(&self, token: &str) -> Option<Claims> {
        let mut validation = Validation::new(self.algorithm);
        validation.leeway = 0;
        match decode::<Claims>(token, &self.keys.decoding, &validation) {
            Ok(data) => Some(data.claims),
            Err(e) => {
                debug!("Token rejected: {}", e);
                None
            }
        }
    }

    pub fn verify_refresh_token(&self, token: &str) -> Option<Claims> {
        self.verify_token(token).filter(Claims::is_refresh)
    }
}
