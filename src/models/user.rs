use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// Row of the `users` table, hash included. Never serialized.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub hashed_password: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

/// Public view of a user.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub username: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

impl From<&UserRecord> for User {
    fn from(record: &UserRecord) -> Self {
        Self {
            id: record.id,
            email: record.email.clone(),
            username: record.username.clone(),
            created_at: record.created_at,
            updated_at: record.updated_at,
        }
    }
}

impl From<UserRecord> for User {
    fn from(record: UserRecord) -> Self {
        Self::from(&record)
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct UserCreate {
    #[validate(email(message = "value is not a valid email address"))]
    pub email: String,
    #[validate(length(min = 1, max = 255))]
    pub username: String,
    #[validate(length(min = 8, message = "Password must be at least 8 characters long"))]
    pub password: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UserUpdate {
    #[validate(email(message = "value is not a valid email address"))]
    pub email: Option<String>,
    #[validate(length(min = 1, max = 255))]
    pub username: Option<String>,
    pub password: Option<String>,
}

/// OAuth2 password-flow form. `username` may hold an email or a username.
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RefreshParams {
    #[validate(length(min = 1))]
    pub refresh_token: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Token {
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRegisterResponse {
    pub user: User,
    pub access_token: String,
    pub refresh_token: String,
    pub token_type: String,
}
