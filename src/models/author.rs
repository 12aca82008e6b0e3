use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Author {
    pub id: i64,
    pub name: String,
    pub biography: String,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct AuthorCreate {
    #[validate(length(min = 1, max = 255, message = "Author name is required"))]
    pub name: String,
    #[validate(length(min = 1, max = 1000, message = "Author biography is required"))]
    pub biography: String,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct AuthorUpdate {
    #[validate(length(min = 1, max = 255))]
    pub name: Option<String>,
    #[validate(length(min = 1, max = 1000))]
    pub biography: Option<String>,
}
