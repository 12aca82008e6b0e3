use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Book {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub author_id: i64,
    pub user_id: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookCreate {
    #[validate(length(min = 1, max = 255))]
    pub title: String,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub author_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct BookUpdate {
    #[validate(length(min = 1, max = 255))]
    pub title: Option<String>,
    pub description: Option<String>,
    #[validate(length(max = 100))]
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
    pub author_id: Option<i64>,
}

/// Optional equality filters for book listings.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct BookFilter {
    pub author_id: Option<i64>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
}
