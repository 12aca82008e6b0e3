pub mod author;
pub mod book;
pub mod user;

use serde::{Deserialize, Serialize};
use validator::Validate;

use self::book::BookFilter;

pub const DEFAULT_PAGE_LIMIT: i64 = 100;
pub const MAX_PAGE_LIMIT: i64 = 100;

fn default_limit() -> i64 {
    DEFAULT_PAGE_LIMIT
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct ListParams {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

impl Default for ListParams {
    fn default() -> Self {
        Self {
            skip: 0,
            limit: DEFAULT_PAGE_LIMIT,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct BookListParams {
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
    pub author_id: Option<i64>,
    pub genre: Option<String>,
    pub publication_year: Option<i32>,
}

impl BookListParams {
    /// Empty values mean "no filter", matching how clients send blank form fields.
    pub fn filter(&self) -> BookFilter {
        BookFilter {
            author_id: self.author_id.filter(|id| *id != 0),
            genre: self.genre.clone().filter(|g| !g.is_empty()),
            publication_year: self.publication_year.filter(|y| *y != 0),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Validate)]
pub struct SearchParams {
    pub q: String,
    #[serde(default)]
    #[validate(range(min = 0))]
    pub skip: i64,
    #[serde(default = "default_limit")]
    #[validate(range(min = 1, max = 100))]
    pub limit: i64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub total: i64,
    pub page: i64,
    pub size: usize,
    pub pages: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl<T> Page<T> {
    /// `limit` must be positive; callers validate it before querying.
    pub fn new(items: Vec<T>, total: i64, skip: i64, limit: i64) -> Self {
        let limit = limit.max(1);
        Self {
            size: items.len(),
            items,
            total,
            page: (skip / limit).saturating_add(1),
            pages: total.saturating_add(limit - 1) / limit,
            has_next: skip.saturating_add(limit) < total,
            has_prev: skip > 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}
