use chrono::{Datelike, Utc};
use tracing::debug;

use super::ServiceError;
use crate::db::{authors, books, Database};
use crate::models::book::{Book, BookCreate, BookUpdate};

const MIN_QUERY_LEN: usize = 2;

fn current_year() -> i32 {
    Utc::now().year()
}

fn check_year(year: Option<i32>) -> Result<(), ServiceError> {
    match year {
        Some(year) if year > current_year() => Err(ServiceError::rule(
            "Publication year cannot be in the future",
        )),
        _ => Ok(()),
    }
}

#[derive(Clone)]
pub struct BookService {
    db: Database,
}

impl BookService {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    async fn check_author(&self, author_id: i64, user_id: i64) -> Result<(), ServiceError> {
        if authors::get(&self.db, author_id, user_id).await?.is_none() {
            return Err(ServiceError::rule("Author not found"));
        }
        Ok(())
    }

    pub async fn create_book(&self, input: BookCreate, user_id: i64) -> Result<Book, ServiceError> {
        check_year(input.publication_year)?;
        self.check_author(input.author_id, user_id).await?;

        let book = books::create(&self.db, input, user_id).await?;
        debug!("User {} created book {}", user_id, book.id);
        Ok(book)
    }

    pub async fn get_user_book(
        &self,
        user_id: i64,
        book_id: i64,
    ) -> Result<Option<Book>, ServiceError> {
        Ok(books::get(&self.db, book_id, user_id).await?)
    }

    /// `Ok(None)` when the book does not exist for this user; that check runs
    /// before the year and author rules.
    pub async fn update_user_book(
        &self,
        user_id: i64,
        book_id: i64,
        input: BookUpdate,
    ) -> Result<Option<Book>, ServiceError> {
        if self.get_user_book(user_id, book_id).await?.is_none() {
            return Ok(None);
        }
        check_year(input.publication_year)?;
        if let Some(author_id) = input.author_id {
            self.check_author(author_id, user_id).await?;
        }
        Ok(books::update(&self.db, book_id, input, user_id).await?)
    }

    pub async fn delete_user_book(&self, user_id: i64, book_id: i64) -> Result<bool, ServiceError> {
        Ok(books::delete(&self.db, book_id, user_id).await?)
    }

    /// Case-insensitive match on title or description.
    pub async fn search_books(
        &self,
        user_id: i64,
        query: &str,
        skip: i64,
        limit: i64,
    ) -> Result<Vec<Book>, ServiceError> {
        let query = query.trim();
        if query.chars().count() < MIN_QUERY_LEN {
            return Err(ServiceError::rule(
                "Search query must be at least 2 characters long",
            ));
        }
        let (found, total) = books::search(&self.db, user_id, query, skip, limit).await?;
        debug!("Search '{}' matched {} books for user {}", query, total, user_id);
        Ok(found)
    }
}
