//! SQLite persistence.
//!
//! All statements run on the dedicated `tokio-rusqlite` connection thread;
//! the repository modules below only build SQL and map rows.

pub mod authors;
pub mod books;
pub mod users;

use chrono::{DateTime, Utc};
use rusqlite::ErrorCode;
use std::path::PathBuf;
use thiserror::Error;
use tokio_rusqlite::Connection;
use tracing::info;

const SCHEMA: &str = r#"
    PRAGMA foreign_keys = ON;

    CREATE TABLE IF NOT EXISTS users (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        email TEXT NOT NULL UNIQUE,
        username TEXT NOT NULL UNIQUE,
        hashed_password TEXT NOT NULL,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS authors (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        name TEXT NOT NULL CHECK (length(name) <= 255),
        biography TEXT NOT NULL CHECK (length(biography) <= 1000),
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE TABLE IF NOT EXISTS books (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        title TEXT NOT NULL CHECK (length(title) <= 255),
        description TEXT,
        genre TEXT CHECK (genre IS NULL OR length(genre) <= 100),
        publication_year INTEGER,
        author_id INTEGER NOT NULL REFERENCES authors(id) ON DELETE CASCADE,
        user_id INTEGER NOT NULL REFERENCES users(id) ON DELETE CASCADE,
        created_at TEXT NOT NULL,
        updated_at TEXT
    );

    CREATE INDEX IF NOT EXISTS idx_authors_user_id ON authors(user_id);
    CREATE INDEX IF NOT EXISTS idx_books_user_id ON books(user_id);
    CREATE INDEX IF NOT EXISTS idx_books_author_id ON books(author_id);
"#;

#[derive(Debug, Error)]
pub enum DbError {
    #[error("unsupported database url '{0}': only sqlite urls are supported")]
    UnsupportedUrl(String),
    #[error("constraint violation: {0}")]
    Conflict(String),
    #[error("database error: {0}")]
    Sqlite(tokio_rusqlite::Error),
}

impl From<tokio_rusqlite::Error> for DbError {
    fn from(err: tokio_rusqlite::Error) -> Self {
        if let tokio_rusqlite::Error::Rusqlite(rusqlite::Error::SqliteFailure(failure, message)) =
            &err
        {
            if failure.code == ErrorCode::ConstraintViolation {
                return DbError::Conflict(
                    message.clone().unwrap_or_else(|| failure.to_string()),
                );
            }
        }
        DbError::Sqlite(err)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DatabaseLocation {
    Memory,
    File(PathBuf),
}

impl DatabaseLocation {
    /// Accepts `sqlite::memory:`, `sqlite://path`, `sqlite:///path` (SQLAlchemy
    /// style, relative unless a fourth slash follows) or a bare file path.
    pub fn parse(url: &str) -> Result<Self, DbError> {
        let url = url.trim();
        let rest = if let Some(rest) = url.strip_prefix("sqlite:///") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite://") {
            rest
        } else if let Some(rest) = url.strip_prefix("sqlite:") {
            rest
        } else if url.contains("://") {
            return Err(DbError::UnsupportedUrl(url.to_string()));
        } else {
            url
        };

        match rest {
            "" => Err(DbError::UnsupportedUrl(url.to_string())),
            ":memory:" | "memory:" => Ok(Self::Memory),
            path => Ok(Self::File(PathBuf::from(path))),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TableCounts {
    pub users: i64,
    pub authors: i64,
    pub books: i64,
}

#[derive(Clone)]
pub struct Database {
    conn: Connection,
    location: DatabaseLocation,
}

impl Database {
    pub async fn connect(url: &str) -> Result<Self, DbError> {
        let location = DatabaseLocation::parse(url)?;
        let conn = match &location {
            DatabaseLocation::Memory => Connection::open_in_memory().await?,
            DatabaseLocation::File(path) => Connection::open(path.clone()).await?,
        };

        let db = Self { conn, location };
        db.init_schema().await?;
        info!("Database ready at {:?}", db.location);
        Ok(db)
    }

    pub async fn open_in_memory() -> Result<Self, DbError> {
        Self::connect("sqlite::memory:").await
    }

    pub fn location(&self) -> &DatabaseLocation {
        &self.location
    }

    async fn init_schema(&self) -> Result<(), DbError> {
        self.conn
            .call(|conn| {
                conn.execute_batch(SCHEMA)?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub(crate) fn conn(&self) -> &Connection {
        &self.conn
    }

    pub async fn ping(&self) -> Result<(), DbError> {
        self.conn
            .call(|conn| {
                conn.query_row("SELECT 1", [], |row| row.get::<_, i64>(0))?;
                Ok(())
            })
            .await?;
        Ok(())
    }

    pub async fn counts(&self) -> Result<TableCounts, DbError> {
        let counts = self
            .conn
            .call(|conn| {
                let count = |table: &str| -> rusqlite::Result<i64> {
                    conn.query_row(&format!("SELECT COUNT(*) FROM {table}"), [], |row| {
                        row.get(0)
                    })
                };
                Ok(TableCounts {
                    users: count("users")?,
                    authors: count("authors")?,
                    books: count("books")?,
                })
            })
            .await?;
        Ok(counts)
    }
}

pub(crate) fn now() -> DateTime<Utc> {
    Utc::now()
}
