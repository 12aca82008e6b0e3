use rusqlite::{params, OptionalExtension, Row};

use super::{now, Database, DbError};
use crate::models::user::UserRecord;

const COLUMNS: &str = "id, email, username, hashed_password, created_at, updated_at";

/// Column values for an update; `None` keeps the stored value.
#[derive(Debug, Clone, Default)]
pub struct UserChanges {
    pub email: Option<String>,
    pub username: Option<String>,
    pub hashed_password: Option<String>,
}

fn row_to_user(row: &Row<'_>) -> rusqlite::Result<UserRecord> {
    Ok(UserRecord {
        id: row.get(0)?,
        email: row.get(1)?,
        username: row.get(2)?,
        hashed_password: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

pub async fn get(db: &Database, user_id: i64) -> Result<Option<UserRecord>, DbError> {
    let user = db
        .conn()
        .call(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                    params![user_id],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await?;
    Ok(user)
}

pub async fn get_by_email(db: &Database, email: &str) -> Result<Option<UserRecord>, DbError> {
    let email = email.to_string();
    let user = db
        .conn()
        .call(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM users WHERE email = ?1"),
                    params![email],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await?;
    Ok(user)
}

pub async fn get_by_username(
    db: &Database,
    username: &str,
) -> Result<Option<UserRecord>, DbError> {
    let username = username.to_string();
    let user = db
        .conn()
        .call(move |conn| {
            let user = conn
                .query_row(
                    &format!("SELECT {COLUMNS} FROM users WHERE username = ?1"),
                    params![username],
                    row_to_user,
                )
                .optional()?;
            Ok(user)
        })
        .await?;
    Ok(user)
}

pub async fn list(db: &Database, skip: i64, limit: i64) -> Result<Vec<UserRecord>, DbError> {
    let users = db
        .conn()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM users ORDER BY id ASC LIMIT ?1 OFFSET ?2"
            ))?;
            let rows = stmt.query_map(params![limit, skip], row_to_user)?;
            let users = rows.collect::<rusqlite::Result<Vec<_>>>()?;
            Ok(users)
        })
        .await?;
    Ok(users)
}

pub async fn create(
    db: &Database,
    email: &str,
    username: &str,
    hashed_password: &str,
) -> Result<UserRecord, DbError> {
    let email = email.to_string();
    let username = username.to_string();
    let hashed_password = hashed_password.to_string();
    let created_at = now();

    let user = db
        .conn()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO users (email, username, hashed_password, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![email, username, hashed_password, created_at],
            )?;
            Ok(UserRecord {
                id: conn.last_insert_rowid(),
                email,
                username,
                hashed_password,
                created_at,
                updated_at: None,
            })
        })
        .await?;
    Ok(user)
}

pub async fn update(
    db: &Database,
    user_id: i64,
    changes: UserChanges,
) -> Result<Option<UserRecord>, DbError> {
    let updated_at = now();
    let user = db
        .conn()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let existing = tx
                .query_row(
                    &format!("SELECT {COLUMNS} FROM users WHERE id = ?1"),
                    params![user_id],
                    row_to_user,
                )
                .optional()?;
            let Some(mut user) = existing else {
                return Ok(None);
            };

            if let Some(email) = changes.email {
                user.email = email;
            }
            if let Some(username) = changes.username {
                user.username = username;
            }
            if let Some(hashed_password) = changes.hashed_password {
                user.hashed_password = hashed_password;
            }
            user.updated_at = Some(updated_at);

            tx.execute(
                "UPDATE users SET email = ?1, username = ?2, hashed_password = ?3, updated_at = ?4 WHERE id = ?5",
                params![user.email, user.username, user.hashed_password, user.updated_at, user.id],
            )?;
            tx.commit()?;
            Ok(Some(user))
        })
        .await?;
    Ok(user)
}

/// Deleting a user cascades to their authors and books.
pub async fn delete(db: &Database, user_id: i64) -> Result<bool, DbError> {
    let deleted = db
        .conn()
        .call(move |conn| {
            let affected = conn.execute("DELETE FROM users WHERE id = ?1", params![user_id])?;
            Ok(affected > 0)
        })
        .await?;
    Ok(deleted)
}

pub async fn count(db: &Database) -> Result<i64, DbError> {
    let total = db
        .conn()
        .call(|conn| {
            let total = conn.query_row("SELECT COUNT(*) FROM users", [], |row| row.get(0))?;
            Ok(total)
        })
        .await?;
    Ok(total)
}
