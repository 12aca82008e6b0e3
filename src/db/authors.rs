use rusqlite::{params, OptionalExtension, Row};

use super::{now, Database, DbError};
use crate::models::author::{Author, AuthorCreate, AuthorUpdate};

const COLUMNS: &str = "id, name, biography, user_id, created_at, updated_at";

fn row_to_author(row: &Row<'_>) -> rusqlite::Result<Author> {
    Ok(Author {
        id: row.get(0)?,
        name: row.get(1)?,
        biography: row.get(2)?,
        user_id: row.get(3)?,
        created_at: row.get(4)?,
        updated_at: row.get(5)?,
    })
}

fn select_owned(
    conn: &rusqlite::Connection,
    author_id: i64,
    user_id: i64,
) -> rusqlite::Result<Option<Author>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM authors WHERE id = ?1 AND user_id = ?2"),
        params![author_id, user_id],
        row_to_author,
    )
    .optional()
}

pub async fn get(db: &Database, author_id: i64, user_id: i64) -> Result<Option<Author>, DbError> {
    let author = db
        .conn()
        .call(move |conn| Ok(select_owned(conn, author_id, user_id)?))
        .await?;
    Ok(author)
}

pub async fn get_by_name(
    db: &Database,
    name: &str,
    user_id: i64,
) -> Result<Option<Author>, DbError> {
    let name = name.to_string();
    let author = db
        .conn()
        .call(move |conn| {
            let author = conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM authors WHERE name = ?1 AND user_id = ?2 ORDER BY id ASC LIMIT 1"
                    ),
                    params![name, user_id],
                    row_to_author,
                )
                .optional()?;
            Ok(author)
        })
        .await?;
    Ok(author)
}

pub async fn list(
    db: &Database,
    user_id: i64,
    skip: i64,
    limit: i64,
) -> Result<Vec<Author>, DbError> {
    let authors = db
        .conn()
        .call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {COLUMNS} FROM authors WHERE user_id = ?1 ORDER BY id ASC LIMIT ?2 OFFSET ?3"
            ))?;
            let rows = stmt.query_map(params![user_id, limit, skip], row_to_author)?;
            Ok(rows.collect::<rusqlite::Result<Vec<_>>>()?)
        })
        .await?;
    Ok(authors)
}

pub async fn create(db: &Database, input: AuthorCreate, user_id: i64) -> Result<Author, DbError> {
    let created_at = now();
    let author = db
        .conn()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO authors (name, biography, user_id, created_at) VALUES (?1, ?2, ?3, ?4)",
                params![input.name, input.biography, user_id, created_at],
            )?;
            Ok(Author {
                id: conn.last_insert_rowid(),
                name: input.name,
                biography: input.biography,
                user_id,
                created_at,
                updated_at: None,
            })
        })
        .await?;
    Ok(author)
}

/// Applies the fields present in `changes`. `None` when the author does not
/// exist for this user.
pub async fn update(
    db: &Database,
    author_id: i64,
    changes: AuthorUpdate,
    user_id: i64,
) -> Result<Option<Author>, DbError> {
    let updated_at = now();
    let author = db
        .conn()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut author) = select_owned(&tx, author_id, user_id)? else {
                return Ok(None);
            };

            if let Some(name) = changes.name {
                author.name = name;
            }
            if let Some(biography) = changes.biography {
                author.biography = biography;
            }
            author.updated_at = Some(updated_at);

            tx.execute(
                "UPDATE authors SET name = ?1, biography = ?2, updated_at = ?3 WHERE id = ?4 AND user_id = ?5",
                params![author.name, author.biography, author.updated_at, author.id, user_id],
            )?;
            tx.commit()?;
            Ok(Some(author))
        })
        .await?;
    Ok(author)
}

/// Deleting an author also removes that author's books.
pub async fn delete(db: &Database, author_id: i64, user_id: i64) -> Result<bool, DbError> {
    let deleted = db
        .conn()
        .call(move |conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "DELETE FROM books WHERE author_id = ?1 AND user_id = ?2",
                params![author_id, user_id],
            )?;
            let affected = tx.execute(
                "DELETE FROM authors WHERE id = ?1 AND user_id = ?2",
                params![author_id, user_id],
            )?;
            if affected == 0 {
                // Nothing owned by this user: keep any books untouched.
                tx.rollback()?;
                return Ok(false);
            }
            tx.commit()?;
            Ok(true)
        })
        .await?;
    Ok(deleted)
}
