use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, OptionalExtension, Row};

use super::{now, Database, DbError};
use crate::models::book::{Book, BookCreate, BookFilter, BookUpdate};

const COLUMNS: &str =
    "id, title, description, genre, publication_year, author_id, user_id, created_at, updated_at";

fn row_to_book(row: &Row<'_>) -> rusqlite::Result<Book> {
    Ok(Book {
        id: row.get(0)?,
        title: row.get(1)?,
        description: row.get(2)?,
        genre: row.get(3)?,
        publication_year: row.get(4)?,
        author_id: row.get(5)?,
        user_id: row.get(6)?,
        created_at: row.get(7)?,
        updated_at: row.get(8)?,
    })
}

fn select_owned(
    conn: &rusqlite::Connection,
    book_id: i64,
    user_id: i64,
) -> rusqlite::Result<Option<Book>> {
    conn.query_row(
        &format!("SELECT {COLUMNS} FROM books WHERE id = ?1 AND user_id = ?2"),
        params![book_id, user_id],
        row_to_book,
    )
    .optional()
}

/// WHERE clause and positional values for a user's books narrowed by `filter`.
fn filter_clause(user_id: i64, filter: &BookFilter) -> (String, Vec<Value>) {
    let mut clause = String::from("user_id = ?");
    let mut values = vec![Value::Integer(user_id)];

    if let Some(author_id) = filter.author_id {
        clause.push_str(" AND author_id = ?");
        values.push(Value::Integer(author_id));
    }
    if let Some(genre) = &filter.genre {
        clause.push_str(" AND genre = ?");
        values.push(Value::Text(genre.clone()));
    }
    if let Some(year) = filter.publication_year {
        clause.push_str(" AND publication_year = ?");
        values.push(Value::Integer(i64::from(year)));
    }
    (clause, values)
}

/// Case-insensitive substring match on title or description.
fn search_clause(user_id: i64, query: &str) -> (String, Vec<Value>) {
    let needle = query.to_lowercase();
    (
        "user_id = ? AND (instr(lower(title), ?) > 0 OR instr(lower(coalesce(description, '')), ?) > 0)"
            .to_string(),
        vec![
            Value::Integer(user_id),
            Value::Text(needle.clone()),
            Value::Text(needle),
        ],
    )
}

fn select_page(
    conn: &rusqlite::Connection,
    clause: &str,
    mut values: Vec<Value>,
    skip: i64,
    limit: i64,
) -> rusqlite::Result<(Vec<Book>, i64)> {
    let total: i64 = conn.query_row(
        &format!("SELECT COUNT(*) FROM books WHERE {clause}"),
        params_from_iter(values.iter()),
        |row| row.get(0),
    )?;

    values.push(Value::Integer(limit));
    values.push(Value::Integer(skip));
    let mut stmt = conn.prepare(&format!(
        "SELECT {COLUMNS} FROM books WHERE {clause} ORDER BY id ASC LIMIT ? OFFSET ?"
    ))?;
    let rows = stmt.query_map(params_from_iter(values.iter()), row_to_book)?;
    let books = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok((books, total))
}

pub async fn get(db: &Database, book_id: i64, user_id: i64) -> Result<Option<Book>, DbError> {
    let book = db
        .conn()
        .call(move |conn| Ok(select_owned(conn, book_id, user_id)?))
        .await?;
    Ok(book)
}

pub async fn get_by_title(
    db: &Database,
    title: &str,
    user_id: i64,
) -> Result<Option<Book>, DbError> {
    let title = title.to_string();
    let book = db
        .conn()
        .call(move |conn| {
            let book = conn
                .query_row(
                    &format!(
                        "SELECT {COLUMNS} FROM books WHERE title = ?1 AND user_id = ?2 ORDER BY id ASC LIMIT 1"
                    ),
                    params![title, user_id],
                    row_to_book,
                )
                .optional()?;
            Ok(book)
        })
        .await?;
    Ok(book)
}

pub async fn list(
    db: &Database,
    user_id: i64,
    filter: BookFilter,
    skip: i64,
    limit: i64,
) -> Result<Vec<Book>, DbError> {
    let (books, _) = list_with_total(db, user_id, filter, skip, limit).await?;
    Ok(books)
}

/// One page of books plus the number of rows matching `filter` overall.
pub async fn list_with_total(
    db: &Database,
    user_id: i64,
    filter: BookFilter,
    skip: i64,
    limit: i64,
) -> Result<(Vec<Book>, i64), DbError> {
    let page = db
        .conn()
        .call(move |conn| {
            let (clause, values) = filter_clause(user_id, &filter);
            Ok(select_page(conn, &clause, values, skip, limit)?)
        })
        .await?;
    Ok(page)
}

pub async fn search(
    db: &Database,
    user_id: i64,
    query: &str,
    skip: i64,
    limit: i64,
) -> Result<(Vec<Book>, i64), DbError> {
    let query = query.to_string();
    let page = db
        .conn()
        .call(move |conn| {
            let (clause, values) = search_clause(user_id, &query);
            Ok(select_page(conn, &clause, values, skip, limit)?)
        })
        .await?;
    Ok(page)
}

pub async fn create(db: &Database, input: BookCreate, user_id: i64) -> Result<Book, DbError> {
    let created_at = now();
    let book = db
        .conn()
        .call(move |conn| {
            conn.execute(
                "INSERT INTO books (title, description, genre, publication_year, author_id, user_id, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    input.title,
                    input.description,
                    input.genre,
                    input.publication_year,
                    input.author_id,
                    user_id,
                    created_at
                ],
            )?;
            Ok(Book {
                id: conn.last_insert_rowid(),
                title: input.title,
                description: input.description,
                genre: input.genre,
                publication_year: input.publication_year,
                author_id: input.author_id,
                user_id,
                created_at,
                updated_at: None,
            })
        })
        .await?;
    Ok(book)
}

/// Applies the fields present in `changes`. `None` when the book does not
/// exist for this user.
pub async fn update(
    db: &Database,
    book_id: i64,
    changes: BookUpdate,
    user_id: i64,
) -> Result<Option<Book>, DbError> {
    let updated_at = now();
    let book = db
        .conn()
        .call(move |conn| {
            let tx = conn.transaction()?;
            let Some(mut book) = select_owned(&tx, book_id, user_id)? else {
                return Ok(None);
            };

            if let Some(title) = changes.title {
                book.title = title;
            }
            if changes.description.is_some() {
                book.description = changes.description;
            }
            if changes.genre.is_some() {
                book.genre = changes.genre;
            }
            if changes.publication_year.is_some() {
                book.publication_year = changes.publication_year;
            }
            if let Some(author_id) = changes.author_id {
                book.author_id = author_id;
            }
            book.updated_at = Some(updated_at);

            tx.execute(
                "UPDATE books SET title = ?1, description = ?2, genre = ?3, publication_year = ?4,
                 author_id = ?5, updated_at = ?6 WHERE id = ?7 AND user_id = ?8",
                params![
                    book.title,
                    book.description,
                    book.genre,
                    book.publication_year,
                    book.author_id,
                    book.updated_at,
                    book.id,
                    user_id
                ],
            )?;
            tx.commit()?;
            Ok(Some(book))
        })
        .await?;
    Ok(book)
}

pub async fn delete(db: &Database, book_id: i64, user_id: i64) -> Result<bool, DbError> {
    let deleted = db
        .conn()
        .call(move |conn| {
            let affected = conn.execute(
                "DELETE FROM books WHERE id = ?1 AND user_id = ?2",
                params![book_id, user_id],
            )?;
            Ok(affected > 0)
        })
        .await?;
    Ok(deleted)
}
