use axum::{
    extract::{Path, State},
    Json,
};

use crate::db::books;
use crate::errors::ApiError;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::auth::CurrentUser;
use crate::models::book::{Book, BookCreate, BookUpdate};
use crate::models::{BookListParams, MessageResponse, Page, SearchParams};
use crate::state::AppState;

fn not_found() -> ApiError {
    ApiError::NotFound("Book not found".into())
}

pub async fn list_books(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(params): ValidatedQuery<BookListParams>,
) -> Result<Json<Page<Book>>, ApiError> {
    let (items, total) =
        books::list_with_total(&state.db, user.id, params.filter(), params.skip, params.limit)
            .await?;
    Ok(Json(Page::new(items, total, params.skip, params.limit)))
}

pub async fn search_books(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(params): ValidatedQuery<SearchParams>,
) -> Result<Json<Vec<Book>>, ApiError> {
    let found = state
        .books
        .search_books(user.id, &params.q, params.skip, params.limit)
        .await?;
    Ok(Json(found))
}

pub async fn create_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(input): ValidatedJson<BookCreate>,
) -> Result<Json<Book>, ApiError> {
    Ok(Json(state.books.create_book(input, user.id).await?))
}

pub async fn get_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<i64>,
) -> Result<Json<Book>, ApiError> {
    state
        .books
        .get_user_book(user.id, book_id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<i64>,
    ValidatedJson(input): ValidatedJson<BookUpdate>,
) -> Result<Json<Book>, ApiError> {
    state
        .books
        .update_user_book(user.id, book_id, input)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn delete_book(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(book_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.books.delete_user_book(user.id, book_id).await? {
        return Err(not_found());
    }
    Ok(Json(MessageResponse::new("Book deleted successfully")))
}
