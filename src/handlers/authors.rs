use axum::{
    extract::{Path, State},
    Json,
};

use crate::db::authors;
use crate::errors::ApiError;
use crate::extract::{ValidatedJson, ValidatedQuery};
use crate::middleware::auth::CurrentUser;
use crate::models::author::{Author, AuthorCreate, AuthorUpdate};
use crate::models::{ListParams, MessageResponse};
use crate::state::AppState;

fn not_found() -> ApiError {
    ApiError::NotFound("Author not found".into())
}

pub async fn list_authors(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedQuery(params): ValidatedQuery<ListParams>,
) -> Result<Json<Vec<Author>>, ApiError> {
    let found = authors::list(&state.db, user.id, params.skip, params.limit).await?;
    Ok(Json(found))
}

pub async fn create_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(input): ValidatedJson<AuthorCreate>,
) -> Result<Json<Author>, ApiError> {
    let author = authors::create(&state.db, input, user.id).await?;
    Ok(Json(author))
}

pub async fn get_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
) -> Result<Json<Author>, ApiError> {
    authors::get(&state.db, author_id, user.id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn update_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
    ValidatedJson(input): ValidatedJson<AuthorUpdate>,
) -> Result<Json<Author>, ApiError> {
    authors::update(&state.db, author_id, input, user.id)
        .await?
        .map(Json)
        .ok_or_else(not_found)
}

pub async fn delete_author(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    Path(author_id): Path<i64>,
) -> Result<Json<MessageResponse>, ApiError> {
    if !authors::delete(&state.db, author_id, user.id).await? {
        return Err(not_found());
    }
    Ok(Json(MessageResponse::new("Author deleted successfully")))
}
