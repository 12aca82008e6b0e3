use axum::{extract::State, Json};
use tracing::{info, warn};

use crate::errors::ApiError;
use crate::extract::{ValidatedForm, ValidatedJson, ValidatedQuery};
use crate::middleware::auth::CurrentUser;
use crate::models::user::{
    LoginForm, RefreshParams, Token, User, UserCreate, UserRegisterResponse, UserUpdate,
};
use crate::models::MessageResponse;
use crate::state::AppState;

const TOKEN_TYPE: &str = "bearer";

fn issue_tokens(state: &AppState, email: &str) -> Result<Token, ApiError> {
    let access_token = state
        .tokens
        .create_access_token(email, None)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    let refresh_token = state
        .tokens
        .create_refresh_token(email)
        .map_err(|e| ApiError::Internal(e.to_string()))?;
    Ok(Token {
        access_token,
        refresh_token,
        token_type: TOKEN_TYPE.to_string(),
    })
}

pub async fn register(
    State(state): State<AppState>,
    ValidatedJson(input): ValidatedJson<UserCreate>,
) -> Result<Json<UserRegisterResponse>, ApiError> {
    let user = state.users.create_user(&input).await?;
    let tokens = issue_tokens(&state, &user.email)?;
    Ok(Json(UserRegisterResponse {
        user: user.into(),
        access_token: tokens.access_token,
        refresh_token: tokens.refresh_token,
        token_type: tokens.token_type,
    }))
}

pub async fn login(
    State(state): State<AppState>,
    ValidatedForm(form): ValidatedForm<LoginForm>,
) -> Result<Json<Token>, ApiError> {
    let Some(user) = state.users.authenticate(&form.username, &form.password).await? else {
        warn!("Failed login attempt for '{}'", form.username);
        return Err(ApiError::Unauthorized("Incorrect email or password".into()));
    };
    info!("User {} logged in", user.id);
    Ok(Json(issue_tokens(&state, &user.email)?))
}

pub async fn refresh(
    State(state): State<AppState>,
    ValidatedQuery(params): ValidatedQuery<RefreshParams>,
) -> Result<Json<Token>, ApiError> {
    let email = state
        .tokens
        .verify_refresh_token(&params.refresh_token)
        .and_then(|claims| claims.sub)
        .ok_or_else(|| ApiError::Unauthorized("Invalid refresh token".into()))?;

    let user = state
        .users
        .get_user_by_email(&email)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("User not found".into()))?;
    Ok(Json(issue_tokens(&state, &user.email)?))
}

pub async fn me(CurrentUser(user): CurrentUser) -> Json<User> {
    Json(user.into())
}

pub async fn update_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
    ValidatedJson(input): ValidatedJson<UserUpdate>,
) -> Result<Json<User>, ApiError> {
    let updated = state
        .users
        .update_user(user.id, &input)
        .await?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;
    Ok(Json(updated.into()))
}

pub async fn delete_me(
    State(state): State<AppState>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<MessageResponse>, ApiError> {
    if !state.users.delete_user(user.id).await? {
        return Err(ApiError::NotFound("User not found".into()));
    }
    Ok(Json(MessageResponse::new("User deleted successfully")))
}
