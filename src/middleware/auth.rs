use axum::{
    async_trait,
    extract::{FromRequestParts, Request, State},
    http::{header, request::Parts},
    middleware::Next,
    response::Response,
};
use tracing::debug;

use crate::db::users;
use crate::errors::ApiError;
use crate::models::user::UserRecord;
use crate::state::AppState;

/// The authenticated user, placed in request extensions by [`auth_middleware`].
#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

#[async_trait]
impl<S> FromRequestParts<S> for CurrentUser
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<CurrentUser>()
            .cloned()
            .ok_or_else(|| ApiError::Forbidden("Not authenticated".into()))
    }
}

/// Splits `Authorization: Bearer <token>`; the scheme is case-insensitive.
fn bearer_token(value: &str) -> Option<&str> {
    let (scheme, token) = value.split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}

pub async fn auth_middleware(
    State(state): State<AppState>,
    mut req: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let Some(value) = req.headers().get(header::AUTHORIZATION) else {
        return Err(ApiError::Forbidden("Not authenticated".into()));
    };
    let token = value
        .to_str()
        .ok()
        .and_then(bearer_token)
        .ok_or_else(|| ApiError::Forbidden("Invalid authentication credentials".into()))?;

    let claims = state
        .tokens
        .verify_token(token)
        .ok_or_else(ApiError::credentials)?;
    if claims.is_refresh() {
        debug!("Refresh token presented to a protected route");
        return Err(ApiError::credentials());
    }
    let email = claims.sub.ok_or_else(ApiError::credentials)?;

    let user = users::get_by_email(&state.db, &email)
        .await?
        .ok_or_else(ApiError::credentials)?;

    req.extensions_mut().insert(CurrentUser(user));
    Ok(next.run(req).await)
}
