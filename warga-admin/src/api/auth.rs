//! Bearer-token authentication middleware

use axum::{
    extract::{Request, State},
    http::header::AUTHORIZATION,
    middleware::Next,
    response::Response,
};

use warga_common::AuthError;

use crate::auth::AuthUser;
use crate::error::ApiError;
use crate::AppState;

/// Identity resolved by [`auth_middleware`], available as a request extension
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub token: String,
    pub user: AuthUser,
}

/// Require `Authorization: Bearer <token>` on protected routes
///
/// Returns 401 when the header is missing or the token is unknown.
pub async fn auth_middleware(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let token = request
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(|token| token.trim().to_string())
        .filter(|token| !token.is_empty())
        .ok_or(AuthError::NotSignedIn)?;

    let user = state.auth.authenticate(&token).await?;
    request.extensions_mut().insert(CurrentUser { token, user });

    Ok(next.run(request).await)
}
