//! Sign-up, sign-in, sign-out and profile endpoints

use axum::{
    extract::State,
    http::StatusCode,
    routing::{get, post, put},
    Extension, Json, Router,
};

use warga_common::validation::{LoginForm, PasswordChangeForm, ProfileForm, RegisterForm};

use super::CurrentUser;
use crate::auth::{AuthUser, FederatedIdentity, Session};
use crate::error::ApiResult;
use crate::AppState;

/// POST /api/auth/register
pub async fn register(
    State(state): State<AppState>,
    Json(form): Json<RegisterForm>,
) -> ApiResult<(StatusCode, Json<Session>)> {
    let session = state.auth.register(&form).await?;
    Ok((StatusCode::CREATED, Json(session)))
}

/// POST /api/auth/login
pub async fn login(
    State(state): State<AppState>,
    Json(form): Json<LoginForm>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.auth.login(&form).await?))
}

/// POST /api/auth/federated
pub async fn login_federated(
    State(state): State<AppState>,
    Json(identity): Json<FederatedIdentity>,
) -> ApiResult<Json<Session>> {
    Ok(Json(state.auth.login_federated(&identity).await?))
}

/// POST /api/auth/logout
pub async fn logout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> ApiResult<StatusCode> {
    state.auth.logout(&current.token, &current.user).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// GET /api/auth/me
pub async fn me(Extension(current): Extension<CurrentUser>) -> Json<AuthUser> {
    Json(current.user)
}

/// PUT /api/profile
pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(form): Json<ProfileForm>,
) -> ApiResult<Json<AuthUser>> {
    Ok(Json(state.auth.update_profile(&current.user, &form).await?))
}

/// POST /api/profile/password
pub async fn change_password(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    Json(form): Json<PasswordChangeForm>,
) -> ApiResult<StatusCode> {
    state.auth.change_password(&current.user, &form).await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Routes reachable without a session
pub fn sign_in_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/register", post(register))
        .route("/api/auth/login", post(login))
        .route("/api/auth/federated", post(login_federated))
}

/// Routes acting on the signed-in user
pub fn account_routes() -> Router<AppState> {
    Router::new()
        .route("/api/auth/logout", post(logout))
        .route("/api/auth/me", get(me))
        .route("/api/profile", put(update_profile))
        .route("/api/profile/password", post(change_password))
}
