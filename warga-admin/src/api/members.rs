//! Member endpoints under a family

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::{get, put},
    Json, Router,
};
use serde_json::{json, Value};

use warga_common::models::MemberRecord;
use warga_common::validation::MemberForm;

use super::ConfirmParams;
use crate::error::ApiResult;
use crate::AppState;

/// GET /api/keluarga/:id/anggota
pub async fn list_members(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> ApiResult<Json<Vec<MemberRecord>>> {
    Ok(Json(state.families.list_members(&family_id).await?))
}

/// POST /api/keluarga/:id/anggota
pub async fn create_member(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(form): Json<MemberForm>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let member_id = state.families.create_member(&family_id, &form).await?;
    Ok((StatusCode::CREATED, Json(json!({ "id": member_id }))))
}

/// PUT /api/keluarga/:id/anggota/:member_id
pub async fn update_member(
    State(state): State<AppState>,
    Path((family_id, member_id)): Path<(String, String)>,
    Json(form): Json<MemberForm>,
) -> ApiResult<StatusCode> {
    state
        .families
        .update_member(&family_id, &member_id, &form)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/keluarga/:id/anggota/:member_id?confirm=true
///
/// The head member cannot be deleted here (409).
pub async fn delete_member(
    State(state): State<AppState>,
    Path((family_id, member_id)): Path<(String, String)>,
    Query(params): Query<ConfirmParams>,
) -> ApiResult<StatusCode> {
    params.require()?;
    state.families.delete_member(&family_id, &member_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn member_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/api/keluarga/:id/anggota",
            get(list_members).post(create_member),
        )
        .route(
            "/api/keluarga/:id/anggota/:member_id",
            put(update_member).delete(delete_member),
        )
}
