//! Family endpoints
//!
//! GET/POST /api/keluarga, GET/PUT/DELETE /api/keluarga/:id

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    routing::get,
    Json, Router,
};
use serde::Deserialize;

use warga_common::models::FamilyRecord;
use warga_common::validation::{FamilyForm, MemberForm};

use super::{family_event_stream, ConfirmParams};
use crate::error::ApiResult;
use crate::workflow::CreatedFamily;
use crate::AppState;

/// Create/edit-family form: family fields plus the head member
#[derive(Debug, Default, Deserialize)]
#[serde(default)]
pub struct FamilyWithHeadRequest {
    pub keluarga: FamilyForm,
    pub kepala: MemberForm,
}

/// GET /api/keluarga
pub async fn list_families(State(state): State<AppState>) -> ApiResult<Json<Vec<FamilyRecord>>> {
    Ok(Json(state.families.snapshot().await?))
}

/// POST /api/keluarga
pub async fn create_family(
    State(state): State<AppState>,
    Json(request): Json<FamilyWithHeadRequest>,
) -> ApiResult<(StatusCode, Json<CreatedFamily>)> {
    let created = state
        .families
        .create_family(&request.keluarga, &request.kepala)
        .await?;
    Ok((StatusCode::CREATED, Json(created)))
}

/// GET /api/keluarga/:id
pub async fn get_family(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
) -> ApiResult<Json<FamilyRecord>> {
    Ok(Json(state.families.get_family(&family_id).await?))
}

/// PUT /api/keluarga/:id
pub async fn update_family(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Json(request): Json<FamilyWithHeadRequest>,
) -> ApiResult<StatusCode> {
    state
        .families
        .update_family(&family_id, &request.keluarga, &request.kepala)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// DELETE /api/keluarga/:id?confirm=true (cascades to every member)
pub async fn delete_family(
    State(state): State<AppState>,
    Path(family_id): Path<String>,
    Query(params): Query<ConfirmParams>,
) -> ApiResult<StatusCode> {
    params.require()?;
    state.families.delete_family(&family_id).await?;
    Ok(StatusCode::NO_CONTENT)
}

pub fn family_routes() -> Router<AppState> {
    Router::new()
        .route("/api/keluarga", get(list_families).post(create_family))
        .route("/api/keluarga/events", get(family_event_stream))
        .route(
            "/api/keluarga/:id",
            get(get_family).put(update_family).delete(delete_family),
        )
}
