//! Dashboard statistics endpoint

use axum::{extract::State, routing::get, Json, Router};

use crate::error::ApiResult;
use crate::workflow::WargaStats;
use crate::AppState;

/// GET /api/statistik
pub async fn get_stats(State(state): State<AppState>) -> ApiResult<Json<WargaStats>> {
    let families = state.families.snapshot().await?;
    Ok(Json(WargaStats::compute(&families)))
}

pub fn stats_routes() -> Router<AppState> {
    Router::new().route("/api/statistik", get(get_stats))
}
