//! Spreadsheet export, template download and import

use axum::{
    body::Bytes,
    extract::State,
    http::header,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};

use crate::error::ApiResult;
use crate::workflow::{ImportReport, SheetFile};
use crate::AppState;

/// Serve a produced spreadsheet as a download
fn attachment(file: SheetFile) -> Response {
    (
        [
            (header::CONTENT_TYPE, file.content_type.to_string()),
            (
                header::CONTENT_DISPOSITION,
                format!("attachment; filename=\"{}\"", file.filename),
            ),
        ],
        file.bytes,
    )
        .into_response()
}

/// GET /api/export
pub async fn export_all(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(attachment(state.transfer.export_all().await?))
}

/// GET /api/template
pub async fn download_template(State(state): State<AppState>) -> ApiResult<Response> {
    Ok(attachment(state.transfer.download_template()?))
}

/// POST /api/import (raw file body)
pub async fn import_file(
    State(state): State<AppState>,
    body: Bytes,
) -> ApiResult<Json<ImportReport>> {
    Ok(Json(state.transfer.import_from(&body).await?))
}

pub fn transfer_routes() -> Router<AppState> {
    Router::new()
        .route("/api/export", get(export_all))
        .route("/api/template", get(download_template))
        .route("/api/import", post(import_file))
}
