//! warga-admin library - RW resident administration service
//!
//! Family/member records, bulk spreadsheet import/export, authentication
//! and dashboard statistics over the shared document store, exposed as an
//! HTTP + SSE API.

use axum::Router;
use sqlx::SqlitePool;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use warga_common::events::EventBus;
use warga_common::store::{DocumentStore, SqliteStore};

pub mod api;
pub mod auth;
pub mod error;
pub mod sheet;
pub mod workflow;

use auth::{AuthService, LocalAuthProvider, SessionContext};
use sheet::CsvCodec;
use workflow::{FamilyService, TransferService};

/// Application state shared across HTTP handlers
#[derive(Clone)]
pub struct AppState {
    pub families: FamilyService,
    pub transfer: TransferService,
    pub auth: AuthService,
    pub event_bus: EventBus,
}

impl AppState {
    /// Wire every workflow onto one database pool and event bus
    ///
    /// `allowed_federated_domains` empty disables federated sign-in.
    pub fn new(db: SqlitePool, event_bus: EventBus, allowed_federated_domains: Vec<String>) -> Self {
        let store: Arc<dyn DocumentStore> =
            Arc::new(SqliteStore::new(db.clone(), event_bus.clone()));
        let families = FamilyService::new(store);
        let transfer = TransferService::new(families.clone(), Arc::new(CsvCodec), event_bus.clone());

        let provider = LocalAuthProvider::new(db, allowed_federated_domains);
        let auth = AuthService::new(Arc::new(provider), SessionContext::new(event_bus.clone()));

        Self {
            families,
            transfer,
            auth,
            event_bus,
        }
    }
}

/// Build application router
///
/// Health and sign-in routes are public; everything else needs a bearer
/// token.
pub fn build_router(state: AppState) -> Router {
    use axum::middleware;

    let protected = Router::new()
        .merge(api::family_routes())
        .merge(api::member_routes())
        .merge(api::transfer_routes())
        .merge(api::stats_routes())
        .merge(api::account_routes())
        .layer(middleware::from_fn_with_state(
            state.clone(),
            api::auth_middleware,
        ));

    let public = Router::new()
        .merge(api::sign_in_routes())
        .merge(api::health_routes());

    Router::new()
        .merge(protected)
        .merge(public)
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}
