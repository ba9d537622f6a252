//! HTTP API handlers for warga-admin

pub mod account;
pub mod auth;
pub mod families;
pub mod health;
pub mod members;
pub mod sse;
pub mod stats;
pub mod transfer;

pub use account::{account_routes, sign_in_routes};
pub use auth::{auth_middleware, CurrentUser};
pub use families::family_routes;
pub use health::health_routes;
pub use members::member_routes;
pub use sse::family_event_stream;
pub use stats::stats_routes;
pub use transfer::transfer_routes;

use serde::Deserialize;

use crate::error::{ApiError, ApiResult};

/// `?confirm=true` on destructive requests
#[derive(Debug, Default, Deserialize)]
pub struct ConfirmParams {
    #[serde(default)]
    pub confirm: bool,
}

impl ConfirmParams {
    /// Reject the request before any workflow runs unless it was confirmed
    pub fn require(&self) -> ApiResult<()> {
        if self.confirm {
            Ok(())
        } else {
            Err(ApiError::BadRequest(
                "Penghapusan harus dikonfirmasi (confirm=true).".to_string(),
            ))
        }
    }
}
