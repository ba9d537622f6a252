//! Authentication workflow
//!
//! The identity provider sits behind [`AuthProvider`]; [`AuthService`] adds
//! form validation, error mapping and the process-wide [`SessionContext`].

mod local;
mod password;
mod service;
mod session;

pub use local::LocalAuthProvider;
pub use password::{hash_password, verify_password};
pub use service::AuthService;
pub use session::SessionContext;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use warga_common::AuthError;

/// Signed-in user as reported by the provider
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthUser {
    pub uid: String,
    pub email: String,
    pub display_name: Option<String>,
    /// `password` or `federated`
    pub provider: String,
}

/// Issued session: bearer token plus the user it belongs to
#[derive(Debug, Clone, Serialize)]
pub struct Session {
    pub token: String,
    pub user: AuthUser,
}

/// Identity asserted by an external identity provider
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FederatedIdentity {
    pub email: String,
    pub display_name: Option<String>,
}

#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AuthError>;

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError>;

    async fn sign_in_federated(&self, identity: &FederatedIdentity) -> Result<Session, AuthError>;

    /// Revoke a session token; unknown tokens are ignored
    async fn sign_out(&self, token: &str) -> Result<(), AuthError>;

    async fn update_profile(&self, uid: &str, display_name: &str) -> Result<AuthUser, AuthError>;

    /// Confirm the user's current password
    async fn reauthenticate(&self, uid: &str, password: &str) -> Result<(), AuthError>;

    async fn update_password(&self, uid: &str, new_password: &str) -> Result<(), AuthError>;

    /// Resolve a bearer token; `NotSignedIn` when it is unknown or revoked
    async fn user_for_token(&self, token: &str) -> Result<AuthUser, AuthError>;
}
