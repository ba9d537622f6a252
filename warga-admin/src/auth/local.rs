//! Local identity provider backed by the `users` table
//!
//! Passwords are stored as Argon2id PHC strings. Session tokens are opaque
//! SHA-256 hex digests of random bytes, held in memory: restarting the
//! service signs everyone out.

use async_trait::async_trait;
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

use warga_common::{uuid_utils, AuthError};

use super::password::{hash_password, verify_password};
use super::{AuthProvider, AuthUser, FederatedIdentity, Session};

const PASSWORD_PROVIDER: &str = "password";
const FEDERATED_PROVIDER: &str = "federated";

type UserRow = (String, String, Option<String>, Option<String>, String);

#[derive(Clone)]
pub struct LocalAuthProvider {
    pool: SqlitePool,
    allowed_domains: Vec<String>,
    /// token -> uid
    sessions: Arc<RwLock<HashMap<String, String>>>,
}

impl LocalAuthProvider {
    /// `allowed_domains` lists the email domains accepted for federated
    /// sign-in; an empty list disables federated sign-in.
    pub fn new(pool: SqlitePool, allowed_domains: Vec<String>) -> Self {
        Self {
            pool,
            allowed_domains: allowed_domains
                .into_iter()
                .map(|d| d.trim().to_ascii_lowercase())
                .filter(|d| !d.is_empty())
                .collect(),
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    fn domain_allowed(&self, email: &str) -> bool {
        match email.rsplit_once('@') {
            Some((_, domain)) => {
                let domain = domain.to_ascii_lowercase();
                self.allowed_domains.iter().any(|d| *d == domain)
            }
            None => false,
        }
    }

    async fn issue_session(&self, user: AuthUser) -> Session {
        let token = generate_token();
        self.sessions
            .write()
            .await
            .insert(token.clone(), user.uid.clone());
        debug!(uid = %user.uid, "Session issued");
        Session { token, user }
    }

    async fn find_by_email(&self, email: &str) -> Result<Option<UserRow>, AuthError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT uid, email, display_name, password_hash, provider FROM users WHERE email = ?",
        )
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(provider_error)
    }

    async fn find_by_uid(&self, uid: &str) -> Result<Option<UserRow>, AuthError> {
        sqlx::query_as::<_, UserRow>(
            "SELECT uid, email, display_name, password_hash, provider FROM users WHERE uid = ?",
        )
        .bind(uid)
        .fetch_optional(&self.pool)
        .await
        .map_err(provider_error)
    }

    async fn insert_user(
        &self,
        email: &str,
        display_name: Option<&str>,
        password_hash: Option<&str>,
        provider: &str,
    ) -> Result<AuthUser, AuthError> {
        let uid = uuid_utils::generate_document_id();
        let result = sqlx::query(
            r#"
            INSERT INTO users (uid, email, display_name, password_hash, provider)
            VALUES (?, ?, ?, ?, ?)
            "#,
        )
        .bind(&uid)
        .bind(email)
        .bind(display_name)
        .bind(password_hash)
        .bind(provider)
        .execute(&self.pool)
        .await;

        match result {
            Ok(_) => Ok(AuthUser {
                uid,
                email: email.to_string(),
                display_name: display_name.map(str::to_string),
                provider: provider.to_string(),
            }),
            Err(sqlx::Error::Database(e)) if e.is_unique_violation() => {
                Err(AuthError::EmailAlreadyInUse)
            }
            Err(e) => Err(provider_error(e)),
        }
    }
}

#[async_trait]
impl AuthProvider for LocalAuthProvider {
    async fn create_user(
        &self,
        email: &str,
        password: &str,
        display_name: &str,
    ) -> Result<Session, AuthError> {
        if self.find_by_email(email).await?.is_some() {
            return Err(AuthError::EmailAlreadyInUse);
        }

        let hash = hash_password(password)?;
        let user = self
            .insert_user(email, Some(display_name), Some(&hash), PASSWORD_PROVIDER)
            .await?;

        info!(uid = %user.uid, "User registered");
        Ok(self.issue_session(user).await)
    }

    async fn sign_in(&self, email: &str, password: &str) -> Result<Session, AuthError> {
        let Some(row) = self.find_by_email(email).await? else {
            return Err(AuthError::InvalidCredential);
        };
        let Some(hash) = row.3.as_deref() else {
            return Err(AuthError::InvalidCredential);
        };
        if !verify_password(password, hash)? {
            return Err(AuthError::InvalidCredential);
        }

        let user = into_user(row);
        info!(uid = %user.uid, "User signed in");
        Ok(self.issue_session(user).await)
    }

    async fn sign_in_federated(&self, identity: &FederatedIdentity) -> Result<Session, AuthError> {
        if !self.domain_allowed(&identity.email) {
            warn!(email = %identity.email, "Federated sign-in from unlisted domain");
            return Err(AuthError::UnauthorizedDomain);
        }

        let user = match self.find_by_email(&identity.email).await? {
            Some(row) => into_user(row),
            None => {
                self.insert_user(
                    &identity.email,
                    identity.display_name.as_deref(),
                    None,
                    FEDERATED_PROVIDER,
                )
                .await?
            }
        };

        info!(uid = %user.uid, "User signed in (federated)");
        Ok(self.issue_session(user).await)
    }

    async fn sign_out(&self, token: &str) -> Result<(), AuthError> {
        if let Some(uid) = self.sessions.write().await.remove(token) {
            info!(uid = %uid, "User signed out");
        }
        Ok(())
    }

    async fn update_profile(&self, uid: &str, display_name: &str) -> Result<AuthUser, AuthError> {
        let result = sqlx::query(
            "UPDATE users SET display_name = ?, updated_at = CURRENT_TIMESTAMP WHERE uid = ?",
        )
        .bind(display_name)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(provider_error)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotSignedIn);
        }

        self.find_by_uid(uid)
            .await?
            .map(into_user)
            .ok_or(AuthError::NotSignedIn)
    }

    async fn reauthenticate(&self, uid: &str, password: &str) -> Result<(), AuthError> {
        let row = self.find_by_uid(uid).await?.ok_or(AuthError::NotSignedIn)?;
        let Some(hash) = row.3.as_deref() else {
            return Err(AuthError::InvalidCredential);
        };
        if verify_password(password, hash)? {
            Ok(())
        } else {
            Err(AuthError::InvalidCredential)
        }
    }

    async fn update_password(&self, uid: &str, new_password: &str) -> Result<(), AuthError> {
        let hash = hash_password(new_password)?;
        let result = sqlx::query(
            "UPDATE users SET password_hash = ?, updated_at = CURRENT_TIMESTAMP WHERE uid = ?",
        )
        .bind(&hash)
        .bind(uid)
        .execute(&self.pool)
        .await
        .map_err(provider_error)?;

        if result.rows_affected() == 0 {
            return Err(AuthError::NotSignedIn);
        }
        info!(uid = %uid, "Password changed");
        Ok(())
    }

    async fn user_for_token(&self, token: &str) -> Result<AuthUser, AuthError> {
        let uid = self
            .sessions
            .read()
            .await
            .get(token)
            .cloned()
            .ok_or(AuthError::NotSignedIn)?;

        self.find_by_uid(&uid)
            .await?
            .map(into_user)
            .ok_or(AuthError::NotSignedIn)
    }
}

/// 64 hex characters
fn generate_token() -> String {
    let mut bytes = [0u8; 32];
    rand::thread_rng().fill_bytes(&mut bytes);

    let mut hasher = Sha256::new();
    hasher.update(bytes);
    format!("{:x}", hasher.finalize())
}

fn into_user((uid, email, display_name, _hash, provider): UserRow) -> AuthUser {
    AuthUser {
        uid,
        email,
        display_name,
        provider,
    }
}

fn provider_error(err: sqlx::Error) -> AuthError {
    AuthError::Provider(err.to_string())
}
