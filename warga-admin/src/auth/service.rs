use std::sync::Arc;
use tracing::warn;

use warga_common::validation::{
    is_well_formed_email, LoginForm, PasswordChangeForm, ProfileForm, RegisterForm,
};
use warga_common::{AuthError, Error, Result, ValidationErrors};

use super::{AuthProvider, AuthUser, FederatedIdentity, Session, SessionContext};

/// Sign-up, sign-in, sign-out, profile and password operations
///
/// Forms are validated before the provider is called.
#[derive(Clone)]
pub struct AuthService {
    provider: Arc<dyn AuthProvider>,
    session: SessionContext,
}

impl AuthService {
    pub fn new(provider: Arc<dyn AuthProvider>, session: SessionContext) -> Self {
        Self { provider, session }
    }

    pub fn session(&self) -> &SessionContext {
        &self.session
    }

    pub async fn register(&self, form: &RegisterForm) -> Result<Session> {
        let form = form.validate()?;
        let session = self
            .provider
            .create_user(&form.email, &form.password, &form.display_name)
            .await?;
        self.session.set(Some(session.user.clone()));
        Ok(session)
    }

    pub async fn login(&self, form: &LoginForm) -> Result<Session> {
        let form = form.validate()?;
        let session = self.provider.sign_in(&form.email, &form.password).await?;
        self.session.set(Some(session.user.clone()));
        Ok(session)
    }

    pub async fn login_federated(&self, identity: &FederatedIdentity) -> Result<Session> {
        let email = identity.email.trim();
        if !is_well_formed_email(email) {
            return Err(ValidationErrors::single("email", "Format email tidak valid.").into());
        }

        let identity = FederatedIdentity {
            email: email.to_string(),
            display_name: identity.display_name.clone(),
        };
        let session = self.provider.sign_in_federated(&identity).await?;
        self.session.set(Some(session.user.clone()));
        Ok(session)
    }

    pub async fn logout(&self, token: &str, user: &AuthUser) -> Result<()> {
        self.provider.sign_out(token).await?;
        self.session.clear_if(&user.uid);
        Ok(())
    }

    /// Resolve a bearer token to its user
    pub async fn authenticate(&self, token: &str) -> Result<AuthUser> {
        Ok(self.provider.user_for_token(token).await?)
    }

    pub async fn update_profile(&self, user: &AuthUser, form: &ProfileForm) -> Result<AuthUser> {
        let form = form.validate()?;
        let updated = self
            .provider
            .update_profile(&user.uid, &form.display_name)
            .await?;
        self.session.set(Some(updated.clone()));
        Ok(updated)
    }

    /// Re-authenticate with the old password, then set the new one
    pub async fn change_password(&self, user: &AuthUser, form: &PasswordChangeForm) -> Result<()> {
        form.validate()?;

        match self.provider.reauthenticate(&user.uid, &form.old_password).await {
            Ok(()) => {}
            Err(AuthError::InvalidCredential) => {
                warn!(uid = %user.uid, "Password change rejected: old password mismatch");
                return Err(Error::Auth(AuthError::WrongPassword));
            }
            Err(e) => return Err(e.into()),
        }

        self.provider
            .update_password(&user.uid, &form.new_password)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LocalAuthProvider;
    use warga_common::db::init_memory_database;
    use warga_common::events::EventBus;

    async fn service() -> AuthService {
        let pool = init_memory_database().await.unwrap();
        let provider = LocalAuthProvider::new(pool, vec!["rw05.id".to_string()]);
        AuthService::new(Arc::new(provider), SessionContext::new(EventBus::new(10)))
    }

    fn register_form() -> RegisterForm {
        RegisterForm {
            display_name: "Admin RW".to_string(),
            email: "admin@rw05.id".to_string(),
            password: "rahasia".to_string(),
        }
    }

    #[tokio::test]
    async fn test_register_sets_session_context() {
        let auth = service().await;
        let session = auth.register(&register_form()).await.unwrap();

        assert_eq!(auth.session().current(), Some(session.user.clone()));

        auth.logout(&session.token, &session.user).await.unwrap();
        assert!(auth.session().current().is_none());
    }

    #[tokio::test]
    async fn test_invalid_forms_never_reach_provider() {
        let auth = service().await;
        let form = RegisterForm {
            display_name: "Al".to_string(),
            email: "bukan-email".to_string(),
            password: "123".to_string(),
        };

        match auth.register(&form).await.unwrap_err() {
            Error::Validation(errors) => {
                assert_eq!(errors.fields(), vec!["displayName", "email", "password"]);
            }
            other => panic!("expected validation error, got {:?}", other),
        }
        assert!(auth.session().current().is_none());
    }

    #[tokio::test]
    async fn test_change_password_requires_old_password() {
        let auth = service().await;
        let session = auth.register(&register_form()).await.unwrap();

        let wrong = PasswordChangeForm {
            old_password: "keliru".to_string(),
            new_password: "baru123".to_string(),
            confirm_password: "baru123".to_string(),
        };
        assert!(matches!(
            auth.change_password(&session.user, &wrong).await,
            Err(Error::Auth(AuthError::WrongPassword))
        ));

        let right = PasswordChangeForm {
            old_password: "rahasia".to_string(),
            ..wrong
        };
        auth.change_password(&session.user, &right).await.unwrap();

        let login = LoginForm {
            email: "admin@rw05.id".to_string(),
            password: "baru123".to_string(),
        };
        auth.login(&login).await.unwrap();
    }
}
