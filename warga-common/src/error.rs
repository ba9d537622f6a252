//! Common error types for the RW administration service

use thiserror::Error;

use crate::validation::ValidationErrors;

/// Common result type for store and workflow operations
pub type Result<T> = std::result::Result<T, Error>;

/// Error taxonomy shared by every workflow
///
/// Every workflow operation resolves to success or exactly one of these.
#[derive(Error, Debug)]
pub enum Error {
    /// Client-side field constraint violation (checked before any store call)
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationErrors),

    /// Referenced identifier is absent
    #[error("Not found: {0}")]
    NotFound(String),

    /// Operation blocked by a family/member invariant
    #[error("{0}")]
    Guard(String),

    /// Network, permission or backend failure; the action may be retried
    #[error("Store error: {0}")]
    Store(String),

    /// Authentication provider failure
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Uploaded spreadsheet could not be read
    #[error("Unreadable file: {0}")]
    Decode(String),

    /// Configuration loading or validation error
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O operation error (wraps std::io::Error)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<sqlx::Error> for Error {
    fn from(err: sqlx::Error) -> Self {
        Error::Store(err.to_string())
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Store(format!("Malformed document: {}", err))
    }
}

/// Authentication failures, one variant per known provider cause code
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid credential")]
    InvalidCredential,

    #[error("email already registered")]
    EmailAlreadyInUse,

    #[error("domain not permitted")]
    UnauthorizedDomain,

    #[error("old password does not match")]
    WrongPassword,

    #[error("recent sign-in required")]
    RequiresRecentLogin,

    #[error("no user is signed in")]
    NotSignedIn,

    #[error("auth provider failure: {0}")]
    Provider(String),
}

impl AuthError {
    /// Provider cause code
    pub fn code(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "auth/invalid-credential",
            AuthError::EmailAlreadyInUse => "auth/email-already-in-use",
            AuthError::UnauthorizedDomain => "auth/unauthorized-domain",
            AuthError::WrongPassword => "auth/wrong-password",
            AuthError::RequiresRecentLogin => "auth/requires-recent-login",
            AuthError::NotSignedIn => "auth/not-signed-in",
            AuthError::Provider(_) => "auth/internal",
        }
    }

    /// User-facing message for the cause code
    pub fn user_message(&self) -> &'static str {
        match self {
            AuthError::InvalidCredential => "Email atau password salah.",
            AuthError::EmailAlreadyInUse => "Email sudah terdaftar. Silakan masuk.",
            AuthError::UnauthorizedDomain => "Domain tidak diizinkan. Hubungi admin.",
            AuthError::WrongPassword => "Password lama salah.",
            AuthError::RequiresRecentLogin => "Silakan masuk kembali untuk melanjutkan.",
            AuthError::NotSignedIn => "Silakan masuk terlebih dahulu.",
            AuthError::Provider(_) => "Gagal memproses permintaan. Silakan coba lagi.",
        }
    }
}

impl Error {
    /// Short category name used in logs and API bodies
    pub fn kind(&self) -> &'static str {
        match self {
            Error::Validation(_) => "VALIDATION_ERROR",
            Error::NotFound(_) => "NOT_FOUND",
            Error::Guard(_) => "GUARD_ERROR",
            Error::Store(_) => "STORE_ERROR",
            Error::Auth(_) => "AUTH_ERROR",
            Error::Decode(_) => "DECODE_ERROR",
            Error::Config(_) => "CONFIG_ERROR",
            Error::Io(_) => "IO_ERROR",
        }
    }
}
