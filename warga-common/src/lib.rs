//! # Warga Common Library
//!
//! Shared code for the RW administration service:
//! - Error taxonomy (validation, not found, guard, store, auth)
//! - Configuration loading and root folder resolution
//! - Event types and the EventBus
//! - Database initialization
//! - Document store gateway with atomic batches and live subscriptions
//! - Family/member models and validation schemas

pub mod config;
pub mod db;
pub mod error;
pub mod events;
pub mod models;
pub mod store;
pub mod uuid_utils;
pub mod validation;

pub use error::{AuthError, Error, Result};
pub use validation::{FieldError, ValidationErrors};
