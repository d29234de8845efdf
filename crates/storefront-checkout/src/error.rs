//! # Service Error Types
//!
//! What API callers see. Every failure in the service tier collapses
//! into one of a handful of categories a transport layer can map to a
//! status code without inspecting messages.

use thiserror::Error;

use storefront_core::CoreError;
use storefront_db::DbError;

/// Errors surfaced by the checkout, cart and webhook services.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The referenced entity does not exist (or is not visible to the
    /// caller - foreign ids are indistinguishable from missing ones).
    #[error("{entity} not found: {id}")]
    NotFound { entity: String, id: String },

    /// The entity exists but its current state rejects the operation.
    /// Nothing was mutated.
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// The request itself is malformed: non-positive quantity, empty
    /// cart at checkout, unusable coupon.
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Webhook signature verification failed. The event body was not
    /// looked at.
    #[error("Invalid webhook signature: {0}")]
    InvalidSignature(String),

    /// Webhook body is not a well-formed event envelope.
    #[error("Malformed webhook event: {0}")]
    MalformedEvent(String),

    /// Domain rule violation from storefront-core.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Database failure from storefront-db.
    #[error(transparent)]
    Db(DbError),
}

impl ServiceError {
    pub fn not_found(entity: impl Into<String>, id: impl Into<String>) -> Self {
        ServiceError::NotFound {
            entity: entity.into(),
            id: id.into(),
        }
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        ServiceError::InvalidInput(message.into())
    }

    pub fn invalid_state(message: impl Into<String>) -> Self {
        ServiceError::InvalidState(message.into())
    }
}

/// `DbError::NotFound` becomes the caller-facing `NotFound`; everything
/// else stays a database error.
impl From<DbError> for ServiceError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, id } => ServiceError::NotFound { entity, id },
            other => ServiceError::Db(other),
        }
    }
}

/// Result type for service operations.
pub type ServiceResult<T> = Result<T, ServiceError>;
