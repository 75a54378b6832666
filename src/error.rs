//! Error handler for identity service.

use thiserror::Error;
use validator::{ValidationError, ValidationErrors};

use crate::crypto::CryptoError;
use crate::user::RepositoryError;

pub type Result<T> = std::result::Result<T, IdentityError>;

/// Enum representing every failure the service can report.
///
/// The transport layer maps these kinds to protocol responses.
#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("{0}")]
    Validation(#[from] ValidationErrors),

    #[error("{0}")]
    Conflict(String),

    #[error("user not found")]
    NotFound,

    #[error("invalid credentials")]
    InvalidCredentials,

    #[error("persistence failure: {0}")]
    Persistence(RepositoryError),

    #[error("failed to sign token: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),

    #[error(transparent)]
    Crypto(#[from] CryptoError),

    #[error("invalid configuration: {0}")]
    Config(String),
}

impl IdentityError {
    /// Create a [`IdentityError::Validation`] holding a single field error.
    pub fn invalid(
        field: &'static str,
        code: &'static str,
        message: &str,
    ) -> Self {
        Self::field(
            field,
            ValidationError::new(code).with_message(message.to_owned().into()),
        )
    }

    /// Create a [`IdentityError::Validation`] from a single field error.
    pub fn field(field: &'static str, error: ValidationError) -> Self {
        let mut errors = ValidationErrors::new();
        errors.add(field, error);
        Self::Validation(errors)
    }

    /// Whether this error is a validation failure on `field`.
    pub fn is_invalid_field(&self, field: &str) -> bool {
        match self {
            Self::Validation(errors) => {
                errors.field_errors().contains_key(field)
            },
            _ => false,
        }
    }
}

impl From<RepositoryError> for IdentityError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::NotFound => Self::NotFound,
            RepositoryError::UniqueViolation(field) => {
                Self::Conflict(format!("{field} already registered"))
            },
            err => Self::Persistence(err),
        }
    }
}
