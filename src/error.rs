//! Error taxonomy for business operations.
//!
//! Handlers turn an [`AppError`] into a `{success: false, message}` body
//! with HTTP 200. Upstream and persistence details are only shown outside
//! production.

use thiserror::Error;

use crate::storage::StorageError;

#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or malformed request fields; storage is never touched.
    #[error("{0}")]
    Validation(String),
    #[error("{0}")]
    NotFound(String),
    /// The room is already taken for the requested dates.
    #[error("{0}")]
    Conflict(String),
    /// Identity, payment, mail or media provider failure.
    #[error("{0}")]
    Upstream(String),
    #[error(transparent)]
    Persistence(#[from] StorageError),
}

impl AppError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self::NotFound(message.into())
    }

    pub fn upstream(message: impl Into<String>) -> Self {
        Self::Upstream(message.into())
    }

    pub fn room_unavailable() -> Self {
        Self::Conflict("Room is not available for selected dates".to_string())
    }

    pub fn room_not_found() -> Self {
        Self::NotFound("Room not found".to_string())
    }

    /// Local outcomes the caller can act on, as opposed to infrastructure failures.
    pub fn is_client_facing(&self) -> bool {
        matches!(self, Self::Validation(_) | Self::NotFound(_) | Self::Conflict(_))
    }

    /// Message safe to return to a client.
    pub fn public_message(&self, expose_details: bool) -> String {
        if self.is_client_facing() || expose_details {
            self.to_string()
        } else {
            "Something went wrong, please try again later".to_string()
        }
    }
}

pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn business_errors_always_show_their_message() {
        let err = AppError::room_unavailable();
        assert_eq!(err.public_message(false), "Room is not available for selected dates");
        assert_eq!(AppError::room_not_found().public_message(false), "Room not found");
    }

    #[test]
    fn infrastructure_details_are_hidden_in_production() {
        let err = AppError::from(StorageError::Unavailable("disk on fire".into()));
        assert!(!err.public_message(false).contains("disk"));
        assert!(err.public_message(true).contains("disk on fire"));

        let err = AppError::upstream("smtp timeout");
        assert!(!err.public_message(false).contains("smtp"));
    }
}
