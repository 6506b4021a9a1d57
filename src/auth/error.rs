//! Outcomes reported by the auth service to its callers.

use thiserror::Error;

use crate::storage::UserId;

/// Server-side reason behind an `InvalidCredentials` outcome.
///
/// It is for logs only and never part of a response.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Rejection {
    #[default]
    Denied,
    /// The stored password hash of this user failed to parse.
    MalformedHash { user_id: UserId },
}

/// Error kinds of the auth service.
///
/// The kind is the contract; transports choose the matching status code.
/// `InvalidCredentials` deliberately covers unknown emails, wrong passwords,
/// corrupted password hashes, rejected tokens and admin checks for unknown
/// users so callers cannot tell them apart.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("invalid credentials")]
    InvalidCredentials(Rejection),
    #[error("user already exists")]
    AlreadyExists,
    #[error("user not found")]
    NotFound,
    #[error("store consistency violation: {0}")]
    Consistency(String),
    #[error("internal error")]
    Internal(#[source] anyhow::Error),
    #[error("operation cancelled")]
    Cancelled,
    #[error("deadline exceeded")]
    DeadlineExceeded,
}

impl AuthError {
    pub(crate) const fn denied() -> Self {
        Self::InvalidCredentials(Rejection::Denied)
    }

    pub(crate) fn internal(err: impl Into<anyhow::Error>) -> Self {
        Self::Internal(err.into())
    }

    /// Whether a caller may retry the same request.
    ///
    /// Deterministic outcomes (`InvalidCredentials`, `AlreadyExists`,
    /// `NotFound`, `Consistency`) never change on retry.
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Self::Internal(_) | Self::Cancelled | Self::DeadlineExceeded
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_transient_errors_are_retryable() {
        assert!(AuthError::internal(anyhow::anyhow!("db down")).is_retryable());
        assert!(AuthError::DeadlineExceeded.is_retryable());
        assert!(!AuthError::denied().is_retryable());
        assert!(!AuthError::AlreadyExists.is_retryable());
        assert!(!AuthError::NotFound.is_retryable());
        assert!(!AuthError::Consistency("2 rows".to_string()).is_retryable());
    }

    #[test]
    fn rejection_reason_is_not_displayed() {
        let malformed = AuthError::InvalidCredentials(Rejection::MalformedHash { user_id: 7 });
        assert_eq!(malformed.to_string(), AuthError::denied().to_string());
        assert!(!malformed.to_string().contains('7'));
    }

    #[test]
    fn internal_error_message_hides_source() {
        let err = AuthError::internal(anyhow::anyhow!("password column missing"));
        assert_eq!(err.to_string(), "internal error");
        assert!(std::error::Error::source(&err).is_some());
    }
}
