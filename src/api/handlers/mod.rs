pub mod auth;
pub mod health;
pub mod users;

// common functions for the handlers
use crate::auth::{AuthError, Rejection};
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use regex::Regex;
use tracing::{debug, error, warn};

pub const MIN_PASSWORD_LEN: usize = 8;

pub fn valid_email(email: &str) -> bool {
    Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").is_ok_and(|re| re.is_match(email))
}

pub fn valid_password(password: &str) -> bool {
    password.chars().count() >= MIN_PASSWORD_LEN
}

#[must_use]
pub fn status_for(err: &AuthError) -> StatusCode {
    match err {
        AuthError::InvalidCredentials(_) => StatusCode::UNAUTHORIZED,
        AuthError::AlreadyExists => StatusCode::CONFLICT,
        AuthError::NotFound => StatusCode::NOT_FOUND,
        AuthError::Internal(_) | AuthError::Consistency(_) => StatusCode::INTERNAL_SERVER_ERROR,
        AuthError::Cancelled => StatusCode::SERVICE_UNAVAILABLE,
        AuthError::DeadlineExceeded => StatusCode::GATEWAY_TIMEOUT,
    }
}

/// Map a service error to a response, logging the server-side ones.
pub fn error_response(err: &AuthError) -> Response {
    match err {
        AuthError::Internal(source) => error!("Internal error: {:#}", source),
        AuthError::Consistency(detail) => error!("Store consistency violation: {}", detail),
        AuthError::Cancelled | AuthError::DeadlineExceeded => error!("Request aborted: {}", err),
        AuthError::InvalidCredentials(Rejection::MalformedHash { user_id }) => {
            warn!(user_id, "Stored password hash is malformed");
        }
        _ => debug!("Request rejected: {}", err),
    }

    (status_for(err), err.to_string()).into_response()
}

pub fn bad_request(message: &str) -> Response {
    (StatusCode::BAD_REQUEST, message.to_string()).into_response()
}
