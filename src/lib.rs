//! # SSO (authentication authority)
//!
//! `sso` authenticates end users and issues and validates bearer tokens for a
//! set of client applications that share one user directory.
//!
//! ## Core
//!
//! The [`auth`] module holds the business logic: password hashing
//! ([`auth::Argon2Hasher`]), stateless HS256 session tokens
//! ([`auth::TokenIssuer`]) and the [`auth::AuthService`] that orchestrates
//! login, registration, token validation, admin checks and user deletion.
//!
//! ## Storage
//!
//! The service depends only on the [`storage::UserStore`] and
//! [`storage::AppStore`] contracts. [`storage::PgStore`] is the Postgres
//! implementation; [`storage::MemoryStore`] is an in-memory fake for tests.
//!
//! ## Enumeration protection
//!
//! Login with an unknown email, login with a wrong password, an expired or
//! forged token, and an admin check for an unknown user all surface as the same
//! `InvalidCredentials` outcome.

pub mod api;
pub mod auth;
pub mod cli;
pub mod storage;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_git_commit_hash_format() {
        if GIT_COMMIT_HASH == "unknown" {
            // Acceptable in non-git build environments
            return;
        }
        assert!(
            GIT_COMMIT_HASH.chars().all(|c| c.is_ascii_hexdigit()),
            "GIT_COMMIT_HASH should be a hex string, got: {GIT_COMMIT_HASH}"
        );
        assert!(
            GIT_COMMIT_HASH.len() >= 7,
            "GIT_COMMIT_HASH should be at least 7 characters long, got: {GIT_COMMIT_HASH}"
        );
    }

    #[test]
    fn test_app_user_agent_format() {
        assert!(APP_USER_AGENT.starts_with(env!("CARGO_PKG_NAME")));
        assert!(APP_USER_AGENT.contains(env!("CARGO_PKG_VERSION")));
    }
}
