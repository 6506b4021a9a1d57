//! User and application storage contracts.
//!
//! The auth service only talks to these traits. Implementations must enforce
//! email uniqueness atomically (a unique constraint, never check-then-insert)
//! and must report exactly how many records a delete touched.

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PgStore;

use async_trait::async_trait;
use std::fmt;
use thiserror::Error;

pub type UserId = i64;
pub type AppId = i64;

/// Durable user record.
#[derive(Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub email: String,
    pub password_hash: Vec<u8>,
    pub is_admin: bool,
}

impl fmt::Debug for User {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("User")
            .field("id", &self.id)
            .field("email", &self.email)
            .field("password_hash", &"***")
            .field("is_admin", &self.is_admin)
            .finish()
    }
}

/// Client application allowed to request tokens.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct App {
    pub id: AppId,
    pub name: String,
}

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("record not found")]
    NotFound,
    #[error("record already exists")]
    Conflict,
    #[error("consistency violation: {affected} records affected, expected 1")]
    Consistency { affected: u64 },
    #[error("database error")]
    Database(#[from] sqlx::Error),
}

#[async_trait]
pub trait UserStore: Send + Sync {
    /// Look up a user by email, `NotFound` when absent.
    async fn find_by_email(&self, email: &str) -> Result<User, StorageError>;

    /// Create a user and return its new id, `Conflict` when the email is taken.
    async fn insert(&self, email: &str, password_hash: &[u8]) -> Result<UserId, StorageError>;

    /// Admin flag of a user, `NotFound` for an unknown id.
    async fn check_admin(&self, user_id: UserId) -> Result<bool, StorageError>;

    /// Delete exactly one user.
    ///
    /// `NotFound` when nothing matched and `Consistency` when more than one
    /// record would have been removed.
    async fn delete(&self, user_id: UserId) -> Result<(), StorageError>;
}

#[async_trait]
pub trait AppStore: Send + Sync {
    async fn app(&self, app_id: AppId) -> Result<App, StorageError>;
}

/// Classify the affected row count of a single-id delete.
pub(crate) fn delete_outcome(affected: u64) -> Result<(), StorageError> {
    match affected {
        0 => Err(StorageError::NotFound),
        1 => Ok(()),
        affected => Err(StorageError::Consistency { affected }),
    }
}
