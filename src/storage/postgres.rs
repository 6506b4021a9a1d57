//! Postgres-backed user and app storage.
//!
//! Expected tables:
//!
//! ```sql
//! CREATE TABLE users (
//!     id            BIGSERIAL PRIMARY KEY,
//!     email         TEXT NOT NULL UNIQUE,
//!     password_hash BYTEA NOT NULL,
//!     is_admin      BOOLEAN NOT NULL DEFAULT FALSE
//! );
//!
//! CREATE TABLE apps (
//!     id   BIGSERIAL PRIMARY KEY,
//!     name TEXT NOT NULL
//! );
//! ```

use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, PgPool, Row};
use std::{future::Future, time::Duration};
use tracing::Instrument;

use super::{delete_outcome, App, AppId, AppStore, StorageError, User, UserId, UserStore};

#[derive(Clone, Debug)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Open a connection pool.
    ///
    /// # Errors
    /// Returns an error if the database is unreachable.
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        Ok(Self::new(pool))
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

fn query_span(operation: &'static str, statement: &'static str) -> tracing::Span {
    tracing::info_span!(
        "db.query",
        db.system = "postgresql",
        db.operation = operation,
        db.statement = statement
    )
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn find_by_email(&self, email: &str) -> Result<User, StorageError> {
        let query = "SELECT id, email, password_hash, is_admin FROM users WHERE email = $1";
        let row = sqlx::query(query)
            .bind(email)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?
            .ok_or(StorageError::NotFound)?;

        Ok(User {
            id: row.try_get("id")?,
            email: row.try_get("email")?,
            password_hash: row.try_get("password_hash")?,
            is_admin: row.try_get("is_admin")?,
        })
    }

    async fn insert(&self, email: &str, password_hash: &[u8]) -> Result<UserId, StorageError> {
        let query = r"
            INSERT INTO users (email, password_hash)
            VALUES ($1, $2)
            RETURNING id
        ";
        let row = sqlx::query(query)
            .bind(email)
            .bind(password_hash)
            .fetch_one(&self.pool)
            .instrument(query_span("INSERT", query))
            .await;

        match row {
            Ok(row) => Ok(row.try_get("id")?),
            Err(err) if is_unique_violation(&err) => Err(StorageError::Conflict),
            Err(err) => Err(err.into()),
        }
    }

    async fn check_admin(&self, user_id: UserId) -> Result<bool, StorageError> {
        let query = "SELECT is_admin FROM users WHERE id = $1";
        let row = sqlx::query(query)
            .bind(user_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?
            .ok_or(StorageError::NotFound)?;

        Ok(row.try_get("is_admin")?)
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        // Only commit when exactly one row went away.
        let mut tx = self.pool.begin().await?;

        let query = "DELETE FROM users WHERE id = $1";
        let affected = sqlx::query(query)
            .bind(user_id)
            .execute(&mut *tx)
            .instrument(query_span("DELETE", query))
            .await?
            .rows_affected();

        commit_if_ok(delete_outcome(affected), tx.commit()).await
    }
}

// An error outcome drops `commit` unpolled, which drops the transaction and
// rolls it back. The outcome is returned as is.
async fn commit_if_ok<F>(outcome: Result<(), StorageError>, commit: F) -> Result<(), StorageError>
where
    F: Future<Output = Result<(), sqlx::Error>>,
{
    outcome?;
    commit.await?;
    Ok(())
}

#[async_trait]
impl AppStore for PgStore {
    async fn app(&self, app_id: AppId) -> Result<App, StorageError> {
        let query = "SELECT id, name FROM apps WHERE id = $1";
        let row = sqlx::query(query)
            .bind(app_id)
            .fetch_optional(&self.pool)
            .instrument(query_span("SELECT", query))
            .await?
            .ok_or(StorageError::NotFound)?;

        Ok(App {
            id: row.try_get("id")?,
            name: row.try_get("name")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use sqlx::error::{DatabaseError, ErrorKind};
    use std::borrow::Cow;
    use std::error::Error as StdError;
    use std::fmt;

    #[derive(Debug)]
    struct TestDbError {
        code: Option<&'static str>,
    }

    impl fmt::Display for TestDbError {
        fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            write!(f, "test database error")
        }
    }

    impl StdError for TestDbError {}

    impl DatabaseError for TestDbError {
        fn message(&self) -> &str {
            "test database error"
        }

        fn code(&self) -> Option<Cow<'_, str>> {
            self.code.map(Cow::Borrowed)
        }

        fn as_error(&self) -> &(dyn StdError + Send + Sync + 'static) {
            self
        }

        fn as_error_mut(&mut self) -> &mut (dyn StdError + Send + Sync + 'static) {
            self
        }

        fn into_error(self: Box<Self>) -> Box<dyn StdError + Send + Sync + 'static> {
            self
        }

        fn kind(&self) -> ErrorKind {
            ErrorKind::UniqueViolation
        }
    }

    #[test]
    fn unique_violation_detected_by_sqlstate() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23505"),
        }));
        assert!(is_unique_violation(&err));
    }

    #[test]
    fn other_errors_are_not_unique_violations() {
        let err = sqlx::Error::Database(Box::new(TestDbError {
            code: Some("23503"),
        }));
        assert!(!is_unique_violation(&err));

        let err = sqlx::Error::Database(Box::new(TestDbError { code: None }));
        assert!(!is_unique_violation(&err));

        assert!(!is_unique_violation(&sqlx::Error::RowNotFound));
    }

    #[tokio::test]
    async fn failed_delete_keeps_its_outcome() {
        let failing_commit = || async { Err::<(), _>(sqlx::Error::PoolTimedOut) };

        let err = commit_if_ok(Err(StorageError::NotFound), failing_commit())
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::NotFound));

        let outcome = Err(StorageError::Consistency { affected: 2 });
        let err = commit_if_ok(outcome, failing_commit()).await.unwrap_err();
        assert!(matches!(err, StorageError::Consistency { affected: 2 }));

        let err = commit_if_ok(Ok(()), failing_commit()).await.unwrap_err();
        assert!(matches!(err, StorageError::Database(_)));

        assert!(commit_if_ok(Ok(()), async { Ok::<(), sqlx::Error>(()) }).await.is_ok());
    }

    #[test]
    fn database_errors_convert_into_storage_errors() {
        let err: StorageError = sqlx::Error::PoolTimedOut.into();
        assert!(matches!(err, StorageError::Database(_)));
    }
}
