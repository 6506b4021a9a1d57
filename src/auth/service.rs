//! Authentication service.
//!
//! Orchestrates the credential hasher, the token issuer and the stores. It
//! holds no mutable state of its own and is shared across requests behind an
//! `Arc`. Operations classify failures into [`AuthError`] kinds and return;
//! they never log or retry.

use secrecy::{ExposeSecret, SecretString};
use std::sync::{Arc, OnceLock};
use tracing::{field, instrument, Span};

use super::{AuthError, CallContext, CredentialHasher, HashError, Rejection, TokenIssuer};
use crate::storage::{AppId, AppStore, StorageError, UserId, UserStore};

// Verified against on unknown emails so they cost as much as a wrong password.
const DUMMY_PASSWORD: &[u8] = b"sso-unknown-user-placeholder";

pub struct AuthService {
    users: Arc<dyn UserStore>,
    apps: Arc<dyn AppStore>,
    hasher: Arc<dyn CredentialHasher>,
    tokens: TokenIssuer,
    dummy_hash: Arc<OnceLock<Vec<u8>>>,
}

impl AuthService {
    #[must_use]
    pub fn new(
        users: Arc<dyn UserStore>,
        apps: Arc<dyn AppStore>,
        hasher: Arc<dyn CredentialHasher>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            users,
            apps,
            hasher,
            tokens,
            dummy_hash: Arc::new(OnceLock::new()),
        }
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    /// Verify credentials and issue a session token.
    ///
    /// Unknown email, wrong password and a corrupted stored hash all return
    /// `InvalidCredentials`. With `app_id`, the app must exist and the token
    /// is scoped to it.
    ///
    /// # Errors
    /// `InvalidCredentials`, `Internal`, `Cancelled` or `DeadlineExceeded`.
    #[instrument(skip(self, ctx, password), fields(user_id = field::Empty, hash = field::Empty))]
    pub async fn login(
        &self,
        ctx: &CallContext,
        email: &str,
        password: &str,
        app_id: Option<AppId>,
    ) -> Result<String, AuthError> {
        ctx.run(async {
            let user = match self.users.find_by_email(email).await {
                Ok(user) => user,
                Err(StorageError::NotFound) => {
                    self.verify_dummy(password).await;
                    return Err(AuthError::denied());
                }
                Err(err) => return Err(AuthError::internal(err)),
            };
            Span::current().record("user_id", user.id);

            match self.verify_password(user.password_hash.clone(), password).await {
                Ok(true) => {}
                Ok(false) => return Err(AuthError::denied()),
                Err(HashError::MalformedHash) => {
                    Span::current().record("hash", "malformed");
                    return Err(AuthError::InvalidCredentials(Rejection::MalformedHash {
                        user_id: user.id,
                    }));
                }
                Err(err) => return Err(AuthError::internal(err)),
            }

            if let Some(app_id) = app_id {
                match self.apps.app(app_id).await {
                    Ok(_) => {}
                    Err(StorageError::NotFound) => return Err(AuthError::denied()),
                    Err(err) => return Err(AuthError::internal(err)),
                }
            }

            self.tokens
                .issue(&user, app_id)
                .map_err(AuthError::internal)
        })
        .await
    }

    /// Hash the password and create the user.
    ///
    /// # Errors
    /// `AlreadyExists` when the email is taken, otherwise `Internal`,
    /// `Cancelled` or `DeadlineExceeded`.
    #[instrument(skip(self, ctx, password), fields(user_id = field::Empty))]
    pub async fn register(
        &self,
        ctx: &CallContext,
        email: &str,
        password: &str,
    ) -> Result<UserId, AuthError> {
        ctx.run(async {
            let password_hash = self
                .hash_password(password)
                .await
                .map_err(AuthError::internal)?;

            match self.users.insert(email, &password_hash).await {
                Ok(user_id) => {
                    Span::current().record("user_id", user_id);
                    Ok(user_id)
                }
                Err(StorageError::Conflict) => Err(AuthError::AlreadyExists),
                Err(err) => Err(AuthError::internal(err)),
            }
        })
        .await
    }

    /// Return the user id carried by a valid, unexpired token.
    ///
    /// # Errors
    /// `InvalidCredentials` for any rejected token, `Internal` when the
    /// signing secret is missing.
    #[instrument(skip_all)]
    pub async fn validate_token(
        &self,
        ctx: &CallContext,
        token: &str,
    ) -> Result<UserId, AuthError> {
        ctx.run(async {
            self.tokens.validate(token).map_err(|err| {
                if err.is_invalid_token() {
                    AuthError::denied()
                } else {
                    AuthError::internal(err)
                }
            })
        })
        .await
    }

    /// Whether the user has the admin flag.
    ///
    /// # Errors
    /// `InvalidCredentials` for an unknown user, otherwise `Internal`,
    /// `Cancelled` or `DeadlineExceeded`.
    #[instrument(skip(self, ctx))]
    pub async fn is_admin(&self, ctx: &CallContext, user_id: UserId) -> Result<bool, AuthError> {
        ctx.run(async {
            match self.users.check_admin(user_id).await {
                Ok(is_admin) => Ok(is_admin),
                Err(StorageError::NotFound) => Err(AuthError::denied()),
                Err(err) => Err(AuthError::internal(err)),
            }
        })
        .await
    }

    /// Delete a user. A second delete of the same id reports `NotFound`.
    ///
    /// # Errors
    /// `NotFound`, `Consistency`, `Internal`, `Cancelled` or `DeadlineExceeded`.
    #[instrument(skip(self, ctx))]
    pub async fn delete_user(&self, ctx: &CallContext, user_id: UserId) -> Result<(), AuthError> {
        ctx.run(async {
            match self.users.delete(user_id).await {
                Ok(()) => Ok(()),
                Err(StorageError::NotFound) => Err(AuthError::NotFound),
                Err(err @ StorageError::Consistency { .. }) => {
                    Err(AuthError::Consistency(err.to_string()))
                }
                Err(err) => Err(AuthError::internal(err)),
            }
        })
        .await
    }

    // Hashing is CPU bound; each call gets its own blocking thread.
    async fn hash_password(&self, password: &str) -> Result<Vec<u8>, HashError> {
        let hasher = Arc::clone(&self.hasher);
        let password = SecretString::from(password.to_owned());
        tokio::task::spawn_blocking(move || hasher.hash(password.expose_secret().as_bytes()))
            .await
            .map_err(|e| HashError::Task(e.to_string()))?
    }

    async fn verify_password(&self, hash: Vec<u8>, password: &str) -> Result<bool, HashError> {
        let hasher = Arc::clone(&self.hasher);
        let password = SecretString::from(password.to_owned());
        tokio::task::spawn_blocking(move || {
            hasher.verify(&hash, password.expose_secret().as_bytes())
        })
        .await
        .map_err(|e| HashError::Task(e.to_string()))?
    }

    // The dummy hash is built on first use with the configured costs. The
    // outcome is discarded.
    async fn verify_dummy(&self, password: &str) {
        let hasher = Arc::clone(&self.hasher);
        let dummy_hash = Arc::clone(&self.dummy_hash);
        let password = SecretString::from(password.to_owned());
        let _ = tokio::task::spawn_blocking(move || -> Result<bool, HashError> {
            let hash = match dummy_hash.get() {
                Some(hash) => hash,
                None => {
                    let hash = hasher.hash(DUMMY_PASSWORD)?;
                    dummy_hash.get_or_init(|| hash)
                }
            };
            hasher.verify(hash, password.expose_secret().as_bytes())
        })
        .await;
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("tokens", &self.tokens)
            .finish_non_exhaustive()
    }
}
