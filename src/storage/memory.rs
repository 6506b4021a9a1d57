//! In-memory store used by tests and local experiments.

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::Mutex;

use super::{App, AppId, AppStore, StorageError, User, UserId, UserStore};

#[derive(Debug, Default)]
struct Inner {
    next_id: UserId,
    users: HashMap<UserId, User>,
    by_email: HashMap<String, UserId>,
    apps: HashMap<AppId, App>,
}

/// Users and apps kept behind one async mutex, so the email uniqueness check
/// and the insert happen under the same lock.
#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: Mutex<Inner>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the admin flag on an existing user.
    ///
    /// # Errors
    /// Returns `NotFound` when the id is unknown.
    pub async fn grant_admin(&self, user_id: UserId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StorageError::NotFound)?;
        user.is_admin = true;
        Ok(())
    }

    pub async fn insert_app(&self, app: App) {
        self.inner.lock().await.apps.insert(app.id, app);
    }

    /// Overwrite the stored hash, used to simulate corrupted records.
    ///
    /// # Errors
    /// Returns `NotFound` when the id is unknown.
    pub async fn set_password_hash(
        &self,
        user_id: UserId,
        password_hash: Vec<u8>,
    ) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        let user = inner
            .users
            .get_mut(&user_id)
            .ok_or(StorageError::NotFound)?;
        user.password_hash = password_hash;
        Ok(())
    }

    pub async fn count_by_email(&self, email: &str) -> usize {
        self.inner
            .lock()
            .await
            .users
            .values()
            .filter(|user| user.email == email)
            .count()
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn find_by_email(&self, email: &str) -> Result<User, StorageError> {
        let inner = self.inner.lock().await;
        inner
            .by_email
            .get(email)
            .and_then(|id| inner.users.get(id))
            .cloned()
            .ok_or(StorageError::NotFound)
    }

    async fn insert(&self, email: &str, password_hash: &[u8]) -> Result<UserId, StorageError> {
        let mut inner = self.inner.lock().await;
        if inner.by_email.contains_key(email) {
            return Err(StorageError::Conflict);
        }

        inner.next_id += 1;
        let id = inner.next_id;
        inner.by_email.insert(email.to_string(), id);
        inner.users.insert(
            id,
            User {
                id,
                email: email.to_string(),
                password_hash: password_hash.to_vec(),
                is_admin: false,
            },
        );
        Ok(id)
    }

    async fn check_admin(&self, user_id: UserId) -> Result<bool, StorageError> {
        let inner = self.inner.lock().await;
        inner
            .users
            .get(&user_id)
            .map(|user| user.is_admin)
            .ok_or(StorageError::NotFound)
    }

    async fn delete(&self, user_id: UserId) -> Result<(), StorageError> {
        let mut inner = self.inner.lock().await;
        let Some(user) = inner.users.remove(&user_id) else {
            return Err(StorageError::NotFound);
        };
        inner.by_email.remove(&user.email);
        Ok(())
    }
}

#[async_trait]
impl AppStore for MemoryStore {
    async fn app(&self, app_id: AppId) -> Result<App, StorageError> {
        self.inner
            .lock()
            .await
            .apps
            .get(&app_id)
            .cloned()
            .ok_or(StorageError::NotFound)
    }
}
