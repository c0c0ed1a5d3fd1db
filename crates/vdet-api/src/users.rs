//! User accounts.
//!
//! [`UserStore`] is the persistence seam used by the auth and admin
//! handlers; [`InMemoryUserStore`] is the built-in implementation.

use std::collections::BTreeMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use thiserror::Error;
use vdet_models::{Role, UserOut};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    #[error("A user with email {0} already exists")]
    Duplicate(String),

    #[error("User not found: {0}")]
    NotFound(i64),

    #[error("User store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

/// Stored account, including the password hash.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserRecord {
    pub id: i64,
    pub email: String,
    pub role: Role,
    /// Argon2id PHC string
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
}

impl UserRecord {
    pub fn to_out(&self) -> UserOut {
        UserOut {
            id: self.id,
            email: self.email.clone(),
            role: self.role,
        }
    }
}

pub trait UserStore: Send + Sync {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>>;

    fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>>;

    /// All users ordered by id.
    fn list(&self) -> StoreResult<Vec<UserRecord>>;

    /// Create a user; emails are unique.
    fn create(&self, email: &str, password_hash: &str, role: Role) -> StoreResult<UserRecord>;

    fn delete(&self, id: i64) -> StoreResult<()>;
}

#[derive(Default)]
struct Inner {
    users: BTreeMap<i64, UserRecord>,
    next_id: i64,
}

/// Process-local user table with monotonically increasing ids.
#[derive(Default)]
pub struct InMemoryUserStore {
    inner: RwLock<Inner>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl UserStore for InMemoryUserStore {
    fn find_by_email(&self, email: &str) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.users.values().find(|u| u.email == email).cloned())
    }

    fn find_by_id(&self, id: i64) -> StoreResult<Option<UserRecord>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.users.get(&id).cloned())
    }

    fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let inner = self.inner.read().map_err(|_| StoreError::Poisoned)?;
        Ok(inner.users.values().cloned().collect())
    }

    fn create(&self, email: &str, password_hash: &str, role: Role) -> StoreResult<UserRecord> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        if inner.users.values().any(|u| u.email == email) {
            return Err(StoreError::Duplicate(email.to_string()));
        }
        inner.next_id += 1;
        let user = UserRecord {
            id: inner.next_id,
            email: email.to_string(),
            role,
            password_hash: password_hash.to_string(),
            created_at: Utc::now(),
        };
        inner.users.insert(user.id, user.clone());
        Ok(user)
    }

    fn delete(&self, id: i64) -> StoreResult<()> {
        let mut inner = self.inner.write().map_err(|_| StoreError::Poisoned)?;
        inner
            .users
            .remove(&id)
            .map(|_| ())
            .ok_or(StoreError::NotFound(id))
    }
}
