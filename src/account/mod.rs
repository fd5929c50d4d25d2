//! Accounts: credential hashing, storage and the register/login flows.

pub mod hasher;
pub mod repository;
pub mod service;
pub mod token;

pub use self::repository::{AccountRepository, MemoryAccounts, PgAccounts, RepositoryError};
pub use self::service::{AccountError, Accounts, Session};
pub use self::token::{OpaqueTokenIssuer, TokenError, TokenIssuer};

use std::fmt;
use uuid::Uuid;

/// A registered account. `password_hash` is the HMAC of the password keyed by `password_salt`.
#[derive(Clone, PartialEq, Eq)]
pub struct Account {
    pub id: Uuid,
    pub username: String,
    pub password_hash: Vec<u8>,
    pub password_salt: Vec<u8>,
}

impl Account {
    /// Build a new account for `username`, normalizing it.
    #[must_use]
    pub fn new(username: &str, password_hash: Vec<u8>, password_salt: Vec<u8>) -> Self {
        Self {
            id: Uuid::now_v7(),
            username: normalize_username(username),
            password_hash,
            password_salt,
        }
    }
}

impl fmt::Debug for Account {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Account")
            .field("id", &self.id)
            .field("username", &self.username)
            .field("password_hash", &"***")
            .field("password_salt", &"***")
            .finish()
    }
}

/// Lowercase form of a username, used as the uniqueness and lookup key.
#[must_use]
pub fn normalize_username(username: &str) -> String {
    username.to_lowercase()
}
