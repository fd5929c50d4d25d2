//! Registration and login flows.
//!
//! Registration: validate, check the username (fast path), hash, persist, issue a token.
//! The store's unique constraint is what actually decides a username race.
//!
//! Login: validate, look up, verify, issue a token. Unknown usernames and wrong
//! passwords both answer `InvalidCredentials`.

use super::{
    hasher::{self, HashError, DIGEST_LEN, SALT_LEN},
    normalize_username, Account, AccountRepository, RepositoryError, TokenError, TokenIssuer,
};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

#[derive(Debug, thiserror::Error)]
pub enum AccountError {
    #[error("malformed input: {0}")]
    MalformedInput(&'static str),
    #[error("username is taken")]
    UsernameTaken,
    #[error("invalid credentials")]
    InvalidCredentials,
    #[error("account store unavailable")]
    StoreUnavailable(#[source] RepositoryError),
    #[error("password hashing failed")]
    Hashing(#[source] HashError),
    #[error("stored credentials are unusable")]
    Credential(#[source] HashError),
    #[error("token issuance failed")]
    Token(#[from] TokenError),
}

impl From<RepositoryError> for AccountError {
    fn from(err: RepositoryError) -> Self {
        match err {
            RepositoryError::Conflict => Self::UsernameTaken,
            RepositoryError::Unavailable(_) => Self::StoreUnavailable(err),
        }
    }
}

/// Result of a successful register or login.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Session {
    pub username: String,
    pub token: String,
}

pub struct Accounts {
    repository: Arc<dyn AccountRepository>,
    tokens: Arc<dyn TokenIssuer>,
}

impl Accounts {
    #[must_use]
    pub fn new(repository: Arc<dyn AccountRepository>, tokens: Arc<dyn TokenIssuer>) -> Self {
        Self { repository, tokens }
    }

    #[must_use]
    pub fn repository(&self) -> &dyn AccountRepository {
        self.repository.as_ref()
    }

    /// Register a new account and issue a token for it.
    ///
    /// # Errors
    /// `MalformedInput`, `UsernameTaken`, `StoreUnavailable`, or a hashing/token failure.
    #[instrument(skip(self, password))]
    pub async fn register(&self, username: &str, password: &str) -> Result<Session, AccountError> {
        let username = validate(username, password)?;

        if self.repository.exists(&username).await? {
            debug!("username already registered");
            return Err(AccountError::UsernameTaken);
        }

        let (digest, salt) = hasher::hash(password).map_err(AccountError::Hashing)?;
        let account = self
            .repository
            .create(Account::new(&username, digest, salt))
            .await?;

        info!(account_id = %account.id, "account registered");

        self.session(&account)
    }

    /// Verify credentials and issue a token.
    ///
    /// # Errors
    /// `MalformedInput`, `InvalidCredentials`, `StoreUnavailable`, or a hashing/token failure.
    #[instrument(skip(self, password))]
    pub async fn login(&self, username: &str, password: &str) -> Result<Session, AccountError> {
        let username = validate(username, password)?;

        let Some(account) = self.repository.find_by_username(&username).await? else {
            // same work as a real check so unknown users don't answer faster
            let _ = std::hint::black_box(hasher::verify(
                password,
                &[0u8; DIGEST_LEN],
                &[0u8; SALT_LEN],
            ));
            debug!("unknown username");
            return Err(AccountError::InvalidCredentials);
        };

        let valid = hasher::verify(password, &account.password_hash, &account.password_salt)
            .map_err(|err| {
                error!(account_id = %account.id, "stored credentials are malformed: {err}");
                AccountError::Credential(err)
            })?;

        if !valid {
            debug!(account_id = %account.id, "password mismatch");
            return Err(AccountError::InvalidCredentials);
        }

        self.session(&account)
    }

    fn session(&self, account: &Account) -> Result<Session, AccountError> {
        let token = self.tokens.issue(account)?;

        Ok(Session {
            username: account.username.clone(),
            token,
        })
    }
}

fn validate(username: &str, password: &str) -> Result<String, AccountError> {
    if username.trim().is_empty() {
        return Err(AccountError::MalformedInput("username is required"));
    }

    if password.is_empty() {
        return Err(AccountError::MalformedInput("password is required"));
    }

    Ok(normalize_username(username))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::account::{MemoryAccounts, OpaqueTokenIssuer};
    use async_trait::async_trait;

    fn accounts() -> (Accounts, Arc<MemoryAccounts>) {
        let repository = Arc::new(MemoryAccounts::new());
        let accounts = Accounts::new(repository.clone(), Arc::new(OpaqueTokenIssuer));
        (accounts, repository)
    }

    #[tokio::test]
    async fn register_then_login_case_insensitive() {
        let (accounts, _) = accounts();

        let registered = accounts.register("Alice", "secret1").await.unwrap();
        assert_eq!(registered.username, "alice");
        assert!(!registered.token.is_empty());

        let session = accounts.login("alice", "secret1").await.unwrap();
        assert_eq!(session.username, "alice");
        assert_ne!(session.token, registered.token);

        assert!(accounts.login("ALICE", "secret1").await.is_ok());
    }

    #[tokio::test]
    async fn register_twice_is_username_taken() {
        let (accounts, repository) = accounts();

        accounts.register("alice", "secret1").await.unwrap();
        let err = accounts.register("ALICE", "other").await.unwrap_err();

        assert!(matches!(err, AccountError::UsernameTaken));
        assert_eq!(repository.len().await, 1);
    }

    #[tokio::test]
    async fn login_wrong_password_is_invalid_credentials() {
        let (accounts, _) = accounts();
        accounts.register("Alice", "secret1").await.unwrap();

        let err = accounts.login("alice", "wrong").await.unwrap_err();
        assert!(matches!(err, AccountError::InvalidCredentials));
    }

    #[tokio::test]
    async fn login_unknown_user_matches_wrong_password() {
        let (accounts, _) = accounts();
        accounts.register("alice", "secret1").await.unwrap();

        let unknown = accounts.login("nosuchuser", "anything").await.unwrap_err();
        let wrong = accounts.login("alice", "anything").await.unwrap_err();

        assert!(matches!(unknown, AccountError::InvalidCredentials));
        assert_eq!(unknown.to_string(), wrong.to_string());
    }

    #[tokio::test]
    async fn malformed_input_is_rejected_before_store_access() {
        let (accounts, repository) = accounts();

        for (username, password) in [("", "secret1"), ("   ", "secret1"), ("alice", "")] {
            let err = accounts.register(username, password).await.unwrap_err();
            assert!(matches!(err, AccountError::MalformedInput(_)));
            let err = accounts.login(username, password).await.unwrap_err();
            assert!(matches!(err, AccountError::MalformedInput(_)));
        }

        assert!(repository.is_empty().await);
    }

    #[tokio::test]
    async fn corrupt_record_is_reported_not_rejected() {
        let (accounts, repository) = accounts();
        repository
            .create(Account::new("mallory", Vec::new(), vec![1; SALT_LEN]))
            .await
            .unwrap();

        let err = accounts.login("mallory", "secret1").await.unwrap_err();
        assert!(matches!(err, AccountError::Credential(_)));
        assert_eq!(err.to_string(), "stored credentials are unusable");
    }

    #[test]
    fn hashing_failure_is_not_blamed_on_stored_credentials() {
        let err = AccountError::Hashing(HashError::MalformedInput("salt"));
        assert_eq!(err.to_string(), "password hashing failed");
        assert!(std::error::Error::source(&err).is_some());
    }

    // Store that misses the pre-check, as when two registrations race.
    struct RacingStore(MemoryAccounts);

    #[async_trait]
    impl AccountRepository for RacingStore {
        async fn exists(&self, _username: &str) -> Result<bool, RepositoryError> {
            Ok(false)
        }

        async fn find_by_username(
            &self,
            username: &str,
        ) -> Result<Option<Account>, RepositoryError> {
            self.0.find_by_username(username).await
        }

        async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
            self.0.create(account).await
        }
    }

    #[tokio::test]
    async fn store_conflict_is_username_taken() {
        let accounts = Accounts::new(
            Arc::new(RacingStore(MemoryAccounts::new())),
            Arc::new(OpaqueTokenIssuer),
        );

        accounts.register("alice", "secret1").await.unwrap();
        let err = accounts.register("alice", "secret2").await.unwrap_err();
        assert!(matches!(err, AccountError::UsernameTaken));
    }

    struct DownStore;

    #[async_trait]
    impl AccountRepository for DownStore {
        async fn exists(&self, _username: &str) -> Result<bool, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn find_by_username(
            &self,
            _username: &str,
        ) -> Result<Option<Account>, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }

        async fn create(&self, _account: Account) -> Result<Account, RepositoryError> {
            Err(RepositoryError::Unavailable(sqlx::Error::PoolTimedOut))
        }
    }

    #[tokio::test]
    async fn store_failure_is_store_unavailable() {
        let accounts = Accounts::new(Arc::new(DownStore), Arc::new(OpaqueTokenIssuer));

        let err = accounts.register("alice", "secret1").await.unwrap_err();
        assert!(matches!(err, AccountError::StoreUnavailable(_)));

        let err = accounts.login("alice", "secret1").await.unwrap_err();
        assert!(matches!(err, AccountError::StoreUnavailable(_)));
    }
}
