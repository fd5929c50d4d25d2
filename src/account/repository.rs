//! Account storage.
//!
//! `PgAccounts` is the production store; `MemoryAccounts` backs `memory://` DSNs
//! and tests. Both normalize the username on every call.

use super::{normalize_username, Account};
use anyhow::{Context, Result};
use async_trait::async_trait;
use sqlx::{postgres::PgPoolOptions, Connection, PgPool, Row};
use std::{collections::HashMap, time::Duration};
use tokio::sync::RwLock;
use tracing::{info_span, Instrument};

const SCHEMA_SQL: &str = include_str!(concat!(env!("CARGO_MANIFEST_DIR"), "/sql/schema.sql"));

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("account already exists")]
    Conflict,
    #[error("account store unavailable")]
    Unavailable(#[source] sqlx::Error),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if is_unique_violation(&err) {
            Self::Conflict
        } else {
            Self::Unavailable(err)
        }
    }
}

#[async_trait]
pub trait AccountRepository: Send + Sync {
    /// True iff an account with the normalized username is stored.
    async fn exists(&self, username: &str) -> Result<bool, RepositoryError>;

    /// Case-insensitive lookup, at most one record.
    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError>;

    /// Persist a new account, `RepositoryError::Conflict` if the username is taken.
    async fn create(&self, account: Account) -> Result<Account, RepositoryError>;

    /// Check the store is reachable.
    async fn ping(&self) -> Result<(), RepositoryError> {
        Ok(())
    }
}

pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err.code().is_some_and(|code| code.as_ref() == "23505"),
        _ => false,
    }
}

/// PostgreSQL-backed accounts.
#[derive(Debug, Clone)]
pub struct PgAccounts {
    pool: PgPool,
}

impl PgAccounts {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Connect to the database and make sure the `accounts` table exists.
    /// # Errors
    /// Returns an error if the connection or the schema setup fails
    pub async fn connect(dsn: &str) -> Result<Self> {
        let pool = PgPoolOptions::new()
            .min_connections(1)
            .max_connections(5)
            .max_lifetime(Duration::from_secs(60 * 2))
            .test_before_acquire(true)
            .connect(dsn)
            .await
            .context("Failed to connect to database")?;

        let accounts = Self::new(pool);
        accounts.ensure_schema().await?;

        Ok(accounts)
    }

    /// Apply `sql/schema.sql`; every statement is idempotent.
    /// # Errors
    /// Returns an error if a statement fails
    pub async fn ensure_schema(&self) -> Result<()> {
        for (index, statement) in split_sql_statements(SCHEMA_SQL).iter().enumerate() {
            sqlx::query(statement)
                .execute(&self.pool)
                .await
                .with_context(|| format!("failed to execute schema statement {}", index + 1))?;
        }

        Ok(())
    }
}

#[async_trait]
impl AccountRepository for PgAccounts {
    async fn exists(&self, username: &str) -> Result<bool, RepositoryError> {
        let query = "SELECT EXISTS(SELECT 1 FROM accounts WHERE username = $1) AS exists";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(normalize_username(username))
            .fetch_one(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.get("exists"))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        let query = r"
            SELECT id, username, password_hash, password_salt
            FROM accounts
            WHERE username = $1
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "SELECT",
            db.statement = query
        );
        let row = sqlx::query(query)
            .bind(normalize_username(username))
            .fetch_optional(&self.pool)
            .instrument(span)
            .await?;

        Ok(row.map(|row| Account {
            id: row.get("id"),
            username: row.get("username"),
            password_hash: row.get("password_hash"),
            password_salt: row.get("password_salt"),
        }))
    }

    async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
        let account = Account {
            username: normalize_username(&account.username),
            ..account
        };

        let query = r"
            INSERT INTO accounts
                (id, username, password_hash, password_salt)
            VALUES ($1, $2, $3, $4)
        ";
        let span = info_span!(
            "db.query",
            db.system = "postgresql",
            db.operation = "INSERT",
            db.statement = query
        );
        sqlx::query(query)
            .bind(account.id)
            .bind(&account.username)
            .bind(&account.password_hash)
            .bind(&account.password_salt)
            .execute(&self.pool)
            .instrument(span)
            .await?;

        Ok(account)
    }

    async fn ping(&self) -> Result<(), RepositoryError> {
        let acquire_span = info_span!(
            "db.acquire",
            db.system = "postgresql",
            db.operation = "ACQUIRE"
        );
        let mut conn = self.pool.acquire().instrument(acquire_span).await?;

        let ping_span = info_span!("db.ping", db.system = "postgresql", db.operation = "PING");
        conn.ping().instrument(ping_span).await?;

        Ok(())
    }
}

/// In-process accounts, lost on restart.
#[derive(Debug, Default)]
pub struct MemoryAccounts {
    accounts: RwLock<HashMap<String, Account>>,
}

impl MemoryAccounts {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn len(&self) -> usize {
        self.accounts.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.accounts.read().await.is_empty()
    }
}

#[async_trait]
impl AccountRepository for MemoryAccounts {
    async fn exists(&self, username: &str) -> Result<bool, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .contains_key(&normalize_username(username)))
    }

    async fn find_by_username(&self, username: &str) -> Result<Option<Account>, RepositoryError> {
        Ok(self
            .accounts
            .read()
            .await
            .get(&normalize_username(username))
            .cloned())
    }

    async fn create(&self, account: Account) -> Result<Account, RepositoryError> {
        let account = Account {
            username: normalize_username(&account.username),
            ..account
        };

        // check and insert under one write lock
        let mut accounts = self.accounts.write().await;
        if accounts.contains_key(&account.username) {
            return Err(RepositoryError::Conflict);
        }
        accounts.insert(account.username.clone(), account.clone());

        Ok(account)
    }
}

fn split_sql_statements(sql: &str) -> Vec<String> {
    let mut statements = Vec::new();
    let mut current = String::new();

    for line in sql.lines() {
        let trimmed = line.trim();
        if trimmed.starts_with("--") {
            continue;
        }
        current.push_str(line);
        current.push('\n');

        if trimmed.ends_with(';') {
            let statement = current.trim();
            if !statement.is_empty() {
                statements.push(statement.to_string());
            }
            current.clear();
        }
    }

    let leftover = current.trim();
    if !leftover.is_empty() {
        statements.push(leftover.to_string());
    }

    statements
}
