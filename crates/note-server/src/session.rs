//! Credential store and session lifecycle.
//!
//! Users register with an email and password; logging in issues an opaque
//! random token that stays valid until its expiry. Only the SHA-256 of each
//! token is persisted. A user may hold any number of concurrent sessions.

use std::sync::Arc;
use std::time::Duration;

use thiserror::Error;

use crate::clock::Clock;
use crate::password::{CredentialHasher, PasswordError};
use crate::storage::{Database, SqlxResultExt, StorageError};
use crate::validation::{is_strong_enough, is_valid_email};

/// Server-generated user identifier.
pub type UserId = i64;

/// Random bytes in a session token (hex-encoded on the wire).
pub const TOKEN_BYTES: usize = 32;

#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid email format")]
    InvalidEmail,

    #[error("Password must be at least 8 characters")]
    WeakPassword,

    #[error("Email already exists")]
    EmailExists,

    #[error("Invalid credentials")]
    InvalidCredentials,

    #[error(transparent)]
    Storage(#[from] StorageError),

    #[error(transparent)]
    Password(#[from] PasswordError),

    #[error("Password hashing task failed: {0}")]
    Task(String),
}

pub type Result<T> = std::result::Result<T, SessionError>;

/// A freshly issued session.
#[derive(Debug, Clone)]
pub struct IssuedSession {
    /// Raw token; returned to the client once and never stored
    pub token: String,
    pub user_id: UserId,
    /// Milliseconds since the Unix epoch
    pub expires_at: i64,
}

/// Issues, validates and revokes session tokens.
#[derive(Debug)]
pub struct SessionManager {
    db: Database,
    hasher: CredentialHasher,
    clock: Arc<dyn Clock>,
    lifetime: Duration,
    /// Verified against when the email is unknown so both login failures cost the same
    dummy_hash: String,
}

impl SessionManager {
    pub fn new(
        db: Database,
        hasher: CredentialHasher,
        clock: Arc<dyn Clock>,
        lifetime: Duration,
    ) -> Result<Self> {
        let dummy_hash = hasher.hash(&generate_token())?;
        Ok(Self {
            db,
            hasher,
            clock,
            lifetime,
            dummy_hash,
        })
    }

    pub fn lifetime(&self) -> Duration {
        self.lifetime
    }

    /// Create an account.
    pub async fn register(&self, email: &str, password: &str) -> Result<UserId> {
        if !is_valid_email(email) {
            return Err(SessionError::InvalidEmail);
        }
        if !is_strong_enough(password) {
            return Err(SessionError::WeakPassword);
        }

        let existing: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE email = ?")
            .bind(email)
            .fetch_optional(self.db.pool())
            .await
            .sql_context("Failed to look up user")?;
        if existing.is_some() {
            return Err(SessionError::EmailExists);
        }

        let hash = self.hash_blocking(password).await?;

        let result = sqlx::query("INSERT INTO users (email, password_hash, created_at) VALUES (?, ?, ?)")
            .bind(email)
            .bind(&hash)
            .bind(self.clock.now_millis())
            .execute(self.db.pool())
            .await
            .sql_context("Failed to insert user");

        match result {
            Ok(done) => {
                let user_id = done.last_insert_rowid();
                tracing::info!("Registered user {}", user_id);
                Ok(user_id)
            }
            // Lost a race with a concurrent registration of the same email
            Err(e) if e.is_unique_violation() => Err(SessionError::EmailExists),
            Err(e) => Err(e.into()),
        }
    }

    /// Check credentials and open a new session.
    ///
    /// Wrong passwords and unknown emails fail identically.
    pub async fn login(&self, email: &str, password: &str) -> Result<IssuedSession> {
        let row: Option<(i64, String)> =
            sqlx::query_as("SELECT id, password_hash FROM users WHERE email = ?")
                .bind(email)
                .fetch_optional(self.db.pool())
                .await
                .sql_context("Failed to look up user")?;

        let Some((user_id, stored_hash)) = row else {
            let _ = self.verify_blocking(password, self.dummy_hash.clone()).await;
            tracing::debug!("Login failed: unknown email");
            return Err(SessionError::InvalidCredentials);
        };

        if !self.verify_blocking(password, stored_hash).await? {
            tracing::debug!("Login failed for user {}: wrong password", user_id);
            return Err(SessionError::InvalidCredentials);
        }

        let token = generate_token();
        let now = self.clock.now_millis();
        let expires_at = now + self.lifetime.as_millis() as i64;

        let mut tx = self
            .db
            .pool()
            .begin()
            .await
            .sql_context("Failed to begin transaction")?;

        sqlx::query(
            "INSERT INTO sessions (token_hash, user_id, created_at, expires_at) VALUES (?, ?, ?, ?)",
        )
        .bind(hash_token(&token))
        .bind(user_id)
        .bind(now)
        .bind(expires_at)
        .execute(&mut *tx)
        .await
        .sql_context("Failed to create session")?;

        sqlx::query("UPDATE users SET last_login = ? WHERE id = ?")
            .bind(now)
            .bind(user_id)
            .execute(&mut *tx)
            .await
            .sql_context("Failed to update last login")?;

        tx.commit()
            .await
            .sql_context("Failed to commit transaction")?;

        tracing::info!("User {} logged in", user_id);
        Ok(IssuedSession {
            token,
            user_id,
            expires_at,
        })
    }

    /// Resolve a token to its user, if the session exists and has not expired.
    pub async fn authenticate(&self, token: &str) -> Result<Option<UserId>> {
        if token.is_empty() {
            return Ok(None);
        }
        let row: Option<(i64,)> =
            sqlx::query_as("SELECT user_id FROM sessions WHERE token_hash = ? AND expires_at > ?")
                .bind(hash_token(token))
                .bind(self.clock.now_millis())
                .fetch_optional(self.db.pool())
                .await
                .sql_context("Failed to look up session")?;
        Ok(row.map(|(user_id,)| user_id))
    }

    /// End a session. Succeeds whether or not the token matched anything.
    ///
    /// Returns true if a session was removed.
    pub async fn logout(&self, token: Option<&str>) -> Result<bool> {
        let Some(token) = token.filter(|t| !t.is_empty()) else {
            return Ok(false);
        };
        let done = sqlx::query("DELETE FROM sessions WHERE token_hash = ?")
            .bind(hash_token(token))
            .execute(self.db.pool())
            .await
            .sql_context("Failed to delete session")?;
        Ok(done.rows_affected() > 0)
    }

    /// Delete sessions that have expired. Returns how many were removed.
    pub async fn purge_expired(&self) -> Result<u64> {
        let done = sqlx::query("DELETE FROM sessions WHERE expires_at <= ?")
            .bind(self.clock.now_millis())
            .execute(self.db.pool())
            .await
            .sql_context("Failed to purge sessions")?;
        let removed = done.rows_affected();
        if removed > 0 {
            tracing::info!("Cleaned up {} expired sessions", removed);
        }
        Ok(removed)
    }

    async fn hash_blocking(&self, password: &str) -> Result<String> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| SessionError::Task(e.to_string()))?
            .map_err(SessionError::from)
    }

    async fn verify_blocking(&self, password: &str, hash: String) -> Result<bool> {
        let hasher = self.hasher.clone();
        let password = password.to_string();
        tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| SessionError::Task(e.to_string()))?
            .map_err(SessionError::from)
    }
}

// --- Utility Functions ---

/// Generate a session token from the thread-local CSPRNG.
pub fn generate_token() -> String {
    use rand::Rng;
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill(&mut bytes);
    hex::encode(bytes)
}

/// Hash a token for storage (we don't store raw tokens)
pub fn hash_token(token: &str) -> String {
    use sha2::{Digest, Sha256};
    let mut hasher = Sha256::new();
    hasher.update(token.as_bytes());
    let result = hasher.finalize();
    base64::Engine::encode(&base64::engine::general_purpose::URL_SAFE_NO_PAD, result)
}
