//! services/app/src/adapters/auth_db.rs
//!
//! The hosted auth-service adapter: password accounts and browser-style
//! sessions stored in PostgreSQL, argon2 for credential verification. It
//! implements the `AuthService` port from the `core` crate.

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use sqlx::{FromRow, PgPool};
use std::sync::Arc;
use tokio::sync::watch;
use tracing::error;
use uuid::Uuid;

use studio_core::domain::{AuthSession, AuthUser};
use studio_core::ports::{AuthService, KeyValueStore, PortError, PortResult};

/// Local-storage key carrying the active session id across restarts.
const SESSION_ID_KEY: &str = "auth_session";
const SESSION_DAYS: i64 = 30;

//=========================================================================================
// The Main Adapter Struct
//=========================================================================================

/// An auth adapter backed by the hosted datastore's `users` and
/// `auth_sessions` tables.
pub struct DbAuthAdapter {
    pool: PgPool,
    kv: Arc<dyn KeyValueStore>,
    sessions: watch::Sender<Option<AuthSession>>,
}

impl DbAuthAdapter {
    /// Creates a new `DbAuthAdapter`.
    pub fn new(pool: PgPool, kv: Arc<dyn KeyValueStore>) -> Self {
        let (sessions, _) = watch::channel(None);
        Self { pool, kv, sessions }
    }

    async fn create_session_row(&self, user: AuthUser) -> PortResult<AuthSession> {
        let session_id = Uuid::new_v4().to_string();
        let expires_at = Utc::now() + Duration::days(SESSION_DAYS);

        sqlx::query("INSERT INTO auth_sessions (id, user_id, expires_at) VALUES ($1, $2, $3)")
            .bind(&session_id)
            .bind(user.id)
            .bind(expires_at)
            .execute(&self.pool)
            .await
            .map_err(|e| PortError::Unexpected(e.to_string()))?;

        let session = AuthSession { id: session_id, user, expires_at };
        self.kv.set(SESSION_ID_KEY, &session.id)?;
        let _ = self.sessions.send(Some(session.clone()));
        Ok(session)
    }
}

//=========================================================================================
// "Impure" Database Record Structs
//=========================================================================================

#[derive(FromRow)]
struct CredentialsRecord {
    user_id: Uuid,
    email: String,
    hashed_password: String,
}

#[derive(FromRow)]
struct SessionRecord {
    id: String,
    user_id: Uuid,
    email: String,
    expires_at: DateTime<Utc>,
}

impl SessionRecord {
    fn to_domain(self) -> AuthSession {
        AuthSession {
            id: self.id,
            user: AuthUser { id: self.user_id, email: self.email },
            expires_at: self.expires_at,
        }
    }
}

//=========================================================================================
// `AuthService` Trait Implementation
//=========================================================================================

#[async_trait]
impl AuthService for DbAuthAdapter {
    async fn sign_in_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        // Unknown email and wrong password collapse into the same rejection.
        let creds = sqlx::query_as::<_, CredentialsRecord>(
            "SELECT user_id, email, hashed_password FROM users WHERE email = $1",
        )
        .bind(email)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| match e {
            sqlx::Error::RowNotFound => PortError::Unauthorized,
            _ => PortError::Unexpected(e.to_string()),
        })?;

        let parsed_hash = PasswordHash::new(&creds.hashed_password).map_err(|e| {
            error!("Failed to parse stored password hash: {:?}", e);
            PortError::Unexpected("Authentication error".to_string())
        })?;

        if Argon2::default()
            .verify_password(password.as_bytes(), &parsed_hash)
            .is_err()
        {
            return Err(PortError::Unauthorized);
        }

        self.create_session_row(AuthUser { id: creds.user_id, email: creds.email })
            .await
    }

    async fn sign_up_with_password(&self, email: &str, password: &str) -> PortResult<AuthSession> {
        let salt = SaltString::generate(&mut OsRng);
        let password_hash = Argon2::default()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| {
                error!("Failed to hash password: {:?}", e);
                PortError::Unexpected("Failed to hash password".to_string())
            })?
            .to_string();

        let user_id: Uuid = sqlx::query_scalar(
            "INSERT INTO users (user_id, email, hashed_password) VALUES ($1, $2, $3) \
             RETURNING user_id",
        )
        .bind(Uuid::new_v4())
        .bind(email)
        .bind(&password_hash)
        .fetch_one(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        self.create_session_row(AuthUser { id: user_id, email: email.to_string() })
            .await
    }

    async fn sign_out(&self) -> PortResult<()> {
        if let Some(session_id) = self.kv.get(SESSION_ID_KEY)? {
            sqlx::query("DELETE FROM auth_sessions WHERE id = $1")
                .bind(&session_id)
                .execute(&self.pool)
                .await
                .map_err(|e| PortError::Unexpected(e.to_string()))?;
        }
        self.kv.remove(SESSION_ID_KEY)?;
        let _ = self.sessions.send(None);
        Ok(())
    }

    async fn current_session(&self) -> PortResult<Option<AuthSession>> {
        let Some(session_id) = self.kv.get(SESSION_ID_KEY)? else {
            return Ok(None);
        };

        let record = sqlx::query_as::<_, SessionRecord>(
            "SELECT s.id, s.user_id, u.email, s.expires_at \
             FROM auth_sessions s JOIN users u ON u.user_id = s.user_id \
             WHERE s.id = $1 AND s.expires_at > now()",
        )
        .bind(&session_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| PortError::Unexpected(e.to_string()))?;

        match record {
            Some(record) => {
                let session = record.to_domain();
                let _ = self.sessions.send(Some(session.clone()));
                Ok(Some(session))
            }
            None => {
                // Expired or revoked server-side; drop the stale local id.
                self.kv.remove(SESSION_ID_KEY)?;
                Ok(None)
            }
        }
    }

    fn subscribe(&self) -> watch::Receiver<Option<AuthSession>> {
        self.sessions.subscribe()
    }
}
