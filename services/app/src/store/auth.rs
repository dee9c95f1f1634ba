//! services/app/src/store/auth.rs
//!
//! The process-wide auth session store. Validation and rate limiting run
//! locally before any call reaches the auth service; session state is
//! initialized from the service's current-session query and kept live by a
//! watcher task over its change subscription.

use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use tracing::{info, warn};
use uuid::Uuid;

use studio_core::domain::AuthSession;
use studio_core::ports::{AuthService, KeyValueStore, PortError, PortResult};

use crate::security::{
    check_password_strength, check_rate_limit, clear_attempts, is_valid_email,
    log_security_event, record_failed_attempt, SecurityEventKind,
};

/// User-facing auth failures, split by the error taxonomy: validation errors
/// never touch the service, credential rejections stay generic, service
/// errors pass through verbatim.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("Invalid email format.")]
    InvalidEmail,

    #[error("{0}")]
    WeakPassword(&'static str),

    #[error("Too many attempts. Try again in {wait_secs} seconds.")]
    RateLimited { wait_secs: u64 },

    #[error("Invalid email or password.")]
    InvalidCredentials,

    #[error(transparent)]
    Service(#[from] PortError),
}

pub struct AuthStore {
    service: Arc<dyn AuthService>,
    kv: Arc<dyn KeyValueStore>,
    session: Arc<RwLock<Option<AuthSession>>>,
    watcher: Mutex<Option<JoinHandle<()>>>,
}

impl AuthStore {
    pub fn new(service: Arc<dyn AuthService>, kv: Arc<dyn KeyValueStore>) -> Self {
        Self {
            service,
            kv,
            session: Arc::new(RwLock::new(None)),
            watcher: Mutex::new(None),
        }
    }

    /// Restores the current session from the service and spawns the watcher
    /// that mirrors subsequent session transitions into local state. Called
    /// once by the application root; `shutdown` is the inverse.
    pub async fn init(&self) -> PortResult<()> {
        let restored = self.service.current_session().await?;
        if let Some(session) = &restored {
            info!(user = %session.user.email, "restored auth session");
        }
        *self.session.write().await = restored;

        let mut rx = self.service.subscribe();
        let slot = Arc::clone(&self.session);
        let handle = tokio::spawn(async move {
            while rx.changed().await.is_ok() {
                let next = rx.borrow_and_update().clone();
                *slot.write().await = next;
            }
        });
        *self.watcher.lock().await = Some(handle);
        Ok(())
    }

    /// Stops mirroring session transitions. Safe to call more than once.
    pub async fn shutdown(&self) {
        if let Some(handle) = self.watcher.lock().await.take() {
            handle.abort();
        }
    }

    /// The change subscription, for consumers that react to user changes.
    pub fn subscribe(&self) -> tokio::sync::watch::Receiver<Option<AuthSession>> {
        self.service.subscribe()
    }

    pub async fn session(&self) -> Option<AuthSession> {
        self.session.read().await.clone()
    }

    pub async fn user_id(&self) -> Option<Uuid> {
        self.session.read().await.as_ref().map(|s| s.user.id)
    }

    pub async fn sign_in(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }

        let decision = check_rate_limit(self.kv.as_ref(), email)?;
        if !decision.allowed {
            let wait_secs = decision.wait_secs.unwrap_or(0);
            self.audit(
                SecurityEventKind::Suspicious,
                &format!("Rate limit exceeded for {}", email),
            );
            return Err(AuthError::RateLimited { wait_secs });
        }

        match self.service.sign_in_with_password(email, password).await {
            Ok(session) => {
                if let Err(e) = clear_attempts(self.kv.as_ref(), email) {
                    warn!("failed to clear login attempt counter: {}", e);
                }
                self.audit(
                    SecurityEventKind::LoginSuccess,
                    &format!("User logged in: {}", email),
                );
                *self.session.write().await = Some(session);
                Ok(())
            }
            Err(PortError::Unauthorized) => {
                if let Err(e) = record_failed_attempt(self.kv.as_ref(), email) {
                    warn!("failed to record login attempt: {}", e);
                }
                self.audit(SecurityEventKind::LoginFail, &format!("Login failed for: {}", email));
                Err(AuthError::InvalidCredentials)
            }
            // Service trouble is not an auth failure: surfaced verbatim,
            // counter untouched.
            Err(e) => Err(AuthError::Service(e)),
        }
    }

    pub async fn sign_up(&self, email: &str, password: &str) -> Result<(), AuthError> {
        if !is_valid_email(email) {
            return Err(AuthError::InvalidEmail);
        }
        if let Err(rule) = check_password_strength(password) {
            return Err(AuthError::WeakPassword(rule));
        }

        let session = self.service.sign_up_with_password(email, password).await?;
        self.audit(SecurityEventKind::Signup, &format!("Account created: {}", email));
        *self.session.write().await = Some(session);
        Ok(())
    }

    pub async fn sign_out(&self) -> Result<(), AuthError> {
        self.service.sign_out().await?;
        *self.session.write().await = None;
        Ok(())
    }

    fn audit(&self, kind: SecurityEventKind, details: &str) {
        if let Err(e) = log_security_event(self.kv.as_ref(), kind, details) {
            warn!("failed to append security audit event: {}", e);
        }
    }
}
