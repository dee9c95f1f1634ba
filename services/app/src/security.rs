//! services/app/src/security.rs
//!
//! Pure security utilities: email/password validation, a one-way digest for
//! the local credential double, the sliding-window login rate limiter, and
//! the append-only audit log. The stateful pieces operate on a passed
//! `KeyValueStore`; nothing here touches the network.

use chrono::{DateTime, Utc};
use regex::Regex;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::sync::OnceLock;
use studio_core::ports::{KeyValueStore, PortResult};

/// Failed attempts allowed per email before the lockout window applies.
pub const ATTEMPT_LIMIT: u32 = 3;
/// Lockout window, in seconds.
pub const LOCKOUT_WINDOW_SECS: i64 = 60;

const AUDIT_LOG_KEY: &str = "security_audit_logs";

fn attempts_key(email: &str) -> String {
    format!("auth_attempts_{}", email)
}

//=========================================================================================
// Validation
//=========================================================================================

static EMAIL_RE: OnceLock<Regex> = OnceLock::new();

pub fn is_valid_email(email: &str) -> bool {
    let re = EMAIL_RE.get_or_init(|| {
        Regex::new(r"^[a-zA-Z0-9._-]+@[a-zA-Z0-9.-]+\.[a-zA-Z]{2,6}$")
            .expect("email pattern is valid")
    });
    re.is_match(email)
}

/// Checks the five password rules in order and reports the first failure.
pub fn check_password_strength(password: &str) -> Result<(), &'static str> {
    if password.len() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_uppercase()) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_lowercase()) {
        return Err("Password must contain at least one lowercase letter");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one digit");
    }
    if !password.chars().any(|c| "!@#$%^&*(),.?\":{}|<>".contains(c)) {
        return Err("Password must contain at least one special character");
    }
    Ok(())
}

/// One-way sha256 hex digest, used by the locally-simulated auth backend for
/// password comparison.
pub fn digest_password(password: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(password.as_bytes());
    hex::encode(hasher.finalize())
}

//=========================================================================================
// Login Rate Limiting
//=========================================================================================

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoginAttempts {
    count: u32,
    /// Epoch milliseconds of the most recent failed attempt.
    last_attempt: i64,
}

/// Outcome of a rate-limit check.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateDecision {
    pub allowed: bool,
    /// Seconds until the counter resets, when rejected.
    pub wait_secs: Option<u64>,
}

impl RateDecision {
    fn allowed() -> Self {
        RateDecision { allowed: true, wait_secs: None }
    }
}

pub fn check_rate_limit(kv: &dyn KeyValueStore, email: &str) -> PortResult<RateDecision> {
    check_rate_limit_at(kv, email, Utc::now())
}

/// Sliding-window check. Once the window has elapsed the counter is removed
/// and the email is allowed again.
pub fn check_rate_limit_at(
    kv: &dyn KeyValueStore,
    email: &str,
    now: DateTime<Utc>,
) -> PortResult<RateDecision> {
    let key = attempts_key(email);
    let Some(raw) = kv.get(&key)? else {
        return Ok(RateDecision::allowed());
    };
    let Ok(attempts) = serde_json::from_str::<LoginAttempts>(&raw) else {
        // Unreadable counters are dropped.
        kv.remove(&key)?;
        return Ok(RateDecision::allowed());
    };

    if attempts.count >= ATTEMPT_LIMIT {
        let elapsed_ms = now.timestamp_millis() - attempts.last_attempt;
        let window_ms = LOCKOUT_WINDOW_SECS * 1000;
        if elapsed_ms < window_ms {
            let wait_secs = ((window_ms - elapsed_ms) as f64 / 1000.0).ceil() as u64;
            return Ok(RateDecision { allowed: false, wait_secs: Some(wait_secs) });
        }
        kv.remove(&key)?;
        return Ok(RateDecision::allowed());
    }

    Ok(RateDecision::allowed())
}

pub fn record_failed_attempt(kv: &dyn KeyValueStore, email: &str) -> PortResult<()> {
    record_failed_attempt_at(kv, email, Utc::now())
}

pub fn record_failed_attempt_at(
    kv: &dyn KeyValueStore,
    email: &str,
    now: DateTime<Utc>,
) -> PortResult<()> {
    let key = attempts_key(email);
    let mut attempts = kv
        .get(&key)?
        .and_then(|raw| serde_json::from_str::<LoginAttempts>(&raw).ok())
        .unwrap_or(LoginAttempts { count: 0, last_attempt: now.timestamp_millis() });

    attempts.count += 1;
    attempts.last_attempt = now.timestamp_millis();

    let raw = serde_json::to_string(&attempts)
        .map_err(|e| studio_core::ports::PortError::Unexpected(e.to_string()))?;
    kv.set(&key, &raw)
}

pub fn clear_attempts(kv: &dyn KeyValueStore, email: &str) -> PortResult<()> {
    kv.remove(&attempts_key(email))
}

//=========================================================================================
// Audit Log
//=========================================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SecurityEventKind {
    LoginSuccess,
    LoginFail,
    Signup,
    Suspicious,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SecurityEvent {
    pub timestamp: DateTime<Utc>,
    pub kind: SecurityEventKind,
    pub details: String,
    pub client: String,
}

fn client_identifier() -> String {
    format!("studio/{} ({})", env!("CARGO_PKG_VERSION"), std::env::consts::OS)
}

/// Appends a structured event to the local audit log. Append-only; failures
/// to persist are surfaced to the caller, who logs and moves on.
pub fn log_security_event(
    kv: &dyn KeyValueStore,
    kind: SecurityEventKind,
    details: &str,
) -> PortResult<()> {
    let mut events: Vec<SecurityEvent> = kv
        .get(AUDIT_LOG_KEY)?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default();

    events.push(SecurityEvent {
        timestamp: Utc::now(),
        kind,
        details: details.to_string(),
        client: client_identifier(),
    });

    let raw = serde_json::to_string(&events)
        .map_err(|e| studio_core::ports::PortError::Unexpected(e.to_string()))?;
    kv.set(AUDIT_LOG_KEY, &raw)?;

    tracing::warn!(?kind, details, "security audit event");
    Ok(())
}

/// The persisted audit trail, oldest first.
pub fn audit_log(kv: &dyn KeyValueStore) -> PortResult<Vec<SecurityEvent>> {
    Ok(kv
        .get(AUDIT_LOG_KEY)?
        .and_then(|raw| serde_json::from_str(&raw).ok())
        .unwrap_or_default())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::kv::MemoryStore;
    use chrono::{Duration, TimeZone};

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap()
    }

    #[test]
    fn accepts_plausible_emails_and_rejects_malformed_ones() {
        assert!(is_valid_email("dev@example.com"));
        assert!(is_valid_email("first.last-1@sub.domain.io"));
        assert!(!is_valid_email("not-an-email"));
        assert!(!is_valid_email("missing@tld"));
        assert!(!is_valid_email("@example.com"));
    }

    #[test]
    fn password_missing_digit_fails_with_digit_rule() {
        let err = check_password_strength("Abcdefg!").unwrap_err();
        assert!(err.contains("digit"), "unexpected rule message: {err}");
    }

    #[test]
    fn password_meeting_all_rules_passes() {
        assert!(check_password_strength("Abcdefg1!").is_ok());
    }

    #[test]
    fn password_rules_fail_in_order() {
        assert!(check_password_strength("Ab1!").unwrap_err().contains("8 characters"));
        assert!(check_password_strength("abcdefg1!").unwrap_err().contains("uppercase"));
        assert!(check_password_strength("ABCDEFG1!").unwrap_err().contains("lowercase"));
        assert!(check_password_strength("Abcdefgh1").unwrap_err().contains("special"));
    }

    #[test]
    fn digest_is_stable_hex_sha256() {
        let d = digest_password("secret");
        assert_eq!(d.len(), 64);
        assert_eq!(d, digest_password("secret"));
        assert_ne!(d, digest_password("Secret"));
    }

    #[test]
    fn fourth_attempt_within_window_is_rejected_with_bounded_wait() {
        let kv = MemoryStore::new();
        let email = "user@example.com";
        for _ in 0..3 {
            record_failed_attempt_at(&kv, email, t0()).unwrap();
        }
        let decision = check_rate_limit_at(&kv, email, t0() + Duration::seconds(1)).unwrap();
        assert!(!decision.allowed);
        let wait = decision.wait_secs.unwrap();
        assert!(wait > 0 && wait <= 60, "wait out of range: {wait}");
    }

    #[test]
    fn counter_resets_after_lockout_window() {
        let kv = MemoryStore::new();
        let email = "user@example.com";
        for _ in 0..3 {
            record_failed_attempt_at(&kv, email, t0()).unwrap();
        }
        let later = t0() + Duration::seconds(LOCKOUT_WINDOW_SECS + 1);
        let decision = check_rate_limit_at(&kv, email, later).unwrap();
        assert!(decision.allowed);
        // The stale counter is gone entirely.
        assert!(kv.get(&attempts_key(email)).unwrap().is_none());
    }

    #[test]
    fn attempts_below_limit_are_allowed() {
        let kv = MemoryStore::new();
        let email = "user@example.com";
        record_failed_attempt_at(&kv, email, t0()).unwrap();
        record_failed_attempt_at(&kv, email, t0()).unwrap();
        assert!(check_rate_limit_at(&kv, email, t0()).unwrap().allowed);
    }

    #[test]
    fn clearing_attempts_unlocks_immediately() {
        let kv = MemoryStore::new();
        let email = "user@example.com";
        for _ in 0..3 {
            record_failed_attempt_at(&kv, email, t0()).unwrap();
        }
        clear_attempts(&kv, email).unwrap();
        assert!(check_rate_limit_at(&kv, email, t0()).unwrap().allowed);
    }

    #[test]
    fn audit_log_appends_in_order() {
        let kv = MemoryStore::new();
        log_security_event(&kv, SecurityEventKind::LoginFail, "bad password").unwrap();
        log_security_event(&kv, SecurityEventKind::LoginSuccess, "signed in").unwrap();
        let events = audit_log(&kv).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, SecurityEventKind::LoginFail);
        assert_eq!(events[1].kind, SecurityEventKind::LoginSuccess);
        assert!(events[1].client.starts_with("studio/"));
    }
}
