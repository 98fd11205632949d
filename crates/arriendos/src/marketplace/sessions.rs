use std::collections::HashMap;
use std::fmt;
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::domain::UserId;
use super::repository::RepositoryError;

/// Opaque bearer token handed out at login or registration.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionToken(pub String);

impl fmt::Debug for SessionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("SessionToken(<redacted>)")
    }
}

/// Lifetime of a session when none is configured: two weeks.
pub const DEFAULT_SESSION_TTL_HOURS: u32 = 14 * 24;

#[derive(Debug, Clone, Copy)]
struct Session {
    user: UserId,
    issued_at: DateTime<Utc>,
}

impl Session {
    fn expired(&self, ttl: Duration, now: DateTime<Utc>) -> bool {
        match self.issued_at.checked_add_signed(ttl) {
            Some(expires_at) => expires_at <= now,
            None => false,
        }
    }
}

/// Token to user mapping for authenticated sessions. Tokens expire `ttl` after being issued;
/// expired entries are dropped on lookup and pruned whenever a new token is issued.
#[derive(Debug)]
pub struct SessionStore {
    ttl: Duration,
    sessions: Mutex<HashMap<SessionToken, Session>>,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_ttl(Duration::hours(i64::from(DEFAULT_SESSION_TTL_HOURS)))
    }
}

fn poisoned<T>(_: T) -> RepositoryError {
    RepositoryError::Unavailable("session lock poisoned".to_string())
}

impl SessionStore {
    pub fn with_ttl(ttl: Duration) -> Self {
        Self {
            ttl,
            sessions: Mutex::default(),
        }
    }

    pub fn issue(&self, user: UserId) -> Result<SessionToken, RepositoryError> {
        let token = SessionToken(Uuid::new_v4().simple().to_string());
        let now = Utc::now();
        let mut sessions = self.sessions.lock().map_err(poisoned)?;

        let before = sessions.len();
        sessions.retain(|_, session| !session.expired(self.ttl, now));
        if sessions.len() < before {
            debug!(pruned = before - sessions.len(), "expired sessions pruned");
        }

        sessions.insert(
            token.clone(),
            Session {
                user,
                issued_at: now,
            },
        );
        Ok(token)
    }

    pub fn resolve(&self, token: &SessionToken) -> Result<Option<UserId>, RepositoryError> {
        let mut sessions = self.sessions.lock().map_err(poisoned)?;
        match sessions.get(token).copied() {
            Some(session) if session.expired(self.ttl, Utc::now()) => {
                sessions.remove(token);
                debug!(user_id = %session.user, "expired session rejected");
                Ok(None)
            }
            Some(session) => Ok(Some(session.user)),
            None => Ok(None),
        }
    }

    /// Returns whether the token was active.
    pub fn revoke(&self, token: &SessionToken) -> Result<bool, RepositoryError> {
        Ok(self
            .sessions
            .lock()
            .map_err(poisoned)?
            .remove(token)
            .is_some())
    }
}
