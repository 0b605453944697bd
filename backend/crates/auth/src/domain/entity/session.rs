//! Session Entity
//!
//! Server-side session referenced by an opaque token.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{SessionId, UserId, session_token::SessionToken};

/// Session entity
#[derive(Debug, Clone)]
pub struct Session {
    pub session_id: SessionId,
    pub token: SessionToken,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Session {
    /// Create a new session with a fresh token
    ///
    /// TTL is provided by the application layer (config), not hard-coded here.
    pub fn new(
        user_id: UserId,
        ip_address: Option<String>,
        user_agent: Option<String>,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            session_id: SessionId::new(),
            token: SessionToken::generate(),
            user_id,
            expires_at: now + ttl,
            ip_address,
            user_agent,
            created_at: now,
            updated_at: now,
        }
    }

    /// A session is live strictly before `expires_at`
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
