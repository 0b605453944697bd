//! Identity
//!
//! The authenticated principal attached to a request: an immutable
//! snapshot of the session and its owning user taken at resolution time.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::domain::entity::{session::Session, user::User};
use crate::domain::value_object::{
    SessionId, UserId, email::Email, user_name::UserName, user_role::UserRole,
};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub id: SessionId,
    #[serde(skip)]
    pub token: String,
    pub user_id: UserId,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserSnapshot {
    pub id: UserId,
    pub username: UserName,
    pub email: Email,
    pub email_verified: bool,
    pub role: UserRole,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Identity {
    pub session: SessionSnapshot,
    pub user: UserSnapshot,
}

impl Identity {
    pub fn new(session: &Session, user: &User) -> Self {
        Self {
            session: SessionSnapshot {
                id: session.session_id,
                token: session.token.as_str().to_string(),
                user_id: session.user_id,
                expires_at: session.expires_at,
                ip_address: session.ip_address.clone(),
                user_agent: session.user_agent.clone(),
            },
            user: UserSnapshot {
                id: user.user_id,
                username: user.user_name.clone(),
                email: user.email.clone(),
                email_verified: user.email_verified,
                role: user.role,
            },
        }
    }
}
