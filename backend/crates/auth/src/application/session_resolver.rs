//! Session Resolver
//!
//! Maps a request's credentials to an [`Identity`], or to no identity.
//!
//! Token sources, in order:
//! 1. `Authorization: Bearer <token>` (raw token, or the signed cookie form)
//! 2. the signed session cookie `<token>.<signature>`
//!
//! A credential whose signature does not verify is treated as absent.
//! Resolution is read-only: it never creates, extends or deletes sessions.

use std::sync::Arc;

use axum::http::{HeaderMap, header};
use chrono::{DateTime, Utc};
use platform::cookie::{extract_cookie, unsign_value};

use crate::application::config::AuthConfig;
use crate::domain::entity::Identity;
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::session_token::SessionToken;
use crate::error::AuthResult;

pub struct SessionResolver<U, S>
where
    U: UserRepository,
    S: SessionRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    config: Arc<AuthConfig>,
}

impl<U, S> SessionResolver<U, S>
where
    U: UserRepository,
    S: SessionRepository,
{
    pub fn new(user_repo: Arc<U>, session_repo: Arc<S>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            session_repo,
            config,
        }
    }

    /// Resolve the identity carried by `headers`
    ///
    /// Store failures are returned as errors, never as "no identity".
    pub async fn resolve(&self, headers: &HeaderMap) -> AuthResult<Option<Identity>> {
        self.resolve_at(headers, Utc::now()).await
    }

    pub async fn resolve_at(
        &self,
        headers: &HeaderMap,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Identity>> {
        let Some(token) = self.extract_token(headers) else {
            return Ok(None);
        };

        let Some(session) = self.session_repo.find_session_by_token(&token).await? else {
            return Ok(None);
        };

        if session.is_expired_at(now) {
            tracing::debug!(session_id = %session.session_id, "Session expired");
            return Ok(None);
        }

        let Some(user) = self.user_repo.find_user_by_id(session.user_id).await? else {
            tracing::warn!(
                session_id = %session.session_id,
                user_id = %session.user_id,
                "Session references a missing user"
            );
            return Ok(None);
        };

        Ok(Some(Identity::new(&session, &user)))
    }

    fn extract_token(&self, headers: &HeaderMap) -> Option<SessionToken> {
        if let Some(bearer) = bearer_token(headers) {
            return self.token_from_credential(bearer);
        }

        let cookie = extract_cookie(headers, &self.config.session_cookie_name)?;
        let key = self.config.cookie_signing_key();
        match unsign_value(&cookie, &key) {
            Some(token) => Some(SessionToken::from_raw(token)),
            None => {
                tracing::debug!("Session cookie signature mismatch");
                None
            }
        }
    }

    /// Bearer credentials may be the raw token or the signed cookie value
    fn token_from_credential(&self, credential: &str) -> Option<SessionToken> {
        if !credential.contains('.') {
            return Some(SessionToken::from_raw(credential));
        }
        let key = self.config.cookie_signing_key();
        unsign_value(credential, &key).map(SessionToken::from_raw)
    }
}

/// Token from `Authorization: Bearer <token>`; the scheme is case-insensitive
fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let value = headers.get(header::AUTHORIZATION)?.to_str().ok()?;
    let (scheme, token) = value.trim().split_once(' ')?;
    let token = token.trim();
    (scheme.eq_ignore_ascii_case("bearer") && !token.is_empty()).then_some(token)
}
