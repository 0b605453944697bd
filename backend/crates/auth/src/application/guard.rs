//! Authorization Gate
//!
//! Per-request context and the `protected` combinator that refuses to run a
//! procedure body without a resolved identity.

use std::future::Future;

use platform::client::ClientInfo;

use crate::domain::entity::Identity;
use crate::error::{AuthError, AuthResult};

/// Context built once per request before any procedure runs
#[derive(Debug, Clone, Default)]
pub struct RequestContext {
    pub identity: Option<Identity>,
    pub client: ClientInfo,
}

impl RequestContext {
    pub fn new(identity: Option<Identity>, client: ClientInfo) -> Self {
        Self { identity, client }
    }

    /// The resolved identity, or `Unauthenticated`
    pub fn require_identity(&self) -> AuthResult<&Identity> {
        self.identity.as_ref().ok_or(AuthError::Unauthenticated)
    }
}

/// Run `body` with the caller's identity
///
/// Fails with `Unauthenticated` without invoking `body` when the context
/// carries no identity.
pub async fn protected<T, F, Fut>(ctx: &RequestContext, body: F) -> AuthResult<T>
where
    F: FnOnce(Identity) -> Fut,
    Fut: Future<Output = AuthResult<T>>,
{
    let identity = ctx.require_identity()?.clone();
    body(identity).await
}
