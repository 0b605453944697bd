//! Request Context Middleware
//!
//! Resolves the caller's identity once per request and exposes it to
//! handlers through the [`Ctx`] and [`Authenticated`] extractors.

use std::net::SocketAddr;

use axum::extract::{ConnectInfo, FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use chrono::Utc;
use platform::client::ClientInfo;

use crate::application::guard::RequestContext;
use crate::application::session_resolver::SessionResolver;
use crate::application::throttle;
use crate::domain::entity::Identity;
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::AuthStore;
use crate::error::AuthError;
use crate::presentation::handlers::AuthAppState;

/// Build the [`RequestContext`] for every request under the auth router
///
/// Requests over the per-IP budget are refused before anything else runs.
/// A store failure while resolving aborts the request with an internal
/// error; a missing or invalid credential just leaves the identity empty.
pub async fn resolve_identity<R, M>(
    State(state): State<AuthAppState<R, M>>,
    mut req: Request,
    next: Next,
) -> Response
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let direct_ip = req
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|info| info.0.ip());

    let headers = req.headers().clone();
    let client = ClientInfo::from_headers(&headers, direct_ip);

    if let (Some(limit), Some(ip)) = (state.config.request_rate_limit.as_ref(), client.ip) {
        let subject = ip.to_string();
        if let Err(e) =
            throttle::enforce(state.repo.as_ref(), "request", &subject, limit, Utc::now()).await
        {
            return e.into_response();
        }
    }

    let resolver = SessionResolver::new(state.repo.clone(), state.repo.clone(), state.config.clone());
    let identity = match resolver.resolve(&headers).await {
        Ok(identity) => identity,
        Err(e) => return e.into_response(),
    };

    req.extensions_mut()
        .insert(RequestContext::new(identity, client));

    next.run(req).await
}

/// The per-request context; empty when the middleware did not run
#[derive(Debug, Clone)]
pub struct Ctx(pub RequestContext);

impl<S> FromRequestParts<S> for Ctx
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let ctx = parts
            .extensions
            .get::<RequestContext>()
            .cloned()
            .unwrap_or_default();
        Ok(Ctx(ctx))
    }
}

/// Extractor form of the authorization gate
///
/// Rejects with `Unauthenticated` before the handler body runs.
#[derive(Debug, Clone)]
pub struct Authenticated(pub Identity);

impl<S> FromRequestParts<S> for Authenticated
where
    S: Send + Sync,
{
    type Rejection = AuthError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Ctx(ctx) = Ctx::from_request_parts(parts, state).await?;
        let identity = ctx.require_identity()?.clone();
        Ok(Authenticated(identity))
    }
}
