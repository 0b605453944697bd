//! Auth Router
//!
//! Procedures are mounted tRPC-style as `/<router>.<procedure>`; nest the
//! router under `/api/trpc`.

use axum::{
    Router, middleware,
    routing::{get, post},
};

use crate::application::config::AuthConfig;
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::AuthStore;
use crate::infra::mailer::Mailer;
use crate::infra::postgres::PgAuthRepository;
use crate::presentation::handlers::{self, AuthAppState};
use crate::presentation::middleware::resolve_identity;

/// Create the auth router with the PostgreSQL store
pub fn auth_router(repo: PgAuthRepository, mailer: Mailer, config: AuthConfig) -> Router {
    auth_router_generic(repo, mailer, config)
}

/// Create the auth router for any store and email transport
pub fn auth_router_generic<R, M>(repo: R, mailer: M, config: AuthConfig) -> Router
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let state = AuthAppState::new(repo, mailer, config);

    Router::new()
        .route("/auth.signUp", post(handlers::sign_up::<R, M>))
        .route("/auth.signIn", post(handlers::sign_in::<R, M>))
        .route(
            "/auth.sendEmailVerificationOTP",
            post(handlers::send_email_verification_otp::<R, M>),
        )
        .route("/auth.verifyEmailOTP", post(handlers::verify_email_otp::<R, M>))
        .route("/auth.getMe", get(handlers::get_me::<R, M>))
        .route("/auth.updateProfile", post(handlers::update_profile::<R, M>))
        .route("/auth.signOut", post(handlers::sign_out::<R, M>))
        .route(
            "/auth.sendPasswordResetOTP",
            post(handlers::send_password_reset_otp::<R, M>),
        )
        .route("/auth.resetPassword", post(handlers::reset_password::<R, M>))
        .layer(middleware::from_fn_with_state(
            state.clone(),
            resolve_identity::<R, M>,
        ))
        .with_state(state)
}
