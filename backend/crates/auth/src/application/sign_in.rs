//! Sign In Use Case
//!
//! Authenticates a user with user name and password and opens a new
//! session. Existing sessions of the user are left untouched. Attempts are
//! rate limited per user name, whether or not the account exists.

use std::sync::Arc;

use chrono::Utc;
use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::normalize_optional;
use crate::application::throttle;
use crate::domain::entity::{Session, User};
use crate::domain::repository::{SessionRepository, UserRepository};
use crate::domain::value_object::{user_name::UserName, user_password::RawPassword};
use crate::error::{AuthError, AuthResult};

/// Sign in input
pub struct SignInInput {
    pub user_name: String,
    pub password: String,
    pub device_id: Option<String>,
    pub client: ClientInfo,
}

/// Sign in output
#[derive(Debug)]
pub struct SignInOutput {
    pub user: User,
    pub session: Session,
}

/// Sign in use case
pub struct SignInUseCase<U, S>
where
    U: UserRepository + RateLimitStore,
    S: SessionRepository,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    config: Arc<AuthConfig>,
}

impl<U, S> SignInUseCase<U, S>
where
    U: UserRepository + RateLimitStore,
    S: SessionRepository,
{
    pub fn new(user_repo: Arc<U>, session_repo: Arc<S>, config: Arc<AuthConfig>) -> Self {
        Self {
            user_repo,
            session_repo,
            config,
        }
    }

    pub async fn execute(&self, input: SignInInput) -> AuthResult<SignInOutput> {
        // Malformed input cannot match any account; answer like a wrong password
        let user_name = UserName::new(&input.user_name).map_err(|_| AuthError::InvalidCredentials)?;
        let raw_password =
            RawPassword::new(input.password).map_err(|_| AuthError::InvalidCredentials)?;

        throttle::enforce(
            self.user_repo.as_ref(),
            "sign-in",
            user_name.canonical(),
            &self.config.sign_in_rate_limit,
            Utc::now(),
        )
        .await?;

        let mut user = self
            .user_repo
            .find_user_by_user_name(&user_name)
            .await?
            .ok_or(AuthError::InvalidCredentials)?;

        if !user.password.verify(&raw_password, self.config.pepper()) {
            tracing::warn!(user_id = %user.user_id, "Sign-in with wrong password");
            return Err(AuthError::InvalidCredentials);
        }

        if let Some(device_id) = normalize_optional(input.device_id) {
            self.user_repo
                .update_device_id(user.user_id, &device_id)
                .await?;
            user.device_id = Some(device_id);
        }

        let session = Session::new(
            user.user_id,
            input.client.ip_string(),
            input.client.user_agent,
            self.config.session_ttl(),
            Utc::now(),
        );
        self.session_repo.create_session(&session).await?;

        tracing::info!(
            user_id = %user.user_id,
            session_id = %session.session_id,
            "User signed in"
        );

        Ok(SignInOutput { user, session })
    }
}
