//! Password Reset Use Case
//!
//! `forget-password` codes. Requesting a code for an unknown address looks
//! exactly like requesting one for a known address.

use std::sync::Arc;

use chrono::Utc;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::otp::OtpService;
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::{SessionRepository, UserRepository, VerificationRepository};
use crate::domain::value_object::{
    email::Email,
    otp_code::OtpCode,
    otp_purpose::OtpPurpose,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Reset password input
pub struct ResetPasswordInput {
    pub email: String,
    pub otp: String,
    pub password: String,
}

pub struct PasswordResetUseCase<U, S, V, M>
where
    U: UserRepository,
    S: SessionRepository,
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    user_repo: Arc<U>,
    session_repo: Arc<S>,
    otp: OtpService<V, M>,
    config: Arc<AuthConfig>,
}

impl<U, S, V, M> PasswordResetUseCase<U, S, V, M>
where
    U: UserRepository,
    S: SessionRepository,
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    pub fn new(
        user_repo: Arc<U>,
        session_repo: Arc<S>,
        otp: OtpService<V, M>,
        config: Arc<AuthConfig>,
    ) -> Self {
        Self {
            user_repo,
            session_repo,
            otp,
            config,
        }
    }

    /// Send a reset code if the address belongs to a user
    pub async fn send(&self, email: &str) -> AuthResult<Email> {
        let email = Email::new(email)?;

        if self.user_repo.find_user_by_email(&email).await?.is_none() {
            tracing::debug!("Password reset requested for unknown email");
            self.otp
                .throttle_issue(&email, OtpPurpose::ForgetPassword, Utc::now())
                .await?;
            return Ok(email);
        }

        self.otp.issue(&email, OtpPurpose::ForgetPassword).await?;
        Ok(email)
    }

    /// Verify the code, replace the password and revoke every session
    ///
    /// Returns the number of revoked sessions.
    pub async fn reset(&self, input: ResetPasswordInput) -> AuthResult<u64> {
        let email = Email::new(&input.email)?;
        let code = OtpCode::parse(&input.otp)?;
        let raw_password = RawPassword::new(input.password)?;

        // Unknown addresses never had a code issued
        let user = self
            .user_repo
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::InvalidOrExpiredCode)?;

        self.otp
            .verify(&email, OtpPurpose::ForgetPassword, &code)
            .await?;

        let password = UserPassword::from_raw(
            &raw_password,
            self.config.pepper(),
            self.config.password_hashing,
        )?;
        self.user_repo
            .update_password(user.user_id, &password)
            .await?;

        let revoked = self
            .session_repo
            .delete_sessions_for_user(user.user_id)
            .await?;

        tracing::info!(user_id = %user.user_id, sessions_revoked = revoked, "Password reset");
        Ok(revoked)
    }
}
