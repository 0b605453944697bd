//! Email Verification Use Case
//!
//! Sends and checks `email-verification` codes. A user whose email is
//! already verified is told so on send, and succeeds without a code check
//! on verify.

use std::sync::Arc;

use platform::rate_limit::RateLimitStore;

use crate::application::otp::{IssuedOtp, OtpService};
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::{UserRepository, VerificationRepository};
use crate::domain::value_object::{email::Email, otp_code::OtpCode, otp_purpose::OtpPurpose};
use crate::error::{AuthError, AuthResult};

/// Outcome of `verify`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyEmailOutcome {
    Verified,
    AlreadyVerified,
}

pub struct EmailVerificationUseCase<U, V, M>
where
    U: UserRepository,
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    user_repo: Arc<U>,
    otp: OtpService<V, M>,
}

impl<U, V, M> EmailVerificationUseCase<U, V, M>
where
    U: UserRepository,
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    pub fn new(user_repo: Arc<U>, otp: OtpService<V, M>) -> Self {
        Self { user_repo, otp }
    }

    pub async fn send(&self, email: &str) -> AuthResult<(Email, IssuedOtp)> {
        let email = Email::new(email)?;

        let user = self
            .user_repo
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Err(AuthError::EmailAlreadyVerified);
        }

        let issued = self.otp.issue(&email, OtpPurpose::EmailVerification).await?;
        Ok((email, issued))
    }

    pub async fn verify(&self, email: &str, otp: &str) -> AuthResult<VerifyEmailOutcome> {
        let email = Email::new(email)?;
        let code = OtpCode::parse(otp)?;

        let user = self
            .user_repo
            .find_user_by_email(&email)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        if user.email_verified {
            return Ok(VerifyEmailOutcome::AlreadyVerified);
        }

        self.otp
            .verify(&email, OtpPurpose::EmailVerification, &code)
            .await?;
        self.user_repo.mark_email_verified(user.user_id).await?;

        tracing::info!(user_id = %user.user_id, "Email verified");
        Ok(VerifyEmailOutcome::Verified)
    }
}
