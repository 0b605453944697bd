//! OTP Issuance & Verification
//!
//! Per `(identifier, purpose)`:
//!
//! ```text
//! NoPending --issue--> Pending --verify ok--> Consumed
//!                         |---- expires_at <= now ----> Expired
//!                         '---- attempts > max -------> AttemptsExhausted
//! ```
//!
//! Codes are stored as `base64url(HMAC-SHA256(key, purpose:identifier:code))`.
//! Sends and verifications are both rate limited per `(purpose, email)`, so
//! requesting fresh codes does not buy extra guesses.
//! Every mutation is a single conditional statement in the store, so two
//! concurrent verifiers of the same correct code cannot both succeed.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use platform::crypto::{constant_time_eq, hmac_sha256, to_base64url};
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::throttle;
use crate::domain::entity::Verification;
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::VerificationRepository;
use crate::domain::value_object::{email::Email, otp_code::OtpCode, otp_purpose::OtpPurpose};
use crate::error::{AuthError, AuthResult};

/// Result of a successful issuance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct IssuedOtp {
    pub expires_at: DateTime<Utc>,
    /// Lifetime in seconds, as reported to clients
    pub expires_in: i64,
}

pub struct OtpService<V, M>
where
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    verification_repo: Arc<V>,
    mailer: Arc<M>,
    config: Arc<AuthConfig>,
}

impl<V, M> Clone for OtpService<V, M>
where
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    fn clone(&self) -> Self {
        Self {
            verification_repo: self.verification_repo.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<V, M> OtpService<V, M>
where
    V: VerificationRepository + RateLimitStore,
    M: EmailTransport,
{
    pub fn new(verification_repo: Arc<V>, mailer: Arc<M>, config: Arc<AuthConfig>) -> Self {
        Self {
            verification_repo,
            mailer,
            config,
        }
    }

    /// Generate, persist and deliver a new code
    ///
    /// Older pending codes stay in the store but are shadowed by this one;
    /// consuming or exhausting this code removes them too.
    pub async fn issue(&self, email: &Email, purpose: OtpPurpose) -> AuthResult<IssuedOtp> {
        self.issue_at(email, purpose, Utc::now()).await
    }

    pub async fn issue_at(
        &self,
        email: &Email,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> AuthResult<IssuedOtp> {
        self.throttle_issue(email, purpose, now).await?;

        let code = OtpCode::generate();
        let ttl = self.config.otp_ttl();
        let verification = Verification::new(
            email.as_str(),
            purpose,
            self.hash_code(email.as_str(), purpose, &code),
            ttl,
            now,
        );

        self.verification_repo
            .create_verification(&verification)
            .await?;

        self.mailer.send_otp(email, &code, purpose).await?;

        tracing::info!(
            verification_id = %verification.verification_id,
            purpose = %purpose,
            "OTP issued"
        );

        Ok(IssuedOtp {
            expires_at: verification.expires_at,
            expires_in: ttl.num_seconds(),
        })
    }

    /// Check a submitted code and consume it on success
    pub async fn verify(&self, email: &Email, purpose: OtpPurpose, code: &OtpCode) -> AuthResult<()> {
        self.verify_at(email, purpose, code, Utc::now()).await
    }

    pub async fn verify_at(
        &self,
        email: &Email,
        purpose: OtpPurpose,
        code: &OtpCode,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        throttle::enforce(
            self.verification_repo.as_ref(),
            &format!("otp-verify:{}", purpose.as_str()),
            email.as_str(),
            &self.config.otp_verify_rate_limit,
            now,
        )
        .await?;

        let Some(record) = self
            .verification_repo
            .find_latest_verification(email.as_str(), purpose, now)
            .await?
        else {
            return Err(AuthError::InvalidOrExpiredCode);
        };

        // Count the attempt before comparing, so a wrong guess always costs one
        let Some(attempts) = self
            .verification_repo
            .increment_verification_attempts(record.verification_id, now)
            .await?
        else {
            return Err(AuthError::InvalidOrExpiredCode);
        };

        if attempts > self.config.otp_max_attempts {
            // Older shadowed codes die with the exhausted one
            let invalidated = self
                .verification_repo
                .invalidate_verifications(email.as_str(), purpose, record.created_at)
                .await?;
            tracing::warn!(
                verification_id = %record.verification_id,
                attempts,
                invalidated,
                "OTP records invalidated after too many attempts"
            );
            return Err(AuthError::AttemptsExhausted);
        }

        let submitted = self.hash_code(email.as_str(), purpose, code);
        if !constant_time_eq(submitted.as_bytes(), record.value.as_bytes()) {
            tracing::debug!(verification_id = %record.verification_id, attempts, "OTP mismatch");
            return Err(AuthError::InvalidCode);
        }

        let consumed = self
            .verification_repo
            .consume_verification(record.verification_id, &record.value, now)
            .await?;
        if !consumed {
            // Lost the race to a concurrent verifier
            return Err(AuthError::InvalidOrExpiredCode);
        }

        tracing::info!(verification_id = %record.verification_id, purpose = %purpose, "OTP verified");
        Ok(())
    }

    /// Count one send against the `(purpose, email)` budget
    ///
    /// `issue_at` calls this itself; callers that decline to issue (unknown
    /// address on password reset) call it directly so both paths throttle alike.
    pub async fn throttle_issue(
        &self,
        email: &Email,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> AuthResult<()> {
        throttle::enforce(
            self.verification_repo.as_ref(),
            &format!("otp-issue:{}", purpose.as_str()),
            email.as_str(),
            &self.config.otp_send_rate_limit,
            now,
        )
        .await
    }

    fn hash_code(&self, identifier: &str, purpose: OtpPurpose, code: &OtpCode) -> String {
        let message = format!("{}:{}:{}", purpose.as_str(), identifier, code.as_str());
        to_base64url(&hmac_sha256(&self.config.otp_hashing_key(), message.as_bytes()))
    }
}
