//! Sign Up Use Case
//!
//! Creates a new user account, opens a session and (optionally) sends an
//! email-verification code.

use std::sync::Arc;

use chrono::Utc;
use platform::client::ClientInfo;
use platform::rate_limit::RateLimitStore;

use crate::application::config::AuthConfig;
use crate::application::otp::OtpService;
use crate::application::normalize_optional;
use crate::domain::entity::{Session, User, UserContact};
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::{SessionRepository, UserRepository, VerificationRepository};
use crate::domain::value_object::{
    email::Email,
    otp_purpose::OtpPurpose,
    user_name::UserName,
    user_password::{RawPassword, UserPassword},
};
use crate::error::{AuthError, AuthResult};

/// Sign up input
pub struct SignUpInput {
    pub user_name: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
    pub device_id: Option<String>,
    pub client: ClientInfo,
}

/// Sign up output
#[derive(Debug)]
pub struct SignUpOutput {
    pub user: User,
    pub session: Session,
    /// Whether the email-verification code was delivered
    pub verification_sent: bool,
}

/// Sign up use case
pub struct SignUpUseCase<U, S, V, M>
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

impl<U, S, V, M> SignUpUseCase<U, S, V, M>
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

    pub async fn execute(&self, input: SignUpInput) -> AuthResult<SignUpOutput> {
        // Validate everything before touching the store
        let user_name = UserName::new(&input.user_name)?;
        let email = Email::new(&input.email)?;
        let raw_password = RawPassword::new(input.password)?;
        let contact = UserContact {
            name: normalize_optional(input.name),
            phone_number: normalize_optional(input.phone_number),
            second_phone: normalize_optional(input.second_phone),
            device_id: normalize_optional(input.device_id),
        };

        if self.user_repo.user_name_exists(&user_name).await? {
            return Err(AuthError::UserNameTaken);
        }
        if self.user_repo.email_exists(&email).await? {
            return Err(AuthError::EmailTaken);
        }

        let password = UserPassword::from_raw(
            &raw_password,
            self.config.pepper(),
            self.config.password_hashing,
        )?;

        let now = Utc::now();
        let user = User::new(user_name, email, password, contact, now);

        // A concurrent sign-up may still win; the store's unique constraints
        // turn that into UserNameTaken / EmailTaken here
        self.user_repo.create_user(&user).await?;

        let session = Session::new(
            user.user_id,
            input.client.ip_string(),
            input.client.user_agent,
            self.config.session_ttl(),
            now,
        );
        self.session_repo.create_session(&session).await?;

        tracing::info!(
            user_id = %user.user_id,
            user_name = %user.user_name,
            "User signed up"
        );

        let verification_sent = if self.config.send_verification_on_sign_up {
            match self
                .otp
                .issue(&user.email, OtpPurpose::EmailVerification)
                .await
            {
                Ok(_) => true,
                Err(e) => {
                    // The account exists; the client can request another code
                    tracing::warn!(user_id = %user.user_id, error = %e, "Sign-up verification email not sent");
                    false
                }
            }
        } else {
            false
        };

        Ok(SignUpOutput {
            user,
            session,
            verification_sent,
        })
    }
}
