//! Procedure Handlers
//!
//! One handler per `auth.*` procedure. Inputs arrive as the raw JSON body,
//! outputs are wrapped in the `{"result":{"data":…}}` envelope and errors
//! use the kernel's procedure error envelope.

use std::sync::Arc;

use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{FromRequest, Request, State};
use axum::http::{HeaderValue, header};
use axum::response::{IntoResponse, Response};
use kernel::error::app_error::AppError;
use platform::cookie::sign_value;
use serde::de::DeserializeOwned;

use crate::application::config::AuthConfig;
use crate::application::guard::protected;
use crate::application::{
    EmailVerificationUseCase, OtpService, PasswordResetUseCase, ProfileUseCase,
    ResetPasswordInput, SignInInput, SignInUseCase, SignOutUseCase, SignUpInput, SignUpUseCase,
    UpdateProfileInput, VerifyEmailOutcome,
};
use crate::domain::entity::Session;
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::AuthStore;
use crate::error::{AuthError, AuthResult};
use crate::presentation::dto::{
    EmailRequest, IssuedSessionResponse, MeResponse, MessageResponse, ProcedureOutput,
    ResetPasswordRequest, SendOtpResponse, SessionResponse, SignInRequest, SignInResponse,
    SignUpRequest, SignUpResponse, UpdateProfileRequest, UpdateProfileResponse, UserResponse,
    VerifyEmailRequest,
};
use crate::presentation::middleware::{Authenticated, Ctx};

/// Shared state for auth handlers
pub struct AuthAppState<R, M>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    pub repo: Arc<R>,
    pub mailer: Arc<M>,
    pub config: Arc<AuthConfig>,
}

impl<R, M> Clone for AuthAppState<R, M>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    fn clone(&self) -> Self {
        Self {
            repo: self.repo.clone(),
            mailer: self.mailer.clone(),
            config: self.config.clone(),
        }
    }
}

impl<R, M> AuthAppState<R, M>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    pub fn new(repo: R, mailer: M, config: AuthConfig) -> Self {
        Self {
            repo: Arc::new(repo),
            mailer: Arc::new(mailer),
            config: Arc::new(config),
        }
    }

    fn otp(&self) -> OtpService<R, M> {
        OtpService::new(self.repo.clone(), self.mailer.clone(), self.config.clone())
    }

    /// `Set-Cookie` value carrying the signed session token
    fn session_cookie(&self, session: &Session) -> Option<HeaderValue> {
        let signed = sign_value(session.token.as_str(), &self.config.cookie_signing_key());
        self.config.session_cookie().set_cookie_header(&signed)
    }

    fn clear_cookie(&self) -> Option<HeaderValue> {
        self.config.session_cookie().delete_cookie_header()
    }
}

/// JSON procedure input; malformed bodies become `BAD_REQUEST`
pub struct ProcedureInput<T>(pub T);

impl<S, T> FromRequest<S> for ProcedureInput<T>
where
    S: Send + Sync,
    T: DeserializeOwned,
{
    type Rejection = AuthError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(ProcedureInput(value)),
            Err(rejection) => Err(input_error(rejection)),
        }
    }
}

fn input_error(rejection: JsonRejection) -> AuthError {
    AuthError::Validation(AppError::bad_request(rejection.body_text()).with_source(rejection))
}

fn ok<T: serde::Serialize>(data: T) -> Response {
    Json(ProcedureOutput::new(data)).into_response()
}

fn with_cookie(mut response: Response, cookie: Option<HeaderValue>) -> Response {
    if let Some(cookie) = cookie {
        response.headers_mut().append(header::SET_COOKIE, cookie);
    }
    response
}

// ============================================================================
// Sign Up
// ============================================================================

/// POST auth.signUp
pub async fn sign_up<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Ctx(ctx): Ctx,
    ProcedureInput(req): ProcedureInput<SignUpRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = SignUpUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.otp(),
        state.config.clone(),
    );

    let output = use_case
        .execute(SignUpInput {
            user_name: req.username,
            email: req.email,
            password: req.password,
            name: req.name,
            phone_number: req.phone_number,
            second_phone: req.second_phone,
            device_id: req.device_id,
            client: ctx.client,
        })
        .await?;

    let message = if output.verification_sent {
        "Account created. Check your email for a verification code"
    } else {
        "Account created"
    };

    let response = ok(SignUpResponse {
        success: true,
        message: message.to_string(),
        user: UserResponse::from(&output.user),
        session: IssuedSessionResponse::from(&output.session),
        verification_sent: output.verification_sent,
    });
    Ok(with_cookie(response, state.session_cookie(&output.session)))
}

// ============================================================================
// Sign In
// ============================================================================

/// POST auth.signIn
pub async fn sign_in<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Ctx(ctx): Ctx,
    ProcedureInput(req): ProcedureInput<SignInRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = SignInUseCase::new(state.repo.clone(), state.repo.clone(), state.config.clone());

    let output = use_case
        .execute(SignInInput {
            user_name: req.username,
            password: req.password,
            device_id: req.device_id,
            client: ctx.client,
        })
        .await?;

    let response = ok(SignInResponse {
        success: true,
        message: "Signed in".to_string(),
        user: UserResponse::from(&output.user),
        session: IssuedSessionResponse::from(&output.session),
    });
    Ok(with_cookie(response, state.session_cookie(&output.session)))
}

// ============================================================================
// Email Verification
// ============================================================================

/// POST auth.sendEmailVerificationOTP
pub async fn send_email_verification_otp<R, M>(
    State(state): State<AuthAppState<R, M>>,
    ProcedureInput(req): ProcedureInput<EmailRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = EmailVerificationUseCase::new(state.repo.clone(), state.otp());
    let (email, issued) = use_case.send(&req.email).await?;

    Ok(ok(SendOtpResponse {
        success: true,
        message: "Verification code sent".to_string(),
        email: email.as_str().to_string(),
        expires_in: issued.expires_in,
    }))
}

/// POST auth.verifyEmailOTP
pub async fn verify_email_otp<R, M>(
    State(state): State<AuthAppState<R, M>>,
    ProcedureInput(req): ProcedureInput<VerifyEmailRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = EmailVerificationUseCase::new(state.repo.clone(), state.otp());

    let message = match use_case.verify(&req.email, &req.otp).await? {
        VerifyEmailOutcome::Verified => "Email verified",
        VerifyEmailOutcome::AlreadyVerified => "Email is already verified",
    };

    Ok(ok(MessageResponse::ok(message)))
}

// ============================================================================
// Profile (requires authentication)
// ============================================================================

/// GET auth.getMe
pub async fn get_me<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Authenticated(identity): Authenticated,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let user = ProfileUseCase::new(state.repo.clone())
        .get_me(&identity)
        .await?;

    Ok(ok(MeResponse {
        user: UserResponse::from(&user),
        session: SessionResponse::from(&identity.session),
    }))
}

/// POST auth.updateProfile
///
/// The gate runs before the body is parsed, so anonymous callers get
/// `UNAUTHORIZED` whatever they send.
pub async fn update_profile<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Authenticated(identity): Authenticated,
    ProcedureInput(req): ProcedureInput<UpdateProfileRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = ProfileUseCase::new(state.repo.clone());

    let input = UpdateProfileInput {
        name: req.name,
        phone_number: req.phone_number,
        second_phone: req.second_phone,
    };
    let user = use_case.update(&identity, input).await?;

    Ok(ok(UpdateProfileResponse {
        success: true,
        message: "Profile updated".to_string(),
        user: UserResponse::from(&user),
    }))
}

/// POST auth.signOut
pub async fn sign_out<R, M>(
    State(state): State<AuthAppState<R, M>>,
    Ctx(ctx): Ctx,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = SignOutUseCase::new(state.repo.clone());

    protected(&ctx, |identity| async move { use_case.execute(&identity).await }).await?;

    Ok(with_cookie(
        ok(MessageResponse::ok("Signed out")),
        state.clear_cookie(),
    ))
}

// ============================================================================
// Password Reset
// ============================================================================

/// POST auth.sendPasswordResetOTP
///
/// Answers identically whether or not the address has an account.
pub async fn send_password_reset_otp<R, M>(
    State(state): State<AuthAppState<R, M>>,
    ProcedureInput(req): ProcedureInput<EmailRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = PasswordResetUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.otp(),
        state.config.clone(),
    );
    let email = use_case.send(&req.email).await?;

    Ok(ok(SendOtpResponse {
        success: true,
        message: "If the address is registered, a reset code has been sent".to_string(),
        email: email.as_str().to_string(),
        expires_in: state.config.otp_ttl().num_seconds(),
    }))
}

/// POST auth.resetPassword
pub async fn reset_password<R, M>(
    State(state): State<AuthAppState<R, M>>,
    ProcedureInput(req): ProcedureInput<ResetPasswordRequest>,
) -> AuthResult<Response>
where
    R: AuthStore,
    M: EmailTransport + Send + Sync + 'static,
{
    let use_case = PasswordResetUseCase::new(
        state.repo.clone(),
        state.repo.clone(),
        state.otp(),
        state.config.clone(),
    );

    use_case
        .reset(ResetPasswordInput {
            email: req.email,
            otp: req.otp,
            password: req.password,
        })
        .await?;

    Ok(with_cookie(
        ok(MessageResponse::ok("Password has been reset. Please sign in again")),
        state.clear_cookie(),
    ))
}
