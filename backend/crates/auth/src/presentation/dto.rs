//! API DTOs (Data Transfer Objects)
//!
//! Procedure inputs and outputs, camelCase on the wire.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::entity::{Session, SessionSnapshot, User};
use crate::domain::value_object::{SessionId, UserId};

// ============================================================================
// Envelope
// ============================================================================

/// Successful procedure result: `{"result":{"data":…}}`
#[derive(Debug, Clone, Serialize)]
pub struct ProcedureOutput<T> {
    pub result: ProcedureData<T>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ProcedureData<T> {
    pub data: T,
}

impl<T> ProcedureOutput<T> {
    pub fn new(data: T) -> Self {
        Self {
            result: ProcedureData { data },
        }
    }
}

// ============================================================================
// Requests
// ============================================================================

/// auth.signUp
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpRequest {
    pub username: String,
    pub email: String,
    pub password: String,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
    pub device_id: Option<String>,
}

/// auth.signIn
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInRequest {
    pub username: String,
    pub password: String,
    pub device_id: Option<String>,
}

/// auth.sendEmailVerificationOTP, auth.sendPasswordResetOTP
#[derive(Debug, Clone, Deserialize)]
pub struct EmailRequest {
    pub email: String,
}

/// auth.verifyEmailOTP
#[derive(Debug, Clone, Deserialize)]
pub struct VerifyEmailRequest {
    pub email: String,
    pub otp: String,
}

/// auth.updateProfile
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateProfileRequest {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
}

/// auth.resetPassword
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub email: String,
    pub otp: String,
    pub password: String,
}

// ============================================================================
// Responses
// ============================================================================

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub email_verified: bool,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
    pub device_id: Option<String>,
    pub role: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<&User> for UserResponse {
    fn from(user: &User) -> Self {
        Self {
            id: user.user_id,
            username: user.user_name.original().to_string(),
            email: user.email.as_str().to_string(),
            email_verified: user.email_verified,
            name: user.name.clone(),
            phone_number: user.phone_number.clone(),
            second_phone: user.second_phone.clone(),
            device_id: user.device_id.clone(),
            role: user.role.code().to_string(),
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionResponse {
    pub id: SessionId,
    pub expires_at: DateTime<Utc>,
    pub ip_address: Option<String>,
    pub user_agent: Option<String>,
}

impl From<&SessionSnapshot> for SessionResponse {
    fn from(session: &SessionSnapshot) -> Self {
        Self {
            id: session.id,
            expires_at: session.expires_at,
            ip_address: session.ip_address.clone(),
            user_agent: session.user_agent.clone(),
        }
    }
}

/// Session handed out at sign-in / sign-up; `token` is usable as a bearer credential
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IssuedSessionResponse {
    pub id: SessionId,
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

impl From<&Session> for IssuedSessionResponse {
    fn from(session: &Session) -> Self {
        Self {
            id: session.session_id,
            token: session.token.as_str().to_string(),
            expires_at: session.expires_at,
        }
    }
}

/// auth.signUp
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignUpResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
    pub session: IssuedSessionResponse,
    pub verification_sent: bool,
}

/// auth.signIn
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SignInResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
    pub session: IssuedSessionResponse,
}

/// OTP dispatch acknowledgement
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendOtpResponse {
    pub success: bool,
    pub message: String,
    pub email: String,
    /// Seconds until the code expires
    pub expires_in: i64,
}

/// auth.getMe
#[derive(Debug, Clone, Serialize)]
pub struct MeResponse {
    pub user: UserResponse,
    pub session: SessionResponse,
}

/// auth.updateProfile
#[derive(Debug, Clone, Serialize)]
pub struct UpdateProfileResponse {
    pub success: bool,
    pub message: String,
    pub user: UserResponse,
}

/// Plain acknowledgement
#[derive(Debug, Clone, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

impl MessageResponse {
    pub fn ok(message: impl Into<String>) -> Self {
        Self {
            success: true,
            message: message.into(),
        }
    }
}
