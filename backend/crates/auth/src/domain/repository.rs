//! Repository Traits
//!
//! Interfaces for data persistence. Implementation is in infrastructure layer.
//!
//! Method names are unique across the traits so a single store type can
//! implement all of them and be used through one generic parameter.

use chrono::{DateTime, Utc};
use platform::rate_limit::RateLimitStore;

use crate::domain::entity::{ProfilePatch, Session, User, Verification};
use crate::domain::value_object::{
    SessionId, UserId, VerificationId, email::Email, otp_purpose::OtpPurpose,
    session_token::SessionToken, user_name::UserName, user_password::UserPassword,
};
use crate::error::AuthResult;

/// User repository trait
#[trait_variant::make(UserRepository: Send)]
pub trait LocalUserRepository {
    /// Insert a new user
    ///
    /// Unique violations map to `UserNameTaken` / `EmailTaken`.
    async fn create_user(&self, user: &User) -> AuthResult<()>;

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>>;

    /// Lookup by canonical (lowercase) user name
    async fn find_user_by_user_name(&self, user_name: &UserName) -> AuthResult<Option<User>>;

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>>;

    async fn user_name_exists(&self, user_name: &UserName) -> AuthResult<bool>;

    async fn email_exists(&self, email: &Email) -> AuthResult<bool>;

    async fn update_device_id(&self, user_id: UserId, device_id: &str) -> AuthResult<()>;

    /// Set `email_verified = true`; never resets it
    async fn mark_email_verified(&self, user_id: UserId) -> AuthResult<()>;

    /// Patch self-editable profile fields, returning the updated user
    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> AuthResult<Option<User>>;

    async fn update_password(&self, user_id: UserId, password: &UserPassword) -> AuthResult<()>;
}

/// Session repository trait
#[trait_variant::make(SessionRepository: Send)]
pub trait LocalSessionRepository {
    async fn create_session(&self, session: &Session) -> AuthResult<()>;

    /// Exact token match; expiry is checked by the caller
    async fn find_session_by_token(&self, token: &SessionToken) -> AuthResult<Option<Session>>;

    /// Returns whether a row was deleted
    async fn delete_session(&self, session_id: SessionId) -> AuthResult<bool>;

    async fn delete_sessions_for_user(&self, user_id: UserId) -> AuthResult<u64>;
}

/// Verification (OTP) repository trait
#[trait_variant::make(VerificationRepository: Send)]
pub trait LocalVerificationRepository {
    async fn create_verification(&self, verification: &Verification) -> AuthResult<()>;

    /// Newest record for `(identifier, purpose)` with `expires_at > now`
    async fn find_latest_verification(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Verification>>;

    /// Atomically increment the attempt counter of a live record
    ///
    /// Returns the new count, or `None` if the record is gone or expired.
    async fn increment_verification_attempts(
        &self,
        verification_id: VerificationId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<i32>>;

    /// Compare-and-delete: removes the record only if it still holds `value`
    /// and is unexpired. Returns whether this caller consumed it.
    ///
    /// On success every older record for the same `(identifier, purpose)` is
    /// deleted in the same statement.
    async fn consume_verification(
        &self,
        verification_id: VerificationId,
        value: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool>;

    /// Delete every record for `(identifier, purpose)` created at or before `up_to`
    async fn invalidate_verifications(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        up_to: DateTime<Utc>,
    ) -> AuthResult<u64>;
}

/// A store that backs every repository and the rate-limit counters;
/// what the HTTP layer is generic over
pub trait AuthStore:
    UserRepository
    + SessionRepository
    + VerificationRepository
    + RateLimitStore
    + Send
    + Sync
    + 'static
{
}

impl<T> AuthStore for T where
    T: UserRepository
        + SessionRepository
        + VerificationRepository
        + RateLimitStore
        + Send
        + Sync
        + 'static
{
}
