//! Verification Entity
//!
//! A pending one-time passcode. Only the keyed hash of the code is stored.

use chrono::{DateTime, Duration, Utc};

use crate::domain::value_object::{VerificationId, otp_purpose::OtpPurpose};

#[derive(Debug, Clone)]
pub struct Verification {
    pub verification_id: VerificationId,
    /// Email address the code was sent to
    pub identifier: String,
    pub purpose: OtpPurpose,
    /// base64url HMAC-SHA256 of the code
    pub value: String,
    pub attempts: i32,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl Verification {
    pub fn new(
        identifier: impl Into<String>,
        purpose: OtpPurpose,
        value: String,
        ttl: Duration,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            verification_id: VerificationId::new(),
            identifier: identifier.into(),
            purpose,
            value,
            attempts: 0,
            expires_at: now + ttl,
            created_at: now,
        }
    }

    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
