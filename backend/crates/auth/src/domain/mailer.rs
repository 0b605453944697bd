//! Email transport port
//!
//! Delivery of one-time passcodes. Implementations live in `infra::mailer`.

use crate::domain::value_object::{email::Email, otp_code::OtpCode, otp_purpose::OtpPurpose};
use crate::error::AuthResult;

/// Sends a code to an address for a purpose
///
/// Failures should be reported as `AuthError::EmailDelivery`.
#[trait_variant::make(EmailTransport: Send)]
pub trait LocalEmailTransport {
    async fn send_otp(&self, to: &Email, code: &OtpCode, purpose: OtpPurpose) -> AuthResult<()>;
}
