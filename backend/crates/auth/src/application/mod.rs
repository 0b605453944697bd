//! Application Layer
//!
//! Use cases and application services.

pub mod config;
pub mod email_verification;
pub mod guard;
pub mod otp;
pub mod password_reset;
pub mod profile;
pub mod session_resolver;
pub mod sign_in;
pub mod sign_out;
pub mod sign_up;
pub(crate) mod throttle;

// Re-exports
pub use config::AuthConfig;
pub use email_verification::{EmailVerificationUseCase, VerifyEmailOutcome};
pub use guard::{RequestContext, protected};
pub use otp::{IssuedOtp, OtpService};
pub use password_reset::{PasswordResetUseCase, ResetPasswordInput};
pub use profile::{ProfileUseCase, UpdateProfileInput};
pub use session_resolver::SessionResolver;
pub use sign_in::{SignInInput, SignInOutput, SignInUseCase};
pub use sign_out::SignOutUseCase;
pub use sign_up::{SignUpInput, SignUpOutput, SignUpUseCase};

/// Trim optional free-text input; blank strings count as absent
pub(crate) fn normalize_optional(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
