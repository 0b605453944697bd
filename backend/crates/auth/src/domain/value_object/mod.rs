//! Value Object Module

pub mod email;
pub mod otp_code;
pub mod otp_purpose;
pub mod session_token;
pub mod user_name;
pub mod user_password;
pub mod user_role;

pub use kernel::id::{SessionId, UserId, VerificationId};
