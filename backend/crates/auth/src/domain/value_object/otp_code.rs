//! One-time passcode
//!
//! Six decimal digits drawn uniformly from `000000..=999999`.

use kernel::error::app_error::{AppError, AppResult};
use rand::Rng;
use std::fmt;

/// Number of digits in a code
pub const OTP_LENGTH: usize = 6;

const OTP_SPACE: u32 = 1_000_000;

/// A six-digit code, either freshly generated or parsed from user input
#[derive(Clone, PartialEq, Eq)]
pub struct OtpCode(String);

impl OtpCode {
    /// Generate a code from the thread-local CSPRNG
    pub fn generate() -> Self {
        let n: u32 = rand::rng().random_range(0..OTP_SPACE);
        Self(format!("{:0width$}", n, width = OTP_LENGTH))
    }

    /// Parse user input; surrounding whitespace is ignored
    pub fn parse(input: &str) -> AppResult<Self> {
        let code = input.trim();
        if code.len() != OTP_LENGTH || !code.chars().all(|c| c.is_ascii_digit()) {
            return Err(AppError::bad_request("OTP must be exactly 6 digits")
                .with_reason("INVALID_OTP"));
        }
        Ok(Self(code.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for OtpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("OtpCode").field(&"[REDACTED]").finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generated_codes_are_six_digits() {
        for _ in 0..1_000 {
            let code = OtpCode::generate();
            assert_eq!(code.as_str().len(), OTP_LENGTH);
            assert!(code.as_str().chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_leading_zeros_kept() {
        assert_eq!(OtpCode::parse("000042").unwrap().as_str(), "000042");
    }

    #[test]
    fn test_parse_rejects_malformed() {
        for bad in ["", "12345", "1234567", "12a456", "１２３４５６"] {
            let err = OtpCode::parse(bad).unwrap_err();
            assert_eq!(err.status_code(), 400, "{bad:?}");
        }
        assert_eq!(OtpCode::parse(" 123456 ").unwrap().as_str(), "123456");
    }
}
