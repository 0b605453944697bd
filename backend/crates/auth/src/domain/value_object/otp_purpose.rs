use derive_more::Display;

/// What a one-time passcode authorizes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display)]
pub enum OtpPurpose {
    #[display("email-verification")]
    EmailVerification,
    #[display("sign-in")]
    SignIn,
    #[display("forget-password")]
    ForgetPassword,
}

impl OtpPurpose {
    pub const fn as_str(&self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "email-verification",
            OtpPurpose::SignIn => "sign-in",
            OtpPurpose::ForgetPassword => "forget-password",
        }
    }

    pub fn from_code(code: &str) -> Option<Self> {
        match code {
            "email-verification" => Some(OtpPurpose::EmailVerification),
            "sign-in" => Some(OtpPurpose::SignIn),
            "forget-password" => Some(OtpPurpose::ForgetPassword),
            _ => None,
        }
    }

    /// Email subject line
    pub const fn subject(&self) -> &'static str {
        match self {
            OtpPurpose::EmailVerification => "Verify Your Email Address",
            OtpPurpose::SignIn => "Your Sign-In OTP Code",
            OtpPurpose::ForgetPassword => "Password Reset OTP",
        }
    }
}
