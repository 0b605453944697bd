//! Application Configuration
//!
//! Configuration for the Auth application layer.

use std::time::Duration;

use platform::cookie::CookieConfig;
use platform::crypto::hmac_sha256;
use platform::password::HashingParams;
use platform::rate_limit::RateLimitConfig;

/// Re-export SameSite from platform
pub use platform::cookie::SameSite;

/// Auth application configuration
#[derive(Debug, Clone)]
pub struct AuthConfig {
    /// Session cookie name
    pub session_cookie_name: String,
    /// Root secret (32 bytes). Cookie-signing and OTP-hashing keys are derived from it.
    pub secret: [u8; 32],
    /// Session lifetime (7 days)
    pub session_ttl: Duration,
    /// OTP lifetime (5 minutes)
    pub otp_ttl: Duration,
    /// Verification attempts allowed per code
    pub otp_max_attempts: i32,
    /// Issue an email-verification code right after sign-up
    pub send_verification_on_sign_up: bool,
    /// Whether to require Secure cookie
    pub cookie_secure: bool,
    /// SameSite policy
    pub cookie_same_site: SameSite,
    /// Password pepper (optional, application-wide secret)
    pub password_pepper: Option<Vec<u8>>,
    /// Argon2id cost for new password hashes
    pub password_hashing: HashingParams,
    /// Per client IP, across every procedure; `None` disables it
    pub request_rate_limit: Option<RateLimitConfig>,
    /// OTP sends per `(purpose, email)`
    pub otp_send_rate_limit: RateLimitConfig,
    /// OTP verifications per `(purpose, email)`, across every issued code
    pub otp_verify_rate_limit: RateLimitConfig,
    /// Sign-in attempts per user name
    pub sign_in_rate_limit: RateLimitConfig,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            session_cookie_name: "trusted.session_token".to_string(),
            secret: [0u8; 32],
            session_ttl: Duration::from_secs(7 * 24 * 3600), // 1 week
            otp_ttl: Duration::from_secs(300),
            otp_max_attempts: 3,
            send_verification_on_sign_up: true,
            cookie_secure: true,
            cookie_same_site: SameSite::Lax,
            password_pepper: None,
            password_hashing: HashingParams::default(),
            request_rate_limit: Some(RateLimitConfig::new(100, 60)),
            otp_send_rate_limit: RateLimitConfig::new(3, 60),
            otp_verify_rate_limit: RateLimitConfig::new(10, 600),
            sign_in_rate_limit: RateLimitConfig::new(10, 60),
        }
    }
}

impl AuthConfig {
    /// Create config with a random secret (for development)
    pub fn with_random_secret() -> Self {
        use rand::RngCore;
        let mut secret = [0u8; 32];
        rand::rng().fill_bytes(&mut secret);
        Self {
            secret,
            ..Default::default()
        }
    }

    /// Create config for development (insecure cookie, no per-IP limit)
    pub fn development() -> Self {
        Self {
            cookie_secure: false,
            request_rate_limit: None,
            ..Self::with_random_secret()
        }
    }

    /// Key for signing session cookies
    pub fn cookie_signing_key(&self) -> [u8; 32] {
        hmac_sha256(&self.secret, b"trusted/session-cookie")
    }

    /// Key for hashing OTP codes at rest
    pub fn otp_hashing_key(&self) -> [u8; 32] {
        hmac_sha256(&self.secret, b"trusted/otp")
    }

    pub fn session_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.session_ttl.as_secs() as i64)
    }

    pub fn otp_ttl(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.otp_ttl.as_secs() as i64)
    }

    /// Cookie settings for the session cookie (Max-Age = session TTL)
    pub fn session_cookie(&self) -> CookieConfig {
        CookieConfig {
            name: self.session_cookie_name.clone(),
            secure: self.cookie_secure,
            http_only: true,
            same_site: self.cookie_same_site,
            path: "/".to_string(),
            max_age_secs: Some(self.session_ttl.as_secs() as i64),
        }
    }

    /// Get password pepper as slice
    pub fn pepper(&self) -> Option<&[u8]> {
        self.password_pepper.as_deref()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = AuthConfig::default();
        assert_eq!(config.session_ttl(), chrono::Duration::days(7));
        assert_eq!(config.otp_ttl(), chrono::Duration::minutes(5));
        assert_eq!(config.otp_max_attempts, 3);
        assert!(config.send_verification_on_sign_up);
        assert_eq!(config.request_rate_limit, Some(RateLimitConfig::new(100, 60)));
        assert_eq!(config.otp_verify_rate_limit.max_requests, 10);
    }

    #[test]
    fn test_development_disables_ip_limit_only() {
        let config = AuthConfig::development();
        assert!(config.request_rate_limit.is_none());
        assert_eq!(config.otp_send_rate_limit, RateLimitConfig::new(3, 60));
        assert_eq!(config.sign_in_rate_limit, RateLimitConfig::new(10, 60));
    }

    #[test]
    fn test_derived_keys_differ() {
        let config = AuthConfig::with_random_secret();
        assert_ne!(config.cookie_signing_key(), config.otp_hashing_key());
        assert_ne!(config.secret, [0u8; 32]);
    }

    #[test]
    fn test_session_cookie() {
        let cookie = AuthConfig::development().session_cookie().build_set_cookie("t.s");
        assert!(cookie.starts_with("trusted.session_token=t.s"));
        assert!(cookie.contains("Max-Age=604800"));
        assert!(cookie.contains("HttpOnly"));
        assert!(!cookie.contains("Secure"));
    }
}
