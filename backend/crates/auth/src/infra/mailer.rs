//! Email transports
//!
//! - [`HttpEmailTransport`]: JSON mail API (Brevo-compatible `smtp/email` body)
//! - [`LogEmailTransport`]: writes codes to the log, for local development
//! - [`Mailer`]: runtime choice between the two

use std::time::Duration;

use reqwest::Client;
use serde::Serialize;

use crate::domain::mailer::EmailTransport;
use crate::domain::value_object::{email::Email, otp_code::OtpCode, otp_purpose::OtpPurpose};
use crate::error::{AuthError, AuthResult};

const USER_AGENT: &str = concat!("trusted-auth/", env!("CARGO_PKG_VERSION"));

/// Mail API settings
#[derive(Debug, Clone)]
pub struct MailerConfig {
    pub api_url: String,
    pub api_key: String,
    pub sender_email: String,
    pub sender_name: String,
    pub timeout: Duration,
}

impl MailerConfig {
    pub fn new(api_url: String, api_key: String, sender_email: String) -> Self {
        Self {
            api_url,
            api_key,
            sender_email,
            sender_name: "Trusted".to_string(),
            timeout: Duration::from_secs(10),
        }
    }
}

// ============================================================================
// Message content
// ============================================================================

/// Rendered OTP message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpMessage {
    pub subject: &'static str,
    pub html: String,
    pub text: String,
}

/// Render the email for a code and purpose
pub fn render_otp_message(code: &OtpCode, purpose: OtpPurpose) -> OtpMessage {
    let intro = match purpose {
        OtpPurpose::EmailVerification => "Use the code below to verify your email address.",
        OtpPurpose::SignIn => "Use the code below to sign in to your account.",
        OtpPurpose::ForgetPassword => "Use the code below to reset your password.",
    };
    let code = code.as_str();

    let html = format!(
        r#"<div style="font-family: sans-serif; max-width: 480px; margin: 0 auto;">
  <h2>{subject}</h2>
  <p>{intro}</p>
  <p style="font-size: 32px; font-weight: bold; letter-spacing: 8px;">{code}</p>
  <p>This code expires in 5 minutes. If you did not request it, you can ignore this email.</p>
</div>"#,
        subject = purpose.subject(),
    );
    let text = format!(
        "{intro}\n\n{code}\n\nThis code expires in 5 minutes. If you did not request it, you can ignore this email."
    );

    OtpMessage {
        subject: purpose.subject(),
        html,
        text,
    }
}

// ============================================================================
// HTTP transport
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress<'a> {
    email: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    name: Option<&'a str>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SendEmailBody<'a> {
    sender: EmailAddress<'a>,
    to: Vec<EmailAddress<'a>>,
    subject: &'a str,
    html_content: &'a str,
    text_content: &'a str,
}

/// Sends mail through an HTTP API with an `api-key` header
#[derive(Debug, Clone)]
pub struct HttpEmailTransport {
    client: Client,
    config: MailerConfig,
}

impl HttpEmailTransport {
    pub fn new(config: MailerConfig) -> AuthResult<Self> {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .timeout(config.timeout)
            .build()
            .map_err(|e| AuthError::Internal(format!("Failed to build mail client: {e}")))?;

        Ok(Self { client, config })
    }
}

impl EmailTransport for HttpEmailTransport {
    async fn send_otp(&self, to: &Email, code: &OtpCode, purpose: OtpPurpose) -> AuthResult<()> {
        let message = render_otp_message(code, purpose);
        let body = SendEmailBody {
            sender: EmailAddress {
                email: &self.config.sender_email,
                name: Some(&self.config.sender_name),
            },
            to: vec![EmailAddress {
                email: to.as_str(),
                name: None,
            }],
            subject: message.subject,
            html_content: &message.html,
            text_content: &message.text,
        };

        let response = self
            .client
            .post(&self.config.api_url)
            .header("api-key", &self.config.api_key)
            .header("accept", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| AuthError::EmailDelivery(e.to_string()))?;

        let status = response.status();
        if status.is_success() {
            tracing::debug!(purpose = %purpose, "OTP email accepted by mail API");
            return Ok(());
        }

        let detail = response.text().await.unwrap_or_default();
        Err(AuthError::EmailDelivery(format!(
            "mail API returned {status}: {detail}"
        )))
    }
}

// ============================================================================
// Log transport
// ============================================================================

/// Logs codes instead of sending them. Never use in production.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogEmailTransport;

impl EmailTransport for LogEmailTransport {
    async fn send_otp(&self, to: &Email, code: &OtpCode, purpose: OtpPurpose) -> AuthResult<()> {
        tracing::info!(
            to = %to,
            purpose = %purpose,
            code = code.as_str(),
            "OTP email (log transport)"
        );
        Ok(())
    }
}

// ============================================================================
// Runtime selection
// ============================================================================

/// Transport chosen from configuration at startup
#[derive(Debug, Clone)]
pub enum Mailer {
    Http(HttpEmailTransport),
    Log(LogEmailTransport),
}

impl EmailTransport for Mailer {
    async fn send_otp(&self, to: &Email, code: &OtpCode, purpose: OtpPurpose) -> AuthResult<()> {
        match self {
            Mailer::Http(transport) => transport.send_otp(to, code, purpose).await,
            Mailer::Log(transport) => transport.send_otp(to, code, purpose).await,
        }
    }
}
