//! Environment-driven server settings

use std::env;

use anyhow::{Context, bail};
use auth::{AuthConfig, Mailer, MailerConfig};
use auth::infra::{HttpEmailTransport, LogEmailTransport};
use platform::cors::CorsPolicy;
use platform::crypto::from_base64;

const DEFAULT_APP_URL: &str = "https://trusted-gamma.vercel.app";
const DEFAULT_PORT: u16 = 3000;

pub struct Settings {
    pub database_url: String,
    pub port: u16,
    pub production: bool,
    pub auth: AuthConfig,
    pub cors: CorsPolicy,
    pub mailer: Mailer,
}

impl Settings {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url =
            env::var("DATABASE_URL").context("DATABASE_URL must be set in environment")?;

        let production = match env::var("APP_ENV") {
            Ok(value) => value.eq_ignore_ascii_case("production"),
            Err(_) => !cfg!(debug_assertions),
        };

        let port = match env::var("PORT") {
            Ok(value) => value.parse().context("PORT must be a port number")?,
            Err(_) => DEFAULT_PORT,
        };

        Ok(Self {
            database_url,
            port,
            production,
            auth: auth_config(production)?,
            cors: cors_policy(production),
            mailer: mailer(production)?,
        })
    }
}

fn auth_config(production: bool) -> anyhow::Result<AuthConfig> {
    let mut config = match env::var("AUTH_SECRET") {
        Ok(secret_b64) => {
            let secret_bytes =
                from_base64(secret_b64.trim()).context("AUTH_SECRET must be base64")?;
            let secret: [u8; 32] = match secret_bytes.try_into() {
                Ok(secret) => secret,
                Err(bytes) => bail!("AUTH_SECRET must decode to 32 bytes, got {}", bytes.len()),
            };
            AuthConfig {
                secret,
                ..AuthConfig::default()
            }
        }
        Err(_) if production => bail!("AUTH_SECRET must be set in production"),
        Err(_) => {
            tracing::warn!("AUTH_SECRET not set, using a random secret; sessions will not survive restarts");
            AuthConfig::with_random_secret()
        }
    };

    config.cookie_secure = production;
    if !production {
        config.request_rate_limit = None;
    }
    config.password_pepper = env::var("AUTH_PASSWORD_PEPPER")
        .ok()
        .filter(|p| !p.is_empty())
        .map(String::into_bytes);

    Ok(config)
}

fn cors_policy(production: bool) -> CorsPolicy {
    let mut policy = CorsPolicy::new();

    if production {
        let app_url = env::var("APP_URL").unwrap_or_else(|_| DEFAULT_APP_URL.to_string());
        policy = policy.allow(&app_url).allow("https://*.vercel.app");

        if let Ok(vercel_url) = env::var("VERCEL_URL") {
            policy = policy.allow(&format!("https://{vercel_url}"));
        }
    } else {
        policy = policy.allow_localhost(true);
    }

    if let Ok(extra) = env::var("CORS_ALLOWED_ORIGINS") {
        policy = policy.allow_list(&extra);
    }

    policy
}

fn mailer(production: bool) -> anyhow::Result<Mailer> {
    let api_url = env::var("MAIL_API_URL").ok();
    let api_key = env::var("MAIL_API_KEY").ok();
    let sender_email = env::var("MAIL_SENDER_EMAIL").ok();

    let (Some(api_url), Some(api_key), Some(sender_email)) = (api_url, api_key, sender_email) else {
        if production {
            bail!("MAIL_API_URL, MAIL_API_KEY and MAIL_SENDER_EMAIL must be set in production");
        }
        tracing::warn!("Mail API not configured, OTP codes will be written to the log");
        return Ok(Mailer::Log(LogEmailTransport));
    };

    let mut config = MailerConfig::new(api_url, api_key, sender_email);
    if let Ok(sender_name) = env::var("MAIL_SENDER_NAME") {
        config.sender_name = sender_name;
    }

    let transport = HttpEmailTransport::new(config)
        .map_err(|e| anyhow::anyhow!("failed to build mail client: {e}"))?;
    Ok(Mailer::Http(transport))
}
