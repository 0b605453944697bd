//! Request throttling on top of `platform::rate_limit`

use chrono::{DateTime, Utc};
use platform::rate_limit::{RateLimitConfig, RateLimitStore};

use crate::error::{AuthError, AuthResult};

/// Count one request for `scope:subject` and fail once the window is full
///
/// Only `scope` is logged; subjects are emails, user names and addresses.
pub(crate) async fn enforce<L>(
    store: &L,
    scope: &str,
    subject: &str,
    config: &RateLimitConfig,
    now: DateTime<Utc>,
) -> AuthResult<()>
where
    L: RateLimitStore,
{
    let now_ms = now.timestamp_millis();
    let key = format!("{scope}:{subject}");

    let result = store
        .check_and_increment(&key, config, now_ms)
        .await
        .map_err(|e| AuthError::Internal(format!("rate limit store: {e}")))?;

    if !result.allowed {
        tracing::warn!(scope, max = config.max_requests, "Rate limit exceeded");
        return Err(AuthError::RateLimited {
            retry_after_secs: result.retry_after_secs(now_ms),
        });
    }

    Ok(())
}
