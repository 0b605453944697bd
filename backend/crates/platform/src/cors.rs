//! CORS policy
//!
//! A declarative origin allow-list evaluated once per request by a single
//! `CorsLayer`. Supports exact origins, `https://*.example.com` subdomain
//! wildcards and any-port loopback origins for local development.

use axum::http::{HeaderName, HeaderValue, Method, header, request::Parts};
use tower_http::cors::{AllowOrigin, CorsLayer};

/// Origin allow-list
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CorsPolicy {
    exact: Vec<String>,
    /// Suffixes such as `.vercel.app`, each paired with its required scheme
    wildcard: Vec<(String, String)>,
    allow_localhost: bool,
}

impl CorsPolicy {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add an origin pattern
    ///
    /// `https://*.vercel.app` matches any subdomain over https; anything
    /// else must match exactly. Trailing slashes are ignored.
    pub fn allow(mut self, pattern: &str) -> Self {
        let pattern = pattern.trim().trim_end_matches('/');
        if pattern.is_empty() {
            return self;
        }
        match pattern.split_once("://*") {
            Some((scheme, suffix)) if suffix.starts_with('.') => {
                self.wildcard
                    .push((scheme.to_ascii_lowercase(), suffix.to_ascii_lowercase()));
            }
            _ => self.exact.push(pattern.to_ascii_lowercase()),
        }
        self
    }

    /// Add every comma-separated pattern in `list`
    pub fn allow_list(self, list: &str) -> Self {
        list.split(',').fold(self, |policy, p| policy.allow(p))
    }

    /// Accept `http://localhost:<any>` and `http://127.0.0.1:<any>`
    pub fn allow_localhost(mut self, enabled: bool) -> Self {
        self.allow_localhost = enabled;
        self
    }

    pub fn is_allowed(&self, origin: &str) -> bool {
        let origin = origin.trim_end_matches('/').to_ascii_lowercase();

        if self.exact.iter().any(|o| *o == origin) {
            return true;
        }

        let Some((scheme, host)) = origin.split_once("://") else {
            return false;
        };

        if self.allow_localhost && is_loopback_host(scheme, host) {
            return true;
        }

        let host_only = host.split(':').next().unwrap_or(host);
        self.wildcard.iter().any(|(s, suffix)| {
            s == scheme && host_only.len() > suffix.len() && host_only.ends_with(suffix.as_str())
        })
    }

    /// Build the single CORS layer applied to the whole router
    ///
    /// Credentials are allowed, so methods and headers are listed explicitly.
    pub fn into_layer(self) -> CorsLayer {
        CorsLayer::new()
            .allow_origin(AllowOrigin::predicate(
                move |origin: &HeaderValue, _parts: &Parts| {
                    origin.to_str().map(|o| self.is_allowed(o)).unwrap_or(false)
                },
            ))
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PUT,
                Method::DELETE,
                Method::PATCH,
                Method::OPTIONS,
            ])
            .allow_headers([
                header::CONTENT_TYPE,
                header::AUTHORIZATION,
                header::ACCEPT,
                header::COOKIE,
                HeaderName::from_static("x-trpc-source"),
            ])
            .allow_credentials(true)
    }
}

fn is_loopback_host(scheme: &str, host: &str) -> bool {
    if scheme != "http" && scheme != "https" {
        return false;
    }
    let (name, port) = match host.rsplit_once(':') {
        Some((name, port)) => (name, Some(port)),
        None => (host, None),
    };
    let port_ok = port.is_none_or(|p| !p.is_empty() && p.chars().all(|c| c.is_ascii_digit()));
    port_ok && (name == "localhost" || name == "127.0.0.1")
}

#[cfg(test)]
mod tests {
    use super::*;

    fn production() -> CorsPolicy {
        CorsPolicy::new()
            .allow("https://trusted-gamma.vercel.app/")
            .allow("https://*.vercel.app")
    }

    #[test]
    fn test_exact_origin() {
        let policy = production();
        assert!(policy.is_allowed("https://trusted-gamma.vercel.app"));
        assert!(!policy.is_allowed("http://trusted-gamma.vercel.app.evil.com"));
    }

    #[test]
    fn test_wildcard_subdomain() {
        let policy = production();
        assert!(policy.is_allowed("https://preview-123.vercel.app"));
        assert!(!policy.is_allowed("http://preview-123.vercel.app"));
        assert!(!policy.is_allowed("https://vercel.app"));
        assert!(!policy.is_allowed("https://evilvercel.app"));
        assert!(!policy.is_allowed("https://vercel.app.evil.com"));
    }

    #[test]
    fn test_localhost_only_when_enabled() {
        assert!(!production().is_allowed("http://localhost:3000"));

        let dev = CorsPolicy::new().allow_localhost(true);
        assert!(dev.is_allowed("http://localhost:3000"));
        assert!(dev.is_allowed("http://127.0.0.1:5173"));
        assert!(dev.is_allowed("http://localhost"));
        assert!(!dev.is_allowed("http://localhost.evil.com:3000"));
        assert!(!dev.is_allowed("http://localhost:abc"));
    }

    #[test]
    fn test_allow_list_skips_blanks() {
        let policy = CorsPolicy::new().allow_list("https://a.example, ,https://b.example");
        assert!(policy.is_allowed("https://a.example"));
        assert!(policy.is_allowed("https://b.example"));
        assert!(!policy.is_allowed(""));
    }
}
