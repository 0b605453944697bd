//! Crate-level tests for the auth pipeline
//! Backed by an in-memory store and a mailer that records every code it sends.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use platform::password::HashingParams;
use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore};

use crate::application::config::AuthConfig;
use crate::domain::entity::{ProfilePatch, Session, User, Verification};
use crate::domain::mailer::EmailTransport;
use crate::domain::repository::{SessionRepository, UserRepository, VerificationRepository};
use crate::domain::value_object::{
    SessionId, UserId, VerificationId, email::Email, otp_code::OtpCode, otp_purpose::OtpPurpose,
    session_token::SessionToken, user_name::UserName, user_password::UserPassword,
};
use crate::error::{AuthError, AuthResult};

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Default)]
struct MemoryState {
    users: Vec<User>,
    sessions: Vec<Session>,
    verifications: Vec<Verification>,
    rate_limits: HashMap<(String, i64), u32>,
}

/// Shared in-memory store; clones see the same state
///
/// With `yielding` set, verification reads and writes hand control back to
/// the runtime after touching the state, so concurrent verifiers interleave.
#[derive(Clone, Default)]
struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
    yielding: Arc<AtomicBool>,
}

impl MemoryStore {
    fn interleave(&self) {
        self.yielding.store(true, Ordering::SeqCst);
    }

    async fn maybe_yield(&self) {
        if self.yielding.load(Ordering::SeqCst) {
            tokio::task::yield_now().await;
        }
    }

    fn users(&self) -> Vec<User> {
        self.state.lock().unwrap().users.clone()
    }

    fn user_by_email(&self, email: &str) -> User {
        self.users()
            .into_iter()
            .find(|u| u.email.as_str() == email)
            .unwrap()
    }

    fn sessions_for(&self, user_id: UserId) -> Vec<Session> {
        self.state
            .lock()
            .unwrap()
            .sessions
            .iter()
            .filter(|s| s.user_id == user_id)
            .cloned()
            .collect()
    }

    fn verifications(&self) -> Vec<Verification> {
        self.state.lock().unwrap().verifications.clone()
    }

    fn remove_user(&self, user_id: UserId) {
        self.state
            .lock()
            .unwrap()
            .users
            .retain(|u| u.user_id != user_id);
    }
}

impl UserRepository for MemoryStore {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        let mut state = self.state.lock().unwrap();
        if state
            .users
            .iter()
            .any(|u| u.user_name.canonical() == user.user_name.canonical())
        {
            return Err(AuthError::UserNameTaken);
        }
        if state.users.iter().any(|u| u.email == user.email) {
            return Err(AuthError::EmailTaken);
        }
        state.users.push(user.clone());
        Ok(())
    }

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| u.user_id == user_id).cloned())
    }

    async fn find_user_by_user_name(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state
            .users
            .iter()
            .find(|u| u.user_name.canonical() == user_name.canonical())
            .cloned())
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let state = self.state.lock().unwrap();
        Ok(state.users.iter().find(|u| &u.email == email).cloned())
    }

    async fn user_name_exists(&self, user_name: &UserName) -> AuthResult<bool> {
        Ok(self.find_user_by_user_name(user_name).await?.is_some())
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        Ok(self.find_user_by_email(email).await?.is_some())
    }

    async fn update_device_id(&self, user_id: UserId, device_id: &str) -> AuthResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.user_id == user_id) {
            user.device_id = Some(device_id.to_string());
        }
        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AuthResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.user_id == user_id) {
            user.email_verified = true;
        }
        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> AuthResult<Option<User>> {
        let mut state = self.state.lock().unwrap();
        let Some(user) = state.users.iter_mut().find(|u| u.user_id == user_id) else {
            return Ok(None);
        };
        user.apply_patch(patch, Utc::now());
        Ok(Some(user.clone()))
    }

    async fn update_password(&self, user_id: UserId, password: &UserPassword) -> AuthResult<()> {
        let mut state = self.state.lock().unwrap();
        if let Some(user) = state.users.iter_mut().find(|u| u.user_id == user_id) {
            user.password = password.clone();
        }
        Ok(())
    }
}

impl SessionRepository for MemoryStore {
    async fn create_session(&self, session: &Session) -> AuthResult<()> {
        self.state.lock().unwrap().sessions.push(session.clone());
        Ok(())
    }

    async fn find_session_by_token(&self, token: &SessionToken) -> AuthResult<Option<Session>> {
        let state = self.state.lock().unwrap();
        Ok(state.sessions.iter().find(|s| &s.token == token).cloned())
    }

    async fn delete_session(&self, session_id: SessionId) -> AuthResult<bool> {
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.session_id != session_id);
        Ok(state.sessions.len() < before)
    }

    async fn delete_sessions_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.sessions.len();
        state.sessions.retain(|s| s.user_id != user_id);
        Ok((before - state.sessions.len()) as u64)
    }
}

impl VerificationRepository for MemoryStore {
    async fn create_verification(&self, verification: &Verification) -> AuthResult<()> {
        self.state
            .lock()
            .unwrap()
            .verifications
            .push(verification.clone());
        Ok(())
    }

    async fn find_latest_verification(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Verification>> {
        let latest = {
            let state = self.state.lock().unwrap();
            state
                .verifications
                .iter()
                .rev()
                .find(|v| v.identifier == identifier && v.purpose == purpose && !v.is_expired_at(now))
                .cloned()
        };
        self.maybe_yield().await;
        Ok(latest)
    }

    async fn increment_verification_attempts(
        &self,
        verification_id: VerificationId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<i32>> {
        let attempts = {
            let mut state = self.state.lock().unwrap();
            state
                .verifications
                .iter_mut()
                .find(|v| v.verification_id == verification_id && !v.is_expired_at(now))
                .map(|v| {
                    v.attempts += 1;
                    v.attempts
                })
        };
        self.maybe_yield().await;
        Ok(attempts)
    }

    async fn consume_verification(
        &self,
        verification_id: VerificationId,
        value: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let mut state = self.state.lock().unwrap();
        let Some(consumed) = state
            .verifications
            .iter()
            .find(|v| v.verification_id == verification_id && v.value == value && !v.is_expired_at(now))
            .cloned()
        else {
            return Ok(false);
        };
        state.verifications.retain(|v| {
            !(v.identifier == consumed.identifier
                && v.purpose == consumed.purpose
                && v.created_at <= consumed.created_at)
        });
        Ok(true)
    }

    async fn invalidate_verifications(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        up_to: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let mut state = self.state.lock().unwrap();
        let before = state.verifications.len();
        state.verifications.retain(|v| {
            !(v.identifier == identifier && v.purpose == purpose && v.created_at <= up_to)
        });
        Ok((before - state.verifications.len()) as u64)
    }
}

impl RateLimitStore for MemoryStore {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, Box<dyn std::error::Error + Send + Sync>> {
        let window_start = config.window_start(now_ms);
        let mut state = self.state.lock().unwrap();
        let count = state
            .rate_limits
            .entry((key.to_string(), window_start))
            .or_insert(0);
        *count += 1;
        Ok(config.evaluate(*count, window_start))
    }
}

#[derive(Debug, Clone)]
struct SentCode {
    to: String,
    code: String,
    purpose: OtpPurpose,
}

/// Records delivered codes; can be switched into a failing mode
#[derive(Clone, Default)]
struct RecordingMailer {
    sent: Arc<Mutex<Vec<SentCode>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingMailer {
    fn fail(&self) {
        self.failing.store(true, Ordering::SeqCst);
    }

    fn sent(&self) -> Vec<SentCode> {
        self.sent.lock().unwrap().clone()
    }

    fn last_code(&self, to: &str, purpose: OtpPurpose) -> String {
        self.sent()
            .into_iter()
            .rev()
            .find(|s| s.to == to && s.purpose == purpose)
            .map(|s| s.code)
            .unwrap()
    }
}

impl EmailTransport for RecordingMailer {
    async fn send_otp(&self, to: &Email, code: &OtpCode, purpose: OtpPurpose) -> AuthResult<()> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(AuthError::EmailDelivery("connection refused".to_string()));
        }
        self.sent.lock().unwrap().push(SentCode {
            to: to.as_str().to_string(),
            code: code.as_str().to_string(),
            purpose,
        });
        Ok(())
    }
}

// ============================================================================
// Harness
// ============================================================================

fn test_config() -> AuthConfig {
    AuthConfig {
        password_hashing: HashingParams::minimal(),
        ..AuthConfig::development()
    }
}

/// A code guaranteed to differ from `code`
fn wrong_code(code: &str) -> String {
    if code == "000000" {
        "111111".to_string()
    } else {
        "000000".to_string()
    }
}

struct Harness {
    store: MemoryStore,
    mailer: RecordingMailer,
    config: Arc<AuthConfig>,
}

impl Harness {
    fn new() -> Self {
        Self::with_config(test_config())
    }

    fn with_config(config: AuthConfig) -> Self {
        Self {
            store: MemoryStore::default(),
            mailer: RecordingMailer::default(),
            config: Arc::new(config),
        }
    }

    fn repo(&self) -> Arc<MemoryStore> {
        Arc::new(self.store.clone())
    }

    fn otp(&self) -> crate::application::OtpService<MemoryStore, RecordingMailer> {
        crate::application::OtpService::new(
            self.repo(),
            Arc::new(self.mailer.clone()),
            self.config.clone(),
        )
    }

    fn sign_up_use_case(
        &self,
    ) -> crate::application::SignUpUseCase<MemoryStore, MemoryStore, MemoryStore, RecordingMailer>
    {
        crate::application::SignUpUseCase::new(
            self.repo(),
            self.repo(),
            self.otp(),
            self.config.clone(),
        )
    }

    fn sign_in_use_case(&self) -> crate::application::SignInUseCase<MemoryStore, MemoryStore> {
        crate::application::SignInUseCase::new(self.repo(), self.repo(), self.config.clone())
    }

    fn resolver(&self) -> crate::application::SessionResolver<MemoryStore, MemoryStore> {
        crate::application::SessionResolver::new(self.repo(), self.repo(), self.config.clone())
    }

    fn email_verification(
        &self,
    ) -> crate::application::EmailVerificationUseCase<MemoryStore, MemoryStore, RecordingMailer>
    {
        crate::application::EmailVerificationUseCase::new(self.repo(), self.otp())
    }

    fn password_reset(
        &self,
    ) -> crate::application::PasswordResetUseCase<
        MemoryStore,
        MemoryStore,
        MemoryStore,
        RecordingMailer,
    > {
        crate::application::PasswordResetUseCase::new(
            self.repo(),
            self.repo(),
            self.otp(),
            self.config.clone(),
        )
    }

    async fn sign_up(&self, user_name: &str, email: &str) -> crate::application::SignUpOutput {
        self.sign_up_use_case()
            .execute(sign_up_input(user_name, email, "correct horse battery"))
            .await
            .unwrap()
    }

    async fn sign_in(&self, user_name: &str, password: &str) -> AuthResult<Session> {
        self.sign_in_use_case()
            .execute(crate::application::SignInInput {
                user_name: user_name.to_string(),
                password: password.to_string(),
                device_id: None,
                client: Default::default(),
            })
            .await
            .map(|output| output.session)
    }

    async fn identity_for(&self, session: &Session) -> crate::domain::entity::Identity {
        self.resolver()
            .resolve(&bearer_headers(session.token.as_str()))
            .await
            .unwrap()
            .unwrap()
    }
}

fn sign_up_input(user_name: &str, email: &str, password: &str) -> crate::application::SignUpInput {
    crate::application::SignUpInput {
        user_name: user_name.to_string(),
        email: email.to_string(),
        password: password.to_string(),
        name: None,
        phone_number: None,
        second_phone: None,
        device_id: None,
        client: Default::default(),
    }
}

fn bearer_headers(token: &str) -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        axum::http::header::AUTHORIZATION,
        format!("Bearer {token}").parse().unwrap(),
    );
    headers
}

fn cookie_headers(config: &AuthConfig, cookie_value: &str) -> axum::http::HeaderMap {
    let mut headers = axum::http::HeaderMap::new();
    headers.insert(
        axum::http::header::COOKIE,
        format!("{}={}", config.session_cookie_name, cookie_value)
            .parse()
            .unwrap(),
    );
    headers
}

// ============================================================================
// Sign up / sign in
// ============================================================================

#[cfg(test)]
mod sign_up_tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_up_creates_user_session_and_sends_code() {
        let h = Harness::new();
        let output = h.sign_up("Alice_01", "Alice@Example.com").await;

        assert_eq!(output.user.user_name.original(), "Alice_01");
        assert_eq!(output.user.email.as_str(), "alice@example.com");
        assert!(!output.user.email_verified);
        assert!(output.verification_sent);
        assert!(output.session.expires_at > Utc::now());

        assert_eq!(h.store.sessions_for(output.user.user_id).len(), 1);
        let sent = h.mailer.sent();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].to, "alice@example.com");
        assert_eq!(sent[0].purpose, OtpPurpose::EmailVerification);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_taken_user_name_case_insensitively() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;

        let result = h
            .sign_up_use_case()
            .execute(sign_up_input("ALICE", "other@example.com", "correct horse battery"))
            .await;

        assert!(matches!(result, Err(AuthError::UserNameTaken)));
        assert_eq!(h.store.users().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_up_rejects_taken_email() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;

        let result = h
            .sign_up_use_case()
            .execute(sign_up_input("bob", "ALICE@example.com", "correct horse battery"))
            .await;

        let err = result.unwrap_err();
        assert!(matches!(err, AuthError::EmailTaken));
        assert_eq!(err.status_code().as_u16(), 409);
    }

    #[tokio::test]
    async fn test_sign_up_validation_happens_before_any_write() {
        let h = Harness::new();

        for (user_name, email, password) in [
            ("ab", "a@example.com", "correct horse battery"),
            ("bad name!", "a@example.com", "correct horse battery"),
            ("alice", "not-an-email", "correct horse battery"),
            ("alice", "a@example.com", "short"),
        ] {
            let err = h
                .sign_up_use_case()
                .execute(sign_up_input(user_name, email, password))
                .await
                .unwrap_err();
            assert_eq!(err.status_code().as_u16(), 400, "{user_name} / {email}");
        }

        assert!(h.store.users().is_empty());
        assert!(h.mailer.sent().is_empty());
    }

    #[tokio::test]
    async fn test_sign_up_survives_mail_failure() {
        let h = Harness::new();
        h.mailer.fail();

        let output = h.sign_up("alice", "alice@example.com").await;

        assert!(!output.verification_sent);
        assert_eq!(h.store.users().len(), 1);
    }

    #[tokio::test]
    async fn test_sign_in_creates_additional_session() {
        let h = Harness::new();
        let signed_up = h.sign_up("alice", "alice@example.com").await;

        let session = h.sign_in("ALICE", "correct horse battery").await.unwrap();

        assert_ne!(session.token, signed_up.session.token);
        assert_eq!(h.store.sessions_for(signed_up.user.user_id).len(), 2);
    }

    #[tokio::test]
    async fn test_sign_in_failures_are_indistinguishable() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;

        let wrong_password = h.sign_in("alice", "wrong password!").await;
        let unknown_user = h.sign_in("nobody", "correct horse battery").await;
        let malformed = h.sign_in("x", "correct horse battery").await;

        for result in [wrong_password, unknown_user, malformed] {
            let err = result.unwrap_err();
            assert!(matches!(err, AuthError::InvalidCredentials));
            assert_eq!(err.status_code().as_u16(), 401);
        }
    }

    #[tokio::test]
    async fn test_sign_in_is_rate_limited_per_user_name() {
        let h = Harness::with_config(AuthConfig {
            sign_in_rate_limit: RateLimitConfig::new(2, 60),
            ..test_config()
        });
        h.sign_up("alice", "alice@example.com").await;

        for _ in 0..2 {
            assert!(matches!(
                h.sign_in("alice", "wrong password!").await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        // Case-insensitive names share one budget, even with the right password
        assert!(matches!(
            h.sign_in("ALICE", "correct horse battery").await,
            Err(AuthError::RateLimited { .. })
        ));

        // Unknown names are throttled the same way
        for _ in 0..2 {
            assert!(matches!(
                h.sign_in("nobody", "correct horse battery").await,
                Err(AuthError::InvalidCredentials)
            ));
        }
        assert!(matches!(
            h.sign_in("nobody", "correct horse battery").await,
            Err(AuthError::RateLimited { .. })
        ));
    }

    #[tokio::test]
    async fn test_sign_in_updates_device_id() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;

        h.sign_in_use_case()
            .execute(crate::application::SignInInput {
                user_name: "alice".to_string(),
                password: "correct horse battery".to_string(),
                device_id: Some("device-42".to_string()),
                client: Default::default(),
            })
            .await
            .unwrap();

        let user = h.store.user_by_email("alice@example.com");
        assert_eq!(user.device_id.as_deref(), Some("device-42"));
    }
}

// ============================================================================
// Session resolver / authorization gate
// ============================================================================

#[cfg(test)]
mod resolver_tests {
    use super::*;
    use crate::application::guard::{RequestContext, protected};
    use platform::cookie::sign_value;

    #[tokio::test]
    async fn test_no_credentials_resolve_to_none() {
        let h = Harness::new();
        let identity = h.resolver().resolve(&axum::http::HeaderMap::new()).await.unwrap();
        assert!(identity.is_none());
    }

    #[tokio::test]
    async fn test_bearer_token_resolves_identity() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;

        let identity = h.identity_for(&output.session).await;

        assert_eq!(identity.user.id, output.user.user_id);
        assert_eq!(identity.user.username.original(), "alice");
        assert_eq!(identity.session.id, output.session.session_id);
        assert_eq!(identity.session.expires_at, output.session.expires_at);
    }

    #[tokio::test]
    async fn test_signed_cookie_resolves_identity() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let signed = sign_value(output.session.token.as_str(), &h.config.cookie_signing_key());

        let identity = h
            .resolver()
            .resolve(&cookie_headers(&h.config, &signed))
            .await
            .unwrap();

        assert_eq!(identity.unwrap().user.id, output.user.user_id);
    }

    #[tokio::test]
    async fn test_tampered_or_unsigned_cookie_is_ignored() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let token = output.session.token.as_str();

        let forged = sign_value(token, b"some other key");
        for value in [forged.as_str(), token] {
            let identity = h
                .resolver()
                .resolve(&cookie_headers(&h.config, value))
                .await
                .unwrap();
            assert!(identity.is_none(), "{value}");
        }
    }

    #[tokio::test]
    async fn test_expired_session_resolves_to_none() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let headers = bearer_headers(output.session.token.as_str());

        let just_before = output.session.expires_at - chrono::Duration::seconds(1);
        let live = h.resolver().resolve_at(&headers, just_before).await.unwrap();
        assert!(live.is_some());

        let at_expiry = h
            .resolver()
            .resolve_at(&headers, output.session.expires_at)
            .await
            .unwrap();
        assert!(at_expiry.is_none());

        // Resolution never extends the session
        let stored = h.store.sessions_for(output.user.user_id);
        assert_eq!(stored[0].expires_at, output.session.expires_at);
    }

    #[tokio::test]
    async fn test_orphaned_session_resolves_to_none() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        h.store.remove_user(output.user.user_id);

        let identity = h
            .resolver()
            .resolve(&bearer_headers(output.session.token.as_str()))
            .await
            .unwrap();

        assert!(identity.is_none());
    }

    #[tokio::test]
    async fn test_gate_passes_identity_to_body() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let identity = h.identity_for(&output.session).await;
        let ctx = RequestContext::new(Some(identity), Default::default());

        let user_id = protected(&ctx, |identity| async move {
            Ok::<_, AuthError>(identity.user.id)
        })
            .await
            .unwrap();

        assert_eq!(user_id, output.user.user_id);
    }

    #[tokio::test]
    async fn test_gate_rejection_has_no_side_effects() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let ctx = RequestContext::default();
        let repo = h.repo();

        let result = protected(&ctx, |identity| {
            let repo = repo.clone();
            async move {
                repo.delete_sessions_for_user(identity.user.id).await?;
                Ok::<(), AuthError>(())
            }
        })
        .await;

        assert!(matches!(result, Err(AuthError::Unauthenticated)));
        assert_eq!(h.store.sessions_for(output.user.user_id).len(), 1);
    }
}

// ============================================================================
// OTP
// ============================================================================

#[cfg(test)]
mod otp_tests {
    use super::*;

    fn email() -> Email {
        Email::new("alice@example.com").unwrap()
    }

    async fn issue(h: &Harness) -> String {
        h.otp()
            .issue(&email(), OtpPurpose::EmailVerification)
            .await
            .unwrap();
        h.mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification)
    }

    async fn verify(h: &Harness, code: &str) -> AuthResult<()> {
        h.otp()
            .verify(
                &email(),
                OtpPurpose::EmailVerification,
                &OtpCode::parse(code).unwrap(),
            )
            .await
    }

    #[tokio::test]
    async fn test_issue_stores_only_a_hash() {
        let h = Harness::new();
        let issued = h
            .otp()
            .issue(&email(), OtpPurpose::EmailVerification)
            .await
            .unwrap();
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification);

        assert_eq!(issued.expires_in, 300);
        assert_eq!(code.len(), 6);
        assert!(code.chars().all(|c| c.is_ascii_digit()));

        let records = h.store.verifications();
        assert_eq!(records.len(), 1);
        assert_ne!(records[0].value, code);
        assert!(!records[0].value.contains(&code));
        assert_eq!(records[0].attempts, 0);
        assert_eq!(records[0].expires_at, issued.expires_at);
    }

    #[tokio::test]
    async fn test_verify_consumes_and_replay_fails() {
        let h = Harness::new();
        let code = issue(&h).await;

        verify(&h, &code).await.unwrap();
        assert!(h.store.verifications().is_empty());

        let replay = verify(&h, &code).await;
        assert!(matches!(replay, Err(AuthError::InvalidOrExpiredCode)));
    }

    #[tokio::test]
    async fn test_wrong_code_keeps_record_and_counts_attempt() {
        let h = Harness::new();
        let code = issue(&h).await;

        let err = verify(&h, &wrong_code(&code)).await.unwrap_err();
        assert!(matches!(err, AuthError::InvalidCode));
        assert_eq!(err.reason(), Some("INVALID_OTP"));

        let records = h.store.verifications();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].attempts, 1);

        verify(&h, &code).await.unwrap();
    }

    #[tokio::test]
    async fn test_attempts_exhausted_deletes_record() {
        let h = Harness::new();
        let code = issue(&h).await;
        let wrong = wrong_code(&code);

        for _ in 0..3 {
            assert!(matches!(verify(&h, &wrong).await, Err(AuthError::InvalidCode)));
        }

        let err = verify(&h, &code).await.unwrap_err();
        assert!(matches!(err, AuthError::AttemptsExhausted));
        assert_eq!(err.status_code().as_u16(), 429);
        assert_eq!(err.reason(), Some("TOO_MANY_ATTEMPTS"));
        assert!(h.store.verifications().is_empty());

        // The correct code no longer works either
        assert!(matches!(
            verify(&h, &code).await,
            Err(AuthError::InvalidOrExpiredCode)
        ));
    }

    #[tokio::test]
    async fn test_expired_code_is_rejected() {
        let h = Harness::new();
        let now = Utc::now();
        let issued = h
            .otp()
            .issue_at(&email(), OtpPurpose::EmailVerification, now)
            .await
            .unwrap();
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification);

        let err = h
            .otp()
            .verify_at(
                &email(),
                OtpPurpose::EmailVerification,
                &OtpCode::parse(&code).unwrap(),
                issued.expires_at,
            )
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::InvalidOrExpiredCode));
        assert_eq!(err.reason(), Some("OTP_EXPIRED"));
    }

    #[tokio::test]
    async fn test_newest_code_shadows_older_one() {
        let h = Harness::new();
        let first = issue(&h).await;
        let second = issue(&h).await;

        if first != second {
            assert!(matches!(verify(&h, &first).await, Err(AuthError::InvalidCode)));
        }
        verify(&h, &second).await.unwrap();
    }

    #[tokio::test]
    async fn test_consuming_newest_code_retires_older_ones() {
        let h = Harness::new();
        let first = issue(&h).await;
        let second = issue(&h).await;
        assert_eq!(h.store.verifications().len(), 2);

        verify(&h, &second).await.unwrap();

        assert!(h.store.verifications().is_empty());
        assert!(matches!(
            verify(&h, &first).await,
            Err(AuthError::InvalidOrExpiredCode)
        ));
    }

    #[tokio::test]
    async fn test_exhausting_newest_code_retires_older_ones() {
        let h = Harness::new();
        let first = issue(&h).await;
        let second = issue(&h).await;
        let wrong = wrong_code(&second);

        for _ in 0..3 {
            assert!(matches!(verify(&h, &wrong).await, Err(AuthError::InvalidCode)));
        }
        assert!(matches!(
            verify(&h, &wrong).await,
            Err(AuthError::AttemptsExhausted)
        ));

        assert!(h.store.verifications().is_empty());
        assert!(matches!(
            verify(&h, &first).await,
            Err(AuthError::InvalidOrExpiredCode)
        ));
    }

    #[tokio::test]
    async fn test_invalidation_keeps_newer_codes() {
        let h = Harness::new();
        let now = Utc::now();
        let otp = h.otp();
        otp.issue_at(&email(), OtpPurpose::EmailVerification, now)
            .await
            .unwrap();
        otp.issue_at(&email(), OtpPurpose::ForgetPassword, now)
            .await
            .unwrap();
        otp.issue_at(
            &email(),
            OtpPurpose::EmailVerification,
            now + chrono::Duration::seconds(1),
        )
        .await
        .unwrap();

        let deleted = h
            .store
            .invalidate_verifications("alice@example.com", OtpPurpose::EmailVerification, now)
            .await
            .unwrap();

        assert_eq!(deleted, 1);
        let remaining = h.store.verifications();
        assert_eq!(remaining.len(), 2);
        assert!(remaining.iter().any(|v| v.purpose == OtpPurpose::ForgetPassword));
        assert!(
            remaining
                .iter()
                .any(|v| v.purpose == OtpPurpose::EmailVerification && v.created_at > now)
        );
    }

    #[tokio::test]
    async fn test_send_budget_limits_issuance() {
        let h = Harness::new();
        let now = Utc::now();
        let otp = h.otp();

        for _ in 0..3 {
            otp.issue_at(&email(), OtpPurpose::EmailVerification, now)
                .await
                .unwrap();
        }
        let err = otp
            .issue_at(&email(), OtpPurpose::EmailVerification, now)
            .await
            .unwrap_err();

        assert!(matches!(err, AuthError::RateLimited { .. }));
        assert_eq!(err.status_code().as_u16(), 429);
        assert_eq!(err.reason(), Some("RATE_LIMITED"));
        assert_eq!(h.mailer.sent().len(), 3);
        assert_eq!(h.store.verifications().len(), 3);

        // Other purposes have their own budget
        otp.issue_at(&email(), OtpPurpose::ForgetPassword, now)
            .await
            .unwrap();

        // The next window starts fresh
        otp.issue_at(
            &email(),
            OtpPurpose::EmailVerification,
            now + chrono::Duration::seconds(60),
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn test_verify_budget_spans_reissued_codes() {
        let h = Harness::with_config(AuthConfig {
            otp_verify_rate_limit: RateLimitConfig::new(4, 600),
            ..test_config()
        });
        let first = issue(&h).await;
        for _ in 0..3 {
            assert!(matches!(
                verify(&h, &wrong_code(&first)).await,
                Err(AuthError::InvalidCode)
            ));
        }

        let second = issue(&h).await;
        let wrong = wrong_code(&second);
        assert!(matches!(verify(&h, &wrong).await, Err(AuthError::InvalidCode)));

        // Over budget: refused before the code is looked at
        let err = verify(&h, &second).await.unwrap_err();
        assert!(matches!(err, AuthError::RateLimited { .. }));

        let newest = h
            .store
            .verifications()
            .into_iter()
            .max_by_key(|v| v.created_at)
            .unwrap();
        assert_eq!(newest.attempts, 1);
    }

    #[tokio::test]
    async fn test_purposes_do_not_cross() {
        let h = Harness::new();
        let code = issue(&h).await;

        let result = h
            .otp()
            .verify(
                &email(),
                OtpPurpose::ForgetPassword,
                &OtpCode::parse(&code).unwrap(),
            )
            .await;

        assert!(matches!(result, Err(AuthError::InvalidOrExpiredCode)));
    }

    #[tokio::test]
    async fn test_concurrent_correct_submissions_succeed_once() {
        let h = Harness::new();
        let code = issue(&h).await;
        // Both verifiers read the record before either consumes it
        h.store.interleave();

        let (a, b) = tokio::join!(verify(&h, &code), verify(&h, &code));

        let successes = [&a, &b].iter().filter(|r| r.is_ok()).count();
        assert_eq!(successes, 1);
        assert!(
            [a, b]
                .into_iter()
                .any(|r| matches!(r, Err(AuthError::InvalidOrExpiredCode)))
        );
    }

    #[tokio::test]
    async fn test_compare_and_delete_only_consumes_once() {
        let h = Harness::new();
        issue(&h).await;
        let record = h.store.verifications().remove(0);
        let now = Utc::now();

        let first = h
            .store
            .consume_verification(record.verification_id, &record.value, now)
            .await
            .unwrap();
        let second = h
            .store
            .consume_verification(record.verification_id, &record.value, now)
            .await
            .unwrap();

        assert!(first);
        assert!(!second);
    }

    #[tokio::test]
    async fn test_transport_failure_is_internal() {
        let h = Harness::new();
        h.mailer.fail();

        let err = h
            .otp()
            .issue(&email(), OtpPurpose::EmailVerification)
            .await
            .unwrap_err();

        assert_eq!(err.status_code().as_u16(), 500);
        assert_eq!(err.to_app_error().message(), "Internal server error");
    }
}

// ============================================================================
// Email verification / profile / sign out / password reset
// ============================================================================

#[cfg(test)]
mod procedure_tests {
    use super::*;
    use crate::application::{ProfileUseCase, SignOutUseCase, UpdateProfileInput, VerifyEmailOutcome};

    #[tokio::test]
    async fn test_verify_email_marks_user_verified() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification);

        let outcome = h
            .email_verification()
            .verify("alice@example.com", &code)
            .await
            .unwrap();

        assert_eq!(outcome, VerifyEmailOutcome::Verified);
        assert!(h.store.user_by_email("alice@example.com").email_verified);
    }

    #[tokio::test]
    async fn test_already_verified_skips_code_check() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification);
        h.email_verification()
            .verify("alice@example.com", &code)
            .await
            .unwrap();

        let outcome = h
            .email_verification()
            .verify("alice@example.com", &wrong_code(&code))
            .await
            .unwrap();
        assert_eq!(outcome, VerifyEmailOutcome::AlreadyVerified);

        let send = h.email_verification().send("alice@example.com").await;
        assert!(matches!(send, Err(AuthError::EmailAlreadyVerified)));
    }

    #[tokio::test]
    async fn test_verify_email_unknown_user_and_bad_input() {
        let h = Harness::new();

        let unknown = h
            .email_verification()
            .verify("nobody@example.com", "123456")
            .await
            .unwrap_err();
        assert!(matches!(unknown, AuthError::UserNotFound));
        assert_eq!(unknown.status_code().as_u16(), 404);

        let malformed = h
            .email_verification()
            .verify("nobody@example.com", "12ab")
            .await
            .unwrap_err();
        assert_eq!(malformed.status_code().as_u16(), 400);

        let send = h.email_verification().send("nobody@example.com").await;
        assert!(matches!(send, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_update_profile_patches_only_given_fields() {
        let h = Harness::new();
        let output = h
            .sign_up_use_case()
            .execute(crate::application::SignUpInput {
                name: Some("Alice".to_string()),
                phone_number: Some("+81 90 0000 0000".to_string()),
                ..sign_up_input("alice", "alice@example.com", "correct horse battery")
            })
            .await
            .unwrap();
        let identity = h.identity_for(&output.session).await;

        let user = ProfileUseCase::new(h.repo())
            .update(
                &identity,
                UpdateProfileInput {
                    second_phone: Some("+81 80 1111 1111".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert_eq!(user.phone_number.as_deref(), Some("+81 90 0000 0000"));
        assert_eq!(user.second_phone.as_deref(), Some("+81 80 1111 1111"));
        assert_eq!(user.email, output.user.email);
        assert_eq!(user.user_name, output.user.user_name);
        assert_eq!(user.role, output.user.role);
        assert!(!user.email_verified);
    }

    #[tokio::test]
    async fn test_get_me_after_user_vanished() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let identity = h.identity_for(&output.session).await;
        h.store.remove_user(output.user.user_id);

        let result = ProfileUseCase::new(h.repo()).get_me(&identity).await;

        assert!(matches!(result, Err(AuthError::UserNotFound)));
    }

    #[tokio::test]
    async fn test_sign_out_deletes_only_current_session() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        let other = h.sign_in("alice", "correct horse battery").await.unwrap();
        let identity = h.identity_for(&output.session).await;

        SignOutUseCase::new(h.repo()).execute(&identity).await.unwrap();

        let gone = h
            .resolver()
            .resolve(&bearer_headers(output.session.token.as_str()))
            .await
            .unwrap();
        assert!(gone.is_none());

        let still_live = h
            .resolver()
            .resolve(&bearer_headers(other.token.as_str()))
            .await
            .unwrap();
        assert!(still_live.is_some());
    }

    #[tokio::test]
    async fn test_password_reset_for_unknown_email_is_silent() {
        let h = Harness::new();

        let email = h.password_reset().send("Nobody@Example.com").await.unwrap();

        assert_eq!(email.as_str(), "nobody@example.com");
        assert!(h.mailer.sent().is_empty());
        assert!(h.store.verifications().is_empty());
    }

    #[tokio::test]
    async fn test_password_reset_throttles_known_and_unknown_alike() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;

        for email in ["alice@example.com", "nobody@example.com"] {
            for _ in 0..3 {
                h.password_reset().send(email).await.unwrap();
            }
            let err = h.password_reset().send(email).await.unwrap_err();
            assert!(matches!(err, AuthError::RateLimited { .. }), "{email}");
        }
        assert_eq!(
            h.mailer
                .sent()
                .iter()
                .filter(|s| s.purpose == OtpPurpose::ForgetPassword)
                .count(),
            3
        );
    }

    #[tokio::test]
    async fn test_older_reset_code_is_dead_after_reset() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;

        h.password_reset().send("alice@example.com").await.unwrap();
        let older = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::ForgetPassword);
        h.password_reset().send("alice@example.com").await.unwrap();
        let newer = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::ForgetPassword);

        h.password_reset()
            .reset(crate::application::ResetPasswordInput {
                email: "alice@example.com".to_string(),
                otp: newer,
                password: "a brand new secret".to_string(),
            })
            .await
            .unwrap();

        let replay = h
            .password_reset()
            .reset(crate::application::ResetPasswordInput {
                email: "alice@example.com".to_string(),
                otp: older,
                password: "attacker chosen secret".to_string(),
            })
            .await;

        assert!(matches!(replay, Err(AuthError::InvalidOrExpiredCode)));
        h.sign_in("alice", "a brand new secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_password_reset_replaces_password_and_revokes_sessions() {
        let h = Harness::new();
        let output = h.sign_up("alice", "alice@example.com").await;
        h.sign_in("alice", "correct horse battery").await.unwrap();

        h.password_reset().send("alice@example.com").await.unwrap();
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::ForgetPassword);

        let revoked = h
            .password_reset()
            .reset(crate::application::ResetPasswordInput {
                email: "alice@example.com".to_string(),
                otp: code,
                password: "a brand new secret".to_string(),
            })
            .await
            .unwrap();

        assert_eq!(revoked, 2);
        assert!(h.store.sessions_for(output.user.user_id).is_empty());
        assert!(matches!(
            h.sign_in("alice", "correct horse battery").await,
            Err(AuthError::InvalidCredentials)
        ));
        h.sign_in("alice", "a brand new secret").await.unwrap();
    }

    #[tokio::test]
    async fn test_email_verification_code_cannot_reset_password() {
        let h = Harness::new();
        h.sign_up("alice", "alice@example.com").await;
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification);

        let result = h
            .password_reset()
            .reset(crate::application::ResetPasswordInput {
                email: "alice@example.com".to_string(),
                otp: code,
                password: "a brand new secret".to_string(),
            })
            .await;

        assert!(matches!(result, Err(AuthError::InvalidOrExpiredCode)));
        h.sign_in("alice", "correct horse battery").await.unwrap();
    }
}

// ============================================================================
// Router
// ============================================================================

#[cfg(test)]
mod router_tests {
    use super::*;
    use axum::Router;
    use axum::body::{Body, to_bytes};
    use axum::http::{Method, Request, StatusCode, header};
    use serde_json::{Value, json};
    use tower::ServiceExt;

    fn router(h: &Harness) -> Router {
        crate::presentation::router::auth_router_generic(
            h.store.clone(),
            h.mailer.clone(),
            // Same secret as the harness
            (*h.config).clone(),
        )
    }

    fn post(uri: &str, body: Value) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn send(router: &Router, req: Request<Body>) -> (StatusCode, Option<String>, Value) {
        let response = router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let json = if body.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&body).unwrap()
        };
        (status, cookie, json)
    }

    async fn sign_up(router: &Router) -> (String, Value) {
        let (status, cookie, body) = send(
            router,
            post(
                "/auth.signUp",
                json!({
                    "username": "alice",
                    "email": "alice@example.com",
                    "password": "correct horse battery",
                    "phoneNumber": "+81 90 0000 0000"
                }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK, "{body}");
        let cookie = cookie.unwrap();
        let pair = cookie.split(';').next().unwrap().to_string();
        (pair, body)
    }

    #[tokio::test]
    async fn test_sign_up_sets_cookie_and_wraps_result() {
        let h = Harness::new();
        let router = router(&h);

        let (cookie, body) = sign_up(&router).await;

        assert!(cookie.starts_with("trusted.session_token="));
        let data = &body["result"]["data"];
        assert_eq!(data["success"], true);
        assert_eq!(data["verificationSent"], true);
        assert_eq!(data["user"]["username"], "alice");
        assert_eq!(data["user"]["emailVerified"], false);
        assert_eq!(data["user"]["phoneNumber"], "+81 90 0000 0000");
        assert_eq!(data["user"]["role"], "user");
        assert!(data["user"].get("password").is_none());
    }

    #[tokio::test]
    async fn test_duplicate_sign_up_is_conflict_envelope() {
        let h = Harness::new();
        let router = router(&h);
        sign_up(&router).await;

        let (status, _, body) = send(
            &router,
            post(
                "/auth.signUp",
                json!({
                    "username": "Alice",
                    "email": "someone@example.com",
                    "password": "correct horse battery"
                }),
            ),
        )
        .await;

        assert_eq!(status, StatusCode::CONFLICT);
        assert_eq!(body["error"]["data"]["code"], "CONFLICT");
        assert_eq!(body["error"]["data"]["httpStatus"], 409);
    }

    #[tokio::test]
    async fn test_get_me_requires_identity() {
        let h = Harness::new();
        let router = router(&h);

        let req = Request::builder()
            .uri("/auth.getMe")
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&router, req).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["data"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_cookie_and_bearer_both_authenticate() {
        let h = Harness::new();
        let router = router(&h);
        let (cookie, body) = sign_up(&router).await;
        let token = body["result"]["data"]["session"]["token"]
            .as_str()
            .unwrap()
            .to_string();

        let by_cookie = Request::builder()
            .uri("/auth.getMe")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let (status, _, body) = send(&router, by_cookie).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["data"]["user"]["email"], "alice@example.com");

        let by_bearer = Request::builder()
            .uri("/auth.getMe")
            .header(header::AUTHORIZATION, format!("Bearer {token}"))
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&router, by_bearer).await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_malformed_body_is_bad_request() {
        let h = Harness::new();
        let router = router(&h);

        let (status, _, body) = send(&router, post("/auth.signIn", json!({ "username": 1 }))).await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["data"]["code"], "BAD_REQUEST");
    }

    #[tokio::test]
    async fn test_wrong_otp_reports_reason() {
        let h = Harness::new();
        let router = router(&h);
        sign_up(&router).await;
        let code = h
            .mailer
            .last_code("alice@example.com", OtpPurpose::EmailVerification);

        let (status, _, body) = send(
            &router,
            post(
                "/auth.verifyEmailOTP",
                json!({ "email": "alice@example.com", "otp": wrong_code(&code) }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["data"]["reason"], "INVALID_OTP");

        let (status, _, _) = send(
            &router,
            post(
                "/auth.verifyEmailOTP",
                json!({ "email": "alice@example.com", "otp": code }),
            ),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert!(h.store.user_by_email("alice@example.com").email_verified);
    }

    #[tokio::test]
    async fn test_update_profile_and_sign_out() {
        let h = Harness::new();
        let router = router(&h);
        let (cookie, _) = sign_up(&router).await;

        let mut req = post("/auth.updateProfile", json!({ "name": "Alice Liddell" }));
        req.headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let (status, _, body) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["result"]["data"]["user"]["name"], "Alice Liddell");
        assert_eq!(body["result"]["data"]["user"]["phoneNumber"], "+81 90 0000 0000");

        let mut req = post("/auth.signOut", json!({}));
        req.headers_mut()
            .insert(header::COOKIE, cookie.parse().unwrap());
        let (status, cleared, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::OK);
        assert!(cleared.unwrap().contains("Max-Age=0"));

        let req = Request::builder()
            .uri("/auth.getMe")
            .header(header::COOKIE, cookie)
            .body(Body::empty())
            .unwrap();
        let (status, _, _) = send(&router, req).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_update_profile_gate_runs_before_body_parsing() {
        let h = Harness::new();
        let router = router(&h);

        let req = Request::builder()
            .method(Method::POST)
            .uri("/auth.updateProfile")
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from("{not json"))
            .unwrap();
        let (status, _, body) = send(&router, req).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["error"]["data"]["code"], "UNAUTHORIZED");
    }

    #[tokio::test]
    async fn test_per_ip_budget_returns_too_many_requests() {
        let h = Harness::with_config(AuthConfig {
            request_rate_limit: Some(RateLimitConfig::new(2, 60)),
            ..test_config()
        });
        let router = router(&h);
        let from = |ip: &str| {
            Request::builder()
                .uri("/auth.getMe")
                .header("x-forwarded-for", ip)
                .body(Body::empty())
                .unwrap()
        };

        for _ in 0..2 {
            let (status, _, _) = send(&router, from("203.0.113.7")).await;
            assert_eq!(status, StatusCode::UNAUTHORIZED);
        }

        let response = router.clone().oneshot(from("203.0.113.7")).await.unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert!(response.headers().contains_key(header::RETRY_AFTER));
        let body = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body: Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(body["error"]["data"]["reason"], "RATE_LIMITED");

        // Other clients are unaffected
        let (status, _, _) = send(&router, from("198.51.100.1")).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_sign_out_without_identity_is_rejected() {
        let h = Harness::new();
        let router = router(&h);

        let (status, cookie, _) = send(&router, post("/auth.signOut", json!({}))).await;

        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert!(cookie.is_none());
    }
}
