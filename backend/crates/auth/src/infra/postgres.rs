//! PostgreSQL Repository Implementations

use chrono::{DateTime, Utc};
use platform::rate_limit::{RateLimitConfig, RateLimitResult, RateLimitStore};
use sqlx::PgPool;
use uuid::Uuid;

use crate::domain::entity::{ProfilePatch, Session, User, Verification};
use crate::domain::repository::{SessionRepository, UserRepository, VerificationRepository};
use crate::domain::value_object::{
    SessionId, UserId, VerificationId, email::Email, otp_purpose::OtpPurpose,
    session_token::SessionToken, user_name::UserName, user_password::UserPassword,
    user_role::UserRole,
};
use crate::error::{AuthError, AuthResult};

/// PostgreSQL unique_violation
const UNIQUE_VIOLATION: &str = "23505";

/// Columns selected for every user query
const USER_COLUMNS: &str = r#"
    user_id,
    user_name,
    email,
    email_verified,
    password_hash,
    name,
    phone_number,
    second_phone,
    device_id,
    role,
    created_at,
    updated_at
"#;

const SESSION_COLUMNS: &str = r#"
    session_id,
    token,
    user_id,
    expires_at,
    ip_address,
    user_agent,
    created_at,
    updated_at
"#;

/// PostgreSQL-backed auth repository
#[derive(Clone)]
pub struct PgAuthRepository {
    pool: PgPool,
}

impl PgAuthRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Delete expired sessions, verification records and rate-limit windows
    ///
    /// Housekeeping only: expiry is always checked at read time.
    pub async fn cleanup_expired(&self) -> AuthResult<(u64, u64, u64)> {
        let now = Utc::now();

        let sessions = sqlx::query("DELETE FROM auth_sessions WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let verifications = sqlx::query("DELETE FROM verifications WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        let rate_limits = sqlx::query("DELETE FROM rate_limits WHERE expires_at <= $1")
            .bind(now)
            .execute(&self.pool)
            .await?
            .rows_affected();

        tracing::info!(
            sessions_deleted = sessions,
            verifications_deleted = verifications,
            rate_limits_deleted = rate_limits,
            "Cleaned up expired auth records"
        );

        Ok((sessions, verifications, rate_limits))
    }
}

/// Map a unique violation on `users` to the matching conflict error
fn map_user_insert_error(err: sqlx::Error) -> AuthError {
    let conflict = match &err {
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some(UNIQUE_VIOLATION) => {
            Some(if db_err.constraint().is_some_and(|c| c.contains("email")) {
                AuthError::EmailTaken
            } else {
                AuthError::UserNameTaken
            })
        }
        _ => None,
    };
    conflict.unwrap_or(AuthError::Database(err))
}

// ============================================================================
// User Repository Implementation
// ============================================================================

impl UserRepository for PgAuthRepository {
    async fn create_user(&self, user: &User) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO users (
                user_id,
                user_name,
                user_name_canonical,
                email,
                email_verified,
                password_hash,
                name,
                phone_number,
                second_phone,
                device_id,
                role,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            "#,
        )
        .bind(user.user_id.as_uuid())
        .bind(user.user_name.original())
        .bind(user.user_name.canonical())
        .bind(user.email.as_str())
        .bind(user.email_verified)
        .bind(user.password.as_phc_string())
        .bind(&user.name)
        .bind(&user.phone_number)
        .bind(&user.second_phone)
        .bind(&user.device_id)
        .bind(user.role.code())
        .bind(user.created_at)
        .bind(user.updated_at)
        .execute(&self.pool)
        .await
        .map_err(map_user_insert_error)?;

        Ok(())
    }

    async fn find_user_by_id(&self, user_id: UserId) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_id = $1"
        ))
        .bind(user_id.as_uuid())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_user_name(&self, user_name: &UserName) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE user_name_canonical = $1"
        ))
        .bind(user_name.canonical())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn find_user_by_email(&self, email: &Email) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1"
        ))
        .bind(email.as_str())
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn user_name_exists(&self, user_name: &UserName) -> AuthResult<bool> {
        let exists = sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS(SELECT 1 FROM users WHERE user_name_canonical = $1)",
        )
        .bind(user_name.canonical())
        .fetch_one(&self.pool)
        .await?;

        Ok(exists)
    }

    async fn email_exists(&self, email: &Email) -> AuthResult<bool> {
        let exists =
            sqlx::query_scalar::<_, bool>("SELECT EXISTS(SELECT 1 FROM users WHERE email = $1)")
                .bind(email.as_str())
                .fetch_one(&self.pool)
                .await?;

        Ok(exists)
    }

    async fn update_device_id(&self, user_id: UserId, device_id: &str) -> AuthResult<()> {
        sqlx::query("UPDATE users SET device_id = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .bind(device_id)
            .execute(&self.pool)
            .await?;

        Ok(())
    }

    async fn mark_email_verified(&self, user_id: UserId) -> AuthResult<()> {
        sqlx::query(
            r#"
            UPDATE users SET
                email_verified = TRUE,
                updated_at = NOW()
            WHERE user_id = $1 AND email_verified = FALSE
            "#,
        )
        .bind(user_id.as_uuid())
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn update_profile(
        &self,
        user_id: UserId,
        patch: &ProfilePatch,
    ) -> AuthResult<Option<User>> {
        let row = sqlx::query_as::<_, UserRow>(&format!(
            r#"
            UPDATE users SET
                name = COALESCE($2, name),
                phone_number = COALESCE($3, phone_number),
                second_phone = COALESCE($4, second_phone),
                updated_at = NOW()
            WHERE user_id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user_id.as_uuid())
        .bind(&patch.name)
        .bind(&patch.phone_number)
        .bind(&patch.second_phone)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_user()).transpose()
    }

    async fn update_password(&self, user_id: UserId, password: &UserPassword) -> AuthResult<()> {
        sqlx::query("UPDATE users SET password_hash = $2, updated_at = NOW() WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .bind(password.as_phc_string())
            .execute(&self.pool)
            .await?;

        Ok(())
    }
}

// ============================================================================
// Session Repository Implementation
// ============================================================================

impl SessionRepository for PgAuthRepository {
    async fn create_session(&self, session: &Session) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO auth_sessions (
                session_id,
                token,
                user_id,
                expires_at,
                ip_address,
                user_agent,
                created_at,
                updated_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            "#,
        )
        .bind(session.session_id.as_uuid())
        .bind(session.token.as_str())
        .bind(session.user_id.as_uuid())
        .bind(session.expires_at)
        .bind(&session.ip_address)
        .bind(&session.user_agent)
        .bind(session.created_at)
        .bind(session.updated_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_session_by_token(&self, token: &SessionToken) -> AuthResult<Option<Session>> {
        let row = sqlx::query_as::<_, SessionRow>(&format!(
            "SELECT {SESSION_COLUMNS} FROM auth_sessions WHERE token = $1"
        ))
        .bind(token.as_str())
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(SessionRow::into_session))
    }

    async fn delete_session(&self, session_id: SessionId) -> AuthResult<bool> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE session_id = $1")
            .bind(session_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted > 0)
    }

    async fn delete_sessions_for_user(&self, user_id: UserId) -> AuthResult<u64> {
        let deleted = sqlx::query("DELETE FROM auth_sessions WHERE user_id = $1")
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await?
            .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Verification Repository Implementation
// ============================================================================

impl VerificationRepository for PgAuthRepository {
    async fn create_verification(&self, verification: &Verification) -> AuthResult<()> {
        sqlx::query(
            r#"
            INSERT INTO verifications (
                verification_id,
                identifier,
                purpose,
                value,
                attempts,
                expires_at,
                created_at
            ) VALUES ($1, $2, $3, $4, $5, $6, $7)
            "#,
        )
        .bind(verification.verification_id.as_uuid())
        .bind(&verification.identifier)
        .bind(verification.purpose.as_str())
        .bind(&verification.value)
        .bind(verification.attempts)
        .bind(verification.expires_at)
        .bind(verification.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_latest_verification(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<Verification>> {
        let row = sqlx::query_as::<_, VerificationRow>(
            r#"
            SELECT
                verification_id,
                identifier,
                purpose,
                value,
                attempts,
                expires_at,
                created_at
            FROM verifications
            WHERE identifier = $1 AND purpose = $2 AND expires_at > $3
            ORDER BY created_at DESC
            LIMIT 1
            "#,
        )
        .bind(identifier)
        .bind(purpose.as_str())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        row.map(|r| r.into_verification()).transpose()
    }

    async fn increment_verification_attempts(
        &self,
        verification_id: VerificationId,
        now: DateTime<Utc>,
    ) -> AuthResult<Option<i32>> {
        let attempts = sqlx::query_scalar::<_, i32>(
            r#"
            UPDATE verifications SET attempts = attempts + 1
            WHERE verification_id = $1 AND expires_at > $2
            RETURNING attempts
            "#,
        )
        .bind(verification_id.as_uuid())
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(attempts)
    }

    async fn consume_verification(
        &self,
        verification_id: VerificationId,
        value: &str,
        now: DateTime<Utc>,
    ) -> AuthResult<bool> {
        let consumed = sqlx::query_scalar::<_, i64>(
            r#"
            WITH consumed AS (
                DELETE FROM verifications
                WHERE verification_id = $1 AND value = $2 AND expires_at > $3
                RETURNING verification_id, identifier, purpose, created_at
            ), superseded AS (
                DELETE FROM verifications v
                USING consumed c
                WHERE v.identifier = c.identifier
                  AND v.purpose = c.purpose
                  AND v.created_at <= c.created_at
                  AND v.verification_id <> c.verification_id
            )
            SELECT COUNT(*) FROM consumed
            "#,
        )
        .bind(verification_id.as_uuid())
        .bind(value)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        Ok(consumed > 0)
    }

    async fn invalidate_verifications(
        &self,
        identifier: &str,
        purpose: OtpPurpose,
        up_to: DateTime<Utc>,
    ) -> AuthResult<u64> {
        let deleted = sqlx::query(
            r#"
            DELETE FROM verifications
            WHERE identifier = $1 AND purpose = $2 AND created_at <= $3
            "#,
        )
        .bind(identifier)
        .bind(purpose.as_str())
        .bind(up_to)
        .execute(&self.pool)
        .await?
        .rows_affected();

        Ok(deleted)
    }
}

// ============================================================================
// Rate Limit Store Implementation
// ============================================================================

impl RateLimitStore for PgAuthRepository {
    async fn check_and_increment(
        &self,
        key: &str,
        config: &RateLimitConfig,
        now_ms: i64,
    ) -> Result<RateLimitResult, Box<dyn std::error::Error + Send + Sync>> {
        let window_start = config.window_start(now_ms);
        let expires_at = DateTime::<Utc>::from_timestamp_millis(window_start + config.window_ms())
            .unwrap_or_else(Utc::now);

        let count = sqlx::query_scalar::<_, i32>(
            r#"
            INSERT INTO rate_limits (key, window_start_ms, request_count, expires_at)
            VALUES ($1, $2, 1, $3)
            ON CONFLICT (key, window_start_ms)
            DO UPDATE SET request_count = rate_limits.request_count + 1
            RETURNING request_count
            "#,
        )
        .bind(key)
        .bind(window_start)
        .bind(expires_at)
        .fetch_one(&self.pool)
        .await?;

        Ok(config.evaluate(count.max(0) as u32, window_start))
    }
}

// ============================================================================
// Row types
// ============================================================================

#[derive(sqlx::FromRow)]
struct UserRow {
    user_id: Uuid,
    user_name: String,
    email: String,
    email_verified: bool,
    password_hash: String,
    name: Option<String>,
    phone_number: Option<String>,
    second_phone: Option<String>,
    device_id: Option<String>,
    role: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl UserRow {
    fn into_user(self) -> AuthResult<User> {
        let role = UserRole::from_code(&self.role)
            .ok_or_else(|| AuthError::Internal(format!("Invalid role in database: {}", self.role)))?;

        Ok(User {
            user_id: UserId::from_uuid(self.user_id),
            user_name: UserName::from_db(self.user_name),
            email: Email::from_db(self.email),
            email_verified: self.email_verified,
            password: UserPassword::from_phc_string(self.password_hash)?,
            name: self.name,
            phone_number: self.phone_number,
            second_phone: self.second_phone,
            device_id: self.device_id,
            role,
            created_at: self.created_at,
            updated_at: self.updated_at,
        })
    }
}

#[derive(sqlx::FromRow)]
struct SessionRow {
    session_id: Uuid,
    token: String,
    user_id: Uuid,
    expires_at: DateTime<Utc>,
    ip_address: Option<String>,
    user_agent: Option<String>,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl SessionRow {
    fn into_session(self) -> Session {
        Session {
            session_id: SessionId::from_uuid(self.session_id),
            token: SessionToken::from_raw(self.token),
            user_id: UserId::from_uuid(self.user_id),
            expires_at: self.expires_at,
            ip_address: self.ip_address,
            user_agent: self.user_agent,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }
}

#[derive(sqlx::FromRow)]
struct VerificationRow {
    verification_id: Uuid,
    identifier: String,
    purpose: String,
    value: String,
    attempts: i32,
    expires_at: DateTime<Utc>,
    created_at: DateTime<Utc>,
}

impl VerificationRow {
    fn into_verification(self) -> AuthResult<Verification> {
        let purpose = OtpPurpose::from_code(&self.purpose).ok_or_else(|| {
            AuthError::Internal(format!("Invalid OTP purpose in database: {}", self.purpose))
        })?;

        Ok(Verification {
            verification_id: VerificationId::from_uuid(self.verification_id),
            identifier: self.identifier,
            purpose,
            value: self.value,
            attempts: self.attempts,
            expires_at: self.expires_at,
            created_at: self.created_at,
        })
    }
}
