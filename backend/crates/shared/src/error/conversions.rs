//! Error conversions
//!
//! `From` implementations for the few foreign error types that reach the
//! procedure boundary, plus the HTTP rendering of [`AppError`].

use super::app_error::AppError;

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        if err.is_syntax() || err.is_data() || err.is_eof() {
            AppError::bad_request("Invalid request body").with_source(err)
        } else {
            AppError::internal("Internal server error").with_source(err)
        }
    }
}

// ============================================================================
// SQLx conversions (feature-gated)
// ============================================================================

/// PostgreSQL unique_violation
#[cfg(feature = "sqlx")]
pub const PG_UNIQUE_VIOLATION: &str = "23505";

#[cfg(feature = "sqlx")]
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        let is_unique_violation = matches!(
            &err,
            sqlx::Error::Database(db_err)
                if db_err.code().as_deref() == Some(PG_UNIQUE_VIOLATION)
        );
        if is_unique_violation {
            AppError::conflict("Duplicate record").with_source(err)
        } else {
            // ストアの詳細はクライアントに返さない
            AppError::internal("Internal server error").with_source(err)
        }
    }
}

// ============================================================================
// Axum conversions (feature-gated)
// ============================================================================

#[cfg(feature = "axum")]
impl AppError {
    /// tRPC 互換のエラーエンベロープ
    ///
    /// ```json
    /// {"error":{"message":"…","code":-32001,"data":{"code":"UNAUTHORIZED","httpStatus":401}}}
    /// ```
    pub fn to_envelope(&self) -> serde_json::Value {
        let mut data = serde_json::json!({
            "code": self.kind().code(),
            "httpStatus": self.status_code(),
        });
        if let Some(reason) = self.reason() {
            data["reason"] = serde_json::Value::from(reason);
        }
        if let Some(action) = self.action() {
            data["action"] = serde_json::Value::from(action);
        }

        serde_json::json!({
            "error": {
                "message": self.message(),
                "code": self.kind().rpc_code(),
                "data": data,
            }
        })
    }
}

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        use axum::Json;
        use axum::http::StatusCode;

        let status =
            StatusCode::from_u16(self.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);

        (status, Json(self.to_envelope())).into_response()
    }
}
