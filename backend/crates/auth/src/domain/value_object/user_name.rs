//! User Name Value Object
//!
//! ユーザー名はサインインに使用する**公開識別子（ハンドル）**。
//!
//! ## 設計方針
//! - ASCII 英数字と `_` のみ許可
//! - 大文字入力は受け付けるが、一意性は小文字の正規形（canonical）で判定
//! - NFKC 正規化 → trim → 検証 の順で処理
//!
//! ## 不変条件
//! - 長さ: 3〜20 文字（正規化後）
//! - 文字種: `[A-Za-z0-9_]+`

use kernel::error::app_error::AppError;
use serde::Serialize;
use std::fmt;
use unicode_normalization::UnicodeNormalization;

/// Minimum length for user name (in characters)
pub const USER_NAME_MIN_LENGTH: usize = 3;

/// Maximum length for user name (in characters)
pub const USER_NAME_MAX_LENGTH: usize = 20;

// ============================================================================
// Error Types
// ============================================================================

/// Error returned when user name validation fails
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserNameError {
    TooShort { length: usize, min: usize },
    TooLong { length: usize, max: usize },
    InvalidCharacter { char: char, position: usize },
}

impl fmt::Display for UserNameError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TooShort { min, .. } => {
                write!(f, "Username must be at least {min} characters")
            }
            Self::TooLong { max, .. } => {
                write!(f, "Username must be at most {max} characters")
            }
            Self::InvalidCharacter { .. } => {
                write!(
                    f,
                    "Username can only contain letters, numbers, and underscores"
                )
            }
        }
    }
}

impl std::error::Error for UserNameError {}

impl From<UserNameError> for AppError {
    fn from(err: UserNameError) -> Self {
        AppError::bad_request(err.to_string())
    }
}

// ============================================================================
// UserName Value Object
// ============================================================================

/// Validated user name
///
/// # Storage
/// - `original`: 入力値（NFKC 正規化・trim 済み、大文字小文字を保持）
/// - `canonical`: 一意性判定とサインイン照合に使う小文字形
#[derive(Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(into = "String")]
pub struct UserName {
    original: String,
    canonical: String,
}

impl UserName {
    /// Normalize and validate raw input
    pub fn new(input: impl AsRef<str>) -> Result<Self, UserNameError> {
        let original = input.as_ref().nfkc().collect::<String>().trim().to_string();
        Self::validate(&original)?;
        let canonical = original.to_ascii_lowercase();
        Ok(Self {
            original,
            canonical,
        })
    }

    /// Create from database values (assumes already validated)
    pub fn from_db(original: impl Into<String>) -> Self {
        let original = original.into();
        let canonical = original.to_ascii_lowercase();
        Self {
            original,
            canonical,
        }
    }

    /// Get the original user name (preserves case)
    #[inline]
    pub fn original(&self) -> &str {
        &self.original
    }

    /// Get the canonical (lowercase) user name
    #[inline]
    pub fn canonical(&self) -> &str {
        &self.canonical
    }

    fn validate(name: &str) -> Result<(), UserNameError> {
        let length = name.chars().count();
        if length < USER_NAME_MIN_LENGTH {
            return Err(UserNameError::TooShort {
                length,
                min: USER_NAME_MIN_LENGTH,
            });
        }
        if length > USER_NAME_MAX_LENGTH {
            return Err(UserNameError::TooLong {
                length,
                max: USER_NAME_MAX_LENGTH,
            });
        }

        if let Some((position, char)) = name
            .chars()
            .enumerate()
            .find(|(_, c)| !(c.is_ascii_alphanumeric() || *c == '_'))
        {
            return Err(UserNameError::InvalidCharacter { char, position });
        }

        Ok(())
    }
}

impl fmt::Debug for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "UserName({:?})", self.original)
    }
}

impl fmt::Display for UserName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.original)
    }
}

impl From<UserName> for String {
    fn from(name: UserName) -> Self {
        name.original
    }
}
