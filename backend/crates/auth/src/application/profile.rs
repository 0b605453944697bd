//! Profile Use Case
//!
//! Reads and patches the signed-in user's own record.

use std::sync::Arc;

use crate::application::normalize_optional;
use crate::domain::entity::{Identity, ProfilePatch, User};
use crate::domain::repository::UserRepository;
use crate::error::{AuthError, AuthResult};
use kernel::error::app_error::AppError;

/// Maximum length of any profile field, in characters
pub const PROFILE_FIELD_MAX_LENGTH: usize = 100;

/// Update profile input; `None` leaves the field unchanged
#[derive(Debug, Default)]
pub struct UpdateProfileInput {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
}

pub struct ProfileUseCase<U>
where
    U: UserRepository,
{
    user_repo: Arc<U>,
}

impl<U> ProfileUseCase<U>
where
    U: UserRepository,
{
    pub fn new(user_repo: Arc<U>) -> Self {
        Self { user_repo }
    }

    /// The current user's record
    pub async fn get_me(&self, identity: &Identity) -> AuthResult<User> {
        self.user_repo
            .find_user_by_id(identity.user.id)
            .await?
            .ok_or(AuthError::UserNotFound)
    }

    pub async fn update(&self, identity: &Identity, input: UpdateProfileInput) -> AuthResult<User> {
        let patch = ProfilePatch {
            name: validate_field("Name", input.name)?,
            phone_number: validate_field("Phone number", input.phone_number)?,
            second_phone: validate_field("Second phone", input.second_phone)?,
        };

        if patch.is_empty() {
            return self.get_me(identity).await;
        }

        let user = self
            .user_repo
            .update_profile(identity.user.id, &patch)
            .await?
            .ok_or(AuthError::UserNotFound)?;

        tracing::info!(user_id = %user.user_id, "Profile updated");
        Ok(user)
    }
}

fn validate_field(label: &str, value: Option<String>) -> AuthResult<Option<String>> {
    let value = normalize_optional(value);
    let too_long = value
        .as_ref()
        .is_some_and(|v| v.chars().count() > PROFILE_FIELD_MAX_LENGTH);
    if too_long {
        return Err(AppError::bad_request(format!(
            "{label} must be at most {PROFILE_FIELD_MAX_LENGTH} characters"
        ))
        .into());
    }
    Ok(value)
}
