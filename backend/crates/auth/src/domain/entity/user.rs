//! User Entity
//!
//! Account record: credentials, contact details and verification state.

use chrono::{DateTime, Utc};

use crate::domain::value_object::{
    UserId, email::Email, user_name::UserName, user_password::UserPassword, user_role::UserRole,
};

/// User entity
#[derive(Debug, Clone)]
pub struct User {
    pub user_id: UserId,
    pub user_name: UserName,
    pub email: Email,
    /// Only ever transitions false -> true
    pub email_verified: bool,
    pub password: UserPassword,
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
    pub device_id: Option<String>,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Fields accepted at sign-up besides the credentials
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserContact {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
    pub device_id: Option<String>,
}

impl User {
    /// Create a new, unverified user with the default role
    pub fn new(
        user_name: UserName,
        email: Email,
        password: UserPassword,
        contact: UserContact,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            user_id: UserId::new(),
            user_name,
            email,
            email_verified: false,
            password,
            name: contact.name,
            phone_number: contact.phone_number,
            second_phone: contact.second_phone,
            device_id: contact.device_id,
            role: UserRole::default(),
            created_at: now,
            updated_at: now,
        }
    }

    /// Apply a profile patch in memory; absent fields are left untouched
    pub fn apply_patch(&mut self, patch: &ProfilePatch, now: DateTime<Utc>) {
        if let Some(name) = &patch.name {
            self.name = Some(name.clone());
        }
        if let Some(phone) = &patch.phone_number {
            self.phone_number = Some(phone.clone());
        }
        if let Some(phone) = &patch.second_phone {
            self.second_phone = Some(phone.clone());
        }
        self.updated_at = now;
    }
}

/// Partial profile update
///
/// Holds only the self-editable fields, so an update can never touch
/// email, user name, role or verification state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ProfilePatch {
    pub name: Option<String>,
    pub phone_number: Option<String>,
    pub second_phone: Option<String>,
}

impl ProfilePatch {
    pub fn is_empty(&self) -> bool {
        self.name.is_none() && self.phone_number.is_none() && self.second_phone.is_none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use platform::password::HashingParams;

    use crate::domain::value_object::user_password::RawPassword;

    fn user() -> User {
        let raw = RawPassword::new("password123".to_string()).unwrap();
        User::new(
            UserName::new("alice").unwrap(),
            Email::new("alice@example.com").unwrap(),
            UserPassword::from_raw(&raw, None, HashingParams::minimal()).unwrap(),
            UserContact {
                name: Some("Alice".to_string()),
                ..Default::default()
            },
            Utc::now(),
        )
    }

    #[test]
    fn test_new_user_defaults() {
        let user = user();
        assert!(!user.email_verified);
        assert_eq!(user.role, UserRole::User);
        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert_eq!(user.created_at, user.updated_at);
    }

    #[test]
    fn test_apply_patch_only_touches_present_fields() {
        let mut user = user();
        let patch = ProfilePatch {
            phone_number: Some("+1-555-0100".to_string()),
            ..Default::default()
        };
        user.apply_patch(&patch, Utc::now());

        assert_eq!(user.name.as_deref(), Some("Alice"));
        assert_eq!(user.phone_number.as_deref(), Some("+1-555-0100"));
        assert_eq!(user.second_phone, None);
        assert!(ProfilePatch::default().is_empty());
        assert!(!patch.is_empty());
    }
}
