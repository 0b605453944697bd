//! Sign Out Use Case
//!
//! Deletes the caller's current session. Other sessions stay valid.

use std::sync::Arc;

use crate::domain::entity::Identity;
use crate::domain::repository::SessionRepository;
use crate::error::AuthResult;

/// Sign out use case
pub struct SignOutUseCase<S>
where
    S: SessionRepository,
{
    session_repo: Arc<S>,
}

impl<S> SignOutUseCase<S>
where
    S: SessionRepository,
{
    pub fn new(session_repo: Arc<S>) -> Self {
        Self { session_repo }
    }

    pub async fn execute(&self, identity: &Identity) -> AuthResult<()> {
        let deleted = self.session_repo.delete_session(identity.session.id).await?;

        tracing::info!(
            user_id = %identity.user.id,
            session_id = %identity.session.id,
            deleted,
            "User signed out"
        );
        Ok(())
    }
}
