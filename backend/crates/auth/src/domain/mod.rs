//! Domain Layer
//!
//! Contains entities, value objects, repository traits and the email
//! transport port.

pub mod entity;
pub mod mailer;
pub mod repository;
pub mod value_object;

// Re-exports
pub use entity::{Identity, Session, User, Verification};
pub use mailer::EmailTransport;
pub use repository::{AuthStore, SessionRepository, UserRepository, VerificationRepository};
