//! Entities

pub mod identity;
pub mod session;
pub mod user;
pub mod verification;

pub use identity::{Identity, SessionSnapshot, UserSnapshot};
pub use session::Session;
pub use user::{ProfilePatch, User, UserContact};
pub use verification::Verification;
