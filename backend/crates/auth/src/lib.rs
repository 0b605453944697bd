//! Auth (Authentication) Backend Module
//!
//! Clean Architecture structure:
//! - `domain/` - Entities, value objects, repository and mailer ports
//! - `application/` - Use cases, session resolver, authorization gate, OTP
//! - `infra/` - PostgreSQL store and email transports
//! - `presentation/` - Procedure handlers, DTOs, router, middleware
//!
//! ## Features
//! - Sign up / sign in with username + password
//! - Server-side sessions, carried as a bearer token or a signed cookie
//! - Email verification and password reset by 6-digit one-time codes
//! - Self-service profile updates
//!
//! ## Security Model
//! - Passwords hashed with Argon2id
//! - Session and OTP validity is checked against the store on every use
//! - OTP codes are stored as keyed hashes, bounded by an attempt counter
//!   and consumed by compare-and-delete; consuming or exhausting a code
//!   also retires every older code for the same address and purpose
//! - Fixed-window rate limits per client IP, per `(purpose, email)` for OTP
//!   sends and checks, and per user name for sign-in

pub mod application;
pub mod domain;
pub mod error;
pub mod infra;
pub mod presentation;

#[cfg(test)]
mod tests;

// Re-exports for convenience
pub use application::config::AuthConfig;
pub use application::guard::{RequestContext, protected};
pub use application::session_resolver::SessionResolver;
pub use domain::entity::Identity;
pub use error::{AuthError, AuthResult};
pub use infra::mailer::{Mailer, MailerConfig};
pub use infra::postgres::PgAuthRepository;
pub use presentation::router::{auth_router, auth_router_generic};

// Re-export kernel error types for unified error handling
pub use kernel::error::{
    app_error::{AppError, AppResult},
    kind::ErrorKind,
};
