//! Infrastructure Layer
//!
//! Database implementations and external service integrations.

pub mod mailer;
pub mod postgres;

pub use mailer::{HttpEmailTransport, LogEmailTransport, Mailer, MailerConfig};
pub use postgres::PgAuthRepository;
