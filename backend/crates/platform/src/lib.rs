//! Platform Crate - Technical Infrastructure
//!
//! This crate provides shared technical foundations:
//! - Cryptographic utilities (HMAC-SHA256, Base64, constant-time compare)
//! - Password hashing (Argon2id with pepper)
//! - Cookie management (signed session cookies are built on top of this)
//! - Client metadata extraction (IP, User-Agent)
//! - Declarative CORS policy
//! - Fixed-window rate limiting abstractions

pub mod client;
pub mod cookie;
pub mod cors;
pub mod crypto;
pub mod password;
pub mod rate_limit;
