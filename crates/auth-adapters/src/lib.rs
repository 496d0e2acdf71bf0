//! # auth-adapters
//!
//! Identity implementations: Argon2 password hashing and, with the
//! `auth-jwt` feature, HS256 bearer tokens.

#[cfg(feature = "auth-jwt")]
pub mod jwt;
pub mod password;

#[cfg(feature = "auth-jwt")]
pub use jwt::JwtAuthenticator;
pub use password::Argon2Hasher;
