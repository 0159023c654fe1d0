//! Account credentials.
//!
//! - [`password`]: Argon2id hashing and verification, password length rules
//! - [`otp`]: one-time codes for password reset

pub mod otp;
pub mod password;
