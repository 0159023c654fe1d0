//! Database models for users.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::UserId;

/// Database request for creating a new user.
///
/// The password must already be hashed; repositories never see plaintext passwords.
#[derive(Debug, Clone)]
pub struct UserCreateDBRequest {
    pub username: String,
    pub email: String,
    pub password_hash: String,
}

/// Change to the user's pending password reset OTP
#[derive(Debug, Clone, PartialEq)]
pub enum OtpUpdate {
    /// Replace any pending OTP with a newly issued one
    Issue { otp_hash: String, expires_at: DateTime<Utc> },
    /// Remove the pending OTP (after a successful reset)
    Clear,
}

/// Database request for updating a user
#[derive(Debug, Clone, Default)]
pub struct UserUpdateDBRequest {
    pub password_hash: Option<String>,
    pub otp: Option<OtpUpdate>,
}

/// Database response for a user
#[derive(Debug, Clone, FromRow)]
pub struct UserDBResponse {
    pub id: UserId,
    pub username: String,
    pub email: String,
    pub password_hash: String,
    pub otp_hash: Option<String>,
    pub otp_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
