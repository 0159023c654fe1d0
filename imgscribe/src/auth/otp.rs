//! One-time codes for password reset.
//!
//! A code is 3 random bytes rendered as 6 lowercase hex characters. Only its hash is stored,
//! together with an expiry; issuing a new code replaces the previous one.

use chrono::{DateTime, Utc};
use rand::prelude::RngExt;
use rand::rng;
use std::time::Duration;

use crate::{
    auth::password::{Argon2Params, hash_string_blocking, verify_string_blocking},
    db::models::users::{OtpUpdate, UserDBResponse},
    errors::Error,
};

/// Generate a fresh 6-character hex OTP
pub fn generate_otp() -> String {
    let mut bytes = [0u8; 3];
    rng().fill(&mut bytes);
    bytes.iter().map(|b| format!("{b:02x}")).collect()
}

/// A newly issued OTP: the plaintext to email, and the update that stores its hash.
#[derive(Debug)]
pub struct IssuedOtp {
    pub otp: String,
    pub update: OtpUpdate,
}

/// Issue an OTP valid until `now + ttl`.
pub async fn issue_otp(ttl: Duration, params: Argon2Params, now: DateTime<Utc>) -> Result<IssuedOtp, Error> {
    let otp = generate_otp();
    let ttl = chrono::Duration::from_std(ttl).map_err(|e| Error::Internal {
        operation: format!("convert OTP ttl: {e}"),
    })?;
    let otp_hash = hash_string_blocking(otp.clone(), params).await?;

    Ok(IssuedOtp {
        otp,
        update: OtpUpdate::Issue {
            otp_hash,
            expires_at: now + ttl,
        },
    })
}

/// True iff `otp` matches the user's last issued code and `now` is strictly before its expiry.
pub async fn verify_otp(user: &UserDBResponse, otp: &str, now: DateTime<Utc>) -> Result<bool, Error> {
    let (Some(otp_hash), Some(expires_at)) = (&user.otp_hash, user.otp_expires_at) else {
        return Ok(false);
    };

    if now >= expires_at {
        return Ok(false);
    }

    verify_string_blocking(otp.to_string(), otp_hash.clone()).await
}
