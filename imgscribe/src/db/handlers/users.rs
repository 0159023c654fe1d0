//! Database repository for users.

use chrono::{DateTime, Utc};
use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::users::{OtpUpdate, UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
    },
    types::{UserId, abbrev_uuid},
};

const USER_COLUMNS: &str = "id, username, email, password_hash, otp_hash, otp_expires_at, created_at, updated_at";

pub struct Users<'c> {
    db: &'c mut PgConnection,
}

#[async_trait::async_trait]
impl<'c> Repository for Users<'c> {
    type CreateRequest = UserCreateDBRequest;
    type Response = UserDBResponse;
    type Id = UserId;

    #[instrument(skip(self, request), fields(username = %request.username), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            INSERT INTO users (id, username, email, password_hash)
            VALUES ($1, $2, $3, $4)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(Uuid::new_v4())
        .bind(&request.username)
        .bind(&request.email)
        .bind(&request.password_hash)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    #[instrument(skip(self), fields(user_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1"))
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let users = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users ORDER BY created_at ASC"))
            .fetch_all(&mut *self.db)
            .await?;

        Ok(users)
    }
}

impl<'c> Users<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }

    #[instrument(skip(self), err)]
    pub async fn get_user_by_username(&mut self, username: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!("SELECT {USER_COLUMNS} FROM users WHERE username = $1"))
            .bind(username)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(user)
    }

    /// Emails are not unique; the oldest account with the address wins.
    #[instrument(skip(self, email), err)]
    pub async fn get_user_by_email(&mut self, email: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE email = $1 ORDER BY created_at ASC LIMIT 1"
        ))
        .bind(email)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }

    /// Apply a password and/or OTP change in a single statement.
    #[instrument(skip(self, request), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn update(&mut self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let (touch_otp, otp_hash, otp_expires_at): (bool, Option<&str>, Option<DateTime<Utc>>) = match &request.otp {
            Some(OtpUpdate::Issue { otp_hash, expires_at }) => (true, Some(otp_hash.as_str()), Some(*expires_at)),
            Some(OtpUpdate::Clear) => (true, None, None),
            None => (false, None, None),
        };

        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            UPDATE users SET
                password_hash = COALESCE($2, password_hash),
                otp_hash = CASE WHEN $3 THEN $4::text ELSE otp_hash END,
                otp_expires_at = CASE WHEN $3 THEN $5::timestamptz ELSE otp_expires_at END,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(request.password_hash.as_deref())
        .bind(touch_otp)
        .bind(otp_hash)
        .bind(otp_expires_at)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(user)
    }

    /// Compare-and-clear: the row only changes if `otp_hash` is still pending and unexpired.
    #[instrument(skip(self, otp_hash, password_hash), fields(user_id = %abbrev_uuid(&id)), err)]
    pub async fn consume_otp(&mut self, id: UserId, otp_hash: &str, password_hash: &str) -> Result<Option<UserDBResponse>> {
        let user = sqlx::query_as::<_, UserDBResponse>(&format!(
            r#"
            UPDATE users SET
                password_hash = $3,
                otp_hash = NULL,
                otp_expires_at = NULL,
                updated_at = NOW()
            WHERE id = $1 AND otp_hash = $2 AND otp_expires_at > NOW()
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id)
        .bind(otp_hash)
        .bind(password_hash)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(user)
    }
}
