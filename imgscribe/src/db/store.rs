//! Store abstractions used by the pipeline and the account handlers.
//!
//! The HTTP layer never touches repositories directly; it goes through these traits so the
//! backing store can be PostgreSQL ([`crate::db::postgres::PgStore`]) or the in-process
//! [`crate::db::memory::MemoryStore`].

use async_trait::async_trait;

use crate::{
    db::{
        errors::Result,
        models::{
            descriptions::{DescriptionRecord, DescriptionRecordCreateDBRequest},
            images::{UploadedImage, UploadedImageCreateDBRequest},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
    },
    types::UserId,
};

/// Persistence for uploaded images and saved description records.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Record an image that has been written to the object store
    async fn create_uploaded_image(&self, request: &UploadedImageCreateDBRequest) -> Result<UploadedImage>;

    /// All uploaded images, oldest first
    async fn list_uploaded_images(&self) -> Result<Vec<UploadedImage>>;

    /// Save a description record. Identical inputs always produce a new record.
    async fn create_description_record(&self, request: &DescriptionRecordCreateDBRequest) -> Result<DescriptionRecord>;

    /// All description records, oldest first
    async fn list_description_records(&self) -> Result<Vec<DescriptionRecord>>;
}

/// Persistence for user accounts.
#[async_trait]
pub trait UserStore: Send + Sync {
    /// Create a user. Fails with a unique violation on `users_username_unique` if the username
    /// is taken.
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse>;

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>>;

    /// Oldest user with the given email, if any
    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>>;

    /// Apply a password and/or OTP change atomically
    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse>;

    /// Set a new password and clear the pending OTP, but only while that OTP is still the one
    /// hashed as `otp_hash` and has not expired. Returns `None` if another request consumed or
    /// replaced it first.
    async fn consume_otp(&self, id: UserId, otp_hash: &str, password_hash: &str) -> Result<Option<UserDBResponse>>;

    async fn list_users(&self) -> Result<Vec<UserDBResponse>>;
}

/// Name of the unique constraint guarding usernames
pub const USERNAME_UNIQUE_CONSTRAINT: &str = "users_username_unique";
