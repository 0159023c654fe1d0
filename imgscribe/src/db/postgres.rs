//! PostgreSQL-backed [`RecordStore`] and [`UserStore`].

use async_trait::async_trait;
use sqlx::PgPool;

use crate::{
    db::{
        errors::Result,
        handlers::{DescriptionRecords, Images, Repository, Users},
        models::{
            descriptions::{DescriptionRecord, DescriptionRecordCreateDBRequest},
            images::{UploadedImage, UploadedImageCreateDBRequest},
            users::{UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
        store::{RecordStore, UserStore},
    },
    types::UserId,
};

/// Store that acquires a pooled connection per call and delegates to the repositories.
#[derive(Debug, Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl RecordStore for PgStore {
    async fn create_uploaded_image(&self, request: &UploadedImageCreateDBRequest) -> Result<UploadedImage> {
        let mut conn = self.pool.acquire().await?;
        Images::new(&mut conn).create(request).await
    }

    async fn list_uploaded_images(&self) -> Result<Vec<UploadedImage>> {
        let mut conn = self.pool.acquire().await?;
        Images::new(&mut conn).list().await
    }

    async fn create_description_record(&self, request: &DescriptionRecordCreateDBRequest) -> Result<DescriptionRecord> {
        let mut conn = self.pool.acquire().await?;
        DescriptionRecords::new(&mut conn).create(request).await
    }

    async fn list_description_records(&self) -> Result<Vec<DescriptionRecord>> {
        let mut conn = self.pool.acquire().await?;
        DescriptionRecords::new(&mut conn).list().await
    }
}

#[async_trait]
impl UserStore for PgStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).create(request).await
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_username(username).await
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).get_user_by_email(email).await
    }

    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).update(id, request).await
    }

    async fn consume_otp(&self, id: UserId, otp_hash: &str, password_hash: &str) -> Result<Option<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).consume_otp(id, otp_hash, password_hash).await
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        let mut conn = self.pool.acquire().await?;
        Users::new(&mut conn).list().await
    }
}
