//! Database repository for uploaded images.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::images::{UploadedImage, UploadedImageCreateDBRequest},
    },
    types::{ImageId, abbrev_uuid},
};

pub struct Images<'c> {
    db: &'c mut PgConnection,
}

impl<'c> Images<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for Images<'c> {
    type CreateRequest = UploadedImageCreateDBRequest;
    type Response = UploadedImage;
    type Id = ImageId;

    #[instrument(skip(self, request), fields(name = %request.name), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let image = sqlx::query_as::<_, UploadedImage>(
            r#"
            INSERT INTO uploaded_images (id, name, url)
            VALUES ($1, $2, $3)
            RETURNING id, name, url, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.name)
        .bind(&request.url)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(image)
    }

    #[instrument(skip(self), fields(image_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let image = sqlx::query_as::<_, UploadedImage>("SELECT id, name, url, created_at FROM uploaded_images WHERE id = $1")
            .bind(id)
            .fetch_optional(&mut *self.db)
            .await?;

        Ok(image)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let images = sqlx::query_as::<_, UploadedImage>("SELECT id, name, url, created_at FROM uploaded_images ORDER BY seq ASC")
            .fetch_all(&mut *self.db)
            .await?;

        Ok(images)
    }
}
