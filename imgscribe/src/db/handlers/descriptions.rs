//! Database repository for saved description records.

use sqlx::PgConnection;
use tracing::instrument;
use uuid::Uuid;

use crate::{
    db::{
        errors::Result,
        handlers::repository::Repository,
        models::descriptions::{DescriptionRecord, DescriptionRecordCreateDBRequest},
    },
    types::{RecordId, abbrev_uuid},
};

pub struct DescriptionRecords<'c> {
    db: &'c mut PgConnection,
}

impl<'c> DescriptionRecords<'c> {
    pub fn new(db: &'c mut PgConnection) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl<'c> Repository for DescriptionRecords<'c> {
    type CreateRequest = DescriptionRecordCreateDBRequest;
    type Response = DescriptionRecord;
    type Id = RecordId;

    #[instrument(skip(self, request), fields(image_url = %request.image_url), err)]
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response> {
        let record = sqlx::query_as::<_, DescriptionRecord>(
            r#"
            INSERT INTO description_records (id, image_url, description)
            VALUES ($1, $2, $3)
            RETURNING id, image_url, description, created_at
            "#,
        )
        .bind(Uuid::new_v4())
        .bind(&request.image_url)
        .bind(&request.description)
        .fetch_one(&mut *self.db)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self), fields(record_id = %abbrev_uuid(&id)), err)]
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>> {
        let record = sqlx::query_as::<_, DescriptionRecord>(
            "SELECT id, image_url, description, created_at FROM description_records WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.db)
        .await?;

        Ok(record)
    }

    #[instrument(skip(self), err)]
    async fn list(&mut self) -> Result<Vec<Self::Response>> {
        let records = sqlx::query_as::<_, DescriptionRecord>(
            "SELECT id, image_url, description, created_at FROM description_records ORDER BY seq ASC",
        )
        .fetch_all(&mut *self.db)
        .await?;

        Ok(records)
    }
}
