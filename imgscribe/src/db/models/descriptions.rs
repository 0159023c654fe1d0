//! Database models for saved image descriptions.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::RecordId;

/// A saved `(image_url, description)` pair.
///
/// `image_url` is whatever the client supplied; it is not required to reference an uploaded image.
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct DescriptionRecord {
    pub id: RecordId,
    pub image_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

/// Request for saving a description record
#[derive(Debug, Clone)]
pub struct DescriptionRecordCreateDBRequest {
    pub image_url: String,
    pub description: String,
}
