//! Database models for uploaded images.

use chrono::{DateTime, Utc};
use sqlx::FromRow;

use crate::types::ImageId;

/// Database entity model
#[derive(Debug, Clone, PartialEq, FromRow)]
pub struct UploadedImage {
    pub id: ImageId,
    /// Object key the image was stored under
    pub name: String,
    /// Public URL of the stored object
    pub url: String,
    pub created_at: DateTime<Utc>,
}

/// Request for recording an uploaded image
#[derive(Debug, Clone)]
pub struct UploadedImageCreateDBRequest {
    pub name: String,
    pub url: String,
}
