use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::{db::models::descriptions::DescriptionRecord, types::RecordId};

/// Multipart body of `POST /upload`
#[derive(Debug, ToSchema)]
#[allow(dead_code)]
pub struct UploadForm {
    /// The image file. Its file name becomes the object key.
    #[schema(value_type = String, format = Binary)]
    pub image: Vec<u8>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct UploadResponse {
    pub message: String,
    /// Public URL the image was stored under
    pub image_url: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDescriptionRequest {
    /// Model to use; the configured default when absent or empty
    #[serde(default)]
    pub model: Option<String>,
    /// Image to describe; the caller's most recent upload when absent
    #[serde(default)]
    pub image_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct GenerateDescriptionResponse {
    pub message: String,
    pub description: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct SaveRecordRequest {
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub image_url: Option<String>,
}

/// A saved `(imageUrl, description)` pair
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionRecordResponse {
    #[schema(value_type = String, format = Uuid)]
    pub id: RecordId,
    pub image_url: String,
    pub description: String,
    pub created_at: DateTime<Utc>,
}

impl From<DescriptionRecord> for DescriptionRecordResponse {
    fn from(record: DescriptionRecord) -> Self {
        Self {
            id: record.id,
            image_url: record.image_url,
            description: record.description,
            created_at: record.created_at,
        }
    }
}
