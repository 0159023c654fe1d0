use axum::{
    Json,
    extract::{Multipart, State},
    http::{HeaderMap, StatusCode},
};

use crate::{
    AppState,
    api::{
        handlers::session_key,
        models::images::{
            DescriptionRecordResponse, GenerateDescriptionRequest, GenerateDescriptionResponse, SaveRecordRequest, UploadForm,
            UploadResponse,
        },
    },
    errors::Error,
};

/// Multipart field carrying the image
const IMAGE_FIELD: &str = "image";

/// Upload an image to the bucket
#[utoipa::path(
    post,
    path = "/upload",
    tag = "images",
    request_body(content = UploadForm, content_type = "multipart/form-data"),
    params(("x-session-id" = Option<String>, Header, description = "Scopes the remembered upload to one client")),
    responses(
        (status = 200, description = "File uploaded successfully", body = UploadResponse),
        (status = 400, description = "No image field in the request"),
        (status = 500, description = "Failed to upload image"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn upload_image(
    State(state): State<AppState>,
    headers: HeaderMap,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, Error> {
    while let Some(field) = multipart.next_field().await.map_err(|e| Error::BadRequest {
        message: format!("Invalid multipart body: {}", e.body_text()),
    })? {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let file_name = field
            .file_name()
            .filter(|name| !name.is_empty())
            .map(str::to_string)
            .ok_or_else(|| Error::BadRequest {
                message: "Uploaded image must have a file name".to_string(),
            })?;
        let content_type = field.content_type().map(str::to_string);
        let bytes = field.bytes().await.map_err(|e| Error::BadRequest {
            message: format!("Failed to read image: {}", e.body_text()),
        })?;

        let image_url = state
            .pipeline
            .handle_upload(&file_name, bytes, content_type.as_deref(), session_key(&headers))
            .await?;

        return Ok(Json(UploadResponse {
            message: "File uploaded successfully".to_string(),
            image_url,
        }));
    }

    Err(Error::BadRequest {
        message: "No image file provided".to_string(),
    })
}

/// Describe an image with the vision model
#[utoipa::path(
    post,
    path = "/api/generate-description",
    tag = "images",
    request_body = GenerateDescriptionRequest,
    params(("x-session-id" = Option<String>, Header, description = "Session whose last upload is described")),
    responses(
        (status = 200, description = "Image description generated successfully", body = GenerateDescriptionResponse),
        (status = 400, description = "No image URL given and nothing uploaded"),
        (status = 500, description = "The vision model call failed"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn generate_description(
    State(state): State<AppState>,
    headers: HeaderMap,
    Json(request): Json<GenerateDescriptionRequest>,
) -> Result<Json<GenerateDescriptionResponse>, Error> {
    let description = state
        .pipeline
        .handle_generate_description(request.model.as_deref(), request.image_url.as_deref(), session_key(&headers))
        .await?;

    Ok(Json(GenerateDescriptionResponse {
        message: "Image description generated successfully".to_string(),
        description,
    }))
}

/// Save an image URL and its description
#[utoipa::path(
    post,
    path = "/save",
    tag = "images",
    request_body = SaveRecordRequest,
    responses(
        (status = 201, description = "Record saved", body = DescriptionRecordResponse),
        (status = 400, description = "imageUrl or description missing"),
        (status = 500, description = "Failed to save data"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn save_record(
    State(state): State<AppState>,
    Json(request): Json<SaveRecordRequest>,
) -> Result<(StatusCode, Json<DescriptionRecordResponse>), Error> {
    let record = state.pipeline.save_record(request.image_url, request.description).await?;
    Ok((StatusCode::CREATED, Json(record.into())))
}

/// List every saved record
#[utoipa::path(
    get,
    path = "/api/images",
    tag = "images",
    responses(
        (status = 200, description = "All saved records, oldest first", body = [DescriptionRecordResponse]),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn list_records(State(state): State<AppState>) -> Result<Json<Vec<DescriptionRecordResponse>>, Error> {
    let records = state.pipeline.list_records().await?;
    Ok(Json(records.into_iter().map(Into::into).collect()))
}
