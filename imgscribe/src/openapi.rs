//! OpenAPI documentation, served at `/docs`.

use utoipa::OpenApi;

use crate::api::{
    handlers,
    models::{auth, images},
};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "imgscribe",
        description = "Upload images, describe them with a vision model, and keep the descriptions."
    ),
    paths(
        handlers::images::upload_image,
        handlers::images::generate_description,
        handlers::images::save_record,
        handlers::images::list_records,
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::forget_password,
        handlers::auth::reset_password,
    ),
    components(
        schemas(
            images::UploadForm,
            images::UploadResponse,
            images::GenerateDescriptionRequest,
            images::GenerateDescriptionResponse,
            images::SaveRecordRequest,
            images::DescriptionRecordResponse,
            auth::RegisterRequest,
            auth::LoginRequest,
            auth::LoginResponse,
            auth::LoginUser,
            auth::ForgetPasswordRequest,
            auth::ResetPasswordRequest,
            auth::MessageResponse,
        )
    ),
    tags(
        (name = "images", description = "Upload, describe and save images"),
        (name = "authentication", description = "Registration, login and password reset"),
    )
)]
pub struct ApiDoc;
