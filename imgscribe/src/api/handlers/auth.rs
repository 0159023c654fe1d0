use axum::{Json, extract::State, http::StatusCode};
use chrono::Utc;

use crate::{
    AppState,
    api::models::auth::{
        ForgetPasswordRequest, LoginRequest, LoginResponse, LoginUser, MessageResponse, RegisterRequest, ResetPasswordRequest,
    },
    auth::{
        otp::{issue_otp, verify_otp},
        password::{self, Argon2Params},
    },
    db::models::users::{UserCreateDBRequest, UserUpdateDBRequest},
    errors::Error,
};

fn invalid_credentials() -> Error {
    Error::Unauthenticated {
        message: Some("Invalid credentials".to_string()),
    }
}

fn invalid_otp() -> Error {
    Error::BadRequest {
        message: "Invalid or expired OTP".to_string(),
    }
}

fn user_not_found() -> Error {
    Error::NotFound {
        message: "User not found".to_string(),
    }
}

/// Register a new user account
#[utoipa::path(
    post,
    path = "/api/register",
    request_body = RegisterRequest,
    tag = "authentication",
    responses(
        (status = 201, description = "User registered successfully", body = MessageResponse),
        (status = 400, description = "Username already exists, or the password is out of bounds"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn register(
    State(state): State<AppState>,
    Json(request): Json<RegisterRequest>,
) -> Result<(StatusCode, Json<MessageResponse>), Error> {
    if state.users.get_user_by_username(&request.username).await?.is_some() {
        return Err(Error::BadRequest {
            message: "Username already exists".to_string(),
        });
    }

    let password_config = &state.config.auth.password;
    password::validate_password(&request.password, password_config)?;

    let password_hash = password::hash_string_blocking(request.password, Argon2Params::from(password_config)).await?;

    // A concurrent registration can still win the race; the unique constraint maps to the same 400
    state
        .users
        .create_user(&UserCreateDBRequest {
            username: request.username,
            email: request.email,
            password_hash,
        })
        .await?;

    Ok((StatusCode::CREATED, Json(MessageResponse::new("User registered successfully"))))
}

/// Check a username and password
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid credentials"),
    )
)]
#[tracing::instrument(skip_all, fields(username = %request.username))]
pub async fn login(State(state): State<AppState>, Json(request): Json<LoginRequest>) -> Result<Json<LoginResponse>, Error> {
    let user = state
        .users
        .get_user_by_username(&request.username)
        .await?
        .ok_or_else(invalid_credentials)?;

    if !password::verify_string_blocking(request.password, user.password_hash).await? {
        return Err(invalid_credentials());
    }

    Ok(Json(LoginResponse {
        success: true,
        message: "Login successful".to_string(),
        user: LoginUser { username: user.username },
    }))
}

/// Email a password reset OTP
#[utoipa::path(
    post,
    path = "/forget-password",
    request_body = ForgetPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "OTP sent to email", body = MessageResponse),
        (status = 404, description = "User not found"),
        (status = 500, description = "Error sending email"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn forget_password(
    State(state): State<AppState>,
    Json(request): Json<ForgetPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let user = state.users.get_user_by_email(&request.email).await?.ok_or_else(user_not_found)?;

    let auth = &state.config.auth;
    let issued = issue_otp(auth.otp.ttl, Argon2Params::from(&auth.password), Utc::now()).await?;

    state
        .users
        .update_user(
            user.id,
            &UserUpdateDBRequest {
                password_hash: None,
                otp: Some(issued.update),
            },
        )
        .await?;

    state.email.send_otp_email(&request.email, &issued.otp).await?;

    Ok(Json(MessageResponse::new("OTP sent to email")))
}

/// Set a new password using an emailed OTP
#[utoipa::path(
    post,
    path = "/reset-password",
    request_body = ResetPasswordRequest,
    tag = "authentication",
    responses(
        (status = 200, description = "Password reset successful", body = MessageResponse),
        (status = 400, description = "Invalid or expired OTP"),
        (status = 404, description = "User not found"),
    )
)]
#[tracing::instrument(skip_all)]
pub async fn reset_password(
    State(state): State<AppState>,
    Json(request): Json<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, Error> {
    let user = state.users.get_user_by_email(&request.email).await?.ok_or_else(user_not_found)?;

    let Some(checked_hash) = user.otp_hash.clone() else {
        return Err(invalid_otp());
    };
    if !verify_otp(&user, &request.otp, Utc::now()).await? {
        return Err(invalid_otp());
    }

    let password_config = &state.config.auth.password;
    password::validate_password(&request.new_password, password_config)?;
    let password_hash = password::hash_string_blocking(request.new_password, Argon2Params::from(password_config)).await?;

    // Only succeeds if the OTP checked above is still pending; a concurrent reset or a newly
    // issued OTP makes this a no-op
    state
        .users
        .consume_otp(user.id, &checked_hash, &password_hash)
        .await?
        .ok_or_else(invalid_otp)?;

    Ok(Json(MessageResponse::new("Password reset successful")))
}
