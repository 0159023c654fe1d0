//! In-process store, selected with `database.type: memory`.
//!
//! Data lives for the lifetime of the process. It mirrors the PostgreSQL store's observable
//! behavior: insertion-ordered listings, unique usernames, oldest-first email lookup.

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::RwLock;
use uuid::Uuid;

use crate::{
    db::{
        errors::{DbError, Result},
        models::{
            descriptions::{DescriptionRecord, DescriptionRecordCreateDBRequest},
            images::{UploadedImage, UploadedImageCreateDBRequest},
            users::{OtpUpdate, UserCreateDBRequest, UserDBResponse, UserUpdateDBRequest},
        },
        store::{RecordStore, USERNAME_UNIQUE_CONSTRAINT, UserStore},
    },
    types::UserId,
};

#[derive(Debug, Default)]
struct Tables {
    images: Vec<UploadedImage>,
    records: Vec<DescriptionRecord>,
    users: Vec<UserDBResponse>,
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn create_uploaded_image(&self, request: &UploadedImageCreateDBRequest) -> Result<UploadedImage> {
        let image = UploadedImage {
            id: Uuid::new_v4(),
            name: request.name.clone(),
            url: request.url.clone(),
            created_at: Utc::now(),
        };
        self.tables.write().await.images.push(image.clone());
        Ok(image)
    }

    async fn list_uploaded_images(&self) -> Result<Vec<UploadedImage>> {
        Ok(self.tables.read().await.images.clone())
    }

    async fn create_description_record(&self, request: &DescriptionRecordCreateDBRequest) -> Result<DescriptionRecord> {
        let record = DescriptionRecord {
            id: Uuid::new_v4(),
            image_url: request.image_url.clone(),
            description: request.description.clone(),
            created_at: Utc::now(),
        };
        self.tables.write().await.records.push(record.clone());
        Ok(record)
    }

    async fn list_description_records(&self) -> Result<Vec<DescriptionRecord>> {
        Ok(self.tables.read().await.records.clone())
    }
}

#[async_trait]
impl UserStore for MemoryStore {
    async fn create_user(&self, request: &UserCreateDBRequest) -> Result<UserDBResponse> {
        let mut tables = self.tables.write().await;
        if tables.users.iter().any(|u| u.username == request.username) {
            return Err(DbError::UniqueViolation {
                constraint: Some(USERNAME_UNIQUE_CONSTRAINT.to_string()),
                table: Some("users".to_string()),
                message: format!("Key (username)=({}) already exists.", request.username),
            });
        }

        let now = Utc::now();
        let user = UserDBResponse {
            id: Uuid::new_v4(),
            username: request.username.clone(),
            email: request.email.clone(),
            password_hash: request.password_hash.clone(),
            otp_hash: None,
            otp_expires_at: None,
            created_at: now,
            updated_at: now,
        };
        tables.users.push(user.clone());
        Ok(user)
    }

    async fn get_user_by_username(&self, username: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.tables.read().await.users.iter().find(|u| u.username == username).cloned())
    }

    async fn get_user_by_email(&self, email: &str) -> Result<Option<UserDBResponse>> {
        Ok(self.tables.read().await.users.iter().find(|u| u.email == email).cloned())
    }

    async fn update_user(&self, id: UserId, request: &UserUpdateDBRequest) -> Result<UserDBResponse> {
        let mut tables = self.tables.write().await;
        let user = tables.users.iter_mut().find(|u| u.id == id).ok_or(DbError::NotFound)?;

        if let Some(password_hash) = &request.password_hash {
            user.password_hash = password_hash.clone();
        }
        match &request.otp {
            Some(OtpUpdate::Issue { otp_hash, expires_at }) => {
                user.otp_hash = Some(otp_hash.clone());
                user.otp_expires_at = Some(*expires_at);
            }
            Some(OtpUpdate::Clear) => {
                user.otp_hash = None;
                user.otp_expires_at = None;
            }
            None => {}
        }
        user.updated_at = Utc::now();

        Ok(user.clone())
    }

    async fn consume_otp(&self, id: UserId, otp_hash: &str, password_hash: &str) -> Result<Option<UserDBResponse>> {
        let mut tables = self.tables.write().await;
        let Some(user) = tables.users.iter_mut().find(|u| u.id == id) else {
            return Ok(None);
        };

        let pending = user.otp_hash.as_deref() == Some(otp_hash) && user.otp_expires_at.is_some_and(|at| Utc::now() < at);
        if !pending {
            return Ok(None);
        }

        user.password_hash = password_hash.to_string();
        user.otp_hash = None;
        user.otp_expires_at = None;
        user.updated_at = Utc::now();

        Ok(Some(user.clone()))
    }

    async fn list_users(&self) -> Result<Vec<UserDBResponse>> {
        Ok(self.tables.read().await.users.clone())
    }
}
