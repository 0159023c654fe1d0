//! API request and response data models.
//!
//! These are distinct from the database models in [`crate::db::models`]. JSON field names are
//! camelCase, and every model is annotated with `utoipa` for the generated docs.
//!
//! - [`images`]: upload, description and saved record payloads
//! - [`auth`]: registration, login and password reset payloads

pub mod auth;
pub mod images;
