//! HTTP API: axum handlers and their request/response models.
//!
//! - **Images**: `POST /upload`, `POST /api/generate-description`, `POST /save`, `GET /api/images`
//! - **Accounts**: `POST /api/register`, `POST /login`, `POST /forget-password`,
//!   `POST /reset-password`
//!
//! OpenAPI documentation for every route is served at `/docs`.

pub mod handlers;
pub mod models;
