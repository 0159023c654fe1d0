//! Repository implementations for PostgreSQL access.
//!
//! Each repository wraps a `PgConnection` (or a transaction dereferencing to one), binds query
//! parameters, and returns the models from [`crate::db::models`].
//!
//! # Available Repositories
//!
//! - [`Images`]: records of images uploaded to the object store
//! - [`DescriptionRecords`]: saved `(image_url, description)` pairs
//! - [`Users`]: user accounts, password hashes and pending OTPs
//!
//! # Common Pattern
//!
//! ```ignore
//! use imgscribe::db::handlers::{DescriptionRecords, Repository};
//!
//! async fn example(pool: &sqlx::PgPool) -> Result<(), Box<dyn std::error::Error>> {
//!     let mut conn = pool.acquire().await?;
//!     let mut repo = DescriptionRecords::new(&mut conn);
//!     let records = repo.list().await?;
//!     Ok(())
//! }
//! ```

pub mod descriptions;
pub mod images;
pub mod repository;
pub mod users;

pub use descriptions::DescriptionRecords;
pub use images::Images;
pub use repository::Repository;
pub use users::Users;
