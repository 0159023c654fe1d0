//! Database record structures.
//!
//! These types mirror the table schemas in `migrations/` and are what the repositories in
//! [`crate::db::handlers`] and the stores in [`crate::db::store`] return.
//!
//! - [`images`]: uploaded image records (`uploaded_images`)
//! - [`descriptions`]: saved image descriptions (`description_records`)
//! - [`users`]: user accounts and their pending password reset OTP (`users`)

pub mod descriptions;
pub mod images;
pub mod users;
