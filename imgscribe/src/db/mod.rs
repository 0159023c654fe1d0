//! Database layer for data persistence and access.
//!
//! ```text
//! ┌─────────────┐
//! │  Handlers   │  (API request handlers, pipeline)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │   Stores    │  (db::store traits: PgStore or MemoryStore)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │ Repositories│  (db::handlers - queries over a PgConnection)
//! └──────┬──────┘
//!        │
//!        ↓
//! ┌─────────────┐
//! │  PostgreSQL │
//! └─────────────┘
//! ```
//!
//! # Modules
//!
//! - [`store`]: the [`store::RecordStore`] and [`store::UserStore`] traits
//! - [`postgres`]: PostgreSQL implementation of both stores
//! - [`memory`]: in-process implementation of both stores
//! - [`handlers`]: Repository implementations for the PostgreSQL tables
//! - [`models`]: Database record structures matching table schemas
//! - [`errors`]: Database-specific error types
//!
//! # Migrations
//!
//! Migrations live in `migrations/` and are embedded by [`crate::migrator`]:
//!
//! ```ignore
//! imgscribe::migrator().run(&pool).await?;
//! ```

pub mod errors;
pub mod handlers;
pub mod memory;
pub mod models;
pub mod postgres;
pub mod store;
