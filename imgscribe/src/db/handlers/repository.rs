//! Base repository trait for database operations.

/// Contains the Repository trait.
///
/// A repository is basically a data access layer for a postgres table. It provides methods for
/// creating and reading entities, and for listing the whole table.
///
/// Each repository is generic over the entity type T, which must implement sqlx::FromRow.
use crate::db::errors::Result;

/// Base repository trait providing common database operations
///
/// Records in this service are immutable once created, so there is no update or delete here;
/// repositories that need them (users) add their own methods.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// List every entity in insertion order
    async fn list(&mut self) -> Result<Vec<Self::Response>>;
}
