//! Base repository trait for database operations.

use std::collections::HashMap;

use crate::db::errors::Result;
use crate::types::UserId;

/// Base repository trait providing common database operations
///
/// A repository is a data access layer for one postgres table. It has separate associated types
/// for create requests, update requests, and responses. Entity specific operations (balance
/// updates, counters) are inherent methods on the repository struct.
#[async_trait::async_trait]
pub trait Repository {
    /// The request type for creating entities
    type CreateRequest;

    /// The request type for updating entities
    type UpdateRequest;

    /// The response/DTO type returned by operations
    type Response;

    /// The identifier type for lookups
    type Id: Send + Sync;

    /// The filter type for list operations
    type Filter: Send + Sync;

    /// Create a new entity
    async fn create(&mut self, request: &Self::CreateRequest) -> Result<Self::Response>;

    /// Get an entity by ID
    async fn get_by_id(&mut self, id: Self::Id) -> Result<Option<Self::Response>>;

    /// Get lots of entities by their IDs, keyed by ID
    async fn get_bulk(&mut self, ids: Vec<Self::Id>) -> Result<HashMap<Self::Id, Self::Response>>;

    /// List entities with filtering and pagination
    async fn list(&mut self, filter: &Self::Filter) -> Result<Vec<Self::Response>>;

    /// Delete an entity by ID
    async fn delete(&mut self, id: Self::Id) -> Result<bool>;

    /// Update an entity by ID
    async fn update(&mut self, id: Self::Id, request: &Self::UpdateRequest) -> Result<Self::Response>;
}

/// List filter for entities owned by one user
#[derive(Debug, Clone)]
pub struct OwnerFilter {
    pub owner_id: UserId,
    pub skip: i64,
    pub limit: i64,
}

impl OwnerFilter {
    pub fn new(owner_id: UserId, skip: i64, limit: i64) -> Self {
        Self { owner_id, skip, limit }
    }

    /// Everything the owner has, for overview pages.
    pub fn all(owner_id: UserId) -> Self {
        Self::new(owner_id, 0, i64::MAX)
    }
}
