//! Entity Store collaborator.
//!
//! # Responsibilities
//! - Persist routing-entity rows (source of truth for intent)
//! - Soft delete: rows are flagged, never removed
//! - Visibility-scoped, searchable listing ordered by primary address
//!
//! # Design Decisions
//! - Ids are assigned by the store and never reused
//! - Reads filter `is_deleted` rows out; a separate unscoped fetch exists
//!   for audit reconstruction
//! - Certificate expansion resolves through the certificate service, the
//!   store holds only the weak reference

pub mod memory;

use async_trait::async_trait;

use crate::access::Visibility;
use crate::entity::{EntityId, EntityPatch, NewEntity, RoutingEntity};
use crate::error::Result;

/// Options for single-row fetches.
#[derive(Debug, Clone, Copy)]
pub struct QueryOptions {
    pub visibility: Visibility,
}

/// Options for listings.
#[derive(Debug, Clone)]
pub struct ListOptions {
    pub visibility: Visibility,
    /// Substring match over the kind-specific primary address field.
    pub search: Option<String>,
}

#[async_trait]
pub trait EntityStore: Send + Sync {
    /// Insert a new row and return it with its assigned id.
    async fn insert(&self, entity: NewEntity) -> Result<RoutingEntity>;

    /// Patch fields on an existing row and return the saved row.
    /// Deleted rows are still patchable (delete itself is a patch).
    async fn patch_by_id(&self, id: EntityId, patch: EntityPatch) -> Result<RoutingEntity>;

    /// Fetch one visible, non-deleted row.
    async fn get_by_id(&self, id: EntityId, opts: &QueryOptions) -> Result<Option<RoutingEntity>>;

    /// Fetch a row by id regardless of deletion or visibility. Used for
    /// audit reconstruction only.
    async fn get_any(&self, id: EntityId) -> Result<Option<RoutingEntity>>;

    /// All visible, non-deleted rows, ordered by primary address ascending.
    async fn list_all(&self, opts: &ListOptions) -> Result<Vec<RoutingEntity>>;

    /// Count of visible, non-deleted rows.
    async fn count_all(&self, visibility: &Visibility) -> Result<u64>;
}
