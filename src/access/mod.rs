//! Access-control collaborator.
//!
//! Every lifecycle and read entry point asks `can` before any store or
//! filesystem interaction; denial surfaces as a permission error and
//! nothing else runs.

use async_trait::async_trait;

use crate::entity::{EntityId, OwnerId};
use crate::error::Result;

/// The principal performing an operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Actor {
    pub user_id: OwnerId,
}

/// Which rows an actor may see.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    All,
    Owner(OwnerId),
}

impl Visibility {
    pub fn permits(&self, owner: OwnerId) -> bool {
        match self {
            Visibility::All => true,
            Visibility::Owner(id) => *id == owner,
        }
    }
}

/// Grant returned by a successful permission check.
#[derive(Debug, Clone, Copy)]
pub struct Permission {
    pub visibility: Visibility,
}

#[async_trait]
pub trait AccessControl: Send + Sync {
    /// Check whether `actor` may perform `action` (e.g. `streams:create`)
    /// on the optional target. Returns the visibility scope on success and
    /// `Error::PermissionDenied` otherwise.
    async fn can(
        &self,
        actor: &Actor,
        action: &str,
        target: Option<EntityId>,
    ) -> Result<Permission>;
}

/// Grants everything with full visibility. Wiring/test implementation.
#[derive(Debug, Default)]
pub struct AllowAll;

#[async_trait]
impl AccessControl for AllowAll {
    async fn can(
        &self,
        _actor: &Actor,
        _action: &str,
        _target: Option<EntityId>,
    ) -> Result<Permission> {
        Ok(Permission {
            visibility: Visibility::All,
        })
    }
}
