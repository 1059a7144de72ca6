//! In-memory entity store.
//!
//! Backs tests and single-process deployments. Rows live in a concurrent
//! map keyed by id; the id counter only ever moves forward, so ids are
//! never reused even after soft deletion.

use async_trait::async_trait;
use chrono::Utc;
use dashmap::DashMap;
use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;

use crate::access::Visibility;
use crate::entity::{EntityId, EntityPatch, NewEntity, RoutingEntity};
use crate::error::{Error, Result};
use crate::store::{EntityStore, ListOptions, QueryOptions};

#[derive(Clone)]
pub struct MemoryStore {
    rows: Arc<DashMap<EntityId, RoutingEntity>>,
    next_id: Arc<AtomicI64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            rows: Arc::new(DashMap::new()),
            next_id: Arc::new(AtomicI64::new(1)),
        }
    }
}

#[async_trait]
impl EntityStore for MemoryStore {
    async fn insert(&self, entity: NewEntity) -> Result<RoutingEntity> {
        let id = EntityId(self.next_id.fetch_add(1, Ordering::SeqCst));
        let now = Utc::now();
        let row = RoutingEntity {
            id,
            kind: entity.kind,
            owner_id: entity.owner_id,
            enabled: entity.enabled,
            is_deleted: false,
            certificate: entity.certificate,
            listen: entity.listen,
            meta: entity.meta,
            created_on: now,
            modified_on: now,
        };
        self.rows.insert(id, row.clone());
        Ok(row)
    }

    async fn patch_by_id(&self, id: EntityId, patch: EntityPatch) -> Result<RoutingEntity> {
        let mut row = self
            .rows
            .get_mut(&id)
            .ok_or_else(|| Error::Store(format!("patch target {id} does not exist")))?;

        if let Some(enabled) = patch.enabled {
            row.enabled = enabled;
        }
        if let Some(is_deleted) = patch.is_deleted {
            row.is_deleted = is_deleted;
        }
        if let Some(certificate) = patch.certificate {
            row.certificate = certificate;
        }
        if let Some(listen) = patch.listen {
            if !listen.matches_kind(row.kind) {
                return Err(Error::Store(format!(
                    "listen spec shape does not match kind {} for {id}",
                    row.kind
                )));
            }
            row.listen = listen;
        }
        if let Some(meta) = patch.meta {
            row.meta = meta;
        }
        row.modified_on = Utc::now();
        Ok(row.clone())
    }

    async fn get_by_id(&self, id: EntityId, opts: &QueryOptions) -> Result<Option<RoutingEntity>> {
        Ok(self.rows.get(&id).map(|r| r.clone()).filter(|row| {
            !row.is_deleted && opts.visibility.permits(row.owner_id)
        }))
    }

    async fn get_any(&self, id: EntityId) -> Result<Option<RoutingEntity>> {
        Ok(self.rows.get(&id).map(|r| r.clone()))
    }

    async fn list_all(&self, opts: &ListOptions) -> Result<Vec<RoutingEntity>> {
        let mut rows: Vec<RoutingEntity> = self
            .rows
            .iter()
            .map(|r| r.value().clone())
            .filter(|row| !row.is_deleted && opts.visibility.permits(row.owner_id))
            .filter(|row| match &opts.search {
                Some(needle) => row.listen.primary_address().contains(needle.as_str()),
                None => true,
            })
            .collect();
        rows.sort_by_key(|row| row.listen.sort_key());
        Ok(rows)
    }

    async fn count_all(&self, visibility: &Visibility) -> Result<u64> {
        Ok(self
            .rows
            .iter()
            .filter(|r| !r.is_deleted && visibility.permits(r.owner_id))
            .count() as u64)
    }
}
