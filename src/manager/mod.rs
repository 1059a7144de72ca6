//! Entity lifecycle manager.
//!
//! # Responsibilities
//! - Orchestrate create/update/enable/disable/delete against the store,
//!   renderer and reconciler, keeping entity state and config presence in
//!   lockstep
//! - Invoke the certificate and audit collaborators at the correct points
//! - Visibility-scoped reads (`get`, `get_all`, `get_count`)
//!
//! # Design Decisions
//! - Every entry point asks access control before touching the store or
//!   the filesystem
//! - Per entity, the store is patched before the artifact is written, so
//!   the artifact never reflects state the store does not durably hold
//! - No entity-level lock: concurrent operations on one id are
//!   last-reload-wins, deliberately
//! - Audit failures are logged and swallowed, never abort an otherwise
//!   successful operation

use std::sync::Arc;

use crate::access::{AccessControl, Actor, Permission, Visibility};
use crate::audit::{AuditEntry, AuditLog};
use crate::certs::{CertificateDescriptor, CertificateService};
use crate::entity::view::{public_view, EntityView};
use crate::entity::{
    CertificateRef, CertificateRequest, CreateRequest, EntityId, EntityKind, EntityPatch,
    ListenSpec, NewEntity, RoutingEntity, UpdateRequest,
};
use crate::error::{Error, Result};
use crate::reconcile::Reconciler;
use crate::render::{render, ArtifactId};
use crate::store::{EntityStore, ListOptions, QueryOptions};

pub struct EntityManager {
    store: Arc<dyn EntityStore>,
    certs: Arc<dyn CertificateService>,
    audit: Arc<dyn AuditLog>,
    access: Arc<dyn AccessControl>,
    reconciler: Arc<Reconciler>,
}

impl EntityManager {
    pub fn new(
        store: Arc<dyn EntityStore>,
        certs: Arc<dyn CertificateService>,
        audit: Arc<dyn AuditLog>,
        access: Arc<dyn AccessControl>,
        reconciler: Arc<Reconciler>,
    ) -> Self {
        Self {
            store,
            certs,
            audit,
            access,
            reconciler,
        }
    }

    /// Create a routing entity and, when enabled, bring its artifact live.
    ///
    /// Any failure after the insert but before commit leaves the row
    /// present with no artifact: the entity exists but is inert until a
    /// later update or reconciliation pass.
    pub async fn create(&self, actor: &Actor, request: CreateRequest) -> Result<EntityView> {
        self.access.can(actor, "routing:create", None).await?;

        if !request.listen.matches_kind(request.kind) {
            return Err(Error::Validation(format!(
                "listen spec shape does not fit kind {}",
                request.kind
            )));
        }

        let wants_new_cert = request.certificate == CertificateRequest::New;
        let initial_ref = match request.certificate {
            CertificateRequest::None => CertificateRef::None,
            CertificateRequest::New => CertificateRef::Pending,
            CertificateRequest::Existing(id) => CertificateRef::Resolved(id),
        };

        // Streams are not routed by domain name; caller-supplied domains
        // never reach the store for them (they may still drive quick-cert
        // issuance below).
        let row = self
            .store
            .insert(NewEntity {
                kind: request.kind,
                owner_id: actor.user_id,
                enabled: request.enabled,
                certificate: initial_ref,
                listen: request.listen.clone(),
                meta: request.meta.clone(),
            })
            .await?;

        if wants_new_cert {
            let domains = effective_domains(&request.domain_names, &request.listen);
            let cert = self.certs.issue_quick(&domains, &row.meta).await?;
            self.store
                .patch_by_id(
                    row.id,
                    EntityPatch {
                        certificate: Some(CertificateRef::Resolved(cert.id)),
                        ..Default::default()
                    },
                )
                .await?;
        }

        // re-fetch with the certificate resolved
        let row = self
            .store
            .get_any(row.id)
            .await?
            .ok_or_else(|| Error::InternalConsistency(format!("inserted row {} vanished", row.id)))?;
        let cert = self.resolve_certificate(&row).await?;

        let row = if row.wants_artifact() {
            self.configure(&row, cert.as_ref()).await?
        } else {
            row
        };

        self.record_audit(actor, "created", row.kind, row.id, request_meta(&request))
            .await;

        Ok(public_view(&row, cert.as_ref()))
    }

    /// Update an entity in place and re-apply its artifact when enabled.
    pub async fn update(
        &self,
        actor: &Actor,
        id: EntityId,
        request: UpdateRequest,
    ) -> Result<EntityView> {
        let perm = self.access.can(actor, "routing:update", Some(id)).await?;
        let row = self.fetch_visible(id, &perm).await?;

        if row.id != id {
            // store corruption, not caller error
            return Err(Error::InternalConsistency(format!(
                "entity could not be updated, ids do not match: {} != {}",
                row.id, id
            )));
        }

        let effective_listen = request.listen.clone().unwrap_or_else(|| row.listen.clone());
        if !effective_listen.matches_kind(row.kind) {
            return Err(Error::Validation(format!(
                "listen spec shape does not fit kind {}",
                row.kind
            )));
        }

        let certificate = match request.certificate {
            Some(CertificateRequest::New) => {
                // domains default from the previous row so audit history
                // reflects the effective address
                let domains = effective_domains(&[], &effective_listen);
                let mut meta = row.meta.clone();
                if let Some(extra) = &request.meta {
                    meta.extend(extra.clone());
                }
                let cert = self.certs.issue_quick(&domains, &meta).await?;
                Some(CertificateRef::Resolved(cert.id))
            }
            Some(CertificateRequest::Existing(cert_id)) => {
                Some(CertificateRef::Resolved(cert_id))
            }
            Some(CertificateRequest::None) => Some(CertificateRef::None),
            None => None,
        };

        let mut merged_meta = row.meta.clone();
        if let Some(extra) = &request.meta {
            merged_meta.extend(extra.clone());
        }

        let saved = self
            .store
            .patch_by_id(
                id,
                EntityPatch {
                    listen: Some(effective_listen.clone()),
                    certificate,
                    meta: Some(merged_meta),
                    ..Default::default()
                },
            )
            .await?;

        let cert = self.resolve_certificate(&saved).await?;
        let saved = if saved.wants_artifact() {
            self.configure(&saved, cert.as_ref()).await?
        } else {
            saved
        };

        self.record_audit(
            actor,
            "updated",
            saved.kind,
            saved.id,
            serde_json::json!({
                "listen": effective_listen,
                "meta": request.meta,
            }),
        )
        .await;

        Ok(public_view(&saved, cert.as_ref()))
    }

    /// Enable a disabled entity: this both creates and activates its
    /// artifact.
    pub async fn enable(&self, actor: &Actor, id: EntityId) -> Result<EntityView> {
        let perm = self.access.can(actor, "routing:update", Some(id)).await?;
        let row = self.fetch_visible(id, &perm).await?;

        if row.enabled {
            return Err(Error::Validation(format!("entity {id} is already enabled")));
        }

        let row = self
            .store
            .patch_by_id(
                id,
                EntityPatch {
                    enabled: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        let cert = self.resolve_certificate(&row).await?;
        let row = self.configure(&row, cert.as_ref()).await?;

        let snapshot = view_meta(&row, cert.as_ref());
        self.record_audit(actor, "enabled", row.kind, row.id, snapshot)
            .await;

        Ok(public_view(&row, cert.as_ref()))
    }

    /// Disable an enabled entity and retire its artifact.
    ///
    /// The store is patched before the artifact is removed; a crash in
    /// between leaves `enabled=false` with a stale file, corrected by the
    /// next reconciliation pass.
    pub async fn disable(&self, actor: &Actor, id: EntityId) -> Result<EntityView> {
        let perm = self.access.can(actor, "routing:update", Some(id)).await?;
        let row = self.fetch_visible(id, &perm).await?;

        if !row.enabled {
            return Err(Error::Validation(format!(
                "entity {id} is already disabled"
            )));
        }

        let row = self
            .store
            .patch_by_id(
                id,
                EntityPatch {
                    enabled: Some(false),
                    ..Default::default()
                },
            )
            .await?;

        self.reconciler.retire(&ArtifactId::for_entity(&row)).await?;

        let cert = self.resolve_certificate(&row).await?;
        let snapshot = view_meta(&row, cert.as_ref());
        self.record_audit(actor, "disabled", row.kind, row.id, snapshot)
            .await;

        Ok(public_view(&row, cert.as_ref()))
    }

    /// Soft-delete an entity and retire its artifact. The row is retained
    /// for audit reconstruction via `get_any`.
    pub async fn delete(&self, actor: &Actor, id: EntityId) -> Result<()> {
        let perm = self.access.can(actor, "routing:delete", Some(id)).await?;
        let row = self.fetch_visible(id, &perm).await?;

        let cert = self.resolve_certificate(&row).await?;
        let snapshot = view_meta(&row, cert.as_ref());

        let row = self
            .store
            .patch_by_id(
                id,
                EntityPatch {
                    is_deleted: Some(true),
                    ..Default::default()
                },
            )
            .await?;

        self.reconciler.retire(&ArtifactId::for_entity(&row)).await?;

        self.record_audit(actor, "deleted", row.kind, row.id, snapshot)
            .await;
        Ok(())
    }

    /// Fetch one visible entity.
    pub async fn get(&self, actor: &Actor, id: EntityId) -> Result<EntityView> {
        let perm = self.access.can(actor, "routing:get", Some(id)).await?;
        let row = self.fetch_visible(id, &perm).await?;
        let cert = self.resolve_certificate(&row).await?;
        Ok(public_view(&row, cert.as_ref()))
    }

    /// Fetch a row by id regardless of deletion, for audit reconstruction.
    pub async fn get_any(&self, actor: &Actor, id: EntityId) -> Result<EntityView> {
        self.access.can(actor, "routing:get", Some(id)).await?;
        let row = self
            .store
            .get_any(id)
            .await?
            .ok_or(Error::NotFound(id))?;
        let cert = self.resolve_certificate(&row).await?;
        Ok(public_view(&row, cert.as_ref()))
    }

    /// All visible entities, optionally filtered by a substring of the
    /// primary address, ordered by that address ascending.
    pub async fn get_all(&self, actor: &Actor, search: Option<String>) -> Result<Vec<EntityView>> {
        let perm = self.access.can(actor, "routing:list", None).await?;
        let rows = self
            .store
            .list_all(&ListOptions {
                visibility: perm.visibility,
                search,
            })
            .await?;

        let mut views = Vec::with_capacity(rows.len());
        for row in &rows {
            let cert = self.resolve_certificate(row).await?;
            views.push(public_view(row, cert.as_ref()));
        }
        Ok(views)
    }

    /// Count of visible entities.
    pub async fn get_count(&self, actor: &Actor) -> Result<u64> {
        let perm = self.access.can(actor, "routing:count", None).await?;
        self.store.count_all(&perm.visibility).await
    }

    /// Rebuild the live directory from the store: one artifact per
    /// enabled, non-deleted entity, then a single reload.
    ///
    /// Entities that fail to render are skipped with a warning so one bad
    /// row cannot wedge the whole pass. Returns the number of artifacts in
    /// the rebuilt set.
    pub async fn reconcile_all(&self, actor: &Actor) -> Result<usize> {
        self.access.can(actor, "routing:reconcile", None).await?;

        // The sweep rebuilds the whole live directory, so the desired set
        // must span every owner; listing under the caller's visibility
        // would retire other owners' artifacts as stale.
        let rows = self
            .store
            .list_all(&ListOptions {
                visibility: Visibility::All,
                search: None,
            })
            .await?;

        let mut desired = Vec::new();
        for row in rows.iter().filter(|r| r.wants_artifact()) {
            let cert = self.resolve_certificate(row).await?;
            match render(row, cert.as_ref()) {
                Ok(artifact) => desired.push(artifact),
                Err(e) => {
                    tracing::warn!(entity = %row.id, error = %e, "skipping unrenderable entity");
                }
            }
        }

        self.reconciler.reconcile_all(&desired).await?;
        Ok(desired.len())
    }

    /// Render and apply one entity's artifact, then persist the meta the
    /// engine derived (certificate paths, engine status).
    async fn configure(
        &self,
        row: &RoutingEntity,
        cert: Option<&CertificateDescriptor>,
    ) -> Result<RoutingEntity> {
        let artifact = render(row, cert)?;
        let derived = self.reconciler.apply(&artifact).await?;

        let mut meta = row.meta.clone();
        meta.extend(derived);
        if let Some(cert) = cert {
            meta.insert(
                "certificate_path".into(),
                serde_json::Value::String(cert.cert_path.display().to_string()),
            );
            meta.insert(
                "certificate_key_path".into(),
                serde_json::Value::String(cert.key_path.display().to_string()),
            );
        }

        self.store
            .patch_by_id(
                row.id,
                EntityPatch {
                    meta: Some(meta),
                    ..Default::default()
                },
            )
            .await
    }

    async fn fetch_visible(&self, id: EntityId, perm: &Permission) -> Result<RoutingEntity> {
        self.store
            .get_by_id(
                id,
                &QueryOptions {
                    visibility: perm.visibility,
                },
            )
            .await?
            .ok_or(Error::NotFound(id))
    }

    async fn resolve_certificate(
        &self,
        row: &RoutingEntity,
    ) -> Result<Option<CertificateDescriptor>> {
        match row.certificate.resolved() {
            Some(cert_id) => {
                let cert = self.certs.get(cert_id).await?;
                if cert.is_none() {
                    tracing::warn!(
                        entity = %row.id,
                        certificate = cert_id.0,
                        "certificate reference does not resolve"
                    );
                }
                Ok(cert)
            }
            None => Ok(None),
        }
    }

    async fn record_audit(
        &self,
        actor: &Actor,
        action: &'static str,
        kind: EntityKind,
        id: EntityId,
        meta: serde_json::Value,
    ) {
        let entry = AuditEntry {
            actor_id: actor.user_id,
            action,
            object_type: kind.as_str(),
            object_id: id,
            meta,
        };
        if let Err(e) = self.audit.record(entry).await {
            tracing::warn!(error = %e, action, "audit record failed, continuing");
        }
    }
}

/// Domains used for quick-certificate issuance: explicit caller domains
/// first, otherwise whatever the listen spec routes by.
fn effective_domains(requested: &[String], listen: &ListenSpec) -> Vec<String> {
    if !requested.is_empty() {
        return requested.to_vec();
    }
    match listen {
        ListenSpec::Domains { domain_names, .. } => domain_names.clone(),
        ListenSpec::Stream { .. } => Vec::new(),
    }
}

fn request_meta(request: &CreateRequest) -> serde_json::Value {
    serde_json::to_value(request).unwrap_or(serde_json::Value::Null)
}

fn view_meta(row: &RoutingEntity, cert: Option<&CertificateDescriptor>) -> serde_json::Value {
    serde_json::to_value(public_view(row, cert)).unwrap_or(serde_json::Value::Null)
}
