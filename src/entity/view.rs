//! Public-view projection of stored entities.
//!
//! Callers never see the soft-delete flag or certificate key material; the
//! projection lives here instead of being ad hoc field deletion at each
//! call site.

use serde::Serialize;
use serde_json::Map;

use crate::certs::CertificateDescriptor;
use crate::entity::{CertificateRef, EntityId, EntityKind, ListenSpec, OwnerId, RoutingEntity};

/// What lifecycle operations and reads return to callers.
#[derive(Debug, Clone, Serialize)]
pub struct EntityView {
    pub id: EntityId,
    pub kind: EntityKind,
    pub owner_id: OwnerId,
    pub enabled: bool,
    pub certificate: CertificateRef,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub certificate_detail: Option<CertificateSummary>,
    pub listen: ListenSpec,
    pub meta: Map<String, serde_json::Value>,
    pub created_on: chrono::DateTime<chrono::Utc>,
    pub modified_on: chrono::DateTime<chrono::Utc>,
}

/// Expanded certificate info with key-material paths stripped.
#[derive(Debug, Clone, Serialize)]
pub struct CertificateSummary {
    pub id: crate::entity::CertificateId,
    pub domain_names: Vec<String>,
    pub expires_on: chrono::DateTime<chrono::Utc>,
}

/// Project a stored row into its public shape.
pub fn public_view(entity: &RoutingEntity, cert: Option<&CertificateDescriptor>) -> EntityView {
    EntityView {
        id: entity.id,
        kind: entity.kind,
        owner_id: entity.owner_id,
        enabled: entity.enabled,
        certificate: entity.certificate,
        certificate_detail: cert.map(|c| CertificateSummary {
            id: c.id,
            domain_names: c.domain_names.clone(),
            expires_on: c.expires_on,
        }),
        listen: entity.listen.clone(),
        meta: entity.meta.clone(),
        created_on: entity.created_on,
        modified_on: entity.modified_on,
    }
}
