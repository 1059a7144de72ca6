//! Certificate service collaborator.
//!
//! Issuance and renewal happen elsewhere; the reconciliation core only
//! needs to request a quick certificate during create/update and to
//! resolve a stored certificate id into file paths for rendering.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Map;
use std::path::PathBuf;

use crate::entity::CertificateId;
use crate::error::{Error, Result};

/// Resolved certificate: paths and parameters the renderer embeds.
#[derive(Debug, Clone, PartialEq)]
pub struct CertificateDescriptor {
    pub id: CertificateId,
    pub domain_names: Vec<String>,
    pub cert_path: PathBuf,
    pub key_path: PathBuf,
    pub expires_on: DateTime<Utc>,
}

/// In-process certificate collaborator.
#[async_trait]
pub trait CertificateService: Send + Sync {
    /// Issue a certificate on demand as a side effect of creating or
    /// updating an entity.
    async fn issue_quick(
        &self,
        domain_names: &[String],
        meta: &Map<String, serde_json::Value>,
    ) -> Result<CertificateDescriptor>;

    /// Resolve a stored certificate id.
    async fn get(&self, id: CertificateId) -> Result<Option<CertificateDescriptor>>;
}

/// Service used when no issuer is wired in: resolution always misses and
/// quick issuance is refused.
#[derive(Debug, Default)]
pub struct NullCertificateService;

#[async_trait]
impl CertificateService for NullCertificateService {
    async fn issue_quick(
        &self,
        domain_names: &[String],
        _meta: &Map<String, serde_json::Value>,
    ) -> Result<CertificateDescriptor> {
        tracing::warn!(
            domains = domain_names.len(),
            "quick certificate requested but no issuer is configured"
        );
        Err(Error::Validation(
            "quick certificate issuance is not configured".into(),
        ))
    }

    async fn get(&self, _id: CertificateId) -> Result<Option<CertificateDescriptor>> {
        Ok(None)
    }
}
