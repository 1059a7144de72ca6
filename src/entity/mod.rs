//! Routing-entity data model.
//!
//! # Responsibilities
//! - Typed representation of stored routing entities (streams, proxy
//!   hosts, redirection hosts, dead hosts)
//! - Request/patch payloads used by the lifecycle manager
//! - The kind/listen invariant: streams never carry domain names
//!
//! # Design Decisions
//! - `CertificateRef` is a tagged variant, not a string sentinel
//! - `meta` is a free-form JSON map merged from caller input and
//!   engine-derived fields; always present, defaults to empty

pub mod view;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Map;

/// Stable store-assigned identity. Never reused.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityId(pub i64);

impl std::fmt::Display for EntityId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identity of the principal that created an entity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OwnerId(pub i64);

/// Identity of a certificate row held by the certificate service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct CertificateId(pub i64);

/// Kind of routing entity. Fixed at creation, immutable afterwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Stream,
    ProxyHost,
    RedirectionHost,
    DeadHost,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            EntityKind::Stream => "stream",
            EntityKind::ProxyHost => "proxy_host",
            EntityKind::RedirectionHost => "redirection_host",
            EntityKind::DeadHost => "dead_host",
        }
    }
}

impl std::fmt::Display for EntityKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Weak reference to a certificate.
///
/// `Pending` means "issue a quick certificate first"; it is resolved to a
/// concrete id before the entity is considered fully configured.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateRef {
    #[default]
    None,
    Pending,
    Resolved(CertificateId),
}

impl CertificateRef {
    pub fn resolved(&self) -> Option<CertificateId> {
        match self {
            CertificateRef::Resolved(id) => Some(*id),
            _ => None,
        }
    }
}

/// Where a host-kind entity sends matched traffic.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ForwardTarget {
    /// Proxy to an upstream (proxy hosts).
    Proxy {
        scheme: String,
        host: String,
        port: u16,
    },
    /// Redirect to another domain (redirection hosts).
    Redirect {
        status_code: u16,
        scheme: String,
        domain: String,
        preserve_path: bool,
    },
    /// Swallow the request (dead hosts).
    Nowhere,
}

/// Kind-specific addressing.
///
/// Streams dispatch on port/protocol only and therefore never hold domain
/// names; host kinds route by name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "type")]
pub enum ListenSpec {
    Stream {
        incoming_port: u16,
        forwarding_host: String,
        forwarding_port: u16,
        tcp_forwarding: bool,
        udp_forwarding: bool,
    },
    Domains {
        domain_names: Vec<String>,
        forward: ForwardTarget,
    },
}

impl ListenSpec {
    /// The field listings are searched and ordered by: the incoming port
    /// for streams, the first domain name for host kinds.
    pub fn primary_address(&self) -> String {
        match self {
            ListenSpec::Stream { incoming_port, .. } => incoming_port.to_string(),
            ListenSpec::Domains { domain_names, .. } => {
                domain_names.first().cloned().unwrap_or_default()
            }
        }
    }

    /// Ordering key for listings: streams compare numerically by incoming
    /// port (so 85 sorts before 10000), host kinds by first domain name.
    /// Streams order ahead of host kinds when a listing mixes them.
    pub fn sort_key(&self) -> (u32, String) {
        match self {
            ListenSpec::Stream { incoming_port, .. } => (u32::from(*incoming_port), String::new()),
            ListenSpec::Domains { domain_names, .. } => (
                u32::MAX,
                domain_names.first().cloned().unwrap_or_default(),
            ),
        }
    }

    /// Whether this spec is the right shape for the given kind.
    pub fn matches_kind(&self, kind: EntityKind) -> bool {
        matches!(
            (self, kind),
            (ListenSpec::Stream { .. }, EntityKind::Stream)
                | (ListenSpec::Domains { .. }, EntityKind::ProxyHost)
                | (ListenSpec::Domains { .. }, EntityKind::RedirectionHost)
                | (ListenSpec::Domains { .. }, EntityKind::DeadHost)
        )
    }
}

/// A persisted routing entity.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoutingEntity {
    pub id: EntityId,
    pub kind: EntityKind,
    pub owner_id: OwnerId,
    pub enabled: bool,
    pub is_deleted: bool,
    pub certificate: CertificateRef,
    pub listen: ListenSpec,
    /// Free-form metadata: caller-supplied keys plus engine-derived fields
    /// attached after configuration (certificate paths, engine status).
    pub meta: Map<String, serde_json::Value>,
    pub created_on: DateTime<Utc>,
    pub modified_on: DateTime<Utc>,
}

impl RoutingEntity {
    /// True when a live config artifact should exist for this entity.
    pub fn wants_artifact(&self) -> bool {
        self.enabled && !self.is_deleted
    }
}

/// How a create/update request refers to a certificate.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CertificateRequest {
    #[default]
    None,
    /// Issue a quick certificate as part of the operation.
    New,
    Existing(CertificateId),
}

/// Payload for `EntityManager::create`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateRequest {
    pub kind: EntityKind,
    pub listen: ListenSpec,
    /// Domain names supplied by the caller. Ignored and dropped for stream
    /// kind before insert; used for quick-certificate issuance otherwise.
    #[serde(default)]
    pub domain_names: Vec<String>,
    #[serde(default)]
    pub certificate: CertificateRequest,
    #[serde(default)]
    pub enabled: bool,
    #[serde(default)]
    pub meta: Map<String, serde_json::Value>,
}

/// Payload for `EntityManager::update`. `None` fields keep the stored
/// value; domain names default from the previous row so audit history
/// always reflects the effective address.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateRequest {
    #[serde(default)]
    pub listen: Option<ListenSpec>,
    #[serde(default)]
    pub certificate: Option<CertificateRequest>,
    #[serde(default)]
    pub meta: Option<Map<String, serde_json::Value>>,
}

/// Field-level patch applied through the store.
#[derive(Debug, Clone, Default)]
pub struct EntityPatch {
    pub enabled: Option<bool>,
    pub is_deleted: Option<bool>,
    pub certificate: Option<CertificateRef>,
    pub listen: Option<ListenSpec>,
    pub meta: Option<Map<String, serde_json::Value>>,
}

/// Insert payload handed to the store by the lifecycle manager.
#[derive(Debug, Clone)]
pub struct NewEntity {
    pub kind: EntityKind,
    pub owner_id: OwnerId,
    pub enabled: bool,
    pub certificate: CertificateRef,
    pub listen: ListenSpec,
    pub meta: Map<String, serde_json::Value>,
}
