//! Shared fixtures for integration tests.

use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Map;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;

use stream_director::access::{AccessControl, Actor, AllowAll};
use stream_director::audit::{AuditEntry, AuditLog};
use stream_director::certs::{CertificateDescriptor, CertificateService};
use stream_director::config::ReloadSettings;
use stream_director::engine::{EngineRejection, ProxyEngine};
use stream_director::entity::{
    CertificateId, CertificateRequest, CreateRequest, EntityKind, ListenSpec, OwnerId,
};
use stream_director::error::Result;
use stream_director::manager::EntityManager;
use stream_director::reconcile::Reconciler;
use stream_director::store::memory::MemoryStore;

/// Engine double that behaves like a real whole-directory self-check: it
/// scans every artifact in the checked directory and rejects duplicate
/// listen ports, so conflicts between unrelated entities surface exactly
/// as they would from the real engine.
pub struct MockEngine {
    pub checks: AtomicUsize,
    pub reloads: AtomicUsize,
    pub fail_reload: AtomicBool,
}

impl MockEngine {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            checks: AtomicUsize::new(0),
            reloads: AtomicUsize::new(0),
            fail_reload: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl ProxyEngine for MockEngine {
    async fn check(&self, config_dir: &Path) -> std::result::Result<(), EngineRejection> {
        self.checks.fetch_add(1, Ordering::SeqCst);

        let mut seen: HashSet<String> = HashSet::new();
        for entry in std::fs::read_dir(config_dir).unwrap() {
            let path = entry.unwrap().path();
            if path.extension().and_then(|e| e.to_str()) != Some("conf") {
                continue;
            }
            let text = std::fs::read_to_string(&path).unwrap();
            for line in text.lines() {
                let line = line.trim().trim_end_matches(';');
                if let Some(rest) = line.strip_prefix("listen ") {
                    if !seen.insert(rest.to_string()) {
                        return Err(EngineRejection {
                            detail: format!("duplicate listen {rest}"),
                        });
                    }
                }
            }
        }
        Ok(())
    }

    async fn reload(&self) -> std::result::Result<(), EngineRejection> {
        self.reloads.fetch_add(1, Ordering::SeqCst);
        if self.fail_reload.load(Ordering::SeqCst) {
            Err(EngineRejection {
                detail: "bind: permission denied".into(),
            })
        } else {
            Ok(())
        }
    }
}

/// Certificate service backed by a fixed set of issued descriptors.
pub struct MockCerts {
    pub issued: dashmap::DashMap<i64, CertificateDescriptor>,
    next_id: AtomicUsize,
}

impl MockCerts {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            issued: dashmap::DashMap::new(),
            next_id: AtomicUsize::new(1),
        })
    }
}

#[async_trait]
impl CertificateService for MockCerts {
    async fn issue_quick(
        &self,
        domain_names: &[String],
        _meta: &Map<String, serde_json::Value>,
    ) -> Result<CertificateDescriptor> {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst) as i64;
        let cert = CertificateDescriptor {
            id: CertificateId(id),
            domain_names: domain_names.to_vec(),
            cert_path: PathBuf::from(format!("/certs/{id}/fullchain.pem")),
            key_path: PathBuf::from(format!("/certs/{id}/privkey.pem")),
            expires_on: Utc::now() + Duration::days(90),
        };
        self.issued.insert(id, cert.clone());
        Ok(cert)
    }

    async fn get(&self, id: CertificateId) -> Result<Option<CertificateDescriptor>> {
        Ok(self.issued.get(&id.0).map(|c| c.clone()))
    }
}

/// Audit log that counts entries and can be made to fail.
pub struct CountingAudit {
    pub entries: AtomicUsize,
    pub fail: AtomicBool,
}

impl CountingAudit {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            entries: AtomicUsize::new(0),
            fail: AtomicBool::new(false),
        })
    }
}

#[async_trait]
impl AuditLog for CountingAudit {
    async fn record(&self, _entry: AuditEntry) -> Result<()> {
        if self.fail.load(Ordering::SeqCst) {
            return Err(stream_director::Error::Store("audit store offline".into()));
        }
        self.entries.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Fully wired manager over a temp live directory and the mock engine.
pub struct Harness {
    pub manager: EntityManager,
    pub engine: Arc<MockEngine>,
    pub certs: Arc<MockCerts>,
    pub audit: Arc<CountingAudit>,
    pub live_dir: PathBuf,
    _tmp: tempfile::TempDir,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_access(Arc::new(AllowAll))
    }

    pub fn with_access(access: Arc<dyn AccessControl>) -> Self {
        let tmp = tempfile::tempdir().unwrap();
        let live_dir = tmp.path().join("conf.d");
        let engine = MockEngine::new();
        let certs = MockCerts::new();
        let audit = CountingAudit::new();

        let reconciler = Arc::new(Reconciler::new(
            &live_dir,
            engine.clone(),
            ReloadSettings {
                max_attempts: 2,
                base_delay_ms: 1,
                max_delay_ms: 2,
            },
        ));
        let manager = EntityManager::new(
            Arc::new(MemoryStore::new()),
            certs.clone(),
            audit.clone(),
            access,
            reconciler,
        );

        Self {
            manager,
            engine,
            certs,
            audit,
            live_dir,
            _tmp: tmp,
        }
    }

    pub fn artifact_path(&self, name: &str) -> PathBuf {
        self.live_dir.join(name)
    }

    pub fn artifact_text(&self, name: &str) -> Option<String> {
        std::fs::read_to_string(self.artifact_path(name)).ok()
    }
}

pub fn actor(user_id: i64) -> Actor {
    Actor {
        user_id: OwnerId(user_id),
    }
}

pub fn stream_request(port: u16, enabled: bool) -> CreateRequest {
    CreateRequest {
        kind: EntityKind::Stream,
        listen: ListenSpec::Stream {
            incoming_port: port,
            forwarding_host: "10.0.0.20".into(),
            forwarding_port: 8080,
            tcp_forwarding: true,
            udp_forwarding: false,
        },
        domain_names: Vec::new(),
        certificate: CertificateRequest::None,
        enabled,
        meta: Map::new(),
    }
}
