//! Template renderer: entity → config text + canonical file identity.
//!
//! # Responsibilities
//! - Pure, deterministic rendering: identical entity state always yields
//!   byte-identical output
//! - Canonical artifact naming from kind and id
//! - Embed resolved certificate paths when a descriptor is supplied
//!
//! # Design Decisions
//! - Never touches the filesystem or the engine
//! - Malformed entity data is a `ConfigSynthesis` error, never silently
//!   defaulted

use std::fmt::Write as _;

use crate::certs::CertificateDescriptor;
use crate::entity::{EntityId, EntityKind, ForwardTarget, ListenSpec, RoutingEntity};
use crate::error::{Error, Result};

/// Canonical identity of an on-disk artifact, derived from kind and id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArtifactId {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl ArtifactId {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    pub fn for_entity(entity: &RoutingEntity) -> Self {
        Self::new(entity.kind, entity.id)
    }

    /// File stem, `{kind}_{id}`.
    pub fn stem(&self) -> String {
        format!("{}_{}", self.kind, self.id)
    }

    /// On-disk file name, `{kind}_{id}.conf`.
    pub fn file_name(&self) -> String {
        format!("{}_{}.conf", self.kind, self.id)
    }
}

impl std::fmt::Display for ArtifactId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.stem())
    }
}

/// A rendered configuration artifact.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub id: ArtifactId,
    pub text: String,
}

/// Render the config artifact for one entity.
///
/// The certificate descriptor, when present, must already be resolved by
/// the caller; the renderer never fetches certificate material itself.
pub fn render(
    entity: &RoutingEntity,
    cert: Option<&CertificateDescriptor>,
) -> Result<Artifact> {
    if !entity.listen.matches_kind(entity.kind) {
        return Err(Error::ConfigSynthesis(format!(
            "entity {} has a {} listen spec that does not fit kind {}",
            entity.id,
            match entity.listen {
                ListenSpec::Stream { .. } => "stream",
                ListenSpec::Domains { .. } => "domain",
            },
            entity.kind
        )));
    }

    let id = ArtifactId::for_entity(entity);
    let mut text = String::new();

    writeln!(text, "# {}", id.stem()).ok();
    writeln!(text, "# managed by stream-director, do not edit").ok();
    writeln!(text).ok();

    match &entity.listen {
        ListenSpec::Stream {
            incoming_port,
            forwarding_host,
            forwarding_port,
            tcp_forwarding,
            udp_forwarding,
        } => render_stream(
            &mut text,
            entity,
            cert,
            *incoming_port,
            forwarding_host,
            *forwarding_port,
            *tcp_forwarding,
            *udp_forwarding,
        )?,
        ListenSpec::Domains {
            domain_names,
            forward,
        } => render_host(&mut text, entity, cert, domain_names, forward)?,
    }

    Ok(Artifact { id, text })
}

#[allow(clippy::too_many_arguments)]
fn render_stream(
    text: &mut String,
    entity: &RoutingEntity,
    cert: Option<&CertificateDescriptor>,
    incoming_port: u16,
    forwarding_host: &str,
    forwarding_port: u16,
    tcp: bool,
    udp: bool,
) -> Result<()> {
    if incoming_port == 0 || forwarding_port == 0 {
        return Err(Error::ConfigSynthesis(format!(
            "entity {} has a zero port",
            entity.id
        )));
    }
    if forwarding_host.trim().is_empty() {
        return Err(Error::ConfigSynthesis(format!(
            "entity {} has an empty forwarding host",
            entity.id
        )));
    }
    if !tcp && !udp {
        return Err(Error::ConfigSynthesis(format!(
            "entity {} forwards neither tcp nor udp",
            entity.id
        )));
    }

    if tcp {
        writeln!(text, "server {{").ok();
        if let Some(cert) = cert {
            writeln!(text, "    listen {} ssl;", incoming_port).ok();
            write_ssl_lines(text, cert);
        } else {
            writeln!(text, "    listen {};", incoming_port).ok();
        }
        writeln!(text, "    proxy_pass {}:{};", forwarding_host, forwarding_port).ok();
        writeln!(text, "}}").ok();
    }
    if udp {
        writeln!(text, "server {{").ok();
        writeln!(text, "    listen {} udp;", incoming_port).ok();
        writeln!(text, "    proxy_pass {}:{};", forwarding_host, forwarding_port).ok();
        writeln!(text, "}}").ok();
    }
    Ok(())
}

fn render_host(
    text: &mut String,
    entity: &RoutingEntity,
    cert: Option<&CertificateDescriptor>,
    domain_names: &[String],
    forward: &ForwardTarget,
) -> Result<()> {
    if domain_names.is_empty() || domain_names.iter().any(|d| d.trim().is_empty()) {
        return Err(Error::ConfigSynthesis(format!(
            "entity {} has no usable domain names",
            entity.id
        )));
    }

    writeln!(text, "server {{").ok();
    writeln!(text, "    server_name {};", domain_names.join(" ")).ok();
    writeln!(text, "    listen 80;").ok();
    if let Some(cert) = cert {
        writeln!(text, "    listen 443 ssl;").ok();
        write_ssl_lines(text, cert);
    }

    match forward {
        ForwardTarget::Proxy { scheme, host, port } => {
            if host.trim().is_empty() || *port == 0 {
                return Err(Error::ConfigSynthesis(format!(
                    "entity {} has an invalid proxy target",
                    entity.id
                )));
            }
            writeln!(text, "    location / {{").ok();
            writeln!(text, "        proxy_pass {}://{}:{};", scheme, host, port).ok();
            writeln!(text, "    }}").ok();
        }
        ForwardTarget::Redirect {
            status_code,
            scheme,
            domain,
            preserve_path,
        } => {
            if domain.trim().is_empty() {
                return Err(Error::ConfigSynthesis(format!(
                    "entity {} redirects to an empty domain",
                    entity.id
                )));
            }
            let suffix = if *preserve_path { "$request_uri" } else { "" };
            writeln!(
                text,
                "    return {} {}://{}{};",
                status_code, scheme, domain, suffix
            )
            .ok();
        }
        ForwardTarget::Nowhere => {
            writeln!(text, "    return 404;").ok();
        }
    }

    writeln!(text, "}}").ok();
    Ok(())
}

fn write_ssl_lines(text: &mut String, cert: &CertificateDescriptor) {
    writeln!(text, "    ssl_certificate {};", cert.cert_path.display()).ok();
    writeln!(text, "    ssl_certificate_key {};", cert.key_path.display()).ok();
}
