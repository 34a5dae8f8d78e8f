// ── Zones, ports and records ──
//
// Zone → ZoneDomain → Port → Record. Each level is created on demand by
// its parent, and each creation checks the structural rules for that edge.

use std::fmt;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::GraphError;
use crate::model::{Cert, CertId, Domain, DomainId, TlsaSelector, TlsaType, TlsaUsage};

pub const DEFAULT_SERVER: &str = "localhost";
pub const DEFAULT_PORT: u16 = 53;
pub const DEFAULT_TTL: u32 = 3600;

// ── Zone ────────────────────────────────────────────────────────────

/// Identity of a zone: the same name behind two servers is two zones.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ZoneKey {
    pub name: String,
    pub key_file: Option<PathBuf>,
    pub server: String,
    pub port: u16,
}

impl ZoneKey {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            key_file: None,
            server: DEFAULT_SERVER.into(),
            port: DEFAULT_PORT,
        }
    }

    /// Whether `domain` may be bound into this zone.
    pub fn admits(&self, domain: &Domain) -> Result<(), GraphError> {
        if domain.is_within(&self.name) {
            Ok(())
        } else {
            Err(GraphError::HierarchyViolation {
                domain: domain.name().to_owned(),
                zone: self.name.clone(),
            })
        }
    }
}

#[derive(Debug)]
pub struct Zone {
    key: ZoneKey,
    zone_domains: IndexMap<DomainId, ZoneDomain>,
}

impl Zone {
    pub(crate) fn new(key: ZoneKey) -> Self {
        Self {
            key,
            zone_domains: IndexMap::new(),
        }
    }

    pub fn key(&self) -> &ZoneKey {
        &self.key
    }

    pub fn name(&self) -> &str {
        &self.key.name
    }

    pub fn key_file(&self) -> Option<&Path> {
        self.key.key_file.as_deref()
    }

    pub fn server(&self) -> &str {
        &self.key.server
    }

    pub fn port(&self) -> u16 {
        self.key.port
    }

    /// The `(server, port)` pair an update for this zone is sent to.
    pub fn connection(&self) -> (&str, u16) {
        (&self.key.server, self.key.port)
    }

    pub fn zone_domains(&self) -> impl Iterator<Item = &ZoneDomain> {
        self.zone_domains.values()
    }

    /// Bind `domain` into this zone, creating the binding on first use.
    pub fn zone_domain_mut(
        &mut self,
        id: DomainId,
        domain: &Domain,
    ) -> Result<&mut ZoneDomain, GraphError> {
        if !self.zone_domains.contains_key(&id) {
            self.key.admits(domain)?;
        }
        Ok(self
            .zone_domains
            .entry(id)
            .or_insert_with(|| ZoneDomain::new(id)))
    }
}

// ── ZoneDomain ──────────────────────────────────────────────────────

#[derive(Debug)]
pub struct ZoneDomain {
    domain: DomainId,
    ports: IndexMap<PortValue, Port>,
}

impl ZoneDomain {
    fn new(domain: DomainId) -> Self {
        Self {
            domain,
            ports: IndexMap::new(),
        }
    }

    pub fn domain(&self) -> DomainId {
        self.domain
    }

    pub fn ports(&self) -> impl Iterator<Item = &Port> {
        self.ports.values()
    }

    pub fn has_wildcard_ports(&self) -> bool {
        self.ports.contains_key(&PortValue::Wildcard)
    }

    pub fn has_numeric_ports(&self) -> bool {
        !self.ports.is_empty() && !self.has_wildcard_ports()
    }

    /// Get or create the port `value`. Wildcard and numeric ports never mix.
    pub fn port_mut(&mut self, value: PortValue, domain: &Domain) -> Result<&mut Port, GraphError> {
        let existing = match value {
            PortValue::Number(_) if self.has_wildcard_ports() => Some("wildcard"),
            PortValue::Wildcard if self.has_numeric_ports() => Some("numeric"),
            _ => None,
        };
        if let Some(existing) = existing {
            return Err(GraphError::PortModeConflict {
                domain: domain.name().to_owned(),
                existing,
                requested: value,
            });
        }

        let zone_domain = self.domain;
        Ok(self
            .ports
            .entry(value)
            .or_insert_with(|| Port::new(zone_domain, value)))
    }
}

// ── Port ────────────────────────────────────────────────────────────

/// A service port, or the wildcard covering every port.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum PortValue {
    Wildcard,
    Number(u16),
}

impl PortValue {
    /// DNS owner name of TLSA records for this port, fully qualified.
    pub fn owner_name(self, domain: &str) -> String {
        let domain = domain.trim_end_matches('.');
        match self {
            Self::Wildcard => format!("*._tcp.{domain}."),
            Self::Number(port) => format!("_{port}._tcp.{domain}."),
        }
    }
}

impl fmt::Display for PortValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Wildcard => f.write_str("wildcard"),
            Self::Number(port) => write!(f, "{port}"),
        }
    }
}

#[derive(Debug)]
pub struct Port {
    domain: DomainId,
    value: PortValue,
    records: IndexMap<CertId, Record>,
}

impl Port {
    fn new(domain: DomainId, value: PortValue) -> Self {
        Self {
            domain,
            value,
            records: IndexMap::new(),
        }
    }

    pub fn value(&self) -> PortValue {
        self.value
    }

    pub fn records(&self) -> impl Iterator<Item = &Record> {
        self.records.values()
    }

    /// Attach a record for `cert`. At most one record per cert, and the
    /// cert must cover the domain this port belongs to.
    pub fn create_record(
        &mut self,
        cert_id: CertId,
        cert: &Cert,
        domain: &Domain,
        params: RecordParams,
    ) -> Result<&Record, GraphError> {
        if self.records.contains_key(&cert_id) {
            return Err(GraphError::DuplicateRecord {
                owner: self.value.owner_name(domain.name()),
                cert: cert.name().to_owned(),
            });
        }
        if !cert.covers(self.domain) {
            return Err(GraphError::DomainNotInCert {
                domain: domain.name().to_owned(),
                cert: cert.name().to_owned(),
            });
        }

        Ok(self.records.entry(cert_id).or_insert(Record {
            cert: cert_id,
            params,
        }))
    }
}

// ── Record ──────────────────────────────────────────────────────────

/// The configurable part of a TLSA record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RecordParams {
    pub ttl: u32,
    pub usage: TlsaUsage,
    pub selector: TlsaSelector,
    #[serde(rename = "type")]
    pub ty: TlsaType,
}

impl Default for RecordParams {
    fn default() -> Self {
        Self {
            ttl: DEFAULT_TTL,
            usage: TlsaUsage::DaneEe,
            selector: TlsaSelector::Spki,
            ty: TlsaType::Sha256,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Record {
    cert: CertId,
    params: RecordParams,
}

impl Record {
    pub fn cert(&self) -> CertId {
        self.cert
    }

    pub fn params(&self) -> &RecordParams {
        &self.params
    }

    /// Zone-file style line: `<owner> <ttl> TLSA <usage> <selector> <type> <content>`.
    pub fn line(&self, owner: &str, content: &str) -> String {
        let p = &self.params;
        format!(
            "{owner} {} TLSA {} {} {} {content}",
            p.ttl,
            p.usage.code(),
            p.selector.code(),
            p.ty.code()
        )
    }
}
