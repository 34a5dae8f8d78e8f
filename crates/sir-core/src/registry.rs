// ── Entity registries ──
//
// Name-keyed owners of every entity in a run. Domains and zones are
// created on first lookup; certs must be created explicitly and only once.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::Serialize;

use crate::error::GraphError;
use crate::model::{
    Cert, CertId, CertSpec, Domain, DomainId, PortValue, RecordParams, Zone, ZoneKey,
};

// ── Domains ─────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct DomainRegistry {
    domains: Vec<Domain>,
    by_name: HashMap<String, DomainId>,
}

impl DomainRegistry {
    /// Return the domain called `name`, creating it if needed.
    pub fn get_or_create(&mut self, name: &str) -> DomainId {
        if let Some(id) = self.by_name.get(name) {
            return *id;
        }
        let id = DomainId(self.domains.len());
        self.domains.push(Domain::new(name));
        self.by_name.insert(name.to_owned(), id);
        id
    }

    pub fn find(&self, name: &str) -> Option<DomainId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: DomainId) -> &Domain {
        &self.domains[id.0]
    }

    pub fn iter(&self) -> impl Iterator<Item = (DomainId, &Domain)> {
        self.domains.iter().enumerate().map(|(i, d)| (DomainId(i), d))
    }

    pub fn len(&self) -> usize {
        self.domains.len()
    }

    pub fn is_empty(&self) -> bool {
        self.domains.is_empty()
    }
}

// ── Certs ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct CertRegistry {
    certs: Vec<Cert>,
    by_name: HashMap<String, CertId>,
}

impl CertRegistry {
    /// Register a new cert. Fails if the name is already taken.
    pub fn create(&mut self, spec: CertSpec) -> Result<CertId, GraphError> {
        if self.by_name.contains_key(&spec.name) {
            return Err(GraphError::DuplicateName { name: spec.name });
        }
        let id = CertId(self.certs.len());
        self.by_name.insert(spec.name.clone(), id);
        self.certs.push(Cert::new(spec));
        Ok(id)
    }

    pub fn find(&self, name: &str) -> Option<CertId> {
        self.by_name.get(name).copied()
    }

    pub fn get(&self, id: CertId) -> &Cert {
        &self.certs[id.0]
    }

    pub fn get_mut(&mut self, id: CertId) -> &mut Cert {
        &mut self.certs[id.0]
    }

    /// Certs in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (CertId, &Cert)> {
        self.certs.iter().enumerate().map(|(i, c)| (CertId(i), c))
    }

    pub fn len(&self) -> usize {
        self.certs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.certs.is_empty()
    }
}

// ── Zones ───────────────────────────────────────────────────────────

#[derive(Debug, Default)]
pub struct ZoneRegistry {
    zones: IndexMap<ZoneKey, Zone>,
}

impl ZoneRegistry {
    /// Return the zone identified by `key`, creating it if needed.
    pub fn get_or_create(&mut self, key: ZoneKey) -> &mut Zone {
        self.zones
            .entry(key)
            .or_insert_with_key(|key| Zone::new(key.clone()))
    }

    pub fn get(&self, key: &ZoneKey) -> Option<&Zone> {
        self.zones.get(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Zone> {
        self.zones.values()
    }

    pub fn len(&self) -> usize {
        self.zones.len()
    }

    pub fn is_empty(&self) -> bool {
        self.zones.is_empty()
    }
}

// ── Graph ───────────────────────────────────────────────────────────

/// Every entity of one run, built by the configuration walker.
#[derive(Debug, Default)]
pub struct DomainGraph {
    pub domains: DomainRegistry,
    pub certs: CertRegistry,
    pub zones: ZoneRegistry,
}

/// Flattened view of one record, for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecordSummary {
    pub cert: String,
    pub domain: String,
    pub owner: String,
    pub zone: String,
    pub server: String,
    pub server_port: u16,
    pub key_file: Option<String>,
    #[serde(flatten)]
    pub params: RecordParams,
}

impl DomainGraph {
    /// Attach an existing domain to a cert. Duplicates are ignored.
    pub fn attach_domain(&mut self, cert: CertId, domain: DomainId) {
        self.certs.get_mut(cert).add_domain(domain);
    }

    /// Check that `domain` may be bound into `zone`, without creating the
    /// zone. Zones only enter the registry once they hold a record.
    pub fn bind_domain(&self, zone: &ZoneKey, domain: DomainId) -> Result<(), GraphError> {
        zone.admits(self.domains.get(domain))
    }

    /// Create the record for `cert` on `port` of `domain` in zone `zone`,
    /// binding the domain into the zone and opening the port as needed.
    /// A failed call leaves the graph unchanged.
    pub fn add_record(
        &mut self,
        zone: ZoneKey,
        domain: DomainId,
        port: PortValue,
        cert: CertId,
        params: RecordParams,
    ) -> Result<(), GraphError> {
        let domain_ref = self.domains.get(domain);
        let cert_ref = self.certs.get(cert);
        zone.admits(domain_ref)?;
        if !cert_ref.covers(domain) {
            return Err(GraphError::DomainNotInCert {
                domain: domain_ref.name().to_owned(),
                cert: cert_ref.name().to_owned(),
            });
        }
        // Remaining failures (port mode, duplicate record) only hit existing entries.
        self.zones
            .get_or_create(zone)
            .zone_domain_mut(domain, domain_ref)?
            .port_mut(port, domain_ref)?
            .create_record(cert, cert_ref, domain_ref, params)?;
        Ok(())
    }

    pub fn record_count(&self) -> usize {
        self.zones
            .iter()
            .flat_map(|z| z.zone_domains())
            .flat_map(|zd| zd.ports())
            .map(|p| p.records().count())
            .sum()
    }

    /// Every record, sorted by zone, owner name and cert.
    pub fn record_summaries(&self) -> Vec<RecordSummary> {
        let mut out = Vec::new();
        for zone in self.zones.iter() {
            for zd in zone.zone_domains() {
                let domain = self.domains.get(zd.domain());
                for port in zd.ports() {
                    for record in port.records() {
                        out.push(RecordSummary {
                            cert: self.certs.get(record.cert()).name().to_owned(),
                            domain: domain.name().to_owned(),
                            owner: port.value().owner_name(domain.name()),
                            zone: zone.name().to_owned(),
                            server: zone.server().to_owned(),
                            server_port: zone.port(),
                            key_file: zone.key_file().map(|p| p.display().to_string()),
                            params: *record.params(),
                        });
                    }
                }
            }
        }
        out.sort_by(|a, b| {
            (&a.zone, &a.server, a.server_port, &a.owner, &a.cert)
                .cmp(&(&b.zone, &b.server, b.server_port, &b.owner, &b.cert))
        });
        out
    }
}
