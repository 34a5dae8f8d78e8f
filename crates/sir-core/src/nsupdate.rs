// ── DNS update scripts ──
//
// One script per key file. Inside a script: `server` per connection,
// `zone … send` per zone, then owner names and records. Every level is
// sorted before emission so equal graphs always produce equal scripts.

use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::CoreError;
use crate::model::{Zone, ZoneDomain};
use crate::registry::{CertRegistry, DomainGraph, DomainRegistry};
use crate::tlsa::CertificateLoader;

/// Whether existing TLSA records are deleted before the current ones are added.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateMode {
    /// Only `update add` lines.
    Add,
    /// `update delete <owner> TLSA` per owner name, then `update add` lines.
    Replace,
}

/// The update script for one key-file group.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateScript {
    pub key_file: Option<PathBuf>,
    pub body: String,
}

type ConnectionGroups<'a> = BTreeMap<(&'a str, u16), Vec<&'a Zone>>;

/// Render the update scripts for every record in `graph`.
///
/// Key-file groups, connections and zones without any record are skipped.
pub fn generate(
    graph: &mut DomainGraph,
    mode: UpdateMode,
    loader: &dyn CertificateLoader,
) -> Result<Vec<UpdateScript>, CoreError> {
    let DomainGraph {
        domains,
        certs,
        zones,
    } = graph;

    let mut groups: BTreeMap<Option<&Path>, ConnectionGroups<'_>> = BTreeMap::new();
    for zone in zones.iter().filter(|z| has_records(z)) {
        groups
            .entry(zone.key_file())
            .or_default()
            .entry(zone.connection())
            .or_default()
            .push(zone);
    }

    let mut scripts = Vec::with_capacity(groups.len());
    for (key_file, connections) in groups {
        let mut body = String::new();
        for ((server, port), mut zones) in connections {
            zones.sort_by(|a, b| a.name().cmp(b.name()));
            let _ = writeln!(body, "server {server} {port}");
            for zone in zones {
                let _ = writeln!(body, "zone {}.", zone.name().trim_end_matches('.'));
                render_zone(&mut body, zone, domains, certs, mode, loader)?;
                body.push_str("send\n");
            }
        }
        debug!(
            key_file = ?key_file,
            lines = body.lines().count(),
            "update script generated"
        );
        scripts.push(UpdateScript {
            key_file: key_file.map(Path::to_path_buf),
            body,
        });
    }
    Ok(scripts)
}

fn has_records(zone: &Zone) -> bool {
    zone.zone_domains()
        .flat_map(ZoneDomain::ports)
        .any(|p| p.records().next().is_some())
}

fn render_zone(
    body: &mut String,
    zone: &Zone,
    domains: &DomainRegistry,
    certs: &mut CertRegistry,
    mode: UpdateMode,
    loader: &dyn CertificateLoader,
) -> Result<(), CoreError> {
    let mut zone_domains: Vec<_> = zone.zone_domains().collect();
    zone_domains.sort_by(|a, b| {
        domains
            .get(a.domain())
            .name()
            .cmp(domains.get(b.domain()).name())
    });

    for zone_domain in zone_domains {
        let domain = domains.get(zone_domain.domain());
        let mut ports: Vec<_> = zone_domain.ports().collect();
        ports.sort_by_key(|p| p.value());

        for port in ports {
            let mut records: Vec<_> = port.records().collect();
            if records.is_empty() {
                continue;
            }
            records.sort_by(|a, b| certs.get(a.cert()).name().cmp(certs.get(b.cert()).name()));

            let owner = port.value().owner_name(domain.name());
            if mode == UpdateMode::Replace {
                let _ = writeln!(body, "update delete {owner} TLSA");
            }
            for record in records {
                let params = record.params();
                let content =
                    certs
                        .get_mut(record.cert())
                        .tlsa_content(params.selector, params.ty, loader)?;
                let _ = writeln!(body, "update add {}", record.line(&owner, &content));
            }
        }
    }
    Ok(())
}

/// Concatenate scripts for display, each headed by its key file.
pub fn render_all(scripts: &[UpdateScript]) -> String {
    let mut out = String::new();
    for script in scripts {
        match &script.key_file {
            Some(path) => {
                let _ = writeln!(out, "; key file: {}", path.display());
            }
            None => out.push_str("; no key file\n"),
        }
        out.push_str(&script.body);
    }
    out
}
