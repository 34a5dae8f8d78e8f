// ── Configuration tree walker ──
//
// Root → Cert → Domain → Zone → Record. At every level:
//   1. merge this level's own attributes into the context,
//   2. merge the level's `…Defaults` blocks (seen by descendants only),
//   3. collect fallback child lists,
//   4. register / attach the level's entity,
//   5. recurse into the explicit child list, or the fallback one.
// The first error aborts the walk and the partially built graph is dropped.

use std::borrow::Cow;

use serde_yaml::{Mapping, Value};
use tracing::{debug, warn};

use crate::context::{CERT_KEYS, Context, DOMAIN_KEYS, Fallback, RECORD_KEYS, ZONE_KEYS};
use crate::error::CoreError;
use crate::model::{CertId, DomainId};
use crate::registry::DomainGraph;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Level {
    Root,
    Cert,
    Domain,
    Zone,
    Record,
}

/// A `…Defaults` block and the template it feeds.
#[derive(Debug, Clone, Copy)]
enum Defaults {
    Cert,
    Domain,
    Zone,
    Record,
}

impl Defaults {
    const ALL: [Self; 4] = [Self::Cert, Self::Domain, Self::Zone, Self::Record];

    const fn key(self) -> &'static str {
        match self {
            Self::Cert => "certDefaults",
            Self::Domain => "domainDefaults",
            Self::Zone => "zoneDefaults",
            Self::Record => "recordDefaults",
        }
    }

    fn apply(self, ctx: &mut Context, raw: &Mapping) -> Result<(), CoreError> {
        match self {
            Self::Cert => ctx.update_cert(raw),
            Self::Domain => ctx.update_domain(raw),
            Self::Zone => ctx.update_zone(raw),
            Self::Record => ctx.update_record(raw),
        }
    }
}

const FALLBACKS: [Fallback; 3] = [Fallback::Domains, Fallback::Zones, Fallback::Records];
const CHILD_KEYS: [&str; 4] = ["certs", "domains", "zones", "records"];

impl Level {
    const fn segment(self) -> &'static str {
        match self {
            Self::Root => "Root",
            Self::Cert => "Cert",
            Self::Domain => "Domain",
            Self::Zone => "Zone",
            Self::Record => "Record",
        }
    }

    /// `…Defaults` blocks allowed here: those of strictly deeper levels.
    fn defaults(self) -> &'static [Defaults] {
        match self {
            Self::Root => &Defaults::ALL,
            Self::Cert => &Defaults::ALL[1..],
            Self::Domain => &Defaults::ALL[2..],
            Self::Zone => &Defaults::ALL[3..],
            Self::Record => &[],
        }
    }

    /// Fallback lists allowed here: those for grandchildren and deeper.
    fn fallbacks(self) -> &'static [Fallback] {
        match self {
            Self::Root => &FALLBACKS,
            Self::Cert => &FALLBACKS[1..],
            Self::Domain => &FALLBACKS[2..],
            Self::Zone | Self::Record => &[],
        }
    }

    fn child_key(self) -> Option<&'static str> {
        match self {
            Self::Root => Some("certs"),
            Self::Cert => Some("domains"),
            Self::Domain => Some("zones"),
            Self::Zone => Some("records"),
            Self::Record => None,
        }
    }

    fn attribute_keys(self) -> &'static [&'static str] {
        match self {
            Self::Root => &[],
            Self::Cert => CERT_KEYS,
            Self::Domain => DOMAIN_KEYS,
            Self::Zone => ZONE_KEYS,
            Self::Record => RECORD_KEYS,
        }
    }
}

/// Walk a parsed certificate document and build the validated graph.
pub fn build_graph(document: &Value) -> Result<DomainGraph, CoreError> {
    let ctx = Context::root();
    let root = match document {
        Value::Null => Cow::Owned(Mapping::new()),
        Value::Mapping(m) => Cow::Borrowed(m),
        _ => {
            return Err(CoreError::InvalidValue {
                key: "document".into(),
                expected: "a mapping",
                path: ctx.position(),
            });
        }
    };

    let mut walker = TreeWalker {
        graph: DomainGraph::default(),
    };
    walker.walk_root(ctx, &root)?;
    debug!(
        certs = walker.graph.certs.len(),
        domains = walker.graph.domains.len(),
        zones = walker.graph.zones.len(),
        records = walker.graph.record_count(),
        "configuration resolved"
    );
    Ok(walker.graph)
}

struct TreeWalker {
    graph: DomainGraph,
}

impl TreeWalker {
    fn walk_root(&mut self, mut ctx: Context, raw: &Mapping) -> Result<(), CoreError> {
        prepare(&mut ctx, Level::Root, raw)?;

        let certs = children(&ctx, raw, Level::Root, None)?;
        for (i, node) in certs.iter().enumerate() {
            let child = ctx.enter(format!("Cert[{i}]"));
            let node = node_mapping(node, &child)?;
            self.walk_cert(child, node)?;
        }
        Ok(())
    }

    fn walk_cert(&mut self, mut ctx: Context, raw: &Mapping) -> Result<(), CoreError> {
        ctx.update_cert(raw)?;
        prepare(&mut ctx, Level::Cert, raw)?;

        let spec = ctx.cert_spec()?;
        let name = spec.name.clone();
        let cert = self
            .graph
            .certs
            .create(spec)
            .map_err(|e| CoreError::graph(ctx.position(), e))?;
        debug!(cert = %name, path = %ctx.position(), "cert registered");

        let domains = children(&ctx, raw, Level::Cert, Some(Fallback::Domains))?;
        for (i, node) in domains.iter().enumerate() {
            let child = ctx.enter(format!("Domain[{i}]"));
            let node = node_mapping(node, &child)?;
            self.walk_domain(child, node, cert)?;
        }
        Ok(())
    }

    fn walk_domain(&mut self, mut ctx: Context, raw: &Mapping, cert: CertId) -> Result<(), CoreError> {
        ctx.update_domain(raw)?;
        prepare(&mut ctx, Level::Domain, raw)?;

        let domain = self.graph.domains.get_or_create(ctx.domain_name()?);
        self.graph.attach_domain(cert, domain);

        let zones = children(&ctx, raw, Level::Domain, Some(Fallback::Zones))?;
        for (i, node) in zones.iter().enumerate() {
            let child = ctx.enter(format!("Zone[{i}]"));
            let node = node_mapping(node, &child)?;
            self.walk_zone(child, node, cert, domain)?;
        }
        Ok(())
    }

    fn walk_zone(
        &mut self,
        mut ctx: Context,
        raw: &Mapping,
        cert: CertId,
        domain: DomainId,
    ) -> Result<(), CoreError> {
        ctx.update_zone(raw)?;
        prepare(&mut ctx, Level::Zone, raw)?;

        let zone = ctx.zone_key()?;
        self.graph
            .bind_domain(&zone, domain)
            .map_err(|e| CoreError::graph(ctx.position(), e))?;

        let records = children(&ctx, raw, Level::Zone, Some(Fallback::Records))?;
        for (i, node) in records.iter().enumerate() {
            let child = ctx.enter(format!("Record[{i}]"));
            let node = node_mapping(node, &child)?;
            self.walk_record(child, node, cert, domain)?;
        }
        Ok(())
    }

    fn walk_record(
        &mut self,
        mut ctx: Context,
        raw: &Mapping,
        cert: CertId,
        domain: DomainId,
    ) -> Result<(), CoreError> {
        ctx.update_record(raw)?;
        prepare(&mut ctx, Level::Record, raw)?;

        let zone = ctx.zone_key()?;
        let (port, params) = ctx.record_params()?;
        debug!(
            path = %ctx.position(),
            cert = self.graph.certs.get(cert).name(),
            domain = self.graph.domains.get(domain).name(),
            zone = %zone.name,
            server = %zone.server,
            %port,
            ttl = params.ttl,
            usage = %params.usage,
            selector = %params.selector,
            tlsa_type = %params.ty,
            "record resolved"
        );

        self.graph
            .add_record(zone, domain, port, cert, params)
            .map_err(|e| CoreError::graph(ctx.position(), e))
    }
}

/// Steps 2 and 3 of a level, plus key validation.
fn prepare(ctx: &mut Context, level: Level, raw: &Mapping) -> Result<(), CoreError> {
    check_keys(ctx, level, raw)?;

    for block in level.defaults() {
        match raw.get(block.key()) {
            None | Some(Value::Null) => {}
            Some(Value::Mapping(map)) => block.apply(ctx, map)?,
            Some(_) => return Err(invalid_node(block.key(), ctx)),
        }
    }

    for fallback in level.fallbacks() {
        ctx.update_fallback(*fallback, raw)?;
    }
    Ok(())
}

/// Reject structural keys that do not belong to `level`; warn on unknown ones.
fn check_keys(ctx: &Context, level: Level, raw: &Mapping) -> Result<(), CoreError> {
    for key in raw.keys() {
        let Some(key) = key.as_str() else {
            warn!(path = %ctx.position(), ?key, "ignoring non-string key");
            continue;
        };

        let is_defaults = Defaults::ALL.iter().any(|d| d.key() == key);
        let is_fallback = FALLBACKS.iter().any(|f| f.key() == key);
        let is_children = CHILD_KEYS.contains(&key);

        let allowed = level.defaults().iter().any(|d| d.key() == key)
            || level.fallbacks().iter().any(|f| f.key() == key)
            || level.child_key() == Some(key);

        if allowed {
            continue;
        }
        if is_defaults || is_fallback || is_children {
            return Err(CoreError::MisplacedKey {
                key: key.to_owned(),
                path: ctx.position(),
            });
        }
        if !level.attribute_keys().contains(&key) {
            warn!(
                path = %ctx.position(),
                key,
                level = level.segment(),
                "ignoring unrecognized key"
            );
        }
    }
    Ok(())
}

/// The explicit child list of `raw`, or the inherited fallback list.
fn children<'a>(
    ctx: &'a Context,
    raw: &'a Mapping,
    level: Level,
    fallback: Option<Fallback>,
) -> Result<&'a [Value], CoreError> {
    let Some(key) = level.child_key() else {
        return Ok(&[]);
    };
    match raw.get(key) {
        Some(Value::Sequence(items)) => Ok(items),
        Some(Value::Null) => Ok(&[]),
        Some(_) => Err(CoreError::InvalidValue {
            key: key.to_owned(),
            expected: "a list",
            path: ctx.position(),
        }),
        None => Ok(fallback.map_or(&[][..], |f| ctx.fallback(f))),
    }
}

fn node_mapping<'a>(node: &'a Value, ctx: &Context) -> Result<&'a Mapping, CoreError> {
    node.as_mapping().ok_or_else(|| invalid_node("node", ctx))
}

fn invalid_node(key: &str, ctx: &Context) -> CoreError {
    CoreError::InvalidValue {
        key: key.to_owned(),
        expected: "a mapping",
        path: ctx.position(),
    }
}
