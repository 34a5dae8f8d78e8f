// ── Cascading configuration context ──
//
// A value-copy snapshot of inherited attribute templates and fallback
// child lists. Every tree level works on its own copy (`enter`), so a
// level can only ever influence its own descendants.

use std::path::PathBuf;

use serde_yaml::{Mapping, Value};

use crate::error::CoreError;
use crate::model::{
    CertSpec, PortValue, RecordParams, ScriptSetting, TlsaSelector, TlsaType, TlsaUsage, ZoneKey,
    accepted_names,
};

pub const CERT_KEYS: &[&str] = &[
    "name",
    "signScript",
    "rolloverScript",
    "type",
    "extraConf",
    "keyDir",
    "csrDir",
    "certDir",
    "chainDir",
];
pub const DOMAIN_KEYS: &[&str] = &["name"];
pub const ZONE_KEYS: &[&str] = &["name", "server", "port", "keyFile"];
pub const RECORD_KEYS: &[&str] = &["port", "ttl", "usage", "selector", "type"];

// ── Templates ───────────────────────────────────────────────────────
//
// `None` means "not set at any enclosing level"; construction falls back
// to the entity's built-in default (or fails for required attributes).

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CertTemplate {
    pub name: Option<String>,
    pub sign_script: Option<ScriptSetting>,
    pub rollover_script: Option<ScriptSetting>,
    pub key_type: Option<String>,
    pub extra_conf: Option<String>,
    pub key_dir: Option<PathBuf>,
    pub csr_dir: Option<PathBuf>,
    pub cert_dir: Option<PathBuf>,
    pub chain_dir: Option<PathBuf>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DomainTemplate {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ZoneTemplate {
    pub name: Option<String>,
    pub server: Option<String>,
    pub port: Option<u16>,
    /// `Some(None)` is an explicit `keyFile: null`.
    pub key_file: Option<Option<PathBuf>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RecordTemplate {
    pub port: Option<PortValue>,
    pub ttl: Option<u32>,
    pub usage: Option<TlsaUsage>,
    pub selector: Option<TlsaSelector>,
    pub ty: Option<TlsaType>,
}

// ── Fallback lists ──────────────────────────────────────────────────

/// Child lists substituted when a level omits its explicit list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Fallback {
    Domains,
    Zones,
    Records,
}

impl Fallback {
    pub const fn key(self) -> &'static str {
        match self {
            Self::Domains => "defaultDomains",
            Self::Zones => "defaultZones",
            Self::Records => "defaultRecords",
        }
    }
}

#[derive(Debug, Clone, Default)]
struct Fallbacks {
    domains: Vec<Value>,
    zones: Vec<Value>,
    records: Vec<Value>,
}

// ── Context ─────────────────────────────────────────────────────────

#[derive(Debug, Clone)]
pub struct Context {
    location: Vec<String>,
    pub cert: CertTemplate,
    pub domain: DomainTemplate,
    pub zone: ZoneTemplate,
    pub record: RecordTemplate,
    fallback: Fallbacks,
}

impl Default for Context {
    fn default() -> Self {
        Self::root()
    }
}

impl Context {
    pub fn root() -> Self {
        Self {
            location: vec!["Root".to_owned()],
            cert: CertTemplate::default(),
            domain: DomainTemplate::default(),
            zone: ZoneTemplate::default(),
            record: RecordTemplate::default(),
            fallback: Fallbacks::default(),
        }
    }

    /// Independent copy for a child node, tagged with `segment`.
    pub fn enter(&self, segment: impl Into<String>) -> Self {
        let mut child = self.clone();
        child.location.push(segment.into());
        child
    }

    /// Human readable tree path, e.g. `Root.Cert[0].Domain[1]`.
    pub fn position(&self) -> String {
        self.location.join(".")
    }

    // ── Template updates ────────────────────────────────────────────

    pub fn update_cert(&mut self, raw: &Mapping) -> Result<(), CoreError> {
        let t = &mut self.cert;
        let path = || self.location.join(".");
        if let Some(v) = string(raw, "name", path)? {
            t.name = Some(v);
        }
        if let Some(v) = script(raw, "signScript", path)? {
            t.sign_script = Some(v);
        }
        if let Some(v) = script(raw, "rolloverScript", path)? {
            t.rollover_script = Some(v);
        }
        if let Some(v) = string(raw, "type", path)? {
            t.key_type = Some(v);
        }
        if let Some(v) = string(raw, "extraConf", path)? {
            t.extra_conf = Some(v);
        }
        if let Some(v) = string(raw, "keyDir", path)? {
            t.key_dir = Some(v.into());
        }
        if let Some(v) = string(raw, "csrDir", path)? {
            t.csr_dir = Some(v.into());
        }
        if let Some(v) = string(raw, "certDir", path)? {
            t.cert_dir = Some(v.into());
        }
        if let Some(v) = string(raw, "chainDir", path)? {
            t.chain_dir = Some(v.into());
        }
        Ok(())
    }

    pub fn update_domain(&mut self, raw: &Mapping) -> Result<(), CoreError> {
        let path = || self.location.join(".");
        if let Some(v) = string(raw, "name", path)? {
            self.domain.name = Some(v);
        }
        Ok(())
    }

    pub fn update_zone(&mut self, raw: &Mapping) -> Result<(), CoreError> {
        let t = &mut self.zone;
        let path = || self.location.join(".");
        if let Some(v) = string(raw, "name", path)? {
            t.name = Some(v);
        }
        if let Some(v) = string(raw, "server", path)? {
            t.server = Some(v);
        }
        if let Some(v) = raw.get("port") {
            t.port = Some(port_number(v, "port", path)?);
        }
        if let Some(v) = raw.get("keyFile") {
            t.key_file = Some(match v {
                Value::Null => None,
                Value::String(s) => Some(PathBuf::from(s)),
                _ => return Err(invalid("keyFile", "a path or null", path)),
            });
        }
        Ok(())
    }

    pub fn update_record(&mut self, raw: &Mapping) -> Result<(), CoreError> {
        let t = &mut self.record;
        let path = || self.location.join(".");
        if let Some(v) = raw.get("port") {
            t.port = Some(match v {
                Value::String(s) if s == "wildcard" || s == "*" => PortValue::Wildcard,
                _ => PortValue::Number(port_number(v, "port", path)?),
            });
        }
        if let Some(v) = raw.get("ttl") {
            let ttl = v
                .as_u64()
                .and_then(|n| u32::try_from(n).ok())
                .ok_or_else(|| invalid("ttl", "a non-negative 32-bit integer", path))?;
            t.ttl = Some(ttl);
        }
        if let Some(v) = string(raw, "usage", path)? {
            t.usage = Some(symbol(&v, "usage", TlsaUsage::from_name, path)?);
        }
        if let Some(v) = string(raw, "selector", path)? {
            t.selector = Some(symbol(&v, "selector", TlsaSelector::from_name, path)?);
        }
        if let Some(v) = string(raw, "type", path)? {
            t.ty = Some(symbol(&v, "type", TlsaType::from_name, path)?);
        }
        Ok(())
    }

    /// Record the fallback list for `which` if `raw` declares one.
    pub fn update_fallback(&mut self, which: Fallback, raw: &Mapping) -> Result<(), CoreError> {
        let Some(value) = raw.get(which.key()) else {
            return Ok(());
        };
        let list = match value {
            Value::Null => Vec::new(),
            Value::Sequence(items) => items.clone(),
            _ => {
                return Err(CoreError::InvalidFallback {
                    key: which.key().to_owned(),
                    path: self.position(),
                });
            }
        };
        match which {
            Fallback::Domains => self.fallback.domains = list,
            Fallback::Zones => self.fallback.zones = list,
            Fallback::Records => self.fallback.records = list,
        }
        Ok(())
    }

    pub fn fallback(&self, which: Fallback) -> &[Value] {
        match which {
            Fallback::Domains => &self.fallback.domains,
            Fallback::Zones => &self.fallback.zones,
            Fallback::Records => &self.fallback.records,
        }
    }

    // ── Resolution ──────────────────────────────────────────────────

    pub fn cert_spec(&self) -> Result<CertSpec, CoreError> {
        let t = &self.cert;
        let name = t.name.clone().ok_or_else(|| self.missing("name"))?;
        let mut spec = CertSpec::new(name);
        if let Some(v) = &t.sign_script {
            spec.sign_script = v.clone();
        }
        if let Some(v) = &t.rollover_script {
            spec.rollover_script = v.clone();
        }
        if let Some(v) = &t.key_type {
            spec.key_type = v.clone();
        }
        if let Some(v) = &t.extra_conf {
            spec.extra_conf = v.clone();
        }
        if let Some(v) = &t.key_dir {
            spec.key_dir = v.clone();
        }
        if let Some(v) = &t.csr_dir {
            spec.csr_dir = v.clone();
        }
        if let Some(v) = &t.cert_dir {
            spec.cert_dir = v.clone();
        }
        if let Some(v) = &t.chain_dir {
            spec.chain_dir = v.clone();
        }
        Ok(spec)
    }

    pub fn domain_name(&self) -> Result<&str, CoreError> {
        self.domain.name.as_deref().ok_or_else(|| self.missing("name"))
    }

    pub fn zone_key(&self) -> Result<ZoneKey, CoreError> {
        let t = &self.zone;
        let name = t.name.clone().ok_or_else(|| self.missing("name"))?;
        let mut key = ZoneKey::new(name);
        if let Some(v) = &t.server {
            key.server = v.clone();
        }
        if let Some(v) = t.port {
            key.port = v;
        }
        if let Some(v) = &t.key_file {
            key.key_file = v.clone();
        }
        Ok(key)
    }

    pub fn record_params(&self) -> Result<(PortValue, RecordParams), CoreError> {
        let t = &self.record;
        let port = t.port.ok_or_else(|| self.missing("port"))?;
        let defaults = RecordParams::default();
        Ok((
            port,
            RecordParams {
                ttl: t.ttl.unwrap_or(defaults.ttl),
                usage: t.usage.unwrap_or(defaults.usage),
                selector: t.selector.unwrap_or(defaults.selector),
                ty: t.ty.unwrap_or(defaults.ty),
            },
        ))
    }

    fn missing(&self, attribute: &'static str) -> CoreError {
        CoreError::MissingAttribute {
            attribute,
            path: self.position(),
        }
    }
}

// ── Value helpers ───────────────────────────────────────────────────

fn invalid(key: &str, expected: &'static str, path: impl Fn() -> String) -> CoreError {
    CoreError::InvalidValue {
        key: key.to_owned(),
        expected,
        path: path(),
    }
}

fn string(raw: &Mapping, key: &str, path: impl Fn() -> String) -> Result<Option<String>, CoreError> {
    match raw.get(key) {
        None => Ok(None),
        Some(Value::String(s)) => Ok(Some(s.clone())),
        Some(_) => Err(invalid(key, "a string", path)),
    }
}

/// Scripts accept `null` to return to automatic lookup.
fn script(
    raw: &Mapping,
    key: &str,
    path: impl Fn() -> String,
) -> Result<Option<ScriptSetting>, CoreError> {
    match raw.get(key) {
        None => Ok(None),
        Some(Value::Null) => Ok(Some(ScriptSetting::Auto)),
        Some(Value::String(s)) => Ok(Some(ScriptSetting::parse(s))),
        Some(_) => Err(invalid(key, "a command line, 'none' or null", path)),
    }
}

fn port_number(value: &Value, key: &str, path: impl Fn() -> String) -> Result<u16, CoreError> {
    value
        .as_u64()
        .and_then(|n| u16::try_from(n).ok())
        .ok_or_else(|| invalid(key, "a port number between 0 and 65535", path))
}

fn symbol<T>(
    value: &str,
    field: &'static str,
    lookup: impl Fn(&str) -> Option<T>,
    path: impl Fn() -> String,
) -> Result<T, CoreError>
where
    T: strum::IntoEnumIterator + Into<&'static str>,
{
    lookup(value).ok_or_else(|| CoreError::UnknownEnumValue {
        field,
        value: value.to_owned(),
        expected: accepted_names::<T>(),
        path: path(),
    })
}
