// ── Certificates ──
//
// A `Cert` is one (possibly multi-domain) certificate together with the
// file locations and scripts used to produce and install it. Its domain
// list only grows. TLSA contents are memoized per (selector, type).

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use crate::error::CoreError;
use crate::model::{DomainId, TlsaSelector, TlsaType};
use crate::tlsa::{self, CertificateLoader};

pub const DEFAULT_KEY_TYPE: &str = "rsa:4096";
pub const DEFAULT_KEY_DIR: &str = "/var/lib/sir/keys/";
pub const DEFAULT_CSR_DIR: &str = "/var/lib/sir/csrs/";
pub const DEFAULT_CERT_DIR: &str = "/var/lib/sir/certs/";
pub const DEFAULT_CHAIN_DIR: &str = "/var/lib/sir/chains/";

/// Handle of a [`Cert`] inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CertId(pub(crate) usize);

/// How the sign or rollover script for a cert is chosen.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum ScriptSetting {
    /// Look for a per-cert or global script in the script directory.
    #[default]
    Auto,
    /// Explicitly disabled with `none`.
    Disabled,
    /// A shell-word command line; file arguments are appended.
    Command(String),
}

impl ScriptSetting {
    pub fn parse(raw: &str) -> Self {
        if raw == "none" {
            Self::Disabled
        } else {
            Self::Command(raw.to_owned())
        }
    }
}

/// Fully resolved attributes a cert is created from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CertSpec {
    pub name: String,
    pub sign_script: ScriptSetting,
    pub rollover_script: ScriptSetting,
    /// `-newkey` argument for openssl, e.g. `rsa:4096`.
    pub key_type: String,
    /// Appended verbatim to the `[SAN]` section of multi-domain CSRs.
    pub extra_conf: String,
    pub key_dir: PathBuf,
    pub csr_dir: PathBuf,
    pub cert_dir: PathBuf,
    pub chain_dir: PathBuf,
}

impl CertSpec {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            sign_script: ScriptSetting::Auto,
            rollover_script: ScriptSetting::Auto,
            key_type: DEFAULT_KEY_TYPE.into(),
            extra_conf: String::new(),
            key_dir: DEFAULT_KEY_DIR.into(),
            csr_dir: DEFAULT_CSR_DIR.into(),
            cert_dir: DEFAULT_CERT_DIR.into(),
            chain_dir: DEFAULT_CHAIN_DIR.into(),
        }
    }
}

#[derive(Debug)]
pub struct Cert {
    spec: CertSpec,
    domains: Vec<DomainId>,
    tlsa_cache: HashMap<(TlsaSelector, TlsaType), String>,
}

impl Cert {
    pub(crate) fn new(spec: CertSpec) -> Self {
        Self {
            spec,
            domains: Vec::new(),
            tlsa_cache: HashMap::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.spec.name
    }

    pub fn spec(&self) -> &CertSpec {
        &self.spec
    }

    pub fn file_name(&self) -> String {
        format!("{}.pem", self.spec.name)
    }

    pub fn key_file(&self) -> PathBuf {
        self.in_dir(&self.spec.key_dir)
    }

    pub fn csr_file(&self) -> PathBuf {
        self.in_dir(&self.spec.csr_dir)
    }

    pub fn cert_file(&self) -> PathBuf {
        self.in_dir(&self.spec.cert_dir)
    }

    pub fn chain_file(&self) -> PathBuf {
        self.in_dir(&self.spec.chain_dir)
    }

    fn in_dir(&self, dir: &Path) -> PathBuf {
        dir.join(self.file_name())
    }

    /// Covered domains, in the order they were first attached.
    pub fn domains(&self) -> &[DomainId] {
        &self.domains
    }

    pub fn covers(&self, domain: DomainId) -> bool {
        self.domains.contains(&domain)
    }

    /// Attach a domain. Returns `false` if it was already covered.
    pub fn add_domain(&mut self, domain: DomainId) -> bool {
        if self.covers(domain) {
            return false;
        }
        self.domains.push(domain);
        true
    }

    /// Hex TLSA association data for the current certificate file.
    ///
    /// The certificate is loaded at most once per (selector, type) pair for
    /// the lifetime of this `Cert`.
    pub fn tlsa_content(
        &mut self,
        selector: TlsaSelector,
        ty: TlsaType,
        loader: &dyn CertificateLoader,
    ) -> Result<String, CoreError> {
        if let Some(cached) = self.tlsa_cache.get(&(selector, ty)) {
            return Ok(cached.clone());
        }

        let der = loader.load_der(self)?;
        let content = tlsa::content(selector, ty, &der).map_err(|reason| CoreError::Certificate {
            path: self.cert_file(),
            reason,
        })?;
        self.tlsa_cache.insert((selector, ty), content.clone());
        Ok(content)
    }
}
