//! Tool settings and certificate document loading for sir.
//!
//! Settings are layered: built-in defaults, then the TOML file at the
//! platform config path, then `SIR_*` environment variables. The
//! certificate document itself is YAML and is handed to `sir-core` as a
//! generic value tree.

use std::path::{Path, PathBuf};

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use sir_core::Tools;

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to serialize settings: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("settings loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{path} is not valid YAML: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("{path}: the top level of a certificate document must be a mapping")]
    NotAMapping { path: PathBuf },
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

impl ConfigError {
    fn io(path: &Path, source: std::io::Error) -> Self {
        Self::Io {
            path: path.to_path_buf(),
            source,
        }
    }
}

// ── Settings ────────────────────────────────────────────────────────

/// Where sir finds its document and external tools.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
pub struct Settings {
    /// YAML certificate document.
    #[serde(default = "default_document")]
    pub document: PathBuf,

    /// Holds `sign[/<cert>]` and `rollover[/<cert>]` fallback scripts.
    #[serde(default = "default_script_dir")]
    pub script_dir: PathBuf,

    #[serde(default = "default_openssl")]
    pub openssl: String,

    /// Base config for multi-domain CSRs.
    #[serde(default = "default_openssl_config")]
    pub openssl_config: PathBuf,

    #[serde(default = "default_nsupdate")]
    pub nsupdate: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            document: default_document(),
            script_dir: default_script_dir(),
            openssl: default_openssl(),
            openssl_config: default_openssl_config(),
            nsupdate: default_nsupdate(),
        }
    }
}

fn default_document() -> PathBuf {
    "/etc/sir/conf.yaml".into()
}
fn default_script_dir() -> PathBuf {
    "/etc/sir".into()
}
fn default_openssl() -> String {
    "openssl".into()
}
fn default_openssl_config() -> PathBuf {
    "/etc/ssl/openssl.cnf".into()
}
fn default_nsupdate() -> String {
    "nsupdate".into()
}

impl Settings {
    /// The external tool set described by these settings.
    pub fn tools(&self) -> Tools {
        Tools {
            openssl: self.openssl.clone(),
            openssl_config: self.openssl_config.clone(),
            nsupdate: self.nsupdate.clone(),
            script_dir: self.script_dir.clone(),
        }
    }
}

// ── Settings file path ──────────────────────────────────────────────

/// Resolve the settings file path via XDG / platform conventions.
pub fn settings_path() -> PathBuf {
    ProjectDirs::from("org", "sir", "sir").map_or_else(
        || {
            let mut p = dirs_fallback();
            p.push("config.toml");
            p
        },
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

fn dirs_fallback() -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.push(".config");
    p.push("sir");
    p
}

// ── Settings loading ────────────────────────────────────────────────

/// Load settings from the canonical file + environment.
pub fn load_settings() -> Result<Settings, ConfigError> {
    load_settings_from(&settings_path())
}

/// Load settings from `path` + environment. A missing file is not an error.
pub fn load_settings_from(path: &Path) -> Result<Settings, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Settings::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("SIR_").only(&[
            "document",
            "script_dir",
            "openssl",
            "openssl_config",
            "nsupdate",
        ]));

    let settings: Settings = figment.extract()?;
    Ok(settings)
}

// ── Settings saving ─────────────────────────────────────────────────

/// Serialize settings to TOML and write to the canonical settings path.
pub fn save_settings(settings: &Settings) -> Result<PathBuf, ConfigError> {
    let path = settings_path();
    save_settings_to(&path, settings)?;
    Ok(path)
}

pub fn save_settings_to(path: &Path, settings: &Settings) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| ConfigError::io(parent, e))?;
    }
    let toml_str = toml::to_string_pretty(settings)?;
    std::fs::write(path, toml_str).map_err(|e| ConfigError::io(path, e))?;
    Ok(())
}

// ── Certificate document ────────────────────────────────────────────

/// Read and parse the YAML certificate document at `path`.
///
/// An empty document yields an empty mapping.
pub fn load_document(path: &Path) -> Result<serde_yaml::Value, ConfigError> {
    let raw = std::fs::read_to_string(path).map_err(|e| ConfigError::io(path, e))?;
    parse_document(path, &raw)
}

fn parse_document(path: &Path, raw: &str) -> Result<serde_yaml::Value, ConfigError> {
    let value: serde_yaml::Value = serde_yaml::from_str(raw).map_err(|source| ConfigError::Yaml {
        path: path.to_path_buf(),
        source,
    })?;
    match value {
        serde_yaml::Value::Null => Ok(serde_yaml::Value::Mapping(serde_yaml::Mapping::new())),
        serde_yaml::Value::Mapping(_) => Ok(value),
        _ => Err(ConfigError::NotAMapping {
            path: path.to_path_buf(),
        }),
    }
}
