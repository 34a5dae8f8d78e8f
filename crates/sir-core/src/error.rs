// ── Core error types ──
//
// `GraphError` covers the structural invariants enforced by the domain
// graph at attachment time. `CoreError` is what the rest of the crate
// returns: graph failures are wrapped with the configuration path they
// were raised at, next to configuration-level and collaborator failures.

use std::path::PathBuf;

use thiserror::Error;

use crate::model::PortValue;

/// A structural invariant of the domain graph was violated.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum GraphError {
    #[error("cert '{name}' is declared more than once")]
    DuplicateName { name: String },

    #[error("domain '{domain}' is not part of zone '{zone}'")]
    HierarchyViolation { domain: String, zone: String },

    #[error("domain '{domain}' already has {existing} ports, cannot add port {requested}")]
    PortModeConflict {
        domain: String,
        existing: &'static str,
        requested: PortValue,
    },

    #[error("{owner} already has a record for cert '{cert}'")]
    DuplicateRecord { owner: String, cert: String },

    #[error("domain '{domain}' is not covered by cert '{cert}'")]
    DomainNotInCert { domain: String, cert: String },
}

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Graph construction ───────────────────────────────────────────
    #[error("{path}: {source}")]
    Graph {
        path: String,
        #[source]
        source: GraphError,
    },

    // ── Configuration tree ───────────────────────────────────────────
    #[error("{path}: '{key}' must be a list or null")]
    InvalidFallback { key: String, path: String },

    #[error("{path}: unknown {field} '{value}' (expected one of {expected})")]
    UnknownEnumValue {
        field: &'static str,
        value: String,
        expected: String,
        path: String,
    },

    #[error("{path}: missing required attribute '{attribute}'")]
    MissingAttribute { attribute: &'static str, path: String },

    #[error("{path}: invalid value for '{key}', expected {expected}")]
    InvalidValue {
        key: String,
        expected: &'static str,
        path: String,
    },

    #[error("{path}: '{key}' is not allowed at this level")]
    MisplacedKey { key: String, path: String },

    // ── Certificates ─────────────────────────────────────────────────
    #[error("cannot decode certificate {path}: {reason}")]
    Certificate { path: PathBuf, reason: String },

    #[error("cannot access {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Collaborators ────────────────────────────────────────────────
    #[error("cannot start '{program}': {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("'{command}' exited with {}", describe_exit(.code))]
    ExternalCommand {
        command: String,
        code: Option<i32>,
        output: String,
    },
}

#[allow(clippy::ref_option, clippy::trivially_copy_pass_by_ref)]
fn describe_exit(code: &Option<i32>) -> String {
    code.map_or_else(|| "a signal".to_owned(), |c| format!("status {c}"))
}

impl CoreError {
    /// Attach a configuration path to a graph invariant violation.
    pub fn graph(path: impl Into<String>, source: GraphError) -> Self {
        Self::Graph {
            path: path.into(),
            source,
        }
    }

    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}
