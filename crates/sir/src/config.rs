//! CLI configuration: a thin wrapper around `sir_config`.
//!
//! Re-exports the shared types and adds the `--config` override on top.

use std::path::{Path, PathBuf};

use tracing::debug;

use sir_core::DomainGraph;

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use sir_config::{Settings, load_settings, save_settings, settings_path};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolved settings plus the certificate document actually in use.
#[derive(Debug)]
pub struct Resolved {
    pub settings: Settings,
    pub document: PathBuf,
}

/// Load settings and apply the `--config` override (flag > env > settings).
pub fn resolve(global: &GlobalOpts) -> Result<Resolved, CliError> {
    let settings = load_settings()?;
    let document = global
        .config
        .clone()
        .unwrap_or_else(|| settings.document.clone());
    debug!(document = %document.display(), "using certificate document");
    Ok(Resolved { settings, document })
}

/// Read the certificate document and build the validated domain graph.
pub fn load_graph(document: &Path) -> Result<DomainGraph, CliError> {
    let value = sir_config::load_document(document).map_err(|source| match source {
        sir_config::ConfigError::Io { .. } => CliError::NoDocument {
            path: document.display().to_string(),
            source,
        },
        other => CliError::Document {
            message: other.to_string(),
        },
    })?;
    Ok(DomainGraph::from_document(&value)?)
}
