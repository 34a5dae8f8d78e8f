//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text.

use miette::Diagnostic;
use thiserror::Error;

use sir_config::ConfigError;
use sir_core::{CoreError, GraphError};

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const CONFIG: i32 = 3;
    pub const EXTERNAL: i32 = 4;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Certificate document ─────────────────────────────────────────

    #[error("Invalid certificate document at {path}: {message}")]
    #[diagnostic(
        code(sir::graph),
        help("{hint}")
    )]
    Graph {
        path: String,
        message: String,
        hint: &'static str,
    },

    #[error("{message}")]
    #[diagnostic(
        code(sir::document),
        help(
            "Check the keys and values at the reported position.\n\
             Run: sir check -v to see how the document is resolved"
        )
    )]
    Document { message: String },

    #[error("Could not read certificate document {path}")]
    #[diagnostic(
        code(sir::no_document),
        help(
            "Pass one with --config <FILE>, set SIR_CONFIG, or set `document` in\n\
             the settings file (sir settings path)."
        )
    )]
    NoDocument {
        path: String,
        #[source]
        source: ConfigError,
    },

    // ── Settings ─────────────────────────────────────────────────────

    #[error(transparent)]
    #[diagnostic(
        code(sir::settings),
        help("Inspect the resolved settings with: sir settings show")
    )]
    Settings(#[from] ConfigError),

    #[error("Settings file already exists at {path}")]
    #[diagnostic(code(sir::settings_exist), help("Use --force to overwrite it."))]
    SettingsExist { path: String },

    // ── Certificates ─────────────────────────────────────────────────

    #[error("Cannot compute TLSA data from {path}: {reason}")]
    #[diagnostic(
        code(sir::certificate),
        help("The cert file must hold a PEM encoded certificate. Did the sign step run?")
    )]
    Certificate { path: String, reason: String },

    #[error("Cannot access {path}")]
    #[diagnostic(code(sir::io))]
    FileAccess {
        path: String,
        #[source]
        source: std::io::Error,
    },

    // ── External tools ───────────────────────────────────────────────

    #[error("Could not start '{program}'")]
    #[diagnostic(
        code(sir::spawn),
        help("Check that it is installed, or point the settings at it (sir settings show).")
    )]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    #[error("{message}")]
    #[diagnostic(code(sir::external_command), help("Its output was:\n{output}"))]
    ExternalCommand { message: String, output: String },

    // ── Serialization ─────────────────────────────────────────────────

    #[error("Could not render output: {0}")]
    #[diagnostic(code(sir::render))]
    Render(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Graph { .. }
            | Self::Document { .. }
            | Self::NoDocument { .. }
            | Self::Settings(_) => exit_code::CONFIG,
            Self::SettingsExist { .. } => exit_code::USAGE,
            Self::Spawn { .. } | Self::ExternalCommand { .. } => exit_code::EXTERNAL,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

fn graph_hint(err: &GraphError) -> &'static str {
    match err {
        GraphError::DuplicateName { .. } => "Every cert needs a unique name.",
        GraphError::HierarchyViolation { .. } => {
            "A domain can only get records in a zone it belongs to, e.g. a.example.com in example.com."
        }
        GraphError::PortModeConflict { .. } => {
            "A domain either uses the wildcard port or numbered ports within one zone, not both."
        }
        GraphError::DuplicateRecord { .. } => {
            "A cert can only have one record per port; check defaultRecords and explicit records."
        }
        GraphError::DomainNotInCert { .. } => "Add the domain to the cert's domain list.",
    }
}

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        let message = err.to_string();
        match err {
            CoreError::Graph { path, source } => CliError::Graph {
                hint: graph_hint(&source),
                message: source.to_string(),
                path,
            },

            CoreError::InvalidFallback { .. }
            | CoreError::UnknownEnumValue { .. }
            | CoreError::MissingAttribute { .. }
            | CoreError::InvalidValue { .. }
            | CoreError::MisplacedKey { .. } => CliError::Document { message },

            CoreError::Certificate { path, reason } => CliError::Certificate {
                path: path.display().to_string(),
                reason,
            },

            CoreError::Io { path, source } => CliError::FileAccess {
                path: path.display().to_string(),
                source,
            },

            CoreError::Spawn { program, source } => CliError::Spawn { program, source },

            CoreError::ExternalCommand { output, .. } => {
                CliError::ExternalCommand { message, output }
            }
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn graph_errors_are_config_errors() {
        let err: CliError = CoreError::graph(
            "Root.Cert[1]",
            GraphError::DuplicateName { name: "web".into() },
        )
        .into();
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert_eq!(
            err.to_string(),
            "Invalid certificate document at Root.Cert[1]: cert 'web' is declared more than once"
        );
    }

    #[test]
    fn failed_commands_are_external_errors() {
        let err: CliError = CoreError::ExternalCommand {
            command: "nsupdate -k k.key".into(),
            code: Some(2),
            output: "REFUSED".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::EXTERNAL);
        assert_eq!(err.to_string(), "'nsupdate -k k.key' exited with status 2");
    }

    #[test]
    fn document_errors_keep_their_position() {
        let err: CliError = CoreError::MisplacedKey {
            key: "certDefaults".into(),
            path: "Root.Cert[0]".into(),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::CONFIG);
        assert!(err.to_string().starts_with("Root.Cert[0]:"));
    }

    #[test]
    fn io_errors_carry_their_path() {
        let err: CliError = CoreError::Io {
            path: "/var/lib/sir/certs/web.pem".into(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        }
        .into();
        assert_eq!(err.exit_code(), exit_code::GENERAL);
        assert_eq!(err.to_string(), "Cannot access /var/lib/sir/certs/web.pem");
    }
}
