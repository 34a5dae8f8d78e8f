// sir-core: Domain graph, cascading configuration and TLSA update scripts.

pub mod context;
pub mod error;
pub mod model;
pub mod nsupdate;
pub mod registry;
pub mod runner;
pub mod tlsa;
pub mod walker;
pub mod workflow;

// ── Primary re-exports ──────────────────────────────────────────────
pub use error::{CoreError, GraphError};
pub use nsupdate::{UpdateMode, UpdateScript};
pub use registry::{CertRegistry, DomainGraph, DomainRegistry, RecordSummary, ZoneRegistry};
pub use runner::{CommandRunner, Invocation, SystemRunner};
pub use tlsa::{CertificateLoader, PemFileLoader};
pub use walker::build_graph;
pub use workflow::{ScriptKind, Step, Tools, Workflow};

pub use model::{
    Cert, CertId, CertSpec, Domain, DomainId, Port, PortValue, Record, RecordParams,
    ScriptSetting, TlsaSelector, TlsaType, TlsaUsage, Zone, ZoneDomain, ZoneKey,
};

impl DomainGraph {
    /// Build and validate the graph described by a parsed certificate document.
    pub fn from_document(document: &serde_yaml::Value) -> Result<Self, CoreError> {
        build_graph(document)
    }
}
