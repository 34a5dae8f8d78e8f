// ── Domain graph entities ──
//
// Registries own the entities; cross references are plain handles
// (`CertId`, `DomainId`) resolved through the registries.

mod cert;
mod domain;
mod tlsa;
mod zone;

pub use cert::{
    Cert, CertId, CertSpec, DEFAULT_CERT_DIR, DEFAULT_CHAIN_DIR, DEFAULT_CSR_DIR, DEFAULT_KEY_DIR,
    DEFAULT_KEY_TYPE, ScriptSetting,
};
pub use domain::{Domain, DomainId};
pub use tlsa::{TlsaSelector, TlsaType, TlsaUsage, accepted_names};
pub use zone::{
    DEFAULT_PORT, DEFAULT_SERVER, DEFAULT_TTL, Port, PortValue, Record, RecordParams, Zone,
    ZoneDomain, ZoneKey,
};
