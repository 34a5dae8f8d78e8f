// ── TLSA parameter enums ──
//
// Closed sets of the symbolic names accepted in the configuration. Each
// name maps to the numeric code written into the record.

use serde::Serialize;
use strum::{Display, EnumIter, IntoEnumIterator, IntoStaticStr};

/// Certificate usage field of a TLSA record (RFC 6698 §2.1.1).
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsaUsage {
    /// Server cert must chain to a CA known to the client and the given cert must be in the chain.
    PkixTa,
    /// Server cert must chain to a CA known to the client and must be the given cert.
    PkixEe,
    /// The given cert must be somewhere in the chain.
    DaneTa,
    /// The given cert must be the server cert.
    DaneEe,
}

impl TlsaUsage {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "PKIX_TA" => Some(Self::PkixTa),
            "PKIX_EE" => Some(Self::PkixEe),
            "DANE_TA" => Some(Self::DaneTa),
            "DANE_EE" => Some(Self::DaneEe),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::PkixTa => 0,
            Self::PkixEe => 1,
            Self::DaneTa => 2,
            Self::DaneEe => 3,
        }
    }
}

/// Which part of the certificate is matched.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsaSelector {
    /// The whole DER-encoded certificate.
    Full,
    /// Only the SubjectPublicKeyInfo.
    Spki,
}

impl TlsaSelector {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "FULL" => Some(Self::Full),
            "SPKI" => Some(Self::Spki),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Full => 0,
            Self::Spki => 1,
        }
    }
}

/// Matching type: the selected data itself or a digest of it.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Display, EnumIter, IntoStaticStr,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum TlsaType {
    Exact,
    #[serde(rename = "SHA256")]
    #[strum(serialize = "SHA256")]
    Sha256,
    #[serde(rename = "SHA512")]
    #[strum(serialize = "SHA512")]
    Sha512,
}

impl TlsaType {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "EXACT" => Some(Self::Exact),
            "SHA256" => Some(Self::Sha256),
            "SHA512" => Some(Self::Sha512),
            _ => None,
        }
    }

    pub const fn code(self) -> u8 {
        match self {
            Self::Exact => 0,
            Self::Sha256 => 1,
            Self::Sha512 => 2,
        }
    }
}

/// Comma-separated list of every accepted name, for error messages.
pub fn accepted_names<E>() -> String
where
    E: IntoEnumIterator + Into<&'static str>,
{
    E::iter().map(Into::into).collect::<Vec<&str>>().join(", ")
}
