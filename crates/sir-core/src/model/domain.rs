use std::fmt;

/// Handle of a [`Domain`] inside its registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DomainId(pub(crate) usize);

/// A DNS name covered by one or more certs.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Domain {
    name: String,
}

impl Domain {
    pub(crate) fn new(name: impl Into<String>) -> Self {
        Self { name: name.into() }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Subject alternative name entry for CSR generation.
    pub fn san(&self) -> String {
        format!("DNS:{}", self.name)
    }

    /// Whether this name lies at or below `zone`, on a label boundary.
    pub fn is_within(&self, zone: &str) -> bool {
        let name = normalize(&self.name);
        let zone = normalize(zone);
        if zone.is_empty() || name == zone {
            return true;
        }
        name.len() > zone.len()
            && name.ends_with(zone.as_str())
            && name.as_bytes()[name.len() - zone.len() - 1] == b'.'
    }
}

impl fmt::Display for Domain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

fn normalize(name: &str) -> String {
    name.trim_end_matches('.').to_ascii_lowercase()
}
