// ── TLSA association data ──
//
// Pure function of (selector, type, DER certificate) plus the loader
// seam that supplies the DER bytes for a cert.

use sha2::{Digest, Sha256, Sha512};

use crate::error::CoreError;
use crate::model::{Cert, TlsaSelector, TlsaType};

/// Supplies the current certificate of a [`Cert`] as DER.
pub trait CertificateLoader {
    fn load_der(&self, cert: &Cert) -> Result<Vec<u8>, CoreError>;
}

/// Reads the PEM file at [`Cert::cert_file`] and decodes its first block.
#[derive(Debug, Clone, Copy, Default)]
pub struct PemFileLoader;

impl CertificateLoader for PemFileLoader {
    fn load_der(&self, cert: &Cert) -> Result<Vec<u8>, CoreError> {
        let path = cert.cert_file();
        let raw = std::fs::read(&path).map_err(|e| CoreError::io(&path, e))?;
        let block = pem::parse(&raw).map_err(|e| CoreError::Certificate {
            path: path.clone(),
            reason: e.to_string(),
        })?;
        if block.tag() != "CERTIFICATE" {
            return Err(CoreError::Certificate {
                path,
                reason: format!("expected a CERTIFICATE block, found {}", block.tag()),
            });
        }
        Ok(block.into_contents())
    }
}

/// Hex-encoded association data for a DER certificate.
pub fn content(selector: TlsaSelector, ty: TlsaType, der: &[u8]) -> Result<String, String> {
    let data = match selector {
        TlsaSelector::Full => der,
        TlsaSelector::Spki => subject_public_key_info(der)?,
    };

    Ok(match ty {
        TlsaType::Exact => hex::encode(data),
        TlsaType::Sha256 => hex::encode(Sha256::digest(data)),
        TlsaType::Sha512 => hex::encode(Sha512::digest(data)),
    })
}

/// Raw DER of the SubjectPublicKeyInfo inside `der`.
fn subject_public_key_info(der: &[u8]) -> Result<&[u8], String> {
    let (_, cert) = x509_parser::parse_x509_certificate(der).map_err(|e| e.to_string())?;
    Ok(cert.tbs_certificate.subject_pki.raw)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rcgen::{CertifiedKey, generate_simple_self_signed};

    use super::*;
    use crate::model::CertSpec;

    fn self_signed() -> CertifiedKey {
        generate_simple_self_signed(vec!["example.com".to_owned()]).unwrap()
    }

    #[test]
    fn spki_sha256_is_digest_of_public_key_info() {
        let CertifiedKey { cert, key_pair } = self_signed();
        let der = cert.der().to_vec();

        let expected = hex::encode(Sha256::digest(key_pair.public_key_der()));
        let actual = content(TlsaSelector::Spki, TlsaType::Sha256, &der).unwrap();
        assert_eq!(actual, expected);
        assert_eq!(actual.len(), 64);

        // Stable across calls.
        assert_eq!(content(TlsaSelector::Spki, TlsaType::Sha256, &der).unwrap(), actual);
    }

    #[test]
    fn full_exact_is_hex_of_whole_certificate() {
        let CertifiedKey { cert, .. } = self_signed();
        let der = cert.der().to_vec();
        assert_eq!(
            content(TlsaSelector::Full, TlsaType::Exact, &der).unwrap(),
            hex::encode(&der)
        );
    }

    #[test]
    fn full_sha512_has_128_hex_digits() {
        let CertifiedKey { cert, .. } = self_signed();
        let digest = content(TlsaSelector::Full, TlsaType::Sha512, cert.der()).unwrap();
        assert_eq!(digest.len(), 128);
        assert!(digest.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn spki_of_garbage_is_an_error() {
        assert!(content(TlsaSelector::Spki, TlsaType::Sha256, b"not a certificate").is_err());
    }

    #[test]
    fn pem_loader_decodes_cert_file() {
        let CertifiedKey { cert, .. } = self_signed();
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("web.pem"), cert.pem()).unwrap();

        let mut spec = CertSpec::new("web");
        spec.cert_dir = dir.path().to_path_buf();
        let loaded = PemFileLoader.load_der(&Cert::new(spec)).unwrap();
        assert_eq!(loaded, cert.der().to_vec());
    }

    #[test]
    fn pem_loader_reports_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let mut spec = CertSpec::new("absent");
        spec.cert_dir = dir.path().to_path_buf();
        let err = PemFileLoader.load_der(&Cert::new(spec)).unwrap_err();
        assert!(matches!(err, CoreError::Io { .. }));
    }

    #[test]
    fn pem_loader_rejects_non_certificate_block() {
        let dir = tempfile::tempdir().unwrap();
        let key = rcgen::KeyPair::generate().unwrap();
        std::fs::write(dir.path().join("key.pem"), key.serialize_pem()).unwrap();

        let mut spec = CertSpec::new("key");
        spec.cert_dir = dir.path().to_path_buf();
        let err = PemFileLoader.load_der(&Cert::new(spec)).unwrap_err();
        assert!(matches!(err, CoreError::Certificate { .. }));
    }
}
