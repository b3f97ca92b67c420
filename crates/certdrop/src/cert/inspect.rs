//! Validity window extraction from PEM certificates

use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};

use crate::errors::CertificateParseError;

const SECONDS_PER_DAY: i64 = 86_400;

/// The `notBefore` / `notAfter` pair of a certificate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ValidityWindow {
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
}

impl ValidityWindow {
    /// Whole days from `now` until `not_after`, rounded toward negative
    /// infinity so an expired certificate reports a negative count.
    pub fn days_until_expiry(&self, now: DateTime<Utc>) -> i64 {
        (self.not_after - now).num_seconds().div_euclid(SECONDS_PER_DAY)
    }
}

/// Read the leading certificate of a PEM file
pub fn read_validity(path: &Path) -> Result<ValidityWindow, CertificateParseError> {
    let data = fs::read(path).map_err(|source| CertificateParseError::Read {
        path: path.to_path_buf(),
        source,
    })?;

    parse_validity(&data, path)
}

/// Parse the first PEM block of `data` as an X.509 certificate
///
/// `path` is only used to label errors.
pub fn parse_validity(data: &[u8], path: &Path) -> Result<ValidityWindow, CertificateParseError> {
    let pem = pem::parse(data).map_err(|e| CertificateParseError::Pem {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })?;

    if pem.tag() != "CERTIFICATE" {
        return Err(CertificateParseError::Pem {
            path: path.to_path_buf(),
            reason: format!("leading block is {:?}, not a certificate", pem.tag()),
        });
    }

    let (_, cert) = x509_parser::parse_x509_certificate(pem.contents()).map_err(|e| {
        CertificateParseError::X509 {
            path: path.to_path_buf(),
            reason: e.to_string(),
        }
    })?;

    let validity = cert.validity();
    let to_utc = |ts: i64| {
        DateTime::from_timestamp(ts, 0).ok_or_else(|| CertificateParseError::Timestamp {
            path: path.to_path_buf(),
        })
    };

    Ok(ValidityWindow {
        not_before: to_utc(validity.not_before.timestamp())?,
        not_after: to_utc(validity.not_after.timestamp())?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::testing::cert_expiring_in;
    use chrono::Duration;

    fn window(not_after: DateTime<Utc>) -> ValidityWindow {
        ValidityWindow {
            not_before: not_after - Duration::days(90),
            not_after,
        }
    }

    #[test]
    fn test_days_until_expiry_floors() {
        let now = Utc::now();
        assert_eq!(window(now + Duration::days(60)).days_until_expiry(now), 60);
        assert_eq!(
            window(now + Duration::days(30) - Duration::seconds(1)).days_until_expiry(now),
            29
        );
        assert_eq!(window(now + Duration::hours(5)).days_until_expiry(now), 0);
    }

    #[test]
    fn test_days_until_expiry_negative_when_expired() {
        let now = Utc::now();
        assert_eq!(window(now - Duration::hours(1)).days_until_expiry(now), -1);
        assert_eq!(window(now - Duration::days(3)).days_until_expiry(now), -3);
    }

    #[test]
    fn test_parse_generated_certificate() {
        let (cert_pem, _key) = cert_expiring_in(60);

        let validity = parse_validity(cert_pem.as_bytes(), Path::new("fullchain.pem")).unwrap();
        assert!(validity.not_before < validity.not_after);

        let days = validity.days_until_expiry(Utc::now());
        assert!((59..=60).contains(&days), "unexpected days: {}", days);
    }

    #[test]
    fn test_parse_reads_leading_certificate_only() {
        let (leaf, _) = cert_expiring_in(10);
        let (intermediate, _) = cert_expiring_in(400);
        let chain = format!("{}{}", leaf, intermediate);

        let validity = parse_validity(chain.as_bytes(), Path::new("fullchain.pem")).unwrap();
        assert!(validity.days_until_expiry(Utc::now()) <= 10);
    }

    #[test]
    fn test_parse_invalid_pem() {
        let result = parse_validity(b"not a valid pem", Path::new("fullchain.pem"));
        assert!(matches!(result, Err(CertificateParseError::Pem { .. })));
    }

    #[test]
    fn test_parse_rejects_key_block() {
        let (_, key_pem) = cert_expiring_in(10);
        let result = parse_validity(key_pem.as_bytes(), Path::new("privkey.pem"));
        assert!(matches!(result, Err(CertificateParseError::Pem { .. })));
    }

    #[test]
    fn test_parse_garbage_der() {
        let garbage = "-----BEGIN CERTIFICATE-----\nAAAA\n-----END CERTIFICATE-----\n";
        let result = parse_validity(garbage.as_bytes(), Path::new("fullchain.pem"));
        assert!(matches!(result, Err(CertificateParseError::X509 { .. })));
    }

    #[test]
    fn test_read_missing_file() {
        let result = read_validity(Path::new("/nonexistent/fullchain.pem"));
        assert!(matches!(result, Err(CertificateParseError::Read { .. })));
    }
}
