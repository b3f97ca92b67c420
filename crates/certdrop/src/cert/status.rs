//! Certificate presence and freshness evaluation

use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use tracing::{debug, error, info, warn};

use super::{read_validity, FULLCHAIN_FILE, REQUIRED_FILES};
use crate::errors::CertificateParseError;

/// Snapshot of the certificate directory, recomputed on every run
#[derive(Debug)]
pub struct CertificateStatus {
    /// Both required files are present
    pub exists: bool,
    /// Remaining validity is strictly greater than the threshold
    pub is_fresh: bool,
    pub days_until_expiry: Option<i64>,
    /// Required files that exist, in archive order
    pub file_paths: Vec<PathBuf>,
    /// `!(exists && is_fresh)`
    pub needs_refresh: bool,
    /// Set when the full chain could not be parsed; freshness degrades to false
    pub parse_error: Option<CertificateParseError>,
}

impl CertificateStatus {
    fn missing() -> Self {
        Self {
            exists: false,
            is_fresh: false,
            days_until_expiry: None,
            file_paths: Vec::new(),
            needs_refresh: true,
            parse_error: None,
        }
    }
}

/// Freshness rule: exactly `threshold_days` left is not fresh
pub fn is_fresh(days_until_expiry: i64, threshold_days: i64) -> bool {
    days_until_expiry > threshold_days
}

/// Evaluate `cert_dir` against the current time
pub fn evaluate(cert_dir: &Path, threshold_days: i64) -> CertificateStatus {
    evaluate_at(cert_dir, threshold_days, Utc::now())
}

/// Evaluate `cert_dir` as of `now`
pub fn evaluate_at(cert_dir: &Path, threshold_days: i64, now: DateTime<Utc>) -> CertificateStatus {
    if !cert_dir.is_dir() {
        warn!(cert_dir = %cert_dir.display(), "Certificate directory does not exist");
        return CertificateStatus::missing();
    }

    for name in REQUIRED_FILES {
        let path = cert_dir.join(name);
        if !path.is_file() {
            warn!(file = %path.display(), "Certificate file missing");
            return CertificateStatus::missing();
        }
    }

    debug!(cert_dir = %cert_dir.display(), "All certificate files present");

    let file_paths: Vec<PathBuf> = REQUIRED_FILES
        .iter()
        .map(|name| cert_dir.join(name))
        .filter(|path| path.is_file())
        .collect();

    let validity = read_validity(&cert_dir.join(FULLCHAIN_FILE));
    let (fresh, days_until_expiry, parse_error) = match validity {
        Ok(validity) => {
            let days = validity.days_until_expiry(now);
            let fresh = is_fresh(days, threshold_days);

            if fresh {
                info!(
                    days_until_expiry = days,
                    threshold_days,
                    "Certificate is still valid"
                );
                debug!(
                    not_before = %validity.not_before.format("%Y-%m-%d"),
                    not_after = %validity.not_after.format("%Y-%m-%d"),
                    "Certificate validity window"
                );
            } else if days > 0 {
                warn!(
                    days_until_expiry = days,
                    threshold_days,
                    "Certificate expires soon"
                );
            } else {
                error!(expired_days_ago = -days, "Certificate has expired");
            }

            (fresh, Some(days), None)
        }
        Err(e) => (false, None, Some(e)),
    };

    CertificateStatus {
        exists: true,
        is_fresh: fresh,
        days_until_expiry,
        needs_refresh: !fresh,
        file_paths,
        parse_error,
    }
}
