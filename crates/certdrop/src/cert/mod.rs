//! Certificate inspection and status evaluation
//!
//! A certificate directory is considered present only when both
//! [`PRIVATE_KEY_FILE`] and [`FULLCHAIN_FILE`] exist in it. Freshness is
//! judged from the `notAfter` of the leading certificate in the full chain.
//!
//! # Directory Structure
//!
//! ```text
//! /etc/letsencrypt/live/example.com/
//! ├── privkey.pem     # Private key
//! └── fullchain.pem   # Leaf certificate followed by intermediates
//! ```

mod inspect;
mod status;

pub use inspect::{read_validity, parse_validity, ValidityWindow};
pub use status::{evaluate, evaluate_at, is_fresh, CertificateStatus};

/// Private key file name
pub const PRIVATE_KEY_FILE: &str = "privkey.pem";

/// Full chain file name
pub const FULLCHAIN_FILE: &str = "fullchain.pem";

/// Files that make up the certificate material, in archive order
pub const REQUIRED_FILES: [&str; 2] = [PRIVATE_KEY_FILE, FULLCHAIN_FILE];

/// Whether every required file exists under `cert_dir`
pub fn material_present(cert_dir: &std::path::Path) -> bool {
    REQUIRED_FILES.iter().all(|name| cert_dir.join(name).is_file())
}
