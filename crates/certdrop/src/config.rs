//! Runtime configuration
//!
//! Settings arrive from the command line or the environment as a loose
//! [`RawSettings`] and are validated into the structs each component takes at
//! construction. Nothing here is global.

use std::path::PathBuf;
use std::time::Duration;

use crate::errors::ConfigError;

/// Default freshness threshold in days
pub const DEFAULT_THRESHOLD_DAYS: i64 = 30;

/// Default renewal executable
pub const DEFAULT_RENEWAL_COMMAND: &str = "certbot";

/// Default notification API endpoint
pub const DEFAULT_API_URL: &str = "https://api.resend.com";

// ============================================================================
// Retry Policies
// ============================================================================

/// Retry and timing policy for the renewal coordinator
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenewalPolicy {
    /// Total executor invocations allowed per run
    pub max_attempts: u32,
    /// Fixed delay between failed attempts
    pub retry_delay: Duration,
    /// Deadline for a single executor invocation
    pub executor_timeout: Duration,
    /// How long to wait for output files after a successful invocation
    pub readiness_timeout: Duration,
    /// Poll period while waiting for output files
    pub readiness_poll: Duration,
}

impl Default for RenewalPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            retry_delay: Duration::from_secs(5),
            executor_timeout: Duration::from_secs(300),
            readiness_timeout: Duration::from_secs(60),
            readiness_poll: Duration::from_secs(2),
        }
    }
}

/// Retry policy for the delivery coordinator
///
/// The wait after attempt `n` is `backoff_unit * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryPolicy {
    pub max_attempts: u32,
    pub backoff_unit: Duration,
}

impl Default for DeliveryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_unit: Duration::from_secs(2),
        }
    }
}

// ============================================================================
// Validated Settings
// ============================================================================

/// Where the certificate lives and how it is renewed and packaged
#[derive(Debug, Clone)]
pub struct CertificateSettings {
    pub domain: String,
    pub cert_dir: PathBuf,
    pub threshold_days: i64,
    pub renewal_command: String,
    /// Directory for generated archives; the working directory when unset
    pub output_dir: Option<PathBuf>,
}

/// Who receives the archive and how
#[derive(Debug, Clone)]
pub struct MailSettings {
    pub api_key: String,
    pub api_url: String,
    pub from_address: String,
    /// Single address or comma separated list
    pub to_addresses: String,
    pub sender_name: Option<String>,
    pub dry_run: bool,
}

/// Complete configuration for one pipeline run
#[derive(Debug, Clone)]
pub struct CourierConfig {
    pub certificate: CertificateSettings,
    pub mail: MailSettings,
    /// Delete the archive after a successful delivery
    pub cleanup_archive: bool,
    pub renewal: RenewalPolicy,
    pub delivery: DeliveryPolicy,
}

// ============================================================================
// Raw Settings
// ============================================================================

/// Unvalidated settings as supplied by the operator
#[derive(Debug, Clone)]
pub struct RawSettings {
    pub domain: Option<String>,
    pub cert_path: Option<PathBuf>,
    pub threshold_days: i64,
    pub api_key: Option<String>,
    pub api_url: String,
    pub from_email: Option<String>,
    pub to_email: Option<String>,
    pub sender_name: Option<String>,
    pub cleanup_archive: bool,
    pub dry_run: bool,
    pub output_dir: Option<PathBuf>,
    pub renewal_command: String,
}

impl Default for RawSettings {
    fn default() -> Self {
        Self {
            domain: None,
            cert_path: None,
            threshold_days: DEFAULT_THRESHOLD_DAYS,
            api_key: None,
            api_url: DEFAULT_API_URL.to_string(),
            from_email: None,
            to_email: None,
            sender_name: None,
            cleanup_archive: false,
            dry_run: false,
            output_dir: None,
            renewal_command: DEFAULT_RENEWAL_COMMAND.to_string(),
        }
    }
}

/// Treat unset and blank values alike
fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().map(str::trim).filter(|v| !v.is_empty())
}

impl RawSettings {
    fn missing_certificate(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.domain).is_none() {
            missing.push("CERT_DOMAIN");
        }
        if self.cert_path.as_ref().map_or(true, |p| p.as_os_str().is_empty()) {
            missing.push("CERT_PATH");
        }
        missing
    }

    fn missing_mail(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if present(&self.api_key).is_none() {
            missing.push("RESEND_API_KEY");
        }
        if present(&self.from_email).is_none() {
            missing.push("FROM_EMAIL");
        }
        if present(&self.to_email).is_none() {
            missing.push("TO_EMAIL");
        }
        missing
    }

    /// Validate only what the certificate stages need
    pub fn certificate_settings(&self) -> Result<CertificateSettings, ConfigError> {
        let missing = self.missing_certificate();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        self.build_certificate()
    }

    /// Validate only what delivery needs
    pub fn mail_settings(&self) -> Result<MailSettings, ConfigError> {
        let missing = self.missing_mail();
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }
        Ok(self.build_mail())
    }

    /// Validate everything a full pipeline run needs
    ///
    /// All missing settings are reported together.
    pub fn into_config(self) -> Result<CourierConfig, ConfigError> {
        let mut missing = self.missing_certificate();
        missing.extend(self.missing_mail());
        if !missing.is_empty() {
            return Err(ConfigError::Missing(missing));
        }

        Ok(CourierConfig {
            certificate: self.build_certificate()?,
            mail: self.build_mail(),
            cleanup_archive: self.cleanup_archive,
            renewal: RenewalPolicy::default(),
            delivery: DeliveryPolicy::default(),
        })
    }

    fn build_certificate(&self) -> Result<CertificateSettings, ConfigError> {
        if self.threshold_days < 0 {
            return Err(ConfigError::Invalid {
                name: "CERT_AGE_THRESHOLD",
                reason: format!("must not be negative, got {}", self.threshold_days),
            });
        }
        let renewal_command = self.renewal_command.trim();
        if renewal_command.is_empty() {
            return Err(ConfigError::Invalid {
                name: "RENEWAL_COMMAND",
                reason: "must not be empty".to_string(),
            });
        }

        Ok(CertificateSettings {
            domain: present(&self.domain).unwrap_or_default().to_string(),
            cert_dir: self.cert_path.clone().unwrap_or_default(),
            threshold_days: self.threshold_days,
            renewal_command: renewal_command.to_string(),
            output_dir: self.output_dir.clone().filter(|p| !p.as_os_str().is_empty()),
        })
    }

    fn build_mail(&self) -> MailSettings {
        MailSettings {
            api_key: present(&self.api_key).unwrap_or_default().to_string(),
            api_url: self.api_url.trim_end_matches('/').to_string(),
            from_address: present(&self.from_email).unwrap_or_default().to_string(),
            to_addresses: present(&self.to_email).unwrap_or_default().to_string(),
            sender_name: present(&self.sender_name).map(str::to_string),
            dry_run: self.dry_run,
        }
    }
}
