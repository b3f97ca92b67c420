//! Error types for every stage of the certificate pipeline.

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required settings: {}", .0.join(", "))]
    Missing(Vec<&'static str>),

    #[error("Invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

/// Failure to read the validity window out of a certificate file
#[derive(Error, Debug)]
pub enum CertificateParseError {
    #[error("Failed to read certificate {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse PEM in {path}: {reason}")]
    Pem { path: PathBuf, reason: String },

    #[error("Invalid X509 certificate in {path}: {reason}")]
    X509 { path: PathBuf, reason: String },

    #[error("Certificate timestamp out of range in {path}")]
    Timestamp { path: PathBuf },
}

/// Renewal errors
#[derive(Error, Debug)]
pub enum RenewalError {
    #[error("Renewal command not found: {0}")]
    ExecutorMissing(String),

    #[error("Renewal command exited with code {}", exit_code(.0))]
    ExecutorFailure(Option<i32>),

    #[error("Renewal command timed out after {0:?}")]
    ExecutorTimeout(Duration),

    #[error("Certificate files did not appear within {0:?}")]
    ReadinessTimeout(Duration),

    #[error("Renewal failed after {attempts} attempt(s): {last}")]
    Exhausted { attempts: u32, last: String },
}

fn exit_code(code: &Option<i32>) -> String {
    code.map_or_else(|| "none".to_string(), |c| c.to_string())
}

/// Archive errors
#[derive(Error, Debug)]
pub enum ArchiveError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Certificate directory does not exist: {0}")]
    SourceMissing(PathBuf),

    #[error("No certificate files found in {0}")]
    NoFiles(PathBuf),

    #[error("Archive failed verification: {path}: {reason}")]
    Invalid { path: PathBuf, reason: String },
}

/// Delivery errors
#[derive(Error, Debug)]
pub enum DeliveryError {
    #[error("Recipient list is empty")]
    EmptyRecipientList,

    #[error("Failed to read archive {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("API error (status {status}): {message}")]
    Api { status: u16, message: String },

    #[error("Delivery failed after {0} attempt(s)")]
    Exhausted(u32),
}

/// Schedule parsing errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("Invalid interval format: {0:?} (expected e.g. 1d, 12h, 30m, 3600s)")]
    InvalidFormat(String),

    #[error("Interval must be positive: {0:?}")]
    ZeroInterval(String),

    #[error("Interval too large: {0:?}")]
    TooLarge(String),
}

/// Pipeline stage that failed, with the underlying cause
#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Renewal stage failed: {0}")]
    Renewal(#[from] RenewalError),

    #[error("Packaging stage failed: {0}")]
    Archive(#[from] ArchiveError),

    #[error("Delivery stage failed: {0}")]
    Delivery(#[from] DeliveryError),
}

impl PipelineError {
    /// Name of the stage that failed
    pub fn stage(&self) -> &'static str {
        match self {
            Self::Renewal(_) => "renewing",
            Self::Archive(_) => "packaging",
            Self::Delivery(_) => "delivering",
        }
    }
}
