//! Certdrop Library
//!
//! Keeps one domain's TLS certificate current and delivers it to whoever
//! deploys it.
//!
//! Each pipeline run:
//!
//! - **Evaluates** the certificate directory: both files present, and more
//!   than the threshold number of days left before expiry
//! - **Renews** through an external tool when the certificate is missing or
//!   stale, then waits for the new files to land
//! - **Packages** the private key and full chain into a verified archive
//! - **Delivers** the archive as an email attachment, with retries
//!
//! A [`schedule`] daemon repeats the run at a fixed interval until a shutdown
//! signal arrives.
//!
//! # Example
//!
//! ```ignore
//! use certdrop::{Pipeline, RawSettings};
//!
//! let config = RawSettings {
//!     domain: Some("example.com".into()),
//!     cert_path: Some("/etc/letsencrypt/live/example.com".into()),
//!     api_key: Some("re_...".into()),
//!     from_email: Some("certs@example.com".into()),
//!     to_email: Some("ops@example.com".into()),
//!     ..Default::default()
//! }
//! .into_config()?;
//!
//! let pipeline = Pipeline::from_config(config)?;
//! let report = pipeline.run_once().await?;
//! ```

// ============================================================================
// Module Declarations
// ============================================================================

pub mod archive;
pub mod cert;
pub mod config;
pub mod deliver;
pub mod errors;
pub mod logging;
pub mod pipeline;
pub mod renew;
pub mod schedule;
pub mod signals;

// ============================================================================
// Public API Re-exports
// ============================================================================

// Configuration
pub use config::{CourierConfig, DeliveryPolicy, RawSettings, RenewalPolicy};

// Errors
pub use errors::{
    ArchiveError, CertificateParseError, ConfigError, DeliveryError, PipelineError,
    RenewalError, ScheduleError,
};

// Pipeline stages
pub use archive::{ArchiveBuilder, ArchiveResult};
pub use cert::{evaluate, CertificateStatus, ValidityWindow};
pub use deliver::{DeliveryCoordinator, Notifier, NotificationPayload, ResendNotifier};
pub use renew::{CommandExecutor, Executor, RenewalCoordinator, RenewalOutcome};

// Orchestration
pub use pipeline::{Pipeline, PipelineReport, PipelineStage};
pub use schedule::{parse_interval, run_daemon, ScheduleInterval};
