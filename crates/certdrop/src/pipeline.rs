//! Check, renew, package and deliver, in that order
//!
//! ```text
//! Start -> Evaluating -> SkipRenewal --+
//!                     \-> Renewing ----+-> Packaging -> Delivering -> Done
//!
//! any failing step ----------------------------------------------> Failed
//! ```
//!
//! The first failing step ends the run; there is no partial success.

use std::fmt;
use std::sync::Arc;

use tracing::{error, info, warn};

use crate::archive::{ArchiveBuilder, ArchiveResult};
use crate::cert;
use crate::config::CourierConfig;
use crate::deliver::{DeliveryCoordinator, DeliveryReport, Notifier, ResendNotifier};
use crate::errors::{DeliveryError, PipelineError};
use crate::renew::{CommandExecutor, Executor, RenewalCoordinator};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Start,
    Evaluating,
    SkipRenewal,
    Renewing,
    Packaging,
    Delivering,
    Done,
    Failed,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Start => "start",
            Self::Evaluating => "evaluating",
            Self::SkipRenewal => "skip-renewal",
            Self::Renewing => "renewing",
            Self::Packaging => "packaging",
            Self::Delivering => "delivering",
            Self::Done => "done",
            Self::Failed => "failed",
        };
        f.write_str(name)
    }
}

/// Summary of a successful run
#[derive(Debug, Clone)]
pub struct PipelineReport {
    /// States visited, ending in [`PipelineStage::Done`]
    pub stages: Vec<PipelineStage>,
    pub renewed: bool,
    /// Executor invocations; zero when renewal was skipped
    pub renewal_attempts: u32,
    pub archive: ArchiveResult,
    pub delivery: DeliveryReport,
    /// The archive was deleted after delivery
    pub archive_removed: bool,
}

/// One configured pipeline; cheap to run repeatedly
pub struct Pipeline {
    config: CourierConfig,
    renewal: RenewalCoordinator,
    archiver: ArchiveBuilder,
    delivery: DeliveryCoordinator,
}

impl Pipeline {
    /// Build a pipeline around the given executor and notifier
    pub fn new(
        config: CourierConfig,
        executor: Arc<dyn Executor>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let renewal = RenewalCoordinator::new(executor, config.renewal);
        let archiver = ArchiveBuilder::new(config.certificate.output_dir.clone());
        let delivery = DeliveryCoordinator::new(notifier, config.mail.clone(), config.delivery);

        Self {
            config,
            renewal,
            archiver,
            delivery,
        }
    }

    /// Build a pipeline that runs the real renewal command and mail API
    pub fn from_config(config: CourierConfig) -> Result<Self, DeliveryError> {
        let executor = Arc::new(CommandExecutor::new(&config.certificate.renewal_command));
        let notifier = Arc::new(ResendNotifier::new(
            &config.mail.api_url,
            config.mail.api_key.clone(),
        )?);
        Ok(Self::new(config, executor, notifier))
    }

    pub fn config(&self) -> &CourierConfig {
        &self.config
    }

    /// Execute the pipeline once
    pub async fn run_once(&self) -> Result<PipelineReport, PipelineError> {
        let mut stages = vec![PipelineStage::Start];
        match self.run_stages(&mut stages).await {
            Ok(report) => Ok(report),
            Err(e) => {
                stages.push(PipelineStage::Failed);
                error!(
                    domain = %self.config.certificate.domain,
                    stage = e.stage(),
                    error = %e,
                    "Certificate pipeline failed"
                );
                Err(e)
            }
        }
    }

    async fn run_stages(
        &self,
        stages: &mut Vec<PipelineStage>,
    ) -> Result<PipelineReport, PipelineError> {
        let certificate = &self.config.certificate;
        let domain = certificate.domain.as_str();

        info!(
            domain = %domain,
            cert_dir = %certificate.cert_dir.display(),
            threshold_days = certificate.threshold_days,
            "Starting certificate pipeline"
        );

        enter(stages, PipelineStage::Evaluating, domain);
        let status = cert::evaluate(&certificate.cert_dir, certificate.threshold_days);
        if let Some(ref e) = status.parse_error {
            error!(domain = %domain, error = %e, "Failed to parse certificate, treating as stale");
        }

        let mut renewal_attempts = 0;
        if status.needs_refresh {
            warn!(
                domain = %domain,
                exists = status.exists,
                days_until_expiry = ?status.days_until_expiry,
                "Certificate needs renewal"
            );
            enter(stages, PipelineStage::Renewing, domain);
            let report = self
                .renewal
                .renew_and_wait(domain, &certificate.cert_dir)
                .await?;
            renewal_attempts = report.attempt_count();
        } else {
            info!(domain = %domain, "Certificate is fresh, skipping renewal");
            enter(stages, PipelineStage::SkipRenewal, domain);
        }

        enter(stages, PipelineStage::Packaging, domain);
        let archive = self
            .archiver
            .build_and_verify(&certificate.cert_dir, None, Some(domain))?;

        enter(stages, PipelineStage::Delivering, domain);
        let delivery = self.delivery.send_with_retry(&archive.path, domain).await?;

        let archive_removed = self.config.cleanup_archive && self.remove_archive(&archive);

        enter(stages, PipelineStage::Done, domain);
        info!(domain = %domain, "Certificate pipeline completed");

        Ok(PipelineReport {
            stages: stages.clone(),
            renewed: renewal_attempts > 0,
            renewal_attempts,
            archive,
            delivery,
            archive_removed,
        })
    }

    /// Delete the delivered archive; failure only warns
    fn remove_archive(&self, archive: &ArchiveResult) -> bool {
        match std::fs::remove_file(&archive.path) {
            Ok(()) => {
                info!(archive = %archive.path.display(), "Removed delivered archive");
                true
            }
            Err(e) => {
                warn!(
                    archive = %archive.path.display(),
                    error = %e,
                    "Failed to remove delivered archive"
                );
                false
            }
        }
    }
}

fn enter(stages: &mut Vec<PipelineStage>, stage: PipelineStage, domain: &str) {
    info!(domain = %domain, stage = %stage, "Pipeline stage");
    stages.push(stage);
}

impl fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Pipeline")
            .field("domain", &self.config.certificate.domain)
            .field("renewal", &self.renewal)
            .field("delivery", &self.delivery)
            .finish()
    }
}
