//! Archive delivery with linear backoff

use std::path::Path;
use std::sync::Arc;

use tokio::time::sleep;
use tracing::{error, info, warn};

use super::notifier::Notifier;
use super::payload::{format_sender, parse_recipients, NotificationPayload};
use crate::config::{DeliveryPolicy, MailSettings};
use crate::errors::DeliveryError;

/// How a single delivery attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Accepted by the provider; the id is `None` when the response lacked one
    Success(Option<String>),
    /// Previewed without sending
    DryRun,
    ApiError(String),
    TransportError(String),
}

/// One delivery attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryAttempt {
    /// 1-based
    pub attempt_number: u32,
    pub outcome: DeliveryOutcome,
}

/// Result of a successful delivery
#[derive(Debug, Clone, Default)]
pub struct DeliveryReport {
    pub attempts: Vec<DeliveryAttempt>,
    /// Provider message id; `None` in dry-run mode or when the provider
    /// accepted the message without returning one
    pub message_id: Option<String>,
    pub dry_run: bool,
}

/// Sends certificate archives through a [`Notifier`]
pub struct DeliveryCoordinator {
    notifier: Arc<dyn Notifier>,
    mail: MailSettings,
    policy: DeliveryPolicy,
}

impl DeliveryCoordinator {
    pub fn new(notifier: Arc<dyn Notifier>, mail: MailSettings, policy: DeliveryPolicy) -> Self {
        Self {
            notifier,
            mail,
            policy,
        }
    }

    /// Deliver `archive` for `domain`, retrying with a linear backoff
    ///
    /// Every attempt re-reads the archive and rebuilds the payload. An empty
    /// recipient list fails before any attempt is made.
    pub async fn send_with_retry(
        &self,
        archive: &Path,
        domain: &str,
    ) -> Result<DeliveryReport, DeliveryError> {
        let recipients = parse_recipients(&self.mail.to_addresses);
        if recipients.is_empty() {
            error!(domain = %domain, "Recipient list is empty");
            return Err(DeliveryError::EmptyRecipientList);
        }

        let max_attempts = self.policy.max_attempts.max(1);
        let mut report = DeliveryReport {
            dry_run: self.mail.dry_run,
            ..Default::default()
        };

        for attempt in 1..=max_attempts {
            info!(domain = %domain, attempt, max_attempts, "Sending certificate archive");

            match self.send_once(archive, domain, &recipients).await {
                Ok(outcome) => {
                    if let DeliveryOutcome::Success(ref id) = outcome {
                        info!(
                            domain = %domain,
                            message_id = id.as_deref().unwrap_or("N/A"),
                            "Certificate archive delivered"
                        );
                        report.message_id = id.clone();
                    }
                    report.attempts.push(DeliveryAttempt {
                        attempt_number: attempt,
                        outcome,
                    });
                    return Ok(report);
                }
                Err(e) => {
                    error!(domain = %domain, attempt, error = %e, "Delivery attempt failed");
                    report.attempts.push(DeliveryAttempt {
                        attempt_number: attempt,
                        outcome: match e {
                            DeliveryError::Api { .. } => DeliveryOutcome::ApiError(e.to_string()),
                            _ => DeliveryOutcome::TransportError(e.to_string()),
                        },
                    });

                    if attempt < max_attempts {
                        let delay = self.policy.backoff_unit * attempt;
                        info!(
                            delay_secs = delay.as_secs_f64(),
                            "Waiting before retrying delivery"
                        );
                        sleep(delay).await;
                    }
                }
            }
        }

        error!(domain = %domain, attempts = max_attempts, "Delivery failed, attempts exhausted");
        Err(DeliveryError::Exhausted(max_attempts))
    }

    /// One full send: read, build, then dispatch or preview
    ///
    /// Only ever returns [`DeliveryOutcome::Success`] or
    /// [`DeliveryOutcome::DryRun`]; failures come back as errors.
    async fn send_once(
        &self,
        archive: &Path,
        domain: &str,
        recipients: &[String],
    ) -> Result<DeliveryOutcome, DeliveryError> {
        let content = tokio::fs::read(archive)
            .await
            .map_err(|source| DeliveryError::Io {
                path: archive.to_path_buf(),
                source,
            })?;

        let file_name = archive
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default();

        let payload = NotificationPayload::certificate_notice(
            format_sender(&self.mail.from_address, self.mail.sender_name.as_deref()),
            recipients.to_vec(),
            domain,
            &file_name,
            content,
        );

        info!(
            from = %payload.from,
            to = %payload.to.join(", "),
            "Prepared certificate notification"
        );

        if self.mail.dry_run {
            warn!("Dry-run mode enabled, notification will not be sent");
            info!(
                subject = %payload.subject,
                from = %payload.from,
                to = %payload.to.join(", "),
                attachment = %file_name,
                bytes = payload.attachment_bytes(),
                "Dry-run notification preview"
            );
            return Ok(DeliveryOutcome::DryRun);
        }

        self.notifier.send(&payload).await.map(DeliveryOutcome::Success)
    }
}

impl std::fmt::Debug for DeliveryCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DeliveryCoordinator")
            .field("dry_run", &self.mail.dry_run)
            .field("policy", &self.policy)
            .finish()
    }
}
