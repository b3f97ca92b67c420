//! Forced renewal with bounded retry and readiness polling

use std::path::Path;
use std::sync::Arc;

use tokio::time::{sleep, Instant};
use tracing::{debug, error, info, warn};

use super::executor::{Executor, RenewalOutcome};
use crate::cert::material_present;
use crate::config::RenewalPolicy;
use crate::errors::RenewalError;

/// One executor invocation and how it ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenewalAttempt {
    /// 1-based
    pub attempt_number: u32,
    pub outcome: RenewalOutcome,
}

/// Attempts made by a successful renewal
#[derive(Debug, Clone, Default)]
pub struct RenewalReport {
    pub attempts: Vec<RenewalAttempt>,
}

impl RenewalReport {
    pub fn attempt_count(&self) -> u32 {
        self.attempts.len() as u32
    }
}

/// Triggers renewal and blocks until the new material is on disk
pub struct RenewalCoordinator {
    executor: Arc<dyn Executor>,
    policy: RenewalPolicy,
}

impl RenewalCoordinator {
    pub fn new(executor: Arc<dyn Executor>, policy: RenewalPolicy) -> Self {
        Self { executor, policy }
    }

    /// Arguments for a forced, non-interactive renewal of `domain`
    pub fn renewal_args(domain: &str) -> Vec<String> {
        vec![
            "renew".to_string(),
            "--force-renewal".to_string(),
            "--cert-name".to_string(),
            domain.to_string(),
            "--non-interactive".to_string(),
        ]
    }

    /// Run the executor until it succeeds or attempts run out
    ///
    /// A missing executable fails immediately without retrying.
    pub async fn renew(&self, domain: &str) -> Result<RenewalReport, RenewalError> {
        let max_attempts = self.policy.max_attempts.max(1);
        let args = Self::renewal_args(domain);
        let mut report = RenewalReport::default();

        info!(domain = %domain, "Starting forced certificate renewal");

        for attempt in 1..=max_attempts {
            info!(domain = %domain, attempt, max_attempts, "Invoking renewal command");

            let outcome = self.executor.run(&args, self.policy.executor_timeout).await;
            report.attempts.push(RenewalAttempt {
                attempt_number: attempt,
                outcome: outcome.clone(),
            });

            match outcome {
                RenewalOutcome::Success => {
                    info!(domain = %domain, attempt, "Renewal command succeeded");
                    return Ok(report);
                }
                RenewalOutcome::ToolMissing(program) => {
                    error!(
                        domain = %domain,
                        program = %program,
                        "Renewal command not found, is it installed?"
                    );
                    return Err(RenewalError::ExecutorMissing(program));
                }
                other => {
                    error!(domain = %domain, attempt, outcome = %other, "Renewal attempt failed");
                    if attempt < max_attempts {
                        info!(
                            delay_secs = self.policy.retry_delay.as_secs_f64(),
                            "Waiting before retrying renewal"
                        );
                        sleep(self.policy.retry_delay).await;
                    }
                }
            }
        }

        let last = report
            .attempts
            .last()
            .map(|a| self.describe(&a.outcome))
            .unwrap_or_default();
        error!(domain = %domain, attempts = max_attempts, "Renewal failed, attempts exhausted");

        Err(RenewalError::Exhausted {
            attempts: max_attempts,
            last,
        })
    }

    fn describe(&self, outcome: &RenewalOutcome) -> String {
        match outcome {
            RenewalOutcome::ProcessFailure(code) => {
                RenewalError::ExecutorFailure(*code).to_string()
            }
            RenewalOutcome::Timeout => {
                RenewalError::ExecutorTimeout(self.policy.executor_timeout).to_string()
            }
            other => other.to_string(),
        }
    }

    /// Poll until both certificate files exist or the readiness window closes
    pub async fn wait_for_ready(&self, cert_dir: &Path) -> Result<(), RenewalError> {
        let start = Instant::now();

        loop {
            if material_present(cert_dir) {
                info!(cert_dir = %cert_dir.display(), "Certificate files are ready");
                return Ok(());
            }

            if start.elapsed() >= self.policy.readiness_timeout {
                error!(
                    cert_dir = %cert_dir.display(),
                    timeout_secs = self.policy.readiness_timeout.as_secs(),
                    "Timed out waiting for certificate files"
                );
                return Err(RenewalError::ReadinessTimeout(self.policy.readiness_timeout));
            }

            debug!(
                elapsed_secs = start.elapsed().as_secs(),
                "Waiting for certificate files"
            );
            sleep(self.policy.readiness_poll).await;
        }
    }

    /// Renew `domain` and wait for its files to appear under `cert_dir`
    pub async fn renew_and_wait(
        &self,
        domain: &str,
        cert_dir: &Path,
    ) -> Result<RenewalReport, RenewalError> {
        let report = self.renew(domain).await?;

        if let Err(e) = self.wait_for_ready(cert_dir).await {
            warn!(domain = %domain, "Renewal reported success but files never appeared");
            return Err(e);
        }

        info!(
            domain = %domain,
            attempts = report.attempt_count(),
            "Certificate renewed and verified on disk"
        );
        Ok(report)
    }
}

impl std::fmt::Debug for RenewalCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RenewalCoordinator")
            .field("policy", &self.policy)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cert::testing::write_material;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;
    use tempfile::TempDir;

    /// Replays scripted outcomes, then succeeds
    struct ScriptedExecutor {
        outcomes: Mutex<VecDeque<RenewalOutcome>>,
        calls: Mutex<Vec<Vec<String>>>,
    }

    impl ScriptedExecutor {
        fn new(outcomes: Vec<RenewalOutcome>) -> Arc<Self> {
            Arc::new(Self {
                outcomes: Mutex::new(outcomes.into()),
                calls: Mutex::new(Vec::new()),
            })
        }

        fn call_count(&self) -> usize {
            self.calls.lock().unwrap().len()
        }
    }

    #[async_trait::async_trait]
    impl Executor for ScriptedExecutor {
        async fn run(&self, args: &[String], _timeout: Duration) -> RenewalOutcome {
            self.calls.lock().unwrap().push(args.to_vec());
            self.outcomes
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or(RenewalOutcome::Success)
        }
    }

    fn fast_policy() -> RenewalPolicy {
        RenewalPolicy {
            max_attempts: 3,
            retry_delay: Duration::from_millis(1),
            executor_timeout: Duration::from_secs(1),
            readiness_timeout: Duration::from_millis(50),
            readiness_poll: Duration::from_millis(5),
        }
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let executor = ScriptedExecutor::new(vec![
            RenewalOutcome::ProcessFailure(Some(1)),
            RenewalOutcome::Timeout,
        ]);
        let coordinator = RenewalCoordinator::new(executor.clone(), fast_policy());

        let report = coordinator.renew("example.com").await.unwrap();

        assert_eq!(report.attempt_count(), 3);
        assert_eq!(executor.call_count(), 3);
        assert_eq!(report.attempts[2].outcome, RenewalOutcome::Success);
        assert_eq!(report.attempts[0].attempt_number, 1);
    }

    #[tokio::test]
    async fn test_fails_after_max_attempts() {
        let executor = ScriptedExecutor::new(vec![
            RenewalOutcome::ProcessFailure(Some(1)),
            RenewalOutcome::Error("spawn failed".to_string()),
            RenewalOutcome::ProcessFailure(Some(2)),
        ]);
        let coordinator = RenewalCoordinator::new(executor.clone(), fast_policy());

        let err = coordinator.renew("example.com").await.unwrap_err();

        assert!(matches!(err, RenewalError::Exhausted { attempts: 3, .. }));
        assert!(err.to_string().contains("exited with code 2"));
        assert_eq!(executor.call_count(), 3);
    }

    #[tokio::test]
    async fn test_missing_tool_is_not_retried() {
        let executor = ScriptedExecutor::new(vec![RenewalOutcome::ToolMissing(
            "certbot".to_string(),
        )]);
        let coordinator = RenewalCoordinator::new(executor.clone(), fast_policy());

        let err = coordinator.renew("example.com").await.unwrap_err();

        assert!(matches!(err, RenewalError::ExecutorMissing(ref p) if p == "certbot"));
        assert_eq!(executor.call_count(), 1);
    }

    #[tokio::test]
    async fn test_passes_forced_renewal_args() {
        let executor = ScriptedExecutor::new(vec![]);
        let coordinator = RenewalCoordinator::new(executor.clone(), fast_policy());

        coordinator.renew("example.com").await.unwrap();

        let calls = executor.calls.lock().unwrap();
        assert_eq!(
            calls[0],
            vec!["renew", "--force-renewal", "--cert-name", "example.com", "--non-interactive"]
        );
    }

    #[tokio::test]
    async fn test_readiness_times_out_without_files() {
        let dir = TempDir::new().unwrap();
        let coordinator = RenewalCoordinator::new(ScriptedExecutor::new(vec![]), fast_policy());

        let err = coordinator
            .renew_and_wait("example.com", dir.path())
            .await
            .unwrap_err();

        assert!(matches!(err, RenewalError::ReadinessTimeout(_)));
    }

    #[tokio::test]
    async fn test_readiness_sees_late_files() {
        let dir = TempDir::new().unwrap();
        let policy = RenewalPolicy {
            readiness_timeout: Duration::from_secs(5),
            ..fast_policy()
        };
        let coordinator = RenewalCoordinator::new(ScriptedExecutor::new(vec![]), policy);

        let target = dir.path().to_path_buf();
        let writer = tokio::spawn(async move {
            sleep(Duration::from_millis(30)).await;
            write_material(&target, 90);
        });

        coordinator.wait_for_ready(dir.path()).await.unwrap();
        writer.await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_delay_is_fixed() {
        let executor = ScriptedExecutor::new(vec![RenewalOutcome::ProcessFailure(Some(1)); 3]);
        let coordinator = RenewalCoordinator::new(executor.clone(), RenewalPolicy::default());

        let start = Instant::now();
        let err = coordinator.renew("example.com").await.unwrap_err();
        let elapsed = start.elapsed();

        // 5s after each of the first two failures, none after the last
        assert!(matches!(err, RenewalError::Exhausted { attempts: 3, .. }));
        assert!(elapsed >= Duration::from_secs(10), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(11), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_polls_every_two_seconds() {
        let dir = TempDir::new().unwrap();
        let coordinator =
            RenewalCoordinator::new(ScriptedExecutor::new(vec![]), RenewalPolicy::default());

        let target = dir.path().to_path_buf();
        let writer = tokio::spawn(async move {
            sleep(Duration::from_secs(5)).await;
            write_material(&target, 90);
        });

        // Files land at 5s; the next check is at 6s
        let start = Instant::now();
        coordinator.wait_for_ready(dir.path()).await.unwrap();
        let elapsed = start.elapsed();
        writer.await.unwrap();

        assert!(elapsed >= Duration::from_secs(6), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(7), "waited {:?}", elapsed);
    }

    #[tokio::test(start_paused = true)]
    async fn test_readiness_gives_up_after_window() {
        let dir = TempDir::new().unwrap();
        let coordinator =
            RenewalCoordinator::new(ScriptedExecutor::new(vec![]), RenewalPolicy::default());

        let start = Instant::now();
        let err = coordinator.wait_for_ready(dir.path()).await.unwrap_err();
        let elapsed = start.elapsed();

        assert!(matches!(err, RenewalError::ReadinessTimeout(d) if d == Duration::from_secs(60)));
        assert!(elapsed >= Duration::from_secs(60), "waited {:?}", elapsed);
        assert!(elapsed < Duration::from_secs(62), "waited {:?}", elapsed);
    }
}
