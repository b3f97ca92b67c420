//! Fixed-interval daemon loop

use std::future::Future;

use chrono::Local;
use tokio::time::{interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info};

use super::interval::ScheduleInterval;

/// Run `job` now and then every `every`, until `shutdown` is cancelled
///
/// Firings never overlap: each one runs to completion on its own task before
/// the next tick is awaited. A job that errors or panics is logged and the
/// schedule carries on. Shutdown is observed between firings only.
///
/// Returns the number of firings.
pub async fn run_daemon<F, Fut>(job: F, every: ScheduleInterval, shutdown: CancellationToken) -> u64
where
    F: Fn() -> Fut,
    Fut: Future<Output = anyhow::Result<()>> + Send + 'static,
{
    info!(
        interval = %every,
        started_at = %Local::now().format("%Y-%m-%d %H:%M:%S"),
        "Certificate daemon starting"
    );

    let mut ticker = interval(every.as_duration());
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    let mut firings = 0u64;

    loop {
        tokio::select! {
            biased;
            _ = shutdown.cancelled() => {
                info!(firings, "Shutdown requested, stopping scheduler");
                break;
            }
            _ = ticker.tick() => {}
        }

        firings += 1;
        debug!(firing = firings, "Running scheduled job");

        match tokio::spawn(job()).await {
            Ok(Ok(())) => debug!(firing = firings, "Scheduled job finished"),
            Ok(Err(e)) => error!(firing = firings, error = %e, "Scheduled job failed"),
            Err(e) if e.is_panic() => error!(firing = firings, "Scheduled job panicked"),
            Err(e) => error!(firing = firings, error = %e, "Scheduled job was cancelled"),
        }

        info!(interval = %every, "Waiting for next scheduled run");
    }

    firings
}
