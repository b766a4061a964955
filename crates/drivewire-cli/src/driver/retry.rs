//! Deadline/interval polling around a single probe.

use std::future::Future;

use drivewire_core::error::{DriverError, Result};
use drivewire_core::policy::RetryPolicy;
use drivewire_core::probe::Probe;
use tokio::time::{sleep, Instant};
use tracing::debug;

/// Run `probe` until it finds something or the policy's deadline passes.
///
/// The probe always runs at least once, even with a zero `wait_timeout`.
/// Sleeps are clamped to the time left before the deadline. Errors from the
/// probe abort polling immediately.
///
/// Returns `Ok(None)` on timeout unless `raise_on_timeout` is set, in which
/// case it fails with [`DriverError::Timeout`] naming `operation`.
pub async fn poll<T, F, Fut>(operation: &str, policy: RetryPolicy, mut probe: F) -> Result<Option<T>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>>>,
{
    let started = Instant::now();
    let deadline = started + policy.wait_timeout;
    let mut attempts: u32 = 0;

    loop {
        attempts += 1;
        if let Probe::Found(value) = probe().await? {
            debug!(
                "`{}` succeeded after {} attempt(s) in {:?}",
                operation,
                attempts,
                started.elapsed()
            );
            return Ok(Some(value));
        }

        let now = Instant::now();
        if now >= deadline {
            break;
        }
        sleep(policy.interval.min(deadline - now)).await;
    }

    debug!(
        "`{}` gave up after {} attempt(s) in {:?}",
        operation,
        attempts,
        started.elapsed()
    );
    if policy.raise_on_timeout {
        Err(DriverError::timeout(operation))
    } else {
        Ok(None)
    }
}

/// [`poll`] for operations whose "not found" value is `false`.
pub async fn poll_flag<F, Fut>(operation: &str, policy: RetryPolicy, probe: F) -> Result<bool>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<()>>>,
{
    Ok(poll(operation, policy, probe).await?.is_some())
}
