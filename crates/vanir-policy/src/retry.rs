//! Bounded retry with an interactive "retry now" signal.
//!
//! Between failed attempts the wrapper waits for either the configured
//! delay or an external signal, whichever comes first. An operator (or
//! any supervisor) can fire the signal to retry immediately; in
//! headless environments the signal simply never fires and the timeout
//! path is always taken.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Notify;
use tokio::time::sleep;
use tracing::{error, info};

use crate::error::PolicyError;

/// Retry bounds for one wrapped operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Maximum attempts, including the first.
    pub max_tries: u32,
    /// Maximum wait between attempts.
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_tries: 3,
            delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Create a policy with explicit bounds.
    pub fn new(max_tries: u32, delay: Duration) -> Self {
        Self { max_tries, delay }
    }
}

/// Clone-able handle for requesting an immediate retry.
///
/// One trigger releases every wait blocked on the signal at that
/// moment: the same handle is shared across all concurrent preparation
/// units, and an operator firing it means "retry now" for all of them.
/// A trigger fired while no attempt is waiting is remembered and
/// consumed by the next wait, so a fast operator cannot lose the race
/// against the failure log line they reacted to.
#[derive(Debug, Clone, Default)]
pub struct RetrySignal {
    inner: Arc<SignalInner>,
}

#[derive(Debug, Default)]
struct SignalInner {
    notify: Notify,
    armed: AtomicBool,
}

impl RetrySignal {
    /// Create a fresh signal.
    pub fn new() -> Self {
        Self::default()
    }

    /// Request an immediate retry of every currently waiting operation.
    pub fn trigger(&self) {
        // Arm before notifying so a waiter racing past the broadcast
        // still observes the trigger.
        self.inner.armed.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    async fn wait(&self) {
        let notified = self.inner.notify.notified();
        tokio::pin!(notified);
        // Register for the broadcast before checking the stored
        // trigger, so no trigger can fall between the two.
        notified.as_mut().enable();
        if self.inner.armed.swap(false, Ordering::SeqCst) {
            return;
        }
        notified.await;
        self.inner.armed.store(false, Ordering::SeqCst);
    }
}

/// Invoke `op` until it succeeds or `policy.max_tries` attempts failed.
///
/// Failures are logged; between attempts the call waits for the signal
/// or the policy delay. After the final failure it returns
/// [`PolicyError::RetriesExhausted`] naming the attempt count.
///
/// Must not be stacked on an operation that already carries the
/// execution engine's automatic retry.
pub async fn retry_with_signal<T, E, Fut>(
    policy: RetryPolicy,
    signal: &RetrySignal,
    mut op: impl FnMut() -> Fut,
) -> Result<T, PolicyError>
where
    E: std::fmt::Display,
    Fut: Future<Output = Result<T, E>>,
{
    let mut last_error = String::new();

    for attempt in 1..=policy.max_tries {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) => {
                error!(attempt, max_tries = policy.max_tries, error = %e, "Attempt failed");
                last_error = e.to_string();

                if attempt < policy.max_tries {
                    info!(
                        delay_secs = policy.delay.as_secs(),
                        "Waiting for retry signal or timeout"
                    );
                    tokio::select! {
                        _ = signal.wait() => info!("Manual retry triggered"),
                        _ = sleep(policy.delay) => info!("Auto-retry after timeout"),
                    }
                }
            }
        }
    }

    Err(PolicyError::RetriesExhausted {
        attempts: policy.max_tries,
        last_error,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[tokio::test(start_paused = true)]
    async fn test_eventual_success_returns_value() {
        let policy = RetryPolicy::default();
        let signal = RetrySignal::new();
        let calls = AtomicU32::new(0);

        // Fails twice, succeeds on the third attempt.
        let value = retry_with_signal(policy, &signal, || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call <= 2 {
                    Err(format!("failure {call}"))
                } else {
                    Ok(call)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_names_attempt_count() {
        let policy = RetryPolicy::new(3, Duration::from_secs(30));
        let signal = RetrySignal::new();
        let calls = AtomicU32::new(0);

        let err = retry_with_signal(policy, &signal, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Err::<(), _>("always broken") }
        })
        .await
        .unwrap_err();

        // Never more than max_tries invocations.
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        match err {
            PolicyError::RetriesExhausted { attempts, last_error } => {
                assert_eq!(attempts, 3);
                assert_eq!(last_error, "always broken");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_signal_short_circuits_wait() {
        let policy = RetryPolicy::new(2, Duration::from_secs(3600));
        let signal = RetrySignal::new();
        let calls = AtomicU32::new(0);

        // Pre-armed trigger: the wait after the first failure consumes it
        // instead of sleeping out the full hour on the paused clock.
        signal.trigger();

        let started = tokio::time::Instant::now();
        let value = retry_with_signal(policy, &signal, || {
            let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
            async move {
                if call == 1 {
                    Err("transient".to_string())
                } else {
                    Ok(call)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 2);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }

    #[tokio::test(start_paused = true)]
    async fn test_one_trigger_releases_all_waiting_operations() {
        let policy = RetryPolicy::new(2, Duration::from_secs(3600));
        let signal = RetrySignal::new();

        // Two concurrent operations sharing one signal, each failing
        // once and then blocking in its retry wait.
        let spawn_flaky = |signal: RetrySignal| {
            tokio::spawn(async move {
                let calls = AtomicU32::new(0);
                retry_with_signal(policy, &signal, || {
                    let call = calls.fetch_add(1, Ordering::SeqCst) + 1;
                    async move {
                        if call == 1 {
                            Err("transient".to_string())
                        } else {
                            Ok(call)
                        }
                    }
                })
                .await
            })
        };
        let first = spawn_flaky(signal.clone());
        let second = spawn_flaky(signal.clone());

        // On the paused clock this only advances once both workers are
        // parked in their retry waits.
        tokio::time::sleep(Duration::from_millis(1)).await;
        let started = tokio::time::Instant::now();
        signal.trigger();

        let (first, second) = tokio::join!(first, second);
        assert_eq!(first.unwrap().unwrap(), 2);
        assert_eq!(second.unwrap().unwrap(), 2);
        assert!(started.elapsed() < Duration::from_secs(3600));
    }
}
