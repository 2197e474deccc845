//! Host-capacity admission control.
//!
//! New preparation work is admitted only when host load is at or below
//! a threshold. `await_capacity()` polls a load source on a fixed
//! interval and blocks the caller until the host recovers; overload is
//! never surfaced as an error. Multiple blocked callers are all
//! released once capacity returns — bursty re-admission is acceptable
//! for the small worker pool this gates.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tracing::{info, warn};

/// One host-load measurement.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LoadSample {
    /// CPU utilization percentage.
    pub cpu_percent: f64,
    /// Memory utilization percentage.
    pub memory_percent: f64,
}

impl LoadSample {
    /// Whether either metric exceeds the threshold.
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.cpu_percent > threshold || self.memory_percent > threshold
    }
}

/// Source of host-load measurements. Mocked in tests.
#[async_trait]
pub trait LoadSource: Send + Sync {
    /// Take one measurement.
    async fn sample(&self) -> LoadSample;
}

/// Load source backed by `/proc/loadavg` and `/proc/meminfo`.
///
/// CPU utilization is approximated from the one-minute load average
/// normalized by core count. On hosts where `/proc` is unreadable the
/// source reports zero load — admission control degrades to a no-op
/// rather than wedging the batch.
pub struct ProcLoadSource {
    num_cpus: f64,
}

impl ProcLoadSource {
    /// Create a source using the detected core count.
    pub fn new() -> Self {
        let num_cpus = std::thread::available_parallelism()
            .map(|n| n.get() as f64)
            .unwrap_or(1.0);
        Self { num_cpus }
    }

    fn cpu_percent(&self) -> Option<f64> {
        let txt = std::fs::read_to_string("/proc/loadavg").ok()?;
        let one_min: f64 = txt.split_whitespace().next()?.parse().ok()?;
        Some((one_min / self.num_cpus * 100.0).min(100.0))
    }

    fn memory_percent(&self) -> Option<f64> {
        let txt = std::fs::read_to_string("/proc/meminfo").ok()?;
        let mut total_kib = None;
        let mut available_kib = None;
        for line in txt.lines() {
            if let Some(rest) = line.strip_prefix("MemTotal:") {
                total_kib = rest.split_whitespace().next()?.parse::<f64>().ok();
            } else if let Some(rest) = line.strip_prefix("MemAvailable:") {
                available_kib = rest.split_whitespace().next()?.parse::<f64>().ok();
            }
        }
        let total = total_kib?;
        let available = available_kib?;
        if total <= 0.0 {
            return None;
        }
        Some(((total - available) / total * 100.0).clamp(0.0, 100.0))
    }
}

impl Default for ProcLoadSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LoadSource for ProcLoadSource {
    async fn sample(&self) -> LoadSample {
        let cpu_percent = self.cpu_percent().unwrap_or_else(|| {
            warn!("Could not read /proc/loadavg, reporting zero CPU load");
            0.0
        });
        let memory_percent = self.memory_percent().unwrap_or_else(|| {
            warn!("Could not read /proc/meminfo, reporting zero memory load");
            0.0
        });
        LoadSample {
            cpu_percent,
            memory_percent,
        }
    }
}

/// Blocks admission of new work while the host is overloaded.
pub struct CapacityMonitor {
    source: Arc<dyn LoadSource>,
    threshold: f64,
    poll_interval: Duration,
}

impl CapacityMonitor {
    /// Default load threshold: 90 percent.
    pub const DEFAULT_THRESHOLD: f64 = 90.0;

    /// Default polling interval: 30 seconds.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

    /// Create a monitor over a load source.
    pub fn new(source: Arc<dyn LoadSource>, threshold: f64, poll_interval: Duration) -> Self {
        Self {
            source,
            threshold,
            poll_interval,
        }
    }

    /// Create a monitor over `/proc` with default threshold and interval.
    pub fn with_defaults() -> Self {
        Self::new(
            Arc::new(ProcLoadSource::new()),
            Self::DEFAULT_THRESHOLD,
            Self::DEFAULT_POLL_INTERVAL,
        )
    }

    /// Block until both load metrics are at or below the threshold.
    pub async fn await_capacity(&self) {
        loop {
            let sample = self.source.sample().await;
            if !sample.exceeds(self.threshold) {
                return;
            }
            info!(
                cpu = format!("{:.1}", sample.cpu_percent),
                memory = format!("{:.1}", sample.memory_percent),
                threshold = self.threshold,
                "System overloaded, waiting for capacity"
            );
            tokio::time::sleep(self.poll_interval).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Replays a fixed sequence of samples, repeating the last one.
    struct ScriptedLoad {
        samples: Vec<LoadSample>,
        cursor: AtomicUsize,
    }

    impl ScriptedLoad {
        fn new(samples: Vec<LoadSample>) -> Self {
            Self {
                samples,
                cursor: AtomicUsize::new(0),
            }
        }

        fn taken(&self) -> usize {
            self.cursor.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl LoadSource for ScriptedLoad {
        async fn sample(&self) -> LoadSample {
            let i = self.cursor.fetch_add(1, Ordering::SeqCst);
            self.samples[i.min(self.samples.len() - 1)]
        }
    }

    fn load(cpu: f64, mem: f64) -> LoadSample {
        LoadSample {
            cpu_percent: cpu,
            memory_percent: mem,
        }
    }

    #[test]
    fn test_exceeds_either_metric() {
        assert!(load(95.0, 10.0).exceeds(90.0));
        assert!(load(10.0, 95.0).exceeds(90.0));
        assert!(!load(90.0, 90.0).exceeds(90.0));
    }

    #[tokio::test(start_paused = true)]
    async fn test_blocks_while_overloaded() {
        let source = Arc::new(ScriptedLoad::new(vec![
            load(95.0, 50.0),
            load(92.0, 50.0),
            load(50.0, 50.0),
        ]));
        let monitor = CapacityMonitor::new(source.clone(), 90.0, Duration::from_secs(30));

        monitor.await_capacity().await;

        // Both overloaded samples were observed before release.
        assert_eq!(source.taken(), 3);
    }

    #[tokio::test]
    async fn test_returns_immediately_under_threshold() {
        let source = Arc::new(ScriptedLoad::new(vec![load(10.0, 10.0)]));
        let monitor = CapacityMonitor::new(source.clone(), 90.0, Duration::from_secs(30));

        monitor.await_capacity().await;
        assert_eq!(source.taken(), 1);
    }
}
