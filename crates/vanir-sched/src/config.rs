//! Batch run configuration.
//!
//! One immutable struct constructed at startup and passed explicitly to
//! every component — no process-wide mutable state. Environment
//! variables override defaults via [`BatchConfig::from_env`]; invalid
//! values are logged and ignored rather than aborting the run.

use std::path::PathBuf;
use std::time::Duration;

use tracing::warn;
use vanir_policy::RetryPolicy;

/// Configuration for one batch run.
#[derive(Debug, Clone)]
pub struct BatchConfig {
    /// Host-load percentage above which new preparation work is held.
    pub load_threshold: f64,
    /// Capacity-poll interval while the host is overloaded.
    pub capacity_poll_interval: Duration,
    /// Worker-pool bound for Phase-1 preparation units.
    pub max_concurrent_preparations: usize,
    /// Weight of backend queue depth against raw runtime cost in
    /// selection scores. Empirically calibrated, not derived.
    pub load_factor: f64,
    /// Automatic submission retry used by the execution engine.
    pub submit_retries: u32,
    /// Delay between automatic submission retries.
    pub submit_retry_delay: Duration,
    /// Interactive retry bounds for preparation builds.
    pub interactive_retry: RetryPolicy,
    /// Memoization entry time-to-live.
    pub memo_ttl: Duration,
    /// SQD convergence tolerance on energy.
    pub energy_tol: f64,
    /// SQD iteration cap; reaching it is a non-convergence outcome.
    pub max_iterations: u32,
    /// Samples per SQD subsampling batch.
    pub samples_per_batch: u32,
    /// Shots per program submission.
    pub shots: u32,
    /// Ansatz repetitions for program construction.
    pub reps: u32,
    /// Circuit optimization level for program construction.
    pub opt_level: u8,
    /// Basis set used by the basis-set fallback.
    pub fallback_basis: String,
    /// Directory for the memoization store.
    pub cache_dir: PathBuf,
    /// Directory for checkpoint state.
    pub checkpoint_dir: PathBuf,
    /// Directory result files are written to.
    pub result_dir: PathBuf,
    /// Whether to clear the memoization store before the run. The
    /// checkpoint store is never cleared implicitly — resumability
    /// depends on it.
    pub clear_cache_on_start: bool,
}

impl Default for BatchConfig {
    fn default() -> Self {
        Self {
            load_threshold: 90.0,
            capacity_poll_interval: Duration::from_secs(30),
            max_concurrent_preparations: 3,
            load_factor: 20_000.0,
            submit_retries: 3,
            submit_retry_delay: Duration::from_secs(30),
            interactive_retry: RetryPolicy::default(),
            memo_ttl: Duration::from_secs(24 * 60 * 60),
            energy_tol: 1e-3,
            max_iterations: 5,
            samples_per_batch: 300,
            shots: 1024,
            reps: 1,
            opt_level: 3,
            fallback_basis: "sto-3g".to_string(),
            cache_dir: PathBuf::from(".vanir_cache"),
            checkpoint_dir: PathBuf::from(".vanir_checkpoints"),
            result_dir: PathBuf::from("results"),
            clear_cache_on_start: false,
        }
    }
}

fn env_override<T: std::str::FromStr>(var: &str, target: &mut T) {
    if let Ok(raw) = std::env::var(var) {
        match raw.parse() {
            Ok(value) => *target = value,
            Err(_) => warn!(var, raw, "Ignoring unparseable environment override"),
        }
    }
}

impl BatchConfig {
    /// Defaults with `VANIR_*` environment overrides applied.
    pub fn from_env() -> Self {
        let mut config = Self::default();

        env_override("VANIR_LOAD_THRESHOLD", &mut config.load_threshold);
        env_override(
            "VANIR_MAX_CONCURRENT_PREPARATIONS",
            &mut config.max_concurrent_preparations,
        );
        env_override("VANIR_LOAD_FACTOR", &mut config.load_factor);
        env_override("VANIR_RETRIES", &mut config.submit_retries);
        env_override("VANIR_ENERGY_TOL", &mut config.energy_tol);
        env_override("VANIR_MAX_ITERATIONS", &mut config.max_iterations);
        env_override("VANIR_SAMPLES_PER_BATCH", &mut config.samples_per_batch);

        let mut retry_delay_secs = config.submit_retry_delay.as_secs();
        env_override("VANIR_RETRY_DELAY_SECS", &mut retry_delay_secs);
        config.submit_retry_delay = Duration::from_secs(retry_delay_secs);
        config.interactive_retry =
            RetryPolicy::new(config.submit_retries, config.submit_retry_delay);

        let mut memo_ttl_hours = config.memo_ttl.as_secs() / 3600;
        env_override("VANIR_MEMO_TTL_HOURS", &mut memo_ttl_hours);
        config.memo_ttl = Duration::from_secs(memo_ttl_hours * 3600);

        config
    }

    /// Digest of the solver-relevant settings, folded into checkpoint
    /// keys so a resumed run with different knobs never reads a stale
    /// checkpoint as its own.
    pub fn run_digest(&self) -> String {
        use std::hash::{Hash, Hasher};
        let mut hasher = std::hash::DefaultHasher::new();
        format!(
            "{:e}|{}|{}|{}|{}|{}",
            self.energy_tol,
            self.max_iterations,
            self.samples_per_batch,
            self.shots,
            self.reps,
            self.fallback_basis,
        )
        .hash(&mut hasher);
        format!("{:08x}", hasher.finish() as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_contract() {
        let config = BatchConfig::default();
        assert_eq!(config.load_threshold, 90.0);
        assert_eq!(config.max_concurrent_preparations, 3);
        assert_eq!(config.load_factor, 20_000.0);
        assert_eq!(config.submit_retries, 3);
        assert_eq!(config.submit_retry_delay, Duration::from_secs(30));
        assert_eq!(config.memo_ttl, Duration::from_secs(86_400));
        assert_eq!(config.energy_tol, 1e-3);
        assert_eq!(config.max_iterations, 5);
        assert_eq!(config.samples_per_batch, 300);
        assert_eq!(config.fallback_basis, "sto-3g");
    }

    #[test]
    fn test_run_digest_sensitive_to_solver_knobs() {
        let base = BatchConfig::default();
        let mut changed = BatchConfig::default();
        changed.max_iterations = 9;

        assert_eq!(base.run_digest(), BatchConfig::default().run_digest());
        assert_ne!(base.run_digest(), changed.run_digest());
    }
}
