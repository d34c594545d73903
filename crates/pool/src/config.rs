use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Delay schedule between retry attempts.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum BackoffPolicy {
    None,
    Fixed { delay_ms: u64 },
    Exponential { base_ms: u64, cap_ms: u64 },
}

impl Default for BackoffPolicy {
    fn default() -> Self {
        Self::Exponential {
            base_ms: 1_000,
            cap_ms: 30_000,
        }
    }
}

impl BackoffPolicy {
    /// Delay before retry number `retry` (1-based).
    pub fn delay(&self, retry: u32) -> Duration {
        match self {
            Self::None => Duration::ZERO,
            Self::Fixed { delay_ms } => Duration::from_millis(*delay_ms),
            Self::Exponential { base_ms, cap_ms } => {
                let shift = retry.saturating_sub(1).min(63);
                let factor = 1u64 << shift;
                Duration::from_millis(base_ms.saturating_mul(factor).min(*cap_ms))
            }
        }
    }
}

/// Worker pool configuration.
///
/// The abort signal is not part of the serialized config; it is attached to
/// the pool with [`WorkerPool::with_abort_signal`](crate::WorkerPool::with_abort_signal).
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct PoolConfig {
    /// Number of concurrent worker loops (clamped to at least 1).
    pub max_workers: usize,
    /// Retries after the first attempt for `Retryable` errors.
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    /// Per-task deadline in milliseconds. `None` disables the timer.
    pub per_task_timeout_ms: Option<u64>,
}

impl Default for PoolConfig {
    fn default() -> Self {
        Self {
            max_workers: 4,
            max_retries: 2,
            backoff: BackoffPolicy::default(),
            per_task_timeout_ms: None,
        }
    }
}

impl PoolConfig {
    /// Single worker, no retries. Reference configuration for determinism checks.
    pub fn sequential() -> Self {
        Self {
            max_workers: 1,
            max_retries: 0,
            backoff: BackoffPolicy::None,
            per_task_timeout_ms: None,
        }
    }

    pub fn with_workers(mut self, max_workers: usize) -> Self {
        self.max_workers = max_workers;
        self
    }

    pub fn with_retries(mut self, max_retries: u32, backoff: BackoffPolicy) -> Self {
        self.max_retries = max_retries;
        self.backoff = backoff;
        self
    }

    pub fn with_task_timeout(mut self, timeout: Duration) -> Self {
        self.per_task_timeout_ms = Some(timeout.as_millis() as u64);
        self
    }

    pub fn per_task_timeout(&self) -> Option<Duration> {
        self.per_task_timeout_ms.map(Duration::from_millis)
    }

    pub fn effective_workers(&self) -> usize {
        self.max_workers.max(1)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exponential_backoff_doubles_and_caps() {
        let policy = BackoffPolicy::Exponential {
            base_ms: 100,
            cap_ms: 350,
        };
        assert_eq!(policy.delay(1), Duration::from_millis(100));
        assert_eq!(policy.delay(2), Duration::from_millis(200));
        assert_eq!(policy.delay(3), Duration::from_millis(350));
        assert_eq!(policy.delay(200), Duration::from_millis(350));
    }

    #[test]
    fn fixed_and_none() {
        assert_eq!(BackoffPolicy::None.delay(5), Duration::ZERO);
        assert_eq!(
            BackoffPolicy::Fixed { delay_ms: 7 }.delay(3),
            Duration::from_millis(7)
        );
    }

    #[test]
    fn sequential_preset() {
        let config = PoolConfig::sequential();
        assert_eq!(config.effective_workers(), 1);
        assert_eq!(config.max_retries, 0);
    }

    #[test]
    fn zero_workers_clamped() {
        assert_eq!(PoolConfig::default().with_workers(0).effective_workers(), 1);
    }

    #[test]
    fn config_serde_uses_millis() {
        let config = PoolConfig::default().with_task_timeout(Duration::from_secs(2));
        let json = serde_json::to_value(&config).unwrap();
        assert_eq!(json["per_task_timeout_ms"], 2000);
        assert_eq!(json["backoff"]["kind"], "exponential");
        let restored: PoolConfig = serde_json::from_value(json).unwrap();
        assert_eq!(restored, config);
    }

    #[test]
    fn partial_config_fills_defaults() {
        let config: PoolConfig = serde_json::from_str(r#"{"max_workers": 8}"#).unwrap();
        assert_eq!(config.max_workers, 8);
        assert_eq!(config.max_retries, 2);
    }
}
