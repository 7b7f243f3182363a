use std::time::Duration;

/// Pipeline tuning knobs loaded from environment variables.
///
/// All fields have defaults suitable for local development; override via
/// environment variables in production.
#[derive(Debug, Clone)]
pub struct PipelineConfig {
    /// Lower bound on concurrent workers (default: `1`).
    pub min_workers: usize,
    /// Upper bound on concurrent workers and pool size at spawn (default: `4`).
    pub max_workers: usize,
    /// How long to wait for an encoder to acknowledge an abort before its
    /// task is torn down (default: `5000` ms).
    pub cancel_grace_period: Duration,
    /// How often an idle worker polls for a claimable job (default: `250` ms).
    pub claim_poll_interval: Duration,
    /// How often a busy worker checks the cancel flag (default: `500` ms).
    pub cancel_poll_interval: Duration,
    /// Autoscaler sampling interval (default: `1000` ms).
    pub autoscale_interval: Duration,
    /// Consecutive samples a watermark must hold before the bound moves
    /// (default: `3`).
    pub sustained_samples: u32,
    /// Queue depth above which the autoscaler adds a worker (default: `10`).
    pub queue_high_watermark: u64,
    /// Queue depth at or below which a worker may be removed (default: `2`).
    pub queue_low_watermark: u64,
    /// Broadcast buffer size for progress snapshots (default: `256`).
    pub progress_buffer_size: usize,
}

impl PipelineConfig {
    /// Load configuration from environment variables with defaults.
    ///
    /// | Env Var                       | Default |
    /// |-------------------------------|---------|
    /// | `MIN_WORKERS`                 | `1`     |
    /// | `MAX_WORKERS`                 | `4`     |
    /// | `CANCEL_GRACE_PERIOD_MS`      | `5000`  |
    /// | `CLAIM_POLL_INTERVAL_MS`      | `250`   |
    /// | `CANCEL_POLL_INTERVAL_MS`     | `500`   |
    /// | `AUTOSCALE_INTERVAL_MS`       | `1000`  |
    /// | `AUTOSCALE_SUSTAINED_SAMPLES` | `3`     |
    /// | `QUEUE_HIGH_WATERMARK`        | `10`    |
    /// | `QUEUE_LOW_WATERMARK`         | `2`     |
    /// | `PROGRESS_STREAM_BUFFER_SIZE` | `256`   |
    pub fn from_env() -> Self {
        let config = Self {
            min_workers: env_parse("MIN_WORKERS", 1),
            max_workers: env_parse("MAX_WORKERS", 4),
            cancel_grace_period: Duration::from_millis(env_parse(
                "CANCEL_GRACE_PERIOD_MS",
                5_000,
            )),
            claim_poll_interval: Duration::from_millis(env_parse("CLAIM_POLL_INTERVAL_MS", 250)),
            cancel_poll_interval: Duration::from_millis(env_parse("CANCEL_POLL_INTERVAL_MS", 500)),
            autoscale_interval: Duration::from_millis(env_parse("AUTOSCALE_INTERVAL_MS", 1_000)),
            sustained_samples: env_parse("AUTOSCALE_SUSTAINED_SAMPLES", 3),
            queue_high_watermark: env_parse("QUEUE_HIGH_WATERMARK", 10),
            queue_low_watermark: env_parse("QUEUE_LOW_WATERMARK", 2),
            progress_buffer_size: env_parse("PROGRESS_STREAM_BUFFER_SIZE", 256),
        };
        config.validated()
    }

    fn validated(self) -> Self {
        assert!(self.min_workers >= 1, "MIN_WORKERS must be at least 1");
        assert!(
            self.min_workers <= self.max_workers,
            "MIN_WORKERS must not exceed MAX_WORKERS"
        );
        assert!(
            self.queue_low_watermark < self.queue_high_watermark,
            "QUEUE_LOW_WATERMARK must be below QUEUE_HIGH_WATERMARK"
        );
        self
    }
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            min_workers: 1,
            max_workers: 4,
            cancel_grace_period: Duration::from_millis(5_000),
            claim_poll_interval: Duration::from_millis(250),
            cancel_poll_interval: Duration::from_millis(500),
            autoscale_interval: Duration::from_millis(1_000),
            sustained_samples: 3,
            queue_high_watermark: 10,
            queue_low_watermark: 2,
            progress_buffer_size: 256,
        }
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, default: T) -> T
where
    T::Err: std::fmt::Debug,
{
    match std::env::var(key) {
        Ok(value) => value
            .parse()
            .unwrap_or_else(|e| panic!("{key} must be a valid value: {e:?}")),
        Err(_) => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_consistent() {
        let config = PipelineConfig::default().validated();
        assert_eq!(config.min_workers, 1);
        assert_eq!(config.max_workers, 4);
        assert_eq!(config.cancel_grace_period, Duration::from_secs(5));
    }

    #[test]
    #[should_panic(expected = "MIN_WORKERS")]
    fn min_above_max_is_rejected() {
        PipelineConfig {
            min_workers: 8,
            max_workers: 4,
            ..PipelineConfig::default()
        }
        .validated();
    }
}
