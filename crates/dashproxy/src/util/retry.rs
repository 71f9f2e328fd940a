use std::{future::Future, time::Duration};

/// Something that can wait. Production code sleeps on the tokio timer, tests record the calls.
pub trait Sleeper: Send + Sync {
    fn sleep(&self, duration: Duration) -> impl Future<Output = ()> + Send;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct TokioSleeper;

impl Sleeper for TokioSleeper {
    async fn sleep(&self, duration: Duration) {
        tokio::time::sleep(duration).await
    }
}

/// How the MPD fetch is retried after a failure.
///
/// The default waits 10 seconds between attempts and never gives up.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub interval: Duration,
    /// Total attempts including the first one. `None` retries forever.
    pub max_attempts: Option<u32>,
    /// Each delay is the previous one multiplied by this factor.
    pub backoff: f64,
    pub max_interval: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(10),
            max_attempts: None,
            backoff: 1.0,
            max_interval: Duration::from_secs(300),
        }
    }
}

impl RetryPolicy {
    pub fn fixed(interval: Duration) -> Self {
        Self {
            interval,
            ..Default::default()
        }
    }

    pub fn with_max_attempts(mut self, max_attempts: Option<u32>) -> Self {
        self.max_attempts = max_attempts;
        self
    }

    pub fn with_backoff(mut self, backoff: f64, max_interval: Duration) -> Self {
        self.backoff = backoff;
        self.max_interval = max_interval;
        self
    }

    /// Delay before the next attempt, or `None` when `attempts` failures exhausted the policy.
    pub fn delay_after(&self, attempts: u32) -> Option<Duration> {
        if let Some(max_attempts) = self.max_attempts {
            if attempts >= max_attempts {
                return None;
            }
        }

        if self.backoff <= 1.0 {
            return Some(self.interval);
        }

        let exponent = attempts.saturating_sub(1).min(64) as i32;
        let delay = self.interval.as_secs_f64() * self.backoff.powi(exponent);
        Some(Duration::from_secs_f64(delay.min(self.max_interval.as_secs_f64())))
    }
}
