//! Retry strategies for webhook delivery.

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Decides whether and when a failed delivery is attempted again.
pub trait RetryStrategy: Send + Sync {
    /// Delay before the next attempt after `failures` failed attempts,
    /// or `None` when no attempt is left.
    fn next_delay(&self, failures: u32) -> Option<Duration>;

    /// Maximum number of attempts, the first one included.
    fn max_attempts(&self) -> u32;
}

/// Shape of the delay curve between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BackoffKind {
    /// `base * multiplier^(n-1)`
    #[default]
    Exponential,
    /// `base * n`
    Linear,
    /// `base`
    Fixed,
    /// Single attempt.
    None,
}

/// Configurable retry policy.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub kind: BackoffKind,
    /// Attempts including the first.
    pub tries: u32,
    pub base: Duration,
    /// Growth factor for exponential backoff.
    pub multiplier: f64,
    pub max_delay: Duration,
    /// Random extra delay as a fraction of the computed delay (0.0 to 1.0).
    pub jitter: f64,
}

impl RetryPolicy {
    /// Exponential backoff: 10s, 100s, 1000s, ... capped at `max_delay`.
    pub fn exponential(tries: u32) -> Self {
        Self {
            kind: BackoffKind::Exponential,
            tries,
            base: Duration::from_secs(10),
            multiplier: 10.0,
            max_delay: Duration::from_secs(100_000),
            jitter: 0.0,
        }
    }

    /// Linearly growing delay.
    pub fn linear(tries: u32, base: Duration) -> Self {
        Self {
            kind: BackoffKind::Linear,
            base,
            ..Self::exponential(tries)
        }
    }

    /// Same delay between all attempts.
    pub fn fixed(tries: u32, delay: Duration) -> Self {
        Self {
            kind: BackoffKind::Fixed,
            base: delay,
            ..Self::exponential(tries)
        }
    }

    /// Exactly one attempt.
    pub fn no_retry() -> Self {
        Self {
            kind: BackoffKind::None,
            ..Self::exponential(1)
        }
    }

    pub fn base(mut self, base: Duration) -> Self {
        self.base = base;
        self
    }

    pub fn multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier.max(1.0);
        self
    }

    pub fn max_delay(mut self, max: Duration) -> Self {
        self.max_delay = max;
        self
    }

    pub fn jitter(mut self, jitter: f64) -> Self {
        self.jitter = jitter.clamp(0.0, 1.0);
        self
    }

    fn raw_delay(&self, failures: u32) -> Duration {
        let n = failures.max(1);
        match self.kind {
            BackoffKind::Exponential => {
                let factor = self.multiplier.powi(n as i32 - 1);
                let secs = self.base.as_secs_f64() * factor;
                if secs.is_finite() && secs < self.max_delay.as_secs_f64() {
                    Duration::from_secs_f64(secs)
                } else {
                    self.max_delay
                }
            }
            BackoffKind::Linear => self.base.saturating_mul(n),
            BackoffKind::Fixed | BackoffKind::None => self.base,
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::exponential(3)
    }
}

impl RetryStrategy for RetryPolicy {
    fn next_delay(&self, failures: u32) -> Option<Duration> {
        if self.kind == BackoffKind::None || failures >= self.max_attempts() {
            return None;
        }

        let delay = self.raw_delay(failures).min(self.max_delay);
        if self.jitter > 0.0 {
            let extra = delay.as_secs_f64() * self.jitter * rand::thread_rng().r#gen::<f64>();
            Some(delay + Duration::from_secs_f64(extra))
        } else {
            Some(delay)
        }
    }

    fn max_attempts(&self) -> u32 {
        match self.kind {
            BackoffKind::None => 1,
            _ => self.tries.max(1),
        }
    }
}
