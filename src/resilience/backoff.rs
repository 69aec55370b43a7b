//! Inter-attempt delay strategies with jitter.

use std::sync::Mutex;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// How the delay before attempt `n + 1` grows with `n`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind")]
pub enum BackoffStrategy {
    /// base · multiplier^(attempt − 1)
    Exponential { multiplier: f64 },
    /// base · attempt
    Linear,
    /// base
    Fixed,
    /// base · fib(attempt)
    Fibonacci,
}

impl Default for BackoffStrategy {
    fn default() -> Self {
        BackoffStrategy::Exponential { multiplier: 2.0 }
    }
}

impl BackoffStrategy {
    /// Raw delay for the given attempt number (1-based), capped at `max`.
    pub fn delay(&self, attempt: u32, base: Duration, max: Duration) -> Duration {
        if attempt == 0 {
            return Duration::ZERO;
        }
        let base_ms = base.as_millis() as f64;
        let delay_ms = match self {
            BackoffStrategy::Exponential { multiplier } => {
                base_ms * multiplier.powi(attempt as i32 - 1)
            }
            BackoffStrategy::Linear => base_ms * attempt as f64,
            BackoffStrategy::Fixed => base_ms,
            BackoffStrategy::Fibonacci => base_ms * fibonacci(attempt) as f64,
        };
        let capped = delay_ms.min(max.as_millis() as f64).max(0.0);
        Duration::from_millis(capped as u64)
    }
}

fn fibonacci(n: u32) -> u64 {
    if n <= 1 {
        return n as u64;
    }
    let (mut a, mut b) = (0u64, 1u64);
    for _ in 2..=n {
        let next = a.saturating_add(b);
        a = b;
        b = next;
    }
    b
}

/// Seedable ±10% jitter source.
///
/// Shared behind a mutex so the retry engine stays `Sync`; contention is
/// negligible because draws happen at most once per backoff sleep.
pub struct Jitter {
    rng: Mutex<fastrand::Rng>,
}

impl Jitter {
    pub fn new() -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::new()),
        }
    }

    /// Fixed-seed jitter for reproducible tests.
    pub fn with_seed(seed: u64) -> Self {
        Self {
            rng: Mutex::new(fastrand::Rng::with_seed(seed)),
        }
    }

    /// Apply ±10% jitter to a delay.
    pub fn apply(&self, delay: Duration) -> Duration {
        let ms = delay.as_millis() as f64;
        if ms <= 0.0 {
            return delay;
        }
        let factor = {
            let mut rng = match self.rng.lock() {
                Ok(guard) => guard,
                Err(poisoned) => poisoned.into_inner(),
            };
            // Uniform in [0.9, 1.1].
            0.9 + rng.f64() * 0.2
        };
        Duration::from_millis((ms * factor) as u64)
    }
}

impl Default for Jitter {
    fn default() -> Self {
        Self::new()
    }
}
