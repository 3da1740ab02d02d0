//! Retry Policies - Exponential backoff for transient node failures
//!
//! A [`RetryPolicy`] only decides *how long to wait* before a node is
//! re-invoked. *Whether* a failed node is retried is decided by the
//! middleware chain (see [`RetryMiddleware`](crate::middleware::RetryMiddleware)),
//! and *how often* is capped by the runner's `max_retries`.
//!
//! ```text
//! node fails ──► middleware on_error ──► Retry?
//!                                          │
//!                      RetryPolicy::calculate_delay(retry)
//!                                          │
//!                 delay = initial × factor^retry, capped at max_interval
//!                 if jitter: delay *= random(0.5..=1.5)
//!                                          │
//!                             sleep, then invoke again
//! ```
//!
//! # Default Policy Timing
//!
//! With default settings (initial: 0.5s, factor: 2.0):
//! - Retry 0: 0.5s × 2^0 = **0.5s**
//! - Retry 1: 0.5s × 2^1 = **1.0s**
//! - Retry 2: 0.5s × 2^2 = **2.0s**
//!
//! Jitter multiplies the delay by a random factor in 0.5x..=1.5x so that many
//! runs failing on the same upstream do not all retry at the same instant.
//!
//! ```rust
//! use flowgraph_core::retry::RetryPolicy;
//!
//! let policy = RetryPolicy::default()
//!     .with_initial_interval(1.0)
//!     .with_backoff_factor(3.0)
//!     .with_max_interval(60.0)
//!     .with_jitter(false);
//!
//! assert_eq!(policy.calculate_delay(2).as_secs_f64(), 9.0);
//! ```

use rand::Rng;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Backoff configuration for retried nodes
///
/// Loaded from the `[retry]` table of the runner configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    /// Initial interval between retries in seconds
    pub initial_interval: f64,

    /// Multiplier for the interval after each retry
    pub backoff_factor: f64,

    /// Maximum interval between retries in seconds
    pub max_interval: f64,

    /// Whether to add random jitter to intervals
    pub jitter: bool,
}

impl RetryPolicy {
    /// Policy that retries immediately
    pub fn immediate() -> Self {
        Self {
            initial_interval: 0.0,
            backoff_factor: 1.0,
            max_interval: 0.0,
            jitter: false,
        }
    }

    /// Set the initial interval between retries
    pub fn with_initial_interval(mut self, seconds: f64) -> Self {
        self.initial_interval = seconds;
        self
    }

    /// Set the backoff factor
    pub fn with_backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    /// Set the maximum interval between retries
    pub fn with_max_interval(mut self, seconds: f64) -> Self {
        self.max_interval = seconds;
        self
    }

    /// Enable or disable jitter
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Calculate the delay before the given retry (0-indexed)
    ///
    /// Uses exponential backoff: initial_interval * (backoff_factor ^ retry)
    /// Capped at max_interval, with optional jitter. Delays too large for a
    /// [`Duration`] saturate at [`Duration::MAX`].
    pub fn calculate_delay(&self, retry: u32) -> Duration {
        let exponent = i32::try_from(retry).unwrap_or(i32::MAX);
        let base_delay = self.initial_interval * self.backoff_factor.powi(exponent);
        let capped_delay = base_delay.min(self.max_interval).max(0.0);

        let final_delay = if self.jitter && capped_delay > 0.0 {
            let mut rng = rand::thread_rng();
            let jitter_factor = rng.gen_range(0.5..=1.5);
            capped_delay * jitter_factor
        } else {
            capped_delay
        };

        Duration::try_from_secs_f64(final_delay).unwrap_or(Duration::MAX)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            initial_interval: 0.5,
            backoff_factor: 2.0,
            max_interval: 128.0,
            jitter: true,
        }
    }
}
