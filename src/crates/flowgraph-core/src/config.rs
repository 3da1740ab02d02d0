//! Runner configuration
//!
//! [`RunnerConfig`] is plain serde data, so it can be built in code or read
//! from TOML. Every table and field is optional; missing values take their
//! defaults.
//!
//! ```toml
//! max_retries = 3
//! max_steps = 1000
//!
//! [checkpoint]
//! every_n_nodes = 5
//! on_error = true
//!
//! [retry]
//! initial_interval = 0.5
//! backoff_factor = 2.0
//! max_interval = 128.0
//! jitter = true
//! ```

use serde::{Deserialize, Serialize};
use std::path::Path;
use tokio::fs;
use tracing::debug;

use crate::error::{GraphError, Result};
use crate::middleware::RetryMiddleware;
use crate::retry::RetryPolicy;

/// Longest retry interval a configuration may ask for (one day)
pub const MAX_RETRY_INTERVAL_SECS: f64 = 86_400.0;

/// When the runner writes checkpoints
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CheckpointPolicy {
    /// Checkpoint after every N completed nodes, counted over the whole run
    pub every_n_nodes: Option<usize>,

    /// Checkpoint at the failed node before a failure is surfaced
    pub on_error: bool,
}

impl CheckpointPolicy {
    /// Only the checkpoints a pause requires
    pub fn none() -> Self {
        Self::default()
    }

    pub fn every_n_nodes(mut self, n: usize) -> Self {
        self.every_n_nodes = Some(n);
        self
    }

    pub fn on_error(mut self, enabled: bool) -> Self {
        self.on_error = enabled;
        self
    }

    /// Whether a cadence checkpoint is due after `steps_completed` nodes
    pub fn cadence_due(&self, steps_completed: usize) -> bool {
        match self.every_n_nodes {
            Some(n) if n > 0 => steps_completed > 0 && steps_completed % n == 0,
            _ => false,
        }
    }
}

/// Configuration of a [`GraphRunner`](crate::GraphRunner)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunnerConfig {
    /// Retries allowed per node after its first attempt
    pub max_retries: u32,

    /// Node executions allowed in one invocation
    pub max_steps: usize,

    /// Checkpoint policy used by `resume`
    pub checkpoint: CheckpointPolicy,

    /// Backoff used by retry middleware built from this config
    pub retry: RetryPolicy,
}

impl Default for RunnerConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            max_steps: 1000,
            checkpoint: CheckpointPolicy::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl RunnerConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_max_steps(mut self, max_steps: usize) -> Self {
        self.max_steps = max_steps;
        self
    }

    pub fn with_checkpoint_policy(mut self, policy: CheckpointPolicy) -> Self {
        self.checkpoint = policy;
        self
    }

    pub fn with_retry_policy(mut self, policy: RetryPolicy) -> Self {
        self.retry = policy;
        self
    }

    /// Retry middleware using this config's backoff
    pub fn retry_middleware(&self) -> RetryMiddleware {
        RetryMiddleware::new(self.retry.clone())
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: RunnerConfig = toml::from_str(content)
            .map_err(|e| GraphError::Configuration(format!("Failed to parse config: {}", e)))?;
        config.validate()?;
        Ok(config)
    }

    /// Read, parse and validate a TOML file
    pub async fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = fs::read_to_string(path).await.map_err(|e| {
            GraphError::Configuration(format!(
                "Failed to read config {}: {}",
                path.display(),
                e
            ))
        })?;

        let config = Self::from_toml_str(&content)?;
        debug!(path = %path.display(), "Loaded runner config");
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.max_steps == 0 {
            return Err(GraphError::Configuration(
                "max_steps must be at least 1".to_string(),
            ));
        }

        if self.checkpoint.every_n_nodes == Some(0) {
            return Err(GraphError::Configuration(
                "checkpoint.every_n_nodes must be at least 1".to_string(),
            ));
        }

        let retry = &self.retry;
        for (name, value) in [
            ("retry.initial_interval", retry.initial_interval),
            ("retry.max_interval", retry.max_interval),
        ] {
            if !value.is_finite() || value < 0.0 {
                return Err(GraphError::Configuration(format!(
                    "{} must be a non-negative number of seconds, got {}",
                    name, value
                )));
            }
            if value > MAX_RETRY_INTERVAL_SECS {
                return Err(GraphError::Configuration(format!(
                    "{} must be at most {} seconds, got {}",
                    name, MAX_RETRY_INTERVAL_SECS, value
                )));
            }
        }

        if !retry.backoff_factor.is_finite() || retry.backoff_factor < 1.0 {
            return Err(GraphError::Configuration(format!(
                "retry.backoff_factor must be at least 1.0, got {}",
                retry.backoff_factor
            )));
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = RunnerConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.max_steps, 1000);
        assert_eq!(config.checkpoint, CheckpointPolicy::none());
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = RunnerConfig::from_toml_str(
            r#"
            max_retries = 5

            [checkpoint]
            every_n_nodes = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.max_retries, 5);
        assert_eq!(config.max_steps, 1000);
        assert_eq!(config.checkpoint.every_n_nodes, Some(2));
        assert!(!config.checkpoint.on_error);
        assert_eq!(config.retry, RetryPolicy::default());
    }

    #[test]
    fn test_invalid_values_are_rejected() {
        assert!(matches!(
            RunnerConfig::from_toml_str("max_steps = 0"),
            Err(GraphError::Configuration(_))
        ));
        assert!(matches!(
            RunnerConfig::from_toml_str("[checkpoint]\nevery_n_nodes = 0"),
            Err(GraphError::Configuration(_))
        ));
        assert!(matches!(
            RunnerConfig::from_toml_str("[retry]\nbackoff_factor = 0.5"),
            Err(GraphError::Configuration(_))
        ));
        assert!(matches!(
            RunnerConfig::from_toml_str("max_retries = \"three\""),
            Err(GraphError::Configuration(_))
        ));
    }

    #[test]
    fn test_retry_intervals_have_an_upper_bound() {
        let huge = "[retry]\ninitial_interval = 1e20\nmax_interval = 1e20\njitter = false";
        assert!(matches!(
            RunnerConfig::from_toml_str(huge),
            Err(GraphError::Configuration(ref msg)) if msg.contains("retry.initial_interval")
        ));
        assert!(matches!(
            RunnerConfig::from_toml_str("[retry]\nmax_interval = 86400.5"),
            Err(GraphError::Configuration(_))
        ));
        assert!(RunnerConfig::from_toml_str("[retry]\nmax_interval = 86400.0").is_ok());
    }

    #[test]
    fn test_cadence_due() {
        let policy = CheckpointPolicy::none().every_n_nodes(2);
        assert!(!policy.cadence_due(0));
        assert!(!policy.cadence_due(1));
        assert!(policy.cadence_due(2));
        assert!(policy.cadence_due(4));
        assert!(!CheckpointPolicy::none().cadence_due(2));
    }

    #[tokio::test]
    async fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("runner.toml");
        tokio::fs::write(&path, "max_steps = 10\n[checkpoint]\non_error = true\n")
            .await
            .unwrap();

        let config = RunnerConfig::load(&path).await.unwrap();
        assert_eq!(config.max_steps, 10);
        assert!(config.checkpoint.on_error);

        let missing = RunnerConfig::load(dir.path().join("absent.toml")).await;
        assert!(matches!(missing, Err(GraphError::Configuration(_))));
    }
}
