//! Configuration for batch execution and consensus

use serde::{Deserialize, Serialize};
use std::time::Duration;
use verdict_core::{Error, Reliability, Result};

/// Environment variable overriding the batch deadline, in milliseconds (0 disables it)
pub const DEADLINE_ENV: &str = "VERDICT_DEADLINE_MS";

/// Environment variable overriding the cancellation grace period, in milliseconds
pub const GRACE_ENV: &str = "VERDICT_GRACE_MS";

/// Configuration for the execution harness
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HarnessConfig {
    /// Time budget for a whole batch, measured from launch; `None` waits forever
    pub deadline: Option<Duration>,

    /// How long engines get to honor cancellation after the deadline
    pub grace_period: Duration,
}

impl Default for HarnessConfig {
    fn default() -> Self {
        Self {
            deadline: Some(Duration::from_secs(30)),
            grace_period: Duration::from_secs(2),
        }
    }
}

impl HarnessConfig {
    /// Create a new configuration builder
    pub fn builder() -> HarnessConfigBuilder {
        HarnessConfigBuilder::default()
    }

    /// Defaults overridden by `VERDICT_DEADLINE_MS` / `VERDICT_GRACE_MS`
    pub fn from_env() -> Result<Self> {
        Self::builder().with_env()?.build()
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.deadline.is_some_and(|d| d.is_zero()) {
            return Err(Error::Config(
                "deadline must be greater than 0 (use no deadline to disable it)".to_string(),
            ));
        }
        Ok(())
    }
}

/// Builder for HarnessConfig
#[derive(Debug, Default)]
pub struct HarnessConfigBuilder {
    deadline: Option<Option<Duration>>,
    grace_period: Option<Duration>,
}

impl HarnessConfigBuilder {
    /// Set the batch deadline
    pub fn deadline(mut self, duration: Duration) -> Self {
        self.deadline = Some(Some(duration));
        self
    }

    /// Wait for every engine however long it takes
    pub fn no_deadline(mut self) -> Self {
        self.deadline = Some(None);
        self
    }

    /// Set the cancellation grace period
    pub fn grace_period(mut self, duration: Duration) -> Self {
        self.grace_period = Some(duration);
        self
    }

    /// Apply `VERDICT_DEADLINE_MS` / `VERDICT_GRACE_MS` if set
    pub fn with_env(mut self) -> Result<Self> {
        if let Some(ms) = read_millis(DEADLINE_ENV)? {
            self.deadline = Some((ms > 0).then(|| Duration::from_millis(ms)));
        }
        if let Some(ms) = read_millis(GRACE_ENV)? {
            self.grace_period = Some(Duration::from_millis(ms));
        }
        Ok(self)
    }

    /// Build the configuration
    pub fn build(self) -> Result<HarnessConfig> {
        let defaults = HarnessConfig::default();

        let config = HarnessConfig {
            deadline: self.deadline.unwrap_or(defaults.deadline),
            grace_period: self.grace_period.unwrap_or(defaults.grace_period),
        };

        config.validate()?;
        Ok(config)
    }
}

fn read_millis(var: &str) -> Result<Option<u64>> {
    match std::env::var(var) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .map(Some)
            .map_err(|e| Error::Config(format!("{var} must be a whole number of milliseconds: {e}"))),
        Err(_) => Ok(None),
    }
}

/// Options for a batch that may end in a consensus
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ConsensusOptions {
    /// Compute a consensus over the successful envelopes
    pub enable_consensus: bool,

    /// Only engines at or above this tier vote
    pub min_reliability: Option<Reliability>,

    /// Run only these engines (all registered engines when `None`)
    pub engine_names: Option<Vec<String>>,
}

impl Default for ConsensusOptions {
    fn default() -> Self {
        Self {
            enable_consensus: true,
            min_reliability: None,
            engine_names: None,
        }
    }
}

impl ConsensusOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn enable_consensus(mut self, enabled: bool) -> Self {
        self.enable_consensus = enabled;
        self
    }

    pub fn min_reliability(mut self, level: Reliability) -> Self {
        self.min_reliability = Some(level);
        self
    }

    pub fn engine_names<I, S>(mut self, names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.engine_names = Some(names.into_iter().map(Into::into).collect());
        self
    }
}
