//! Per-engine outcomes and the batch result

use serde::{Deserialize, Serialize};
use std::fmt;
use verdict_consensus::ConsensusResult;
use verdict_core::{Error, ResultEnvelope};

/// Why an engine produced no usable envelope
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// The engine returned an error
    Execution,
    /// The engine was still running when the deadline and grace period ran out
    Timeout,
    /// The envelope's quality metadata was out of range
    InvalidQuality,
    /// The engine's task panicked
    Panicked,
}

impl FailureKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Execution => "execution",
            Self::Timeout => "timeout",
            Self::InvalidQuality => "invalid_quality",
            Self::Panicked => "panicked",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A failed engine run, recorded as data
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineFailure {
    pub engine: String,
    pub kind: FailureKind,
    pub detail: String,
}

impl EngineFailure {
    pub fn new(engine: impl Into<String>, kind: FailureKind, detail: impl Into<String>) -> Self {
        Self {
            engine: engine.into(),
            kind,
            detail: detail.into(),
        }
    }

    /// Classify an engine error, attributing it to `engine`
    pub fn from_error(engine: impl Into<String>, error: &Error) -> Self {
        let kind = match error {
            Error::Timeout { .. } => FailureKind::Timeout,
            Error::InvalidQualityMeta { .. } => FailureKind::InvalidQuality,
            _ => FailureKind::Execution,
        };
        Self::new(engine, kind, error.to_string())
    }
}

impl fmt::Display for EngineFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.engine, self.kind, self.detail)
    }
}

/// Terminal state of one engine in a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", content = "value", rename_all = "snake_case")]
pub enum EngineOutcome {
    Success(ResultEnvelope),
    Failure(EngineFailure),
}

impl EngineOutcome {
    /// Name of the engine this outcome belongs to
    pub fn engine(&self) -> &str {
        match self {
            Self::Success(envelope) => &envelope.engine,
            Self::Failure(failure) => &failure.engine,
        }
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success(_))
    }
}

/// Everything a batch produced
///
/// `successful_engines + failures.len() == total_engines` always holds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    /// Successful envelopes, in completion order
    pub engine_results: Vec<ResultEnvelope>,
    /// Failed engines, in completion order
    pub failures: Vec<EngineFailure>,
    pub total_engines: usize,
    pub successful_engines: usize,
    /// Wall-clock time from launch to fan-in completion
    pub execution_time_ms: f64,
    /// Present when consensus was requested
    pub consensus: Option<ConsensusResult>,
}

impl BatchResult {
    /// Result of a batch with no selected engines
    pub fn empty() -> Self {
        Self {
            engine_results: Vec::new(),
            failures: Vec::new(),
            total_engines: 0,
            successful_engines: 0,
            execution_time_ms: 0.0,
            consensus: None,
        }
    }

    /// Split outcomes into successes and failures
    pub fn from_outcomes(outcomes: Vec<EngineOutcome>, execution_time_ms: f64) -> Self {
        let total_engines = outcomes.len();
        let mut engine_results = Vec::new();
        let mut failures = Vec::new();

        for outcome in outcomes {
            match outcome {
                EngineOutcome::Success(envelope) => engine_results.push(envelope),
                EngineOutcome::Failure(failure) => failures.push(failure),
            }
        }

        Self {
            successful_engines: engine_results.len(),
            engine_results,
            failures,
            total_engines,
            execution_time_ms,
            consensus: None,
        }
    }

    pub fn with_consensus(mut self, consensus: ConsensusResult) -> Self {
        self.consensus = Some(consensus);
        self
    }

    /// Share of engines that succeeded, 0 for an empty batch
    pub fn success_rate(&self) -> f64 {
        if self.total_engines == 0 {
            0.0
        } else {
            self.successful_engines as f64 / self.total_engines as f64
        }
    }

    pub fn all_succeeded(&self) -> bool {
        self.failures.is_empty()
    }

    /// Envelope produced by `engine`, if it succeeded
    pub fn envelope(&self, engine: &str) -> Option<&ResultEnvelope> {
        self.engine_results.iter().find(|e| e.engine == engine)
    }

    /// Failure recorded for `engine`, if it failed
    pub fn failure(&self, engine: &str) -> Option<&EngineFailure> {
        self.failures.iter().find(|f| f.engine == engine)
    }
}
