//! Consensus result types

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

use crate::signal::NormalizedSignal;

/// Aggregate verdict across eligible engines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusSignal {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
    /// No engine was eligible
    InsufficientData,
}

impl ConsensusSignal {
    /// Classify a weighted score in `[-2, 2]`
    ///
    /// | weighted score        | signal        |
    /// |-----------------------|---------------|
    /// | `>= 1.5`              | StrongBullish |
    /// | `[0.5, 1.5)`          | Bullish       |
    /// | `(-0.5, 0.5)`         | Neutral       |
    /// | `(-1.5, -0.5]`        | Bearish       |
    /// | `<= -1.5`             | StrongBearish |
    pub fn from_score(score: f64) -> Self {
        if score >= 1.5 {
            Self::StrongBullish
        } else if score >= 0.5 {
            Self::Bullish
        } else if score <= -1.5 {
            Self::StrongBearish
        } else if score <= -0.5 {
            Self::Bearish
        } else {
            Self::Neutral
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrongBullish => "strong_bullish",
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
            Self::StrongBearish => "strong_bearish",
            Self::InsufficientData => "insufficient_data",
        }
    }
}

impl fmt::Display for ConsensusSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse trust label for a consensus
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsensusQuality {
    Low,
    Medium,
    High,
}

impl ConsensusQuality {
    /// Quality lookup table
    ///
    /// | engines analyzed | confidence   | quality |
    /// |------------------|--------------|---------|
    /// | `< 2`            | any          | low     |
    /// | `>= 2`           | `< 0.3`      | low     |
    /// | `>= 2`           | `[0.3, 0.6)` | medium  |
    /// | `>= 2`           | `>= 0.6`     | high    |
    pub fn classify(engines_analyzed: usize, confidence: f64) -> Self {
        if engines_analyzed < 2 || confidence < 0.3 {
            Self::Low
        } else if confidence < 0.6 {
            Self::Medium
        } else {
            Self::High
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for ConsensusQuality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// How one eligible engine fed into the consensus
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineContribution {
    /// The engine's own normalized direction
    pub signal: NormalizedSignal,
    /// Signed score of `signal`
    pub score: f64,
    /// Effective weight used in the weighted mean
    pub weight: f64,
    /// Share of the total weight, in [0, 1]
    pub weight_contribution: f64,
}

/// Reliability-weighted verdict over a batch
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConsensusResult {
    pub signal: ConsensusSignal,
    /// Distance from neutral, `|weighted_score| / 2`
    pub confidence: f64,
    /// Confidence scaled by the share of weight that agrees with the verdict
    pub strength: f64,
    pub quality: ConsensusQuality,
    /// Weighted mean score in `[-2, 2]`
    pub weighted_score: f64,
    /// Per-engine breakdown, keyed by engine name
    pub engine_contributions: BTreeMap<String, EngineContribution>,
    pub engines_bullish: usize,
    pub engines_bearish: usize,
    pub engines_neutral: usize,
    pub engines_analyzed: usize,
    /// Unweighted mean of the eligible engines' tier values (1 to 3)
    pub reliability_average: f64,
}

impl ConsensusResult {
    /// The defined outcome when no engine is eligible
    pub fn insufficient_data() -> Self {
        Self {
            signal: ConsensusSignal::InsufficientData,
            confidence: 0.0,
            strength: 0.0,
            quality: ConsensusQuality::Low,
            weighted_score: 0.0,
            engine_contributions: BTreeMap::new(),
            engines_bullish: 0,
            engines_bearish: 0,
            engines_neutral: 0,
            engines_analyzed: 0,
            reliability_average: 0.0,
        }
    }

    pub fn is_insufficient(&self) -> bool {
        self.signal == ConsensusSignal::InsufficientData
    }

    /// One-line human-readable summary
    pub fn summary(&self) -> String {
        if self.is_insufficient() {
            return "insufficient data: no eligible engines".to_string();
        }
        format!(
            "{} (confidence {:.0}%, strength {:.0}%, {} quality) from {} engines: {} bullish / {} neutral / {} bearish",
            self.signal,
            self.confidence * 100.0,
            self.strength * 100.0,
            self.quality,
            self.engines_analyzed,
            self.engines_bullish,
            self.engines_neutral,
            self.engines_bearish,
        )
    }
}
