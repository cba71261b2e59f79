//! Request, result and classification types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{Error, Result};
use crate::facts::Facts;

/// The unit of work shared by every engine in a batch
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    /// Instrument symbol (e.g. "AAPL")
    pub symbol: String,
    /// Bar timeframe (e.g. "1d", "4h")
    pub timeframe: String,
    /// Point in time the analysis refers to
    pub as_of: DateTime<Utc>,
}

impl AnalysisRequest {
    pub fn new(symbol: impl Into<String>, timeframe: impl Into<String>, as_of: DateTime<Utc>) -> Self {
        Self {
            symbol: symbol.into(),
            timeframe: timeframe.into(),
            as_of,
        }
    }

    /// Request as of the current instant
    pub fn now(symbol: impl Into<String>, timeframe: impl Into<String>) -> Self {
        Self::new(symbol, timeframe, Utc::now())
    }
}

/// Data-quality metadata attached to every envelope
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityMeta {
    /// Number of data points the engine looked at
    pub sample_size: f64,
    /// Age of the newest input, in seconds
    pub freshness_sec: f64,
    /// Fraction of expected input that was present, in [0, 1]
    pub data_completeness: f64,
    /// How easily the signal can be gamed, if the engine knows
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub manipulation_sensitivity: Option<f64>,
    /// Estimated false-positive rate, in [0, 1]
    #[serde(default)]
    pub false_positive_risk: f64,
}

impl QualityMeta {
    pub fn new(sample_size: f64, freshness_sec: f64, data_completeness: f64) -> Self {
        Self {
            sample_size,
            freshness_sec,
            data_completeness,
            manipulation_sensitivity: None,
            false_positive_risk: 0.0,
        }
    }

    pub fn with_manipulation_sensitivity(mut self, value: f64) -> Self {
        self.manipulation_sensitivity = Some(value);
        self
    }

    pub fn with_false_positive_risk(mut self, value: f64) -> Self {
        self.false_positive_risk = value;
        self
    }

    /// Check every field against its documented range
    pub fn validate(&self, engine: &str) -> Result<()> {
        let invalid = |field: &'static str, value: f64| Error::InvalidQualityMeta {
            engine: engine.to_string(),
            field,
            value,
        };

        if self.sample_size.is_nan() || self.sample_size < 0.0 {
            return Err(invalid("sample_size", self.sample_size));
        }
        if self.freshness_sec.is_nan() || self.freshness_sec < 0.0 {
            return Err(invalid("freshness_sec", self.freshness_sec));
        }
        if !(0.0..=1.0).contains(&self.data_completeness) {
            return Err(invalid("data_completeness", self.data_completeness));
        }
        if !(0.0..=1.0).contains(&self.false_positive_risk) {
            return Err(invalid("false_positive_risk", self.false_positive_risk));
        }
        if let Some(value) = self.manipulation_sensitivity {
            if !(0.0..=1.0).contains(&value) {
                return Err(invalid("manipulation_sensitivity", value));
            }
        }

        Ok(())
    }
}

/// Structured result an engine returns for one request
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultEnvelope {
    /// Name of the engine that produced this result
    pub engine: String,
    /// Point in time the result refers to
    pub at: DateTime<Utc>,
    /// Timeframe the result was computed on
    pub timeframe: String,
    /// Engine-defined payload
    pub facts: Facts,
    /// Data-quality metadata
    pub quality: QualityMeta,
}

impl ResultEnvelope {
    /// Build an envelope for `request`, copying its timestamp and timeframe
    pub fn for_request(
        engine: impl Into<String>,
        request: &AnalysisRequest,
        facts: Facts,
        quality: QualityMeta,
    ) -> Self {
        Self {
            engine: engine.into(),
            at: request.as_of,
            timeframe: request.timeframe.clone(),
            facts,
            quality,
        }
    }
}

/// How an engine produces its signal
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineKind {
    /// Classical method-based analysis
    Traditional,
    /// Pattern/condition scanner wrapped as an engine
    Scanner,
}

impl EngineKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Traditional => "traditional",
            Self::Scanner => "scanner",
        }
    }
}

impl fmt::Display for EngineKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for EngineKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "traditional" => Ok(Self::Traditional),
            "scanner" => Ok(Self::Scanner),
            other => Err(Error::Config(format!("unknown engine kind: {other}"))),
        }
    }
}

/// Declared trustworthiness tier of an engine
///
/// Tiers are totally ordered `Low < Medium < High`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Reliability {
    Low,
    Medium,
    High,
}

impl Reliability {
    /// Numeric tier value, used as the aggregation weight factor
    pub fn weight(&self) -> f64 {
        match self {
            Self::Low => 1.0,
            Self::Medium => 2.0,
            Self::High => 3.0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
        }
    }
}

impl fmt::Display for Reliability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Reliability {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Self::Low),
            "medium" => Ok(Self::Medium),
            "high" => Ok(Self::High),
            other => Err(Error::Config(format!("unknown reliability level: {other}"))),
        }
    }
}

/// Static classification of a registered engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineDescriptor {
    pub name: String,
    pub kind: EngineKind,
    pub reliability: Reliability,
    pub description: String,
}
