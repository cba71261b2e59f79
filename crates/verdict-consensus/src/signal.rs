//! Directional signal extraction and normalization

use serde::{Deserialize, Serialize};
use std::fmt;
use verdict_core::Facts;
use verdict_core::facts::keys;

/// An engine's direction mapped onto the five-point scale
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NormalizedSignal {
    StrongBullish,
    Bullish,
    Neutral,
    Bearish,
    StrongBearish,
}

impl NormalizedSignal {
    /// Signed score in `[-2, 2]`
    pub fn score(self) -> f64 {
        match self {
            Self::StrongBullish => 2.0,
            Self::Bullish => 1.0,
            Self::Neutral => 0.0,
            Self::Bearish => -1.0,
            Self::StrongBearish => -2.0,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::StrongBullish => "strong_bullish",
            Self::Bullish => "bullish",
            Self::Neutral => "neutral",
            Self::Bearish => "bearish",
            Self::StrongBearish => "strong_bearish",
        }
    }

    /// Map a free-form direction label to a signal
    ///
    /// Labels are matched case-insensitively with spaces and hyphens treated
    /// as underscores. An intensifier prefix (`strong`, `strongly`, `very`,
    /// `extremely`) promotes a bullish or bearish term to its strong variant.
    /// The direction is decided by the whole remaining label or, failing that,
    /// its first word, so `bullish_crossover` reads as bullish. Anything
    /// unrecognized is neutral.
    pub fn from_label(label: &str) -> Self {
        let normalized: String = label
            .trim()
            .chars()
            .map(|c| match c {
                ' ' | '-' => '_',
                c => c.to_ascii_lowercase(),
            })
            .collect();

        let (strong, rest) = strip_intensifier(&normalized);
        let direction = direction_of(rest).or_else(|| {
            rest.split('_')
                .next()
                .and_then(direction_of)
        });

        match (direction, strong) {
            (Some(Direction::Up), true) => Self::StrongBullish,
            (Some(Direction::Up), false) => Self::Bullish,
            (Some(Direction::Down), true) => Self::StrongBearish,
            (Some(Direction::Down), false) => Self::Bearish,
            (None, _) => Self::Neutral,
        }
    }
}

impl fmt::Display for NormalizedSignal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Up,
    Down,
}

const INTENSIFIERS: [&str; 4] = ["strong_", "strongly_", "very_", "extremely_"];

const BULLISH_TERMS: &[&str] = &[
    "bullish",
    "bull",
    "buy",
    "long",
    "up",
    "uptrend",
    "upward",
    "upside",
    "rising",
    "positive",
    "accumulation",
    "accumulating",
    "markup",
    "outperform",
    "overweight",
];

const BEARISH_TERMS: &[&str] = &[
    "bearish",
    "bear",
    "sell",
    "short",
    "down",
    "downtrend",
    "downward",
    "downside",
    "falling",
    "negative",
    "distribution",
    "distributing",
    "markdown",
    "underperform",
    "underweight",
];

fn strip_intensifier(label: &str) -> (bool, &str) {
    INTENSIFIERS
        .iter()
        .find_map(|prefix| label.strip_prefix(prefix))
        .map_or((false, label), |rest| (true, rest))
}

fn direction_of(term: &str) -> Option<Direction> {
    if BULLISH_TERMS.contains(&term) {
        Some(Direction::Up)
    } else if BEARISH_TERMS.contains(&term) {
        Some(Direction::Down)
    } else {
        None
    }
}

/// Reads an engine's direction out of its facts
///
/// Keys are tried in priority order and the first one present wins, even if
/// its value is not a recognizable direction. Facts without any of the keys
/// read as [`NormalizedSignal::Neutral`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignalExtractor {
    keys: Vec<String>,
}

impl Default for SignalExtractor {
    fn default() -> Self {
        Self::with_keys(keys::DIRECTIONAL)
    }
}

impl SignalExtractor {
    /// Extractor with a custom key priority list
    pub fn with_keys<I, S>(keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            keys: keys.into_iter().map(Into::into).collect(),
        }
    }

    /// Key priority list, highest first
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    /// The first priority key present in `facts`, if any
    pub fn source_key<'a>(&'a self, facts: &Facts) -> Option<&'a str> {
        self.keys
            .iter()
            .find(|key| facts.contains_key(key))
            .map(String::as_str)
    }

    /// Normalized direction of `facts`
    ///
    /// A present key with a non-string value reads as neutral.
    pub fn extract(&self, facts: &Facts) -> NormalizedSignal {
        self.source_key(facts)
            .and_then(|key| facts.get_str(key))
            .map_or(NormalizedSignal::Neutral, NormalizedSignal::from_label)
    }
}
