//! Engine-defined result payload
//!
//! `Facts` is an opaque key-value store. Engines put whatever they compute in
//! it; the consensus aggregator only reads the directional keys listed in
//! [`keys`] and everything else passes through untouched.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Well-known fact keys understood by the consensus aggregator
pub mod keys {
    /// Explicit directional signal (e.g. "bullish", "strong_sell")
    pub const SIGNAL: &str = "signal";
    /// Primary trend direction
    pub const PRIMARY_TREND: &str = "primary_trend";
    /// Market cycle phase (e.g. "accumulation", "markdown")
    pub const MARKET_PHASE: &str = "market_phase";
    /// Suggested position bias (e.g. "long", "short")
    pub const POSITION_BIAS: &str = "position_bias";

    /// Default lookup order used when extracting a direction
    pub const DIRECTIONAL: [&str; 4] = [SIGNAL, PRIMARY_TREND, MARKET_PHASE, POSITION_BIAS];
}

/// Key-value payload carried by a [`ResultEnvelope`](crate::ResultEnvelope)
///
/// # Example
///
/// ```
/// use verdict_core::Facts;
///
/// let facts = Facts::new()
///     .with("primary_trend", "bullish")
///     .with("trend_strength", 0.75);
///
/// assert_eq!(facts.get_str("primary_trend"), Some("bullish"));
/// assert_eq!(facts.get_f64("trend_strength"), Some(0.75));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Facts {
    data: HashMap<String, serde_json::Value>,
}

impl Facts {
    /// Create an empty payload
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.insert(key, value);
        self
    }

    /// Insert a value
    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.data.insert(key.into(), value.into());
    }

    /// Get a raw value
    pub fn get(&self, key: &str) -> Option<&serde_json::Value> {
        self.data.get(key)
    }

    /// Get a string value
    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.get(key).and_then(|v| v.as_str())
    }

    /// Get a numeric value
    pub fn get_f64(&self, key: &str) -> Option<f64> {
        self.get(key).and_then(serde_json::Value::as_f64)
    }

    /// Insert a typed value, serializing it to JSON first
    pub fn insert_typed<T: Serialize>(
        &mut self,
        key: impl Into<String>,
        value: &T,
    ) -> crate::Result<()> {
        let json_value = serde_json::to_value(value)
            .map_err(|e| crate::Error::Other(format!("Failed to serialize fact: {e}")))?;
        self.data.insert(key.into(), json_value);
        Ok(())
    }

    /// Get a typed value, deserializing it from JSON
    pub fn get_typed<T: for<'de> Deserialize<'de>>(&self, key: &str) -> crate::Result<Option<T>> {
        match self.data.get(key) {
            None => Ok(None),
            Some(value) => {
                let typed = serde_json::from_value(value.clone())
                    .map_err(|e| crate::Error::Other(format!("Failed to deserialize fact: {e}")))?;
                Ok(Some(typed))
            }
        }
    }

    /// Check if a key exists
    pub fn contains_key(&self, key: &str) -> bool {
        self.data.contains_key(key)
    }

    /// Iterate over all entries
    pub fn iter(&self) -> impl Iterator<Item = (&String, &serde_json::Value)> {
        self.data.iter()
    }

    /// Get the number of entries
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if the payload is empty
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
