//! Range-breakout scanner

use anyhow::ensure;
use serde::{Deserialize, Serialize};
use verdict_core::facts::keys;
use verdict_core::{AnalysisRequest, Facts, QualityMeta, Reliability};

use crate::sample;
use crate::scanner::ScannerEngine;

pub const NAME: &str = "range_breakout";

const RANGE_BARS: usize = 20;
const SERIES_BARS: usize = 60;

/// Fact key holding the prior range as a [`RangeLevels`]
pub const RANGE: &str = "range";

/// High and low of the bars preceding the last close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RangeLevels {
    pub high: f64,
    pub low: f64,
}

/// Scanner flagging a close outside the prior 20-bar range
pub fn range_breakout_scanner() -> ScannerEngine {
    ScannerEngine::new(NAME, Reliability::Low, scan)
        .with_description("Close breaking the prior 20-bar high/low range")
        .with_quality(QualityMeta::new(SERIES_BARS as f64, 0.0, 1.0).with_false_positive_risk(0.5))
}

fn scan(request: &AnalysisRequest) -> anyhow::Result<Facts> {
    let bars = sample::series(request, SERIES_BARS);
    ensure!(bars.len() > RANGE_BARS, "need more than {RANGE_BARS} bars, got {}", bars.len());

    let (prior, last) = bars.split_at(bars.len() - 1);
    let window = &prior[prior.len() - RANGE_BARS..];
    let range = RangeLevels {
        high: window.iter().map(|bar| bar.high).fold(f64::MIN, f64::max),
        low: window.iter().map(|bar| bar.low).fold(f64::MAX, f64::min),
    };
    let close = last[0].close;

    let mut facts = Facts::new()
        .with(keys::POSITION_BIAS, bias(close, range.high, range.low))
        .with("last_close", close);
    facts.insert_typed(RANGE, &range)?;
    Ok(facts)
}

fn bias(close: f64, range_high: f64, range_low: f64) -> &'static str {
    if close > range_high {
        "long"
    } else if close < range_low {
        "short"
    } else {
        "neutral"
    }
}
