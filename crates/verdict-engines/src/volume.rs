//! Volume-phase engine
//!
//! Places the market in one of the classic volume cycle phases by comparing
//! the on-balance volume trend with the price trend over a recent window:
//!
//! | OBV trend | price change  | phase          |
//! |-----------|---------------|----------------|
//! | flat      | any           | consolidation  |
//! | rising    | `> 2%`        | markup         |
//! | rising    | `<= 2%`       | accumulation   |
//! | falling   | `< -2%`       | markdown       |
//! | falling   | `>= -2%`      | distribution   |

use async_trait::async_trait;
use std::time::Duration;
use ta::Next;
use ta::indicators::{OnBalanceVolume, SimpleMovingAverage};
use verdict_core::facts::keys;
use verdict_core::{
    AnalysisEngine, AnalysisRequest, EngineKind, Error, Facts, QualityMeta, Reliability, Result,
    ResultEnvelope, RunContext,
};

use crate::pace;
use crate::sample;

pub const NAME: &str = "volume_phase";

const VOLUME_AVERAGE_PERIOD: usize = 20;
const PRICE_MOVE_PCT: f64 = 2.0;

#[derive(Debug, Clone)]
pub struct VolumePhaseEngine {
    lookback: usize,
    window: usize,
    stage_delay: Duration,
}

impl Default for VolumePhaseEngine {
    fn default() -> Self {
        Self {
            lookback: 90,
            window: 20,
            stage_delay: Duration::from_millis(40),
        }
    }
}

impl VolumePhaseEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bars compared when deciding the phase
    pub fn with_window(mut self, bars: usize) -> Self {
        self.window = bars.max(2);
        self.lookback = self.lookback.max(self.window + 1);
        self
    }

    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }
}

#[async_trait]
impl AnalysisEngine for VolumePhaseEngine {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Traditional
    }

    fn reliability(&self) -> Reliability {
        Reliability::Medium
    }

    fn description(&self) -> &str {
        "Accumulation/markup/distribution/markdown phase from on-balance volume vs price"
    }

    async fn run(&self, request: &AnalysisRequest, ctx: &RunContext) -> Result<ResultEnvelope> {
        ctx.report("fetch", 0.0, format!("loading {} bars", self.lookback));
        let bars = sample::series(request, self.lookback);
        pace(ctx, self.stage_delay).await?;

        ctx.report("compute", 30.0, "on-balance volume");
        let mut obv = OnBalanceVolume::default();
        let mut volume_average = SimpleMovingAverage::new(VOLUME_AVERAGE_PERIOD)
            .map_err(|e| Error::execution(NAME, format!("indicator setup failed: {e}")))?;

        let mut obv_values = Vec::with_capacity(bars.len());
        let mut average = 0.0;
        for bar in &bars {
            obv_values.push(obv.next(bar));
            average = volume_average.next(bar.volume);
        }
        pace(ctx, self.stage_delay).await?;

        ctx.report("score", 65.0, "classifying phase");
        let reading = PhaseReading::from_series(&bars, &obv_values, self.window, average);
        let phase = reading.phase(average);

        let facts = Facts::new()
            .with(keys::MARKET_PHASE, phase)
            .with("obv", reading.obv.round())
            .with("obv_change", reading.obv_change.round())
            .with("price_change_pct", (reading.price_change_pct * 100.0).round() / 100.0)
            .with("volume_ratio", (reading.volume_ratio * 100.0).round() / 100.0);

        // Volume-driven reads are easy to push around on thin names
        let quality = QualityMeta::new(bars.len() as f64, 0.0, 1.0)
            .with_manipulation_sensitivity(0.4)
            .with_false_positive_risk(0.35);
        pace(ctx, self.stage_delay).await?;
        ctx.report("score", 100.0, phase);

        Ok(ResultEnvelope::for_request(NAME, request, facts, quality))
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct PhaseReading {
    obv: f64,
    obv_change: f64,
    price_change_pct: f64,
    volume_ratio: f64,
}

impl PhaseReading {
    fn from_series(bars: &[sample::Bar], obv: &[f64], window: usize, average_volume: f64) -> Self {
        let last = bars.len().saturating_sub(1);
        let start = last.saturating_sub(window);

        let close = |i: usize| bars.get(i).map_or(0.0, |bar| bar.close);
        let obv_at = |i: usize| obv.get(i).copied().unwrap_or(0.0);

        let price_change_pct = if close(start) > 0.0 {
            (close(last) / close(start) - 1.0) * 100.0
        } else {
            0.0
        };
        let volume_ratio = if average_volume > 0.0 {
            bars.get(last).map_or(0.0, |bar| bar.volume) / average_volume
        } else {
            0.0
        };

        Self {
            obv: obv_at(last),
            obv_change: obv_at(last) - obv_at(start),
            price_change_pct,
            volume_ratio,
        }
    }

    /// OBV moving less than one average bar's volume counts as flat
    fn phase(&self, average_volume: f64) -> &'static str {
        if self.obv_change.abs() < average_volume {
            "consolidation"
        } else if self.obv_change > 0.0 {
            if self.price_change_pct > PRICE_MOVE_PCT {
                "markup"
            } else {
                "accumulation"
            }
        } else if self.price_change_pct < -PRICE_MOVE_PCT {
            "markdown"
        } else {
            "distribution"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use verdict_consensus::{NormalizedSignal, SignalExtractor};

    fn reading(obv_change: f64, price_change_pct: f64) -> PhaseReading {
        PhaseReading {
            obv: 0.0,
            obv_change,
            price_change_pct,
            volume_ratio: 1.0,
        }
    }

    #[test]
    fn test_phase_table() {
        assert_eq!(reading(10.0, 5.0).phase(100.0), "consolidation");
        assert_eq!(reading(500.0, 5.0).phase(100.0), "markup");
        assert_eq!(reading(500.0, 1.0).phase(100.0), "accumulation");
        assert_eq!(reading(-500.0, -5.0).phase(100.0), "markdown");
        assert_eq!(reading(-500.0, 0.5).phase(100.0), "distribution");
    }

    #[test]
    fn test_phases_read_as_directions() {
        let extractor = SignalExtractor::default();
        for (phase, expected) in [
            ("markup", NormalizedSignal::Bullish),
            ("accumulation", NormalizedSignal::Bullish),
            ("markdown", NormalizedSignal::Bearish),
            ("distribution", NormalizedSignal::Bearish),
            ("consolidation", NormalizedSignal::Neutral),
        ] {
            let facts = Facts::new().with(keys::MARKET_PHASE, phase);
            assert_eq!(extractor.extract(&facts), expected, "phase {phase}");
        }
    }

    #[tokio::test]
    async fn test_run_produces_phase_facts() {
        let engine = VolumePhaseEngine::new().with_stage_delay(Duration::ZERO);
        let request = AnalysisRequest::new("MSFT", "1d", Utc.with_ymd_and_hms(2024, 6, 3, 0, 0, 0).unwrap());

        let envelope = engine.run(&request, &RunContext::detached(NAME)).await.unwrap();

        let phase = envelope.facts.get_str(keys::MARKET_PHASE).unwrap();
        assert!(["consolidation", "markup", "accumulation", "markdown", "distribution"].contains(&phase));
        assert!(envelope.facts.get_f64("volume_ratio").unwrap() > 0.0);
        assert_eq!(envelope.quality.manipulation_sensitivity, Some(0.4));
        assert!(envelope.quality.validate(NAME).is_ok());
    }
}
