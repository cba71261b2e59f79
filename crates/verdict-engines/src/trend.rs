//! Trend-following engine

use async_trait::async_trait;
use std::time::Duration;
use ta::Next;
use ta::indicators::{ExponentialMovingAverage, RelativeStrengthIndex, SimpleMovingAverage};
use tracing::debug;
use verdict_core::facts::keys;
use verdict_core::{
    AnalysisEngine, AnalysisRequest, EngineKind, Error, Facts, QualityMeta, Reliability, Result,
    ResultEnvelope, RunContext,
};

use crate::pace;
use crate::sample;

pub const NAME: &str = "trend_following";

const FAST_PERIOD: usize = 20;
const SLOW_PERIOD: usize = 50;
const EMA_PERIOD: usize = 12;
const RSI_PERIOD: usize = 14;

/// Moving-average trend follower
///
/// Reads the primary trend from the stacking of price, SMA(20) and SMA(50);
/// RSI(14) between 55 and 70 (or 30 and 45 in a downtrend) confirms it as a
/// strong trend.
#[derive(Debug, Clone)]
pub struct TrendFollowingEngine {
    lookback: usize,
    stage_delay: Duration,
}

impl Default for TrendFollowingEngine {
    fn default() -> Self {
        Self {
            lookback: 120,
            stage_delay: Duration::from_millis(40),
        }
    }
}

impl TrendFollowingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of bars to analyze (at least the slow SMA period)
    pub fn with_lookback(mut self, bars: usize) -> Self {
        self.lookback = bars.max(SLOW_PERIOD);
        self
    }

    /// Pause between stages
    pub fn with_stage_delay(mut self, delay: Duration) -> Self {
        self.stage_delay = delay;
        self
    }

    fn indicator_error(e: impl std::fmt::Display) -> Error {
        Error::execution(NAME, format!("indicator setup failed: {e}"))
    }
}

#[async_trait]
impl AnalysisEngine for TrendFollowingEngine {
    fn name(&self) -> &str {
        NAME
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Traditional
    }

    fn reliability(&self) -> Reliability {
        Reliability::High
    }

    fn description(&self) -> &str {
        "Trend direction from price vs SMA(20)/SMA(50), confirmed by RSI(14)"
    }

    async fn run(&self, request: &AnalysisRequest, ctx: &RunContext) -> Result<ResultEnvelope> {
        ctx.report("fetch", 0.0, format!("loading {} bars", self.lookback));
        let bars = sample::series(request, self.lookback);
        pace(ctx, self.stage_delay).await?;

        ctx.report("compute", 35.0, "moving averages and RSI");
        let mut sma_fast = SimpleMovingAverage::new(FAST_PERIOD).map_err(Self::indicator_error)?;
        let mut sma_slow = SimpleMovingAverage::new(SLOW_PERIOD).map_err(Self::indicator_error)?;
        let mut ema = ExponentialMovingAverage::new(EMA_PERIOD).map_err(Self::indicator_error)?;
        let mut rsi = RelativeStrengthIndex::new(RSI_PERIOD).map_err(Self::indicator_error)?;

        let (mut fast, mut slow, mut ema_value, mut rsi_value) = (0.0, 0.0, 0.0, 50.0);
        for bar in &bars {
            fast = sma_fast.next(bar.close);
            slow = sma_slow.next(bar.close);
            ema_value = ema.next(bar.close);
            rsi_value = rsi.next(bar.close);
        }
        let last_close = bars.last().map_or(0.0, |bar| bar.close);
        pace(ctx, self.stage_delay).await?;

        ctx.report("score", 70.0, "classifying trend");
        let trend = classify(last_close, fast, slow, rsi_value);
        let trend_strength = if slow > 0.0 { (fast - slow) / slow * 100.0 } else { 0.0 };
        debug!(symbol = %request.symbol, trend, rsi = rsi_value, "trend classified");

        let facts = Facts::new()
            .with(keys::PRIMARY_TREND, trend)
            .with("last_close", round(last_close))
            .with("sma_20", round(fast))
            .with("sma_50", round(slow))
            .with("ema_12", round(ema_value))
            .with("rsi_14", round(rsi_value))
            .with("trend_strength_pct", round(trend_strength));

        let quality = QualityMeta::new(bars.len() as f64, 0.0, 1.0).with_false_positive_risk(0.25);
        pace(ctx, self.stage_delay).await?;
        ctx.report("score", 100.0, trend);

        Ok(ResultEnvelope::for_request(NAME, request, facts, quality))
    }
}

fn classify(close: f64, fast: f64, slow: f64, rsi: f64) -> &'static str {
    if close > fast && fast > slow {
        if (55.0..=70.0).contains(&rsi) {
            "strong_bullish"
        } else {
            "bullish"
        }
    } else if close < fast && fast < slow {
        if (30.0..=45.0).contains(&rsi) {
            "strong_bearish"
        } else {
            "bearish"
        }
    } else {
        "sideways"
    }
}

fn round(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
