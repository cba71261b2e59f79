//! Deterministic sample market data
//!
//! The demo engines never touch a market data provider. Each request maps to
//! a reproducible price/volume series seeded from its symbol, timeframe and
//! day, so two runs over the same request see the same bars.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use verdict_core::AnalysisRequest;

/// One OHLCV bar
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Bar {
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

impl ta::Close for Bar {
    fn close(&self) -> f64 {
        self.close
    }
}

impl ta::Volume for Bar {
    fn volume(&self) -> f64 {
        self.volume
    }
}

impl ta::High for Bar {
    fn high(&self) -> f64 {
        self.high
    }
}

impl ta::Low for Bar {
    fn low(&self) -> f64 {
        self.low
    }
}

/// Generate `len` bars for `request`
pub fn series(request: &AnalysisRequest, len: usize) -> Vec<Bar> {
    let mut rng = StdRng::seed_from_u64(seed(request));

    // Per-series drift in roughly [-0.4%, 0.4%] per bar
    let drift: f64 = rng.gen_range(-0.004..0.004);
    let mut close: f64 = rng.gen_range(20.0..300.0);
    let base_volume = rng.gen_range(200_000.0..5_000_000.0);

    (0..len)
        .map(|_| {
            let open = close;
            let change = drift + rng.gen_range(-0.015..0.015);
            close = (open * (1.0 + change)).max(0.01);
            let wick = open.max(close) * rng.gen_range(0.0..0.01);
            // Up bars draw more volume when the series trends up, and vice versa
            let conviction = if (change > 0.0) == (drift > 0.0) { 1.3 } else { 0.8 };

            Bar {
                open,
                high: open.max(close) + wick,
                low: (open.min(close) - wick).max(0.0),
                close,
                volume: base_volume * conviction * rng.gen_range(0.5..1.5),
            }
        })
        .collect()
}

fn seed(request: &AnalysisRequest) -> u64 {
    let day = request.as_of.timestamp().div_euclid(86_400);
    let key = format!("{}|{}|{day}", request.symbol.to_uppercase(), request.timeframe);

    // FNV-1a
    key.bytes().fold(0xcbf2_9ce4_8422_2325, |hash, byte| {
        (hash ^ u64::from(byte)).wrapping_mul(0x0100_0000_01b3)
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn request(symbol: &str) -> AnalysisRequest {
        let as_of = Utc.with_ymd_and_hms(2024, 3, 15, 16, 0, 0).unwrap();
        AnalysisRequest::new(symbol, "1d", as_of)
    }

    #[test]
    fn test_series_is_reproducible() {
        let a = series(&request("AAPL"), 60);
        let b = series(&request("aapl"), 60);
        assert_eq!(a, b);
        assert_ne!(a, series(&request("TSLA"), 60));
    }

    #[test]
    fn test_series_follows_request_day() {
        let today = request("AAPL");
        let tomorrow = AnalysisRequest::new("AAPL", "1d", today.as_of + chrono::Duration::days(1));
        let later_same_day = AnalysisRequest::new("AAPL", "1d", today.as_of + chrono::Duration::hours(2));

        assert_eq!(series(&today, 30), series(&later_same_day, 30));
        assert_ne!(series(&today, 30), series(&tomorrow, 30));
    }

    #[test]
    fn test_bars_are_well_formed() {
        for bar in series(&request("NVDA"), 250) {
            assert!(bar.low <= bar.open.min(bar.close));
            assert!(bar.high >= bar.open.max(bar.close));
            assert!(bar.low >= 0.0);
            assert!(bar.volume > 0.0);
        }
    }
}
