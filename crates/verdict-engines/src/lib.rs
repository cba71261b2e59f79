//! Bundled analysis engines for verdict
//!
//! - [`TrendFollowingEngine`]: moving-average trend direction (high reliability)
//! - [`VolumePhaseEngine`]: volume cycle phase from on-balance volume (medium)
//! - [`ScannerEngine`]: wraps any blocking scanner function; the bundled
//!   [`range_breakout_scanner`] is one (low)
//!
//! All bundled engines work on deterministic sample data, so they are safe to
//! run anywhere and give the same answer for the same request.
//!
//! # Example
//!
//! ```no_run
//! # async fn example() -> verdict_core::Result<()> {
//! let consensus = verdict_engines::quick_consensus("AAPL", None).await?;
//! println!("{}", consensus.summary());
//! # Ok(())
//! # }
//! ```

pub mod breakout;
pub mod sample;
pub mod scanner;
pub mod setup;
pub mod trend;
pub mod volume;

use std::time::Duration;
use verdict_core::{Result, RunContext};

pub use breakout::{RangeLevels, range_breakout_scanner};
pub use scanner::{ScanFn, ScannerEngine};
pub use setup::{default_engines, default_orchestrator, default_registry, quick_analysis, quick_consensus};
pub use trend::TrendFollowingEngine;
pub use volume::VolumePhaseEngine;

/// Wait `delay` between stages, returning early with an error on cancellation
pub(crate) async fn pace(ctx: &RunContext, delay: Duration) -> Result<()> {
    if !delay.is_zero() {
        tokio::select! {
            () = ctx.cancelled() => {}
            () = tokio::time::sleep(delay) => {}
        }
    }
    ctx.check_cancelled()
}
