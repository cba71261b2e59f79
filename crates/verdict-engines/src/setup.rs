//! Default engine set and one-call helpers

use std::sync::Arc;
use verdict_consensus::ConsensusResult;
use verdict_core::{AnalysisEngine, AnalysisRequest, Reliability, Result};
use verdict_registry::EngineRegistry;
use verdict_runtime::{BatchResult, ConsensusOptions, HarnessConfig, Orchestrator};

use crate::breakout::range_breakout_scanner;
use crate::trend::TrendFollowingEngine;
use crate::volume::VolumePhaseEngine;

/// Timeframe used by [`quick_consensus`]
pub const DEFAULT_TIMEFRAME: &str = "1d";

/// The bundled engines: trend following, volume phase and range breakout
pub fn default_engines() -> Vec<Arc<dyn AnalysisEngine>> {
    vec![
        Arc::new(TrendFollowingEngine::new()),
        Arc::new(VolumePhaseEngine::new()),
        Arc::new(range_breakout_scanner()),
    ]
}

/// A registry holding [`default_engines`]
pub fn default_registry() -> Result<Arc<EngineRegistry>> {
    let registry = EngineRegistry::new();
    for engine in default_engines() {
        registry.register(engine)?;
    }
    Ok(Arc::new(registry))
}

/// An orchestrator over [`default_registry`]
pub fn default_orchestrator(config: HarnessConfig) -> Result<Orchestrator> {
    Orchestrator::builder()
        .registry(default_registry()?)
        .harness_config(config)
        .build()
}

/// Run every default engine on `symbol`, computing the consensus when `with_consensus` is set
///
/// Harness settings come from the environment (see [`HarnessConfig::from_env`]).
pub async fn quick_analysis(symbol: &str, timeframe: &str, with_consensus: bool) -> Result<BatchResult> {
    let orchestrator = default_orchestrator(HarnessConfig::from_env()?)?;
    let options = ConsensusOptions::default().enable_consensus(with_consensus);
    orchestrator
        .run_with_consensus(AnalysisRequest::now(symbol, timeframe), &options)
        .await
}

/// Consensus of the default engines on `symbol` over the daily timeframe
pub async fn quick_consensus(symbol: &str, min_reliability: Option<Reliability>) -> Result<ConsensusResult> {
    let orchestrator = default_orchestrator(HarnessConfig::from_env()?)?;
    let options = ConsensusOptions {
        min_reliability,
        ..ConsensusOptions::default()
    };
    orchestrator
        .consensus_only(AnalysisRequest::now(symbol, DEFAULT_TIMEFRAME), &options)
        .await
}
