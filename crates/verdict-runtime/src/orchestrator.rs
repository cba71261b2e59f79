//! Orchestrator facade: registry → harness → aggregator

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;
use verdict_consensus::{ConsensusAggregator, ConsensusResult, RatedEnvelope, SignalExtractor};
use verdict_core::{
    AnalysisEngine, AnalysisRequest, EngineDescriptor, Error, ProgressSink, Reliability, Result,
    ResultEnvelope,
};
use verdict_registry::{DescriptorFilter, EngineRegistry};

use crate::batch::{BatchResult, EngineOutcome, FailureKind};
use crate::config::{ConsensusOptions, HarnessConfig};
use crate::harness::ExecutionHarness;

/// Single entry point for running engines and computing consensus
///
/// Owns its registry; every batch works on the engine set as it was when the
/// batch started.
#[derive(Debug)]
pub struct Orchestrator {
    registry: Arc<EngineRegistry>,
    harness: ExecutionHarness,
    aggregator: ConsensusAggregator,
}

impl Default for Orchestrator {
    fn default() -> Self {
        Self::new(Arc::new(EngineRegistry::new()))
    }
}

impl Orchestrator {
    /// Orchestrator over `registry` with default harness settings
    pub fn new(registry: Arc<EngineRegistry>) -> Self {
        Self {
            registry,
            harness: ExecutionHarness::default(),
            aggregator: ConsensusAggregator::new(),
        }
    }

    pub fn builder() -> OrchestratorBuilder {
        OrchestratorBuilder::default()
    }

    pub fn registry(&self) -> &Arc<EngineRegistry> {
        &self.registry
    }

    pub fn harness_config(&self) -> &HarnessConfig {
        self.harness.config()
    }

    /// Register an engine
    pub fn register(&self, engine: Arc<dyn AnalysisEngine>) -> Result<()> {
        self.registry.register(engine)
    }

    /// Remove an engine; returns whether one was removed
    pub fn unregister(&self, name: &str) -> bool {
        self.registry.unregister(name).is_some()
    }

    /// Descriptors of registered engines matching `filter`
    pub fn list_descriptors(&self, filter: DescriptorFilter) -> Vec<EngineDescriptor> {
        self.registry.list(filter)
    }

    /// Run every registered engine
    pub async fn run_all(&self, request: AnalysisRequest) -> BatchResult {
        self.run_all_with_progress(request, None).await
    }

    pub async fn run_all_with_progress(&self, request: AnalysisRequest, sink: Option<ProgressSink>) -> BatchResult {
        self.execute(request, self.registry.snapshot(), sink, None).await
    }

    /// Run the named engines
    ///
    /// Fails with [`Error::EngineNotFound`] before anything runs if a name is
    /// unknown.
    pub async fn run_named<S: AsRef<str>>(&self, names: &[S], request: AnalysisRequest) -> Result<BatchResult> {
        self.run_named_with_progress(names, request, None).await
    }

    pub async fn run_named_with_progress<S: AsRef<str>>(
        &self,
        names: &[S],
        request: AnalysisRequest,
        sink: Option<ProgressSink>,
    ) -> Result<BatchResult> {
        let engines = self.registry.resolve(names)?;
        Ok(self.execute(request, engines, sink, None).await)
    }

    /// Run a batch and, if enabled, compute its consensus
    pub async fn run_with_consensus(&self, request: AnalysisRequest, options: &ConsensusOptions) -> Result<BatchResult> {
        self.run_with_progress(request, options, None).await
    }

    pub async fn run_with_progress(
        &self,
        request: AnalysisRequest,
        options: &ConsensusOptions,
        sink: Option<ProgressSink>,
    ) -> Result<BatchResult> {
        let engines = self.select(options)?;
        let consensus = options.enable_consensus.then_some(options.min_reliability);
        Ok(self.execute(request, engines, sink, consensus).await)
    }

    /// Run a batch and return only its consensus
    ///
    /// Consensus is computed even if `options` disables it.
    pub async fn consensus_only(&self, request: AnalysisRequest, options: &ConsensusOptions) -> Result<ConsensusResult> {
        self.consensus_only_with_progress(request, options, None).await
    }

    pub async fn consensus_only_with_progress(
        &self,
        request: AnalysisRequest,
        options: &ConsensusOptions,
        sink: Option<ProgressSink>,
    ) -> Result<ConsensusResult> {
        let engines = self.select(options)?;
        let batch = self
            .execute(request, engines, sink, Some(options.min_reliability))
            .await;
        Ok(batch.consensus.unwrap_or_else(ConsensusResult::insufficient_data))
    }

    /// Run a single engine under the harness and return its envelope
    pub async fn run_one(
        &self,
        name: &str,
        request: AnalysisRequest,
        sink: Option<ProgressSink>,
    ) -> Result<ResultEnvelope> {
        let engine = self
            .registry
            .get(name)
            .ok_or_else(|| Error::EngineNotFound(name.to_string()))?;

        let report = self
            .harness
            .execute(Arc::new(request), vec![engine], sink)
            .await;

        match report.outcomes.into_iter().next() {
            Some(EngineOutcome::Success(envelope)) => Ok(envelope),
            Some(EngineOutcome::Failure(failure)) => Err(match failure.kind {
                FailureKind::Timeout => Error::Timeout {
                    engine: failure.engine,
                    after_ms: u64::try_from(report.elapsed.as_millis()).unwrap_or(u64::MAX),
                },
                _ => Error::Execution {
                    engine: failure.engine,
                    reason: failure.detail,
                },
            }),
            None => Err(Error::execution(name, "engine produced no outcome")),
        }
    }

    fn select(&self, options: &ConsensusOptions) -> Result<Vec<Arc<dyn AnalysisEngine>>> {
        match &options.engine_names {
            Some(names) => self.registry.resolve(names),
            None => Ok(self.registry.snapshot()),
        }
    }

    /// `consensus` is `Some(min_reliability)` when a consensus is wanted
    async fn execute(
        &self,
        request: AnalysisRequest,
        engines: Vec<Arc<dyn AnalysisEngine>>,
        sink: Option<ProgressSink>,
        consensus: Option<Option<Reliability>>,
    ) -> BatchResult {
        // Tiers are captured at launch so a concurrent unregister cannot drop a vote
        let reliabilities: HashMap<String, Reliability> = engines
            .iter()
            .map(|engine| (engine.name().to_string(), engine.reliability()))
            .collect();

        let batch = self
            .harness
            .execute(Arc::new(request), engines, sink)
            .await
            .into_batch();

        if batch.total_engines == 0 {
            return batch;
        }

        match consensus {
            Some(min_reliability) => {
                let rated = batch.engine_results.iter().filter_map(|envelope| {
                    reliabilities
                        .get(&envelope.engine)
                        .map(|&reliability| RatedEnvelope::new(envelope, reliability))
                });
                let result = self.aggregator.aggregate(rated, min_reliability);
                info!(
                    signal = %result.signal,
                    confidence = result.confidence,
                    engines = result.engines_analyzed,
                    "consensus computed"
                );
                batch.with_consensus(result)
            }
            None => batch,
        }
    }
}

/// Builder for [`Orchestrator`]
#[derive(Default)]
pub struct OrchestratorBuilder {
    registry: Option<Arc<EngineRegistry>>,
    engines: Vec<Arc<dyn AnalysisEngine>>,
    harness_config: Option<HarnessConfig>,
    signal_keys: Option<Vec<String>>,
}

impl OrchestratorBuilder {
    /// Use an existing registry instead of a fresh one
    pub fn registry(mut self, registry: Arc<EngineRegistry>) -> Self {
        self.registry = Some(registry);
        self
    }

    /// Register `engine` when building
    pub fn engine(mut self, engine: Arc<dyn AnalysisEngine>) -> Self {
        self.engines.push(engine);
        self
    }

    pub fn harness_config(mut self, config: HarnessConfig) -> Self {
        self.harness_config = Some(config);
        self
    }

    /// Override the facts keys consulted for an engine's direction
    pub fn signal_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.signal_keys = Some(keys.into_iter().map(Into::into).collect());
        self
    }

    pub fn build(self) -> Result<Orchestrator> {
        let harness_config = self.harness_config.unwrap_or_default();
        harness_config.validate()?;

        let registry = self.registry.unwrap_or_default();
        for engine in self.engines {
            registry.register(engine)?;
        }

        let aggregator = self
            .signal_keys
            .map_or_else(ConsensusAggregator::new, |keys| {
                ConsensusAggregator::with_extractor(SignalExtractor::with_keys(keys))
            });

        Ok(Orchestrator {
            registry,
            harness: ExecutionHarness::new(harness_config),
            aggregator,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedEngine};
    use std::time::Duration;
    use verdict_consensus::ConsensusSignal;
    use verdict_core::Facts;

    fn request() -> AnalysisRequest {
        AnalysisRequest::now("MSFT", "1d")
    }

    fn vote(name: &str, reliability: Reliability, label: &str) -> Arc<dyn AnalysisEngine> {
        ScriptedEngine::voting(
            name,
            reliability,
            Facts::new().with("signal", label),
            Duration::from_millis(2),
        )
    }

    fn orchestrator(engines: Vec<Arc<dyn AnalysisEngine>>) -> Orchestrator {
        let config = HarnessConfig::builder()
            .deadline(Duration::from_millis(200))
            .grace_period(Duration::from_millis(50))
            .build()
            .unwrap();
        engines
            .into_iter()
            .fold(Orchestrator::builder().harness_config(config), OrchestratorBuilder::engine)
            .build()
            .unwrap()
    }

    #[tokio::test]
    async fn test_one_failure_one_survivor() {
        let orchestrator = orchestrator(vec![
            vote("survivor", Reliability::Medium, "bullish"),
            ScriptedEngine::new("broken", Reliability::High, Script::Fail("feed offline")),
        ]);

        let batch = orchestrator
            .run_with_consensus(request(), &ConsensusOptions::default())
            .await
            .unwrap();

        assert_eq!(batch.failures.len(), 1);
        assert_eq!(batch.successful_engines, 1);
        let consensus = batch.consensus.unwrap();
        assert_eq!(consensus.engines_analyzed, 1);
        assert!(consensus.engine_contributions.contains_key("survivor"));
        assert_eq!(consensus.signal, ConsensusSignal::Bullish);
    }

    #[tokio::test]
    async fn test_all_fail_is_insufficient() {
        let orchestrator = orchestrator(vec![
            ScriptedEngine::new("a", Reliability::High, Script::Fail("x")),
            ScriptedEngine::new("b", Reliability::Low, Script::Panic),
        ]);

        let batch = orchestrator
            .run_with_consensus(request(), &ConsensusOptions::default())
            .await
            .unwrap();

        assert!(batch.engine_results.is_empty());
        assert_eq!(batch.total_engines, 2);
        assert_eq!(batch.failures.len(), 2);
        assert!(batch.consensus.unwrap().is_insufficient());
    }

    #[tokio::test]
    async fn test_weighted_consensus_over_registry() {
        let orchestrator = orchestrator(vec![
            vote("trend", Reliability::High, "bullish"),
            vote("phase", Reliability::Low, "bearish"),
        ]);

        let consensus = orchestrator
            .consensus_only(request(), &ConsensusOptions::default().enable_consensus(false))
            .await
            .unwrap();

        assert!((consensus.weighted_score - 0.5).abs() < 1e-9);
        assert_eq!(consensus.signal, ConsensusSignal::Bullish);
        assert!((consensus.confidence - 0.25).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_min_reliability_without_high_tier() {
        let orchestrator = orchestrator(vec![
            vote("m", Reliability::Medium, "bullish"),
            vote("l", Reliability::Low, "strong_bullish"),
        ]);

        let options = ConsensusOptions::default().min_reliability(Reliability::High);
        let batch = orchestrator.run_with_consensus(request(), &options).await.unwrap();

        assert_eq!(batch.successful_engines, 2);
        assert_eq!(batch.consensus.unwrap().signal, ConsensusSignal::InsufficientData);
    }

    #[tokio::test]
    async fn test_consensus_disabled() {
        let orchestrator = orchestrator(vec![vote("a", Reliability::High, "bullish")]);
        let options = ConsensusOptions::default().enable_consensus(false);

        let batch = orchestrator.run_with_consensus(request(), &options).await.unwrap();
        assert_eq!(batch.successful_engines, 1);
        assert!(batch.consensus.is_none());

        let plain = orchestrator.run_all(request()).await;
        assert!(plain.consensus.is_none());
    }

    #[tokio::test]
    async fn test_unknown_name_fails_before_launch() {
        let (sink, mut rx) = ProgressSink::channel();
        let orchestrator = orchestrator(vec![ScriptedEngine::staged("known", 3)]);

        let result = orchestrator
            .run_named_with_progress(&["known", "ghost"], request(), Some(sink))
            .await;

        match tokio_test::assert_err!(result) {
            Error::EngineNotFound(name) => assert_eq!(name, "ghost"),
            other => panic!("Expected EngineNotFound, got {other:?}"),
        }
        // Nothing ran, so nothing reported
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_empty_subset() {
        let orchestrator = orchestrator(vec![vote("a", Reliability::High, "bullish")]);
        let options = ConsensusOptions::default().engine_names(Vec::<String>::new());

        let batch = orchestrator.run_with_consensus(request(), &options).await.unwrap();
        assert_eq!(batch.total_engines, 0);
        assert_eq!(batch.successful_engines, 0);
        assert!(batch.consensus.is_none());
    }

    #[tokio::test]
    async fn test_duplicate_names_run_once() {
        let orchestrator = orchestrator(vec![
            vote("a", Reliability::High, "bullish"),
            vote("b", Reliability::High, "bearish"),
        ]);

        let batch = orchestrator.run_named(&["a", "a", "b"], request()).await.unwrap();
        assert_eq!(batch.total_engines, 2);
        assert_eq!(batch.successful_engines + batch.failures.len(), batch.total_engines);
    }

    #[tokio::test]
    async fn test_run_one() {
        let orchestrator = orchestrator(vec![
            vote("a", Reliability::High, "bullish"),
            ScriptedEngine::new("slow", Reliability::Low, Script::Stubborn),
            ScriptedEngine::new("bad", Reliability::Low, Script::Fail("nope")),
        ]);

        let envelope = orchestrator.run_one("a", request(), None).await.unwrap();
        assert_eq!(envelope.engine, "a");
        assert_eq!(envelope.facts.get_str("signal"), Some("bullish"));

        assert!(matches!(
            orchestrator.run_one("slow", request(), None).await,
            Err(Error::Timeout { .. })
        ));
        assert!(matches!(
            orchestrator.run_one("bad", request(), None).await,
            Err(Error::Execution { .. })
        ));
        let missing = tokio_test::assert_err!(orchestrator.run_one("missing", request(), None).await);
        assert!(matches!(missing, Error::EngineNotFound(name) if name == "missing"));
    }

    #[tokio::test]
    async fn test_registry_management() {
        let orchestrator = orchestrator(vec![vote("a", Reliability::High, "bullish")]);

        assert!(matches!(
            orchestrator.register(vote("a", Reliability::Low, "bearish")),
            Err(Error::DuplicateEngineName(_))
        ));
        orchestrator.register(vote("b", Reliability::Low, "bearish")).unwrap();

        let high = orchestrator.list_descriptors(DescriptorFilter::default().min_reliability(Reliability::High));
        assert_eq!(high.len(), 1);
        assert_eq!(orchestrator.list_descriptors(DescriptorFilter::default()).len(), 2);

        assert!(orchestrator.unregister("b"));
        assert!(!orchestrator.unregister("b"));
        assert_eq!(orchestrator.run_all(request()).await.total_engines, 1);
    }

    #[tokio::test]
    async fn test_custom_signal_keys() {
        let engine = ScriptedEngine::voting(
            "custom",
            Reliability::High,
            Facts::new().with("bias", "bearish").with("signal", "bullish"),
            Duration::ZERO,
        );
        let orchestrator = Orchestrator::builder()
            .engine(engine)
            .signal_keys(["bias"])
            .build()
            .unwrap();

        let consensus = orchestrator
            .consensus_only(request(), &ConsensusOptions::default())
            .await
            .unwrap();
        assert_eq!(consensus.signal, ConsensusSignal::Bearish);
    }
}
