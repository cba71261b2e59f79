//! Concurrent execution harness
//!
//! Fans a request out to a set of engines, one tokio task each, and fans the
//! outcomes back in. A failing, panicking or slow engine only affects its own
//! outcome.

use futures::FutureExt;
use std::any::Any;
use std::collections::BTreeMap;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{Instant, timeout_at};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};
use verdict_core::{AnalysisEngine, AnalysisRequest, Error, ProgressSink, Result, ResultEnvelope, RunContext};

use crate::batch::{BatchResult, EngineFailure, EngineOutcome, FailureKind};
use crate::config::HarnessConfig;

/// Raw result of one harness run
#[derive(Debug, Clone)]
pub struct HarnessReport {
    /// Exactly one outcome per launched engine, in completion order
    pub outcomes: Vec<EngineOutcome>,
    /// Time from launch to fan-in completion
    pub elapsed: Duration,
}

impl HarnessReport {
    pub fn into_batch(self) -> BatchResult {
        BatchResult::from_outcomes(self.outcomes, self.elapsed.as_secs_f64() * 1000.0)
    }
}

/// Runs engines concurrently under a deadline
#[derive(Debug, Clone, Default)]
pub struct ExecutionHarness {
    config: HarnessConfig,
}

impl ExecutionHarness {
    pub fn new(config: HarnessConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &HarnessConfig {
        &self.config
    }

    /// Run every engine in `engines` against `request`
    ///
    /// Progress from each engine reaches `sink` tagged with that engine's name.
    /// When the deadline passes, the batch's cancellation token fires; engines
    /// still running once the grace period is over are aborted and recorded as
    /// timeouts.
    pub async fn execute(
        &self,
        request: Arc<AnalysisRequest>,
        engines: Vec<Arc<dyn AnalysisEngine>>,
        sink: Option<ProgressSink>,
    ) -> HarnessReport {
        if engines.is_empty() {
            debug!("no engines selected, skipping batch");
            return HarnessReport {
                outcomes: Vec::new(),
                elapsed: Duration::ZERO,
            };
        }

        let launched = Instant::now();
        let cancel = CancellationToken::new();
        let mut tasks = JoinSet::new();
        let mut pending: BTreeMap<usize, String> = BTreeMap::new();

        info!(
            symbol = %request.symbol,
            timeframe = %request.timeframe,
            engines = engines.len(),
            deadline_ms = self.config.deadline.map(millis),
            "launching batch"
        );

        for (index, engine) in engines.into_iter().enumerate() {
            let name = engine.name().to_string();
            let ctx = RunContext::new(name.as_str(), sink.clone(), cancel.clone());
            let request = Arc::clone(&request);
            pending.insert(index, name);

            tasks.spawn(async move {
                let run = AssertUnwindSafe(engine.run(&request, &ctx)).catch_unwind().await;
                let outcome = match run {
                    Ok(result) => settle(&ctx, result, launched),
                    Err(payload) => EngineOutcome::Failure(EngineFailure::new(
                        ctx.engine_name(),
                        FailureKind::Panicked,
                        panic_message(payload.as_ref()),
                    )),
                };
                (index, outcome)
            });
        }

        let deadline = self.config.deadline.map(|d| launched + d);
        let mut grace_until: Option<Instant> = None;
        let mut outcomes = Vec::with_capacity(pending.len());

        loop {
            let joined = match grace_until.or(deadline) {
                Some(at) => match timeout_at(at, tasks.join_next()).await {
                    Ok(joined) => joined,
                    Err(_) if grace_until.is_none() => {
                        warn!(
                            running = pending.len(),
                            "batch deadline reached, requesting cancellation"
                        );
                        cancel.cancel();
                        grace_until = Some(at + self.config.grace_period);
                        continue;
                    }
                    Err(_) => break,
                },
                None => tasks.join_next().await,
            };

            match joined {
                Some(Ok((index, outcome))) => {
                    pending.remove(&index);
                    match &outcome {
                        EngineOutcome::Success(_) => debug!(engine = %outcome.engine(), "engine finished"),
                        EngineOutcome::Failure(failure) => warn!(
                            engine = %failure.engine,
                            kind = %failure.kind,
                            detail = %failure.detail,
                            "engine failed"
                        ),
                    }
                    outcomes.push(outcome);
                }
                // Panics are caught inside the task, so only runtime shutdown lands here
                Some(Err(e)) => warn!(error = %e, "engine task ended without an outcome"),
                None => break,
            }
        }

        if !pending.is_empty() {
            tasks.abort_all();
        }

        let timed_out = grace_until.is_some();
        let after_ms = millis(launched.elapsed());
        for (_, engine) in pending {
            let failure = if timed_out {
                warn!(engine = %engine, after_ms, "engine aborted after deadline");
                EngineFailure::from_error(&engine, &Error::Timeout {
                    engine: engine.clone(),
                    after_ms,
                })
            } else {
                EngineFailure::new(&engine, FailureKind::Execution, "task cancelled before completion")
            };
            outcomes.push(EngineOutcome::Failure(failure));
        }

        let elapsed = launched.elapsed();
        info!(
            outcomes = outcomes.len(),
            succeeded = outcomes.iter().filter(|o| o.is_success()).count(),
            elapsed_ms = millis(elapsed),
            "batch finished"
        );

        HarnessReport { outcomes, elapsed }
    }
}

/// Turn an engine's return value into its outcome
///
/// The envelope is attributed to the engine that produced it, whatever name it
/// carries, and must pass quality validation. An error raised after the batch
/// was cancelled counts as a timeout.
fn settle(ctx: &RunContext, result: Result<ResultEnvelope>, launched: Instant) -> EngineOutcome {
    let engine = ctx.engine_name();

    match result {
        Ok(mut envelope) => {
            if envelope.engine != engine {
                warn!(
                    engine = %engine,
                    reported = %envelope.engine,
                    "envelope reported a different engine name, re-attributing"
                );
                envelope.engine = engine.to_string();
            }
            match envelope.quality.validate(engine) {
                Ok(()) => EngineOutcome::Success(envelope),
                Err(e) => EngineOutcome::Failure(EngineFailure::from_error(engine, &e)),
            }
        }
        Err(_) if ctx.is_cancelled() => EngineOutcome::Failure(EngineFailure::from_error(
            engine,
            &Error::Timeout {
                engine: engine.to_string(),
                after_ms: millis(launched.elapsed()),
            },
        )),
        Err(e) => EngineOutcome::Failure(EngineFailure::from_error(engine, &e)),
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("panicked: {message}")
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("panicked: {message}")
    } else {
        "panicked".to_string()
    }
}

fn millis(duration: Duration) -> u64 {
    u64::try_from(duration.as_millis()).unwrap_or(u64::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{Script, ScriptedEngine};
    use std::collections::HashMap;
    use verdict_core::{Facts, QualityMeta, Reliability};

    fn request() -> Arc<AnalysisRequest> {
        Arc::new(AnalysisRequest::now("AAPL", "1d"))
    }

    fn quick_harness() -> ExecutionHarness {
        ExecutionHarness::new(
            HarnessConfig::builder()
                .deadline(Duration::from_millis(150))
                .grace_period(Duration::from_millis(50))
                .build()
                .unwrap(),
        )
    }

    fn bullish(name: &str) -> Arc<dyn AnalysisEngine> {
        ScriptedEngine::voting(
            name,
            Reliability::High,
            Facts::new().with("signal", "bullish"),
            Duration::from_millis(5),
        )
    }

    #[tokio::test]
    async fn test_empty_subset_returns_immediately() {
        let report = ExecutionHarness::default().execute(request(), Vec::new(), None).await;
        assert!(report.outcomes.is_empty());
        assert_eq!(report.elapsed, Duration::ZERO);

        let batch = report.into_batch();
        assert_eq!(batch.total_engines, 0);
        assert!(batch.execution_time_ms.abs() < f64::EPSILON);
    }

    #[tokio::test]
    async fn test_failures_are_isolated() {
        let engines = vec![
            bullish("a"),
            ScriptedEngine::new("b", Reliability::Low, Script::Fail("no data")),
            ScriptedEngine::new("c", Reliability::Medium, Script::Panic),
            bullish("d"),
        ];

        let batch = quick_harness().execute(request(), engines, None).await.into_batch();

        assert_eq!(batch.total_engines, 4);
        assert_eq!(batch.successful_engines, 2);
        assert_eq!(batch.successful_engines + batch.failures.len(), batch.total_engines);

        let b = batch.failure("b").unwrap();
        assert_eq!(b.kind, FailureKind::Execution);
        assert!(b.detail.contains("no data"));

        let c = batch.failure("c").unwrap();
        assert_eq!(c.kind, FailureKind::Panicked);
        assert!(c.detail.contains("scripted panic"));
    }

    #[tokio::test]
    async fn test_deadline_records_timeouts() {
        let engines = vec![
            bullish("fast"),
            ScriptedEngine::new("polite", Reliability::Medium, Script::Cooperative),
            ScriptedEngine::new("stubborn", Reliability::Medium, Script::Stubborn),
        ];

        let started = std::time::Instant::now();
        let batch = quick_harness().execute(request(), engines, None).await.into_batch();

        // Deadline plus grace, nowhere near the stubborn engine's sleep
        assert!(started.elapsed() < Duration::from_secs(5));
        assert_eq!(batch.total_engines, 3);
        assert!(batch.envelope("fast").is_some());
        assert_eq!(batch.failure("polite").unwrap().kind, FailureKind::Timeout);
        assert_eq!(batch.failure("stubborn").unwrap().kind, FailureKind::Timeout);
    }

    #[tokio::test]
    async fn test_no_deadline_waits_for_everyone() {
        let harness = ExecutionHarness::new(HarnessConfig::builder().no_deadline().build().unwrap());
        let engines = vec![
            ScriptedEngine::voting("slowish", Reliability::Low, Facts::new(), Duration::from_millis(40)),
            bullish("quick"),
        ];

        let report = harness.execute(request(), engines, None).await;
        let order: Vec<_> = report.outcomes.iter().map(EngineOutcome::engine).collect();
        assert_eq!(order, vec!["quick", "slowish"]);

        // Fractional milliseconds survive into the batch
        let exact = report.elapsed.as_secs_f64() * 1000.0;
        let batch = report.into_batch();
        assert!(batch.execution_time_ms >= 40.0);
        assert!((batch.execution_time_ms - exact).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_invalid_quality_and_wrong_name() {
        let engines = vec![
            ScriptedEngine::new(
                "sloppy",
                Reliability::High,
                Script::Succeed {
                    facts: Facts::new(),
                    quality: QualityMeta::new(10.0, 0.0, 1.5),
                    delay: Duration::ZERO,
                    stages: 0,
                },
            ),
            ScriptedEngine::new("registered", Reliability::High, Script::Impostor("someone_else")),
        ];

        let batch = quick_harness().execute(request(), engines, None).await.into_batch();

        assert_eq!(batch.failure("sloppy").unwrap().kind, FailureKind::InvalidQuality);
        assert!(batch.envelope("registered").is_some());
        assert!(batch.envelope("someone_else").is_none());
    }

    #[tokio::test]
    async fn test_progress_is_tagged_and_ordered() {
        let (sink, mut rx) = ProgressSink::channel();
        let engines = vec![ScriptedEngine::staged("alpha", 4), ScriptedEngine::staged("beta", 3)];

        quick_harness().execute(request(), engines, Some(sink)).await;

        let mut per_engine: HashMap<String, Vec<f64>> = HashMap::new();
        while let Ok(event) = rx.try_recv() {
            per_engine.entry(event.engine).or_default().push(event.percent);
        }

        assert_eq!(per_engine["alpha"], vec![25.0, 50.0, 75.0, 100.0]);
        assert_eq!(per_engine["beta"].len(), 3);
        assert!(per_engine["beta"].windows(2).all(|w| w[0] < w[1]));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_engines_run_in_parallel() {
        let engines: Vec<_> = (0..4)
            .map(|i| {
                ScriptedEngine::voting(
                    &format!("e{i}"),
                    Reliability::Medium,
                    Facts::new(),
                    Duration::from_millis(100),
                )
            })
            .collect();

        let harness = ExecutionHarness::new(HarnessConfig::builder().no_deadline().build().unwrap());
        let report = harness.execute(request(), engines, None).await;

        assert_eq!(report.outcomes.len(), 4);
        assert!(report.elapsed < Duration::from_millis(350));
    }
}
