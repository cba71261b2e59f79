//! Adapter for blocking scanner functions
//!
//! Scanners are plain synchronous functions from a request to facts. The
//! adapter runs them on tokio's blocking pool so they never stall the
//! executor threads the other engines share.

use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use tracing::debug;
use verdict_core::{
    AnalysisEngine, AnalysisRequest, EngineKind, Error, Facts, QualityMeta, Reliability, Result,
    ResultEnvelope, RunContext,
};

/// Signature of a blocking scanner
pub type ScanFn = dyn Fn(&AnalysisRequest) -> anyhow::Result<Facts> + Send + Sync;

/// A blocking scanner exposed as a [`EngineKind::Scanner`] engine
///
/// Cancellation stops the adapter from waiting, but the scan itself runs to
/// completion on its blocking thread.
#[derive(Clone)]
pub struct ScannerEngine {
    name: String,
    description: String,
    reliability: Reliability,
    quality: QualityMeta,
    scan: Arc<ScanFn>,
}

impl ScannerEngine {
    pub fn new<F>(name: impl Into<String>, reliability: Reliability, scan: F) -> Self
    where
        F: Fn(&AnalysisRequest) -> anyhow::Result<Facts> + Send + Sync + 'static,
    {
        Self {
            name: name.into(),
            description: String::new(),
            reliability,
            quality: QualityMeta::new(1.0, 0.0, 1.0),
            scan: Arc::new(scan),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Quality metadata attached to every envelope this scanner produces
    pub fn with_quality(mut self, quality: QualityMeta) -> Self {
        self.quality = quality;
        self
    }
}

impl fmt::Debug for ScannerEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ScannerEngine")
            .field("name", &self.name)
            .field("reliability", &self.reliability)
            .field("quality", &self.quality)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl AnalysisEngine for ScannerEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Scanner
    }

    fn reliability(&self) -> Reliability {
        self.reliability
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn run(&self, request: &AnalysisRequest, ctx: &RunContext) -> Result<ResultEnvelope> {
        ctx.check_cancelled()?;
        ctx.report("scan", 0.0, "scanning");

        let scan = Arc::clone(&self.scan);
        let owned = request.clone();
        let handle = tokio::task::spawn_blocking(move || scan(&owned));

        let facts = tokio::select! {
            joined = handle => match joined {
                Ok(Ok(facts)) => facts,
                Ok(Err(e)) => return Err(Error::execution(&self.name, format!("{e:#}"))),
                Err(e) if e.is_panic() => std::panic::resume_unwind(e.into_panic()),
                Err(e) => return Err(Error::execution(&self.name, format!("scan task failed: {e}"))),
            },
            () = ctx.cancelled() => {
                debug!(engine = %self.name, "cancelled while scanning, leaving scan to finish");
                return Err(Error::execution(&self.name, "cancelled"));
            }
        };

        ctx.report("scan", 100.0, format!("{} facts", facts.len()));
        Ok(ResultEnvelope::for_request(&self.name, request, facts, self.quality.clone()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    fn request() -> AnalysisRequest {
        AnalysisRequest::now("AMD", "1h")
    }

    #[tokio::test]
    async fn test_scanner_success() {
        let engine = ScannerEngine::new("gaps", Reliability::Low, |request: &AnalysisRequest| {
            Ok(Facts::new()
                .with("position_bias", "long")
                .with("symbol_seen", request.symbol.clone()))
        })
        .with_description("gap scanner")
        .with_quality(QualityMeta::new(30.0, 5.0, 0.8));

        assert_eq!(engine.kind(), EngineKind::Scanner);
        assert_eq!(engine.descriptor().description, "gap scanner");

        let envelope = engine.run(&request(), &RunContext::detached("gaps")).await.unwrap();
        assert_eq!(envelope.engine, "gaps");
        assert_eq!(envelope.facts.get_str("symbol_seen"), Some("AMD"));
        assert_eq!(envelope.quality.data_completeness, 0.8);
    }

    #[tokio::test]
    async fn test_scanner_error_becomes_execution_failure() {
        let engine = ScannerEngine::new("broken", Reliability::Low, |_: &AnalysisRequest| {
            Err(anyhow::anyhow!("universe file missing"))
        });

        let result = engine.run(&request(), &RunContext::detached("broken")).await;
        match tokio_test::assert_err!(result) {
            Error::Execution { engine, reason } => {
                assert_eq!(engine, "broken");
                assert!(reason.contains("universe file missing"));
            }
            other => panic!("Expected Execution error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_scanner_stops_waiting_on_cancel() {
        let engine = ScannerEngine::new("slow", Reliability::Low, |_: &AnalysisRequest| {
            std::thread::sleep(Duration::from_millis(300));
            Ok(Facts::new())
        });
        let ctx = RunContext::detached("slow");
        let token = ctx.cancellation_token().clone();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            token.cancel();
        });

        let started = std::time::Instant::now();
        let result = engine.run(&request(), &ctx).await;
        assert!(result.is_err());
        assert!(started.elapsed() < Duration::from_millis(250));
    }
}
