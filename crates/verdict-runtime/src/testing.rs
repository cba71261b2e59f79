//! Scripted engines for runtime tests

use async_trait::async_trait;
use std::sync::Arc;
use std::time::Duration;
use verdict_core::{
    AnalysisEngine, AnalysisRequest, EngineKind, Error, Facts, QualityMeta, Reliability, Result,
    ResultEnvelope, RunContext,
};

#[derive(Debug, Clone)]
pub enum Script {
    /// Report `stages` progress events, wait `delay`, then return `facts`
    Succeed {
        facts: Facts,
        quality: QualityMeta,
        delay: Duration,
        stages: usize,
    },
    Fail(&'static str),
    Panic,
    /// Wait for cancellation, then bail out
    Cooperative,
    /// Ignore cancellation and keep sleeping
    Stubborn,
    /// Succeed but claim another engine's name
    Impostor(&'static str),
}

pub struct ScriptedEngine {
    name: String,
    reliability: Reliability,
    script: Script,
}

impl ScriptedEngine {
    pub fn new(name: &str, reliability: Reliability, script: Script) -> Arc<dyn AnalysisEngine> {
        Arc::new(Self {
            name: name.to_string(),
            reliability,
            script,
        })
    }

    /// Engine returning `facts` with full completeness after `delay`
    pub fn voting(name: &str, reliability: Reliability, facts: Facts, delay: Duration) -> Arc<dyn AnalysisEngine> {
        Self::new(
            name,
            reliability,
            Script::Succeed {
                facts,
                quality: QualityMeta::new(100.0, 0.0, 1.0),
                delay,
                stages: 0,
            },
        )
    }

    /// Engine emitting `stages` progress events before returning
    pub fn staged(name: &str, stages: usize) -> Arc<dyn AnalysisEngine> {
        Self::new(
            name,
            Reliability::Medium,
            Script::Succeed {
                facts: Facts::new().with("signal", "neutral"),
                quality: QualityMeta::new(10.0, 0.0, 1.0),
                delay: Duration::from_millis(1),
                stages,
            },
        )
    }
}

#[async_trait]
impl AnalysisEngine for ScriptedEngine {
    fn name(&self) -> &str {
        &self.name
    }

    fn kind(&self) -> EngineKind {
        EngineKind::Traditional
    }

    fn reliability(&self) -> Reliability {
        self.reliability
    }

    async fn run(&self, request: &AnalysisRequest, ctx: &RunContext) -> Result<ResultEnvelope> {
        match &self.script {
            Script::Succeed {
                facts,
                quality,
                delay,
                stages,
            } => {
                for stage in 0..*stages {
                    let percent = (stage + 1) as f64 * 100.0 / *stages as f64;
                    ctx.report(format!("stage-{stage}"), percent, "");
                    tokio::task::yield_now().await;
                }
                tokio::time::sleep(*delay).await;
                Ok(ResultEnvelope::for_request(&self.name, request, facts.clone(), quality.clone()))
            }
            Script::Fail(reason) => Err(Error::execution(&self.name, *reason)),
            Script::Panic => panic!("scripted panic in {}", self.name),
            Script::Cooperative => {
                ctx.cancelled().await;
                ctx.check_cancelled()?;
                unreachable!("cancellation was observed")
            }
            Script::Stubborn => {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Err(Error::execution(&self.name, "woke up too late"))
            }
            Script::Impostor(claimed) => Ok(ResultEnvelope::for_request(
                *claimed,
                request,
                Facts::new().with("signal", "bullish"),
                QualityMeta::new(10.0, 0.0, 1.0),
            )),
        }
    }
}
