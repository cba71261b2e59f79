//! Core AnalysisEngine trait definition

use crate::{AnalysisRequest, EngineDescriptor, EngineKind, Reliability, Result, ResultEnvelope, RunContext};
use async_trait::async_trait;

/// Capability contract every analysis engine must implement
///
/// An engine is identified by [`name`](AnalysisEngine::name), which must be
/// stable: it is the registry key and the key under which the engine appears
/// in every result mapping.
///
/// # Cancellation
///
/// When a batch deadline expires the runtime cancels the token exposed by
/// [`RunContext`]. Engines should observe it at their own suspension points
/// (`ctx.check_cancelled()?` between stages, or `select!` on
/// `ctx.cancelled()`). Engines that block a thread without yielding cannot be
/// preempted; they are reported as timed out but keep running until they
/// return on their own.
#[async_trait]
pub trait AnalysisEngine: Send + Sync {
    /// Get the engine's name
    ///
    /// Must be unique within an EngineRegistry
    fn name(&self) -> &str;

    /// How the engine produces its signal
    fn kind(&self) -> EngineKind;

    /// Declared trustworthiness tier, used as a consensus weight factor
    fn reliability(&self) -> Reliability;

    /// Short human-readable description
    fn description(&self) -> &str {
        ""
    }

    /// Snapshot of the engine's classification
    fn descriptor(&self) -> EngineDescriptor {
        EngineDescriptor {
            name: self.name().to_string(),
            kind: self.kind(),
            reliability: self.reliability(),
            description: self.description().to_string(),
        }
    }

    /// Run the analysis for `request`
    ///
    /// Progress may be reported through `ctx` any number of times, including
    /// zero. Returns a populated envelope or an error carrying a
    /// human-readable cause.
    async fn run(&self, request: &AnalysisRequest, ctx: &RunContext) -> Result<ResultEnvelope>;
}
