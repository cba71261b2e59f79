//! Concurrent batch execution and the orchestrator facade
//!
//! [`ExecutionHarness`] runs a set of engines in parallel under a deadline and
//! turns every result, error, panic or timeout into an [`EngineOutcome`].
//! [`Orchestrator`] ties the registry, the harness and the consensus
//! aggregator together behind single-call operations.
//!
//! # Example
//!
//! ```no_run
//! use verdict_core::AnalysisRequest;
//! use verdict_runtime::{ConsensusOptions, Orchestrator};
//!
//! # async fn example() -> verdict_core::Result<()> {
//! let orchestrator = Orchestrator::builder().build()?;
//! let batch = orchestrator
//!     .run_with_consensus(AnalysisRequest::now("AAPL", "1d"), &ConsensusOptions::default())
//!     .await?;
//!
//! if let Some(consensus) = &batch.consensus {
//!     println!("{}", consensus.summary());
//! }
//! # Ok(())
//! # }
//! ```

pub mod batch;
pub mod config;
pub mod harness;
pub mod orchestrator;

#[cfg(test)]
mod testing;

pub use batch::{BatchResult, EngineFailure, EngineOutcome, FailureKind};
pub use config::{ConsensusOptions, HarnessConfig, HarnessConfigBuilder};
pub use harness::{ExecutionHarness, HarnessReport};
pub use orchestrator::{Orchestrator, OrchestratorBuilder};
