//! Core abstractions for verdict
//!
//! This crate defines the capability contract every analysis engine
//! implements, the request/result data model shared by all crates in the
//! workspace, progress reporting, and the common error type.

pub mod engine;
pub mod error;
pub mod facts;
pub mod progress;
pub mod types;

pub use engine::AnalysisEngine;
pub use error::{Error, Result};
pub use facts::Facts;
pub use progress::{ProgressEvent, ProgressSink, RunContext};
pub use types::{
    AnalysisRequest, EngineDescriptor, EngineKind, QualityMeta, Reliability, ResultEnvelope,
};
