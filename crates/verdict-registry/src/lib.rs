//! Engine registry for verdict
//!
//! This crate holds the set of named analysis engines an orchestrator can
//! run, and answers classification queries over it.

pub mod registry;

pub use registry::{DescriptorFilter, EngineRegistry};
