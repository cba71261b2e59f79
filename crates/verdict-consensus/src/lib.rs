//! Consensus aggregation for verdict
//!
//! Turns the successful envelopes of a batch into one explainable verdict.
//! Each engine's directional fact is normalized to a signed score in
//! `[-2, 2]`, weighted by `reliability tier × data completeness`, and the
//! weighted mean is classified into a [`ConsensusSignal`]. The aggregator is a
//! pure function: identical input always yields an identical result.

pub mod aggregator;
pub mod result;
pub mod signal;

pub use aggregator::{ConsensusAggregator, RatedEnvelope};
pub use result::{ConsensusQuality, ConsensusResult, ConsensusSignal, EngineContribution};
pub use signal::{NormalizedSignal, SignalExtractor};
