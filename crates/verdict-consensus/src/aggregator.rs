//! Reliability-weighted consensus aggregator

use std::collections::BTreeMap;
use std::collections::btree_map::Entry;
use tracing::{debug, warn};
use verdict_core::{Reliability, ResultEnvelope};

use crate::result::{ConsensusQuality, ConsensusResult, ConsensusSignal, EngineContribution};
use crate::signal::{NormalizedSignal, SignalExtractor};

/// A successful envelope paired with its engine's declared reliability
#[derive(Debug, Clone, Copy)]
pub struct RatedEnvelope<'a> {
    pub envelope: &'a ResultEnvelope,
    pub reliability: Reliability,
}

impl<'a> RatedEnvelope<'a> {
    pub fn new(envelope: &'a ResultEnvelope, reliability: Reliability) -> Self {
        Self {
            envelope,
            reliability,
        }
    }
}

struct Ballot {
    signal: NormalizedSignal,
    reliability: Reliability,
    weight: f64,
}

/// Stateless consensus calculator
///
/// Holds only the signal extraction policy; every call to
/// [`aggregate`](ConsensusAggregator::aggregate) is independent.
#[derive(Debug, Clone, Default)]
pub struct ConsensusAggregator {
    extractor: SignalExtractor,
}

impl ConsensusAggregator {
    /// Aggregator with the default signal key priority
    pub fn new() -> Self {
        Self::default()
    }

    /// Aggregator with a custom signal extraction policy
    pub fn with_extractor(extractor: SignalExtractor) -> Self {
        Self { extractor }
    }

    pub fn extractor(&self) -> &SignalExtractor {
        &self.extractor
    }

    /// Compute the consensus over `inputs`
    ///
    /// Envelopes from engines below `min_reliability` are not eligible.
    /// Envelopes with invalid quality metadata are rejected, as are repeated
    /// envelopes from an engine already counted. With no eligible engine the
    /// result is [`ConsensusSignal::InsufficientData`].
    pub fn aggregate<'a, I>(&self, inputs: I, min_reliability: Option<Reliability>) -> ConsensusResult
    where
        I: IntoIterator<Item = RatedEnvelope<'a>>,
    {
        let mut ballots: BTreeMap<String, Ballot> = BTreeMap::new();
        // Summation follows input order so identical input sums identically
        let mut order: Vec<String> = Vec::new();

        for RatedEnvelope {
            envelope,
            reliability,
        } in inputs
        {
            if min_reliability.is_some_and(|min| reliability < min) {
                debug!(engine = %envelope.engine, %reliability, "below minimum reliability, skipping");
                continue;
            }
            if let Err(e) = envelope.quality.validate(&envelope.engine) {
                warn!(engine = %envelope.engine, error = %e, "rejecting envelope from consensus");
                continue;
            }

            match ballots.entry(envelope.engine.clone()) {
                Entry::Occupied(_) => {
                    warn!(engine = %envelope.engine, "duplicate envelope for engine, keeping the first");
                }
                Entry::Vacant(slot) => {
                    slot.insert(Ballot {
                        signal: self.extractor.extract(&envelope.facts),
                        reliability,
                        weight: reliability.weight() * envelope.quality.data_completeness,
                    });
                    order.push(envelope.engine.clone());
                }
            }
        }

        if ballots.is_empty() {
            debug!("no eligible engines, consensus has insufficient data");
            return ConsensusResult::insufficient_data();
        }

        let analyzed = ballots.len();
        let mut total_weight: f64 = order.iter().map(|name| ballots[name].weight).sum();
        if total_weight <= 0.0 {
            debug!(analyzed, "all weights are zero, falling back to uniform weighting");
            for ballot in ballots.values_mut() {
                ballot.weight = 1.0;
            }
            total_weight = analyzed as f64;
        }

        let weighted_score = (order
            .iter()
            .map(|name| {
                let ballot = &ballots[name];
                ballot.signal.score() * ballot.weight
            })
            .sum::<f64>()
            / total_weight)
            .clamp(-2.0, 2.0);

        let signal = ConsensusSignal::from_score(weighted_score);
        let confidence = (weighted_score.abs() / 2.0).clamp(0.0, 1.0);

        let agreeing_weight: f64 = if weighted_score == 0.0 {
            total_weight
        } else {
            order
                .iter()
                .map(|name| &ballots[name])
                .filter(|ballot| {
                    let score = ballot.signal.score();
                    score != 0.0 && score.signum() == weighted_score.signum()
                })
                .map(|ballot| ballot.weight)
                .sum()
        };
        let strength = (confidence * agreeing_weight / total_weight).clamp(0.0, 1.0);

        let mut engines_bullish = 0;
        let mut engines_bearish = 0;
        let mut engines_neutral = 0;
        let mut reliability_sum = 0.0;
        let mut engine_contributions = BTreeMap::new();

        for (name, ballot) in ballots {
            let score = ballot.signal.score();
            if score > 0.0 {
                engines_bullish += 1;
            } else if score < 0.0 {
                engines_bearish += 1;
            } else {
                engines_neutral += 1;
            }
            reliability_sum += ballot.reliability.weight();

            engine_contributions.insert(
                name,
                EngineContribution {
                    signal: ballot.signal,
                    score,
                    weight: ballot.weight,
                    weight_contribution: ballot.weight / total_weight,
                },
            );
        }

        let result = ConsensusResult {
            signal,
            confidence,
            strength,
            quality: ConsensusQuality::classify(analyzed, confidence),
            weighted_score,
            engine_contributions,
            engines_bullish,
            engines_bearish,
            engines_neutral,
            engines_analyzed: analyzed,
            reliability_average: reliability_sum / analyzed as f64,
        };

        debug!(
            signal = %result.signal,
            weighted_score,
            confidence,
            analyzed,
            "consensus computed"
        );

        result
    }
}
