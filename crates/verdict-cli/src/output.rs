//! Table rendering for command output

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, ContentArrangement, Table};
use verdict_consensus::{ConsensusResult, SignalExtractor};
use verdict_core::{EngineDescriptor, ProgressEvent, ResultEnvelope};
use verdict_runtime::BatchResult;

fn table(header: &[&str]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(header.to_vec());
    table
}

pub fn engines_table(descriptors: &[EngineDescriptor]) -> Table {
    let mut table = table(&["Engine", "Kind", "Reliability", "Description"]);
    for descriptor in descriptors {
        table.add_row(vec![
            Cell::new(&descriptor.name),
            Cell::new(descriptor.kind),
            Cell::new(descriptor.reliability),
            Cell::new(&descriptor.description),
        ]);
    }
    table
}

/// One row per engine: successes first, then failures
pub fn batch_table(batch: &BatchResult, extractor: &SignalExtractor) -> Table {
    let mut table = table(&["Engine", "Status", "Signal", "Source", "Completeness", "Details"]);

    for envelope in &batch.engine_results {
        table.add_row(vec![
            Cell::new(&envelope.engine),
            Cell::new("ok"),
            Cell::new(extractor.extract(&envelope.facts)),
            Cell::new(extractor.source_key(&envelope.facts).unwrap_or("-")),
            Cell::new(format!("{:.0}%", envelope.quality.data_completeness * 100.0)),
            Cell::new(fact_summary(envelope)),
        ]);
    }
    for failure in &batch.failures {
        table.add_row(vec![
            Cell::new(&failure.engine),
            Cell::new(failure.kind),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new("-"),
            Cell::new(&failure.detail),
        ]);
    }

    table
}

pub fn contributions_table(consensus: &ConsensusResult) -> Table {
    let mut table = table(&["Engine", "Signal", "Score", "Weight", "Share"]);
    for (engine, contribution) in &consensus.engine_contributions {
        table.add_row(vec![
            Cell::new(engine),
            Cell::new(contribution.signal),
            Cell::new(format!("{:+.0}", contribution.score)),
            Cell::new(format!("{:.2}", contribution.weight)),
            Cell::new(format!("{:.1}%", contribution.weight_contribution * 100.0)),
        ]);
    }
    table
}

pub fn progress_line(event: &ProgressEvent) -> String {
    if event.note.is_empty() {
        format!("[{:>5.1}%] {:<16} {}", event.percent, event.engine, event.stage)
    } else {
        format!(
            "[{:>5.1}%] {:<16} {}: {}",
            event.percent, event.engine, event.stage, event.note
        )
    }
}

/// Numeric and short string facts as `key=value`, sorted by key
fn fact_summary(envelope: &ResultEnvelope) -> String {
    let mut parts: Vec<String> = envelope
        .facts
        .iter()
        .filter_map(|(key, value)| {
            if let Some(n) = value.as_f64() {
                Some(format!("{key}={n}"))
            } else {
                value
                    .as_str()
                    .filter(|s| s.len() <= 24)
                    .map(|s| format!("{key}={s}"))
            }
        })
        .collect();
    parts.sort();
    parts.join(" ")
}
