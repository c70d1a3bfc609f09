//! This example trains a Temporal Memory on a few high-order sequences and measures how well it
//! predicts them afterwards.
//!
//! The sequences share a common block of patterns in the middle, so predicting the elements after
//! the shared block requires remembering which sequence the block appeared in. Inputs are
//! non-overlapping consecutive patterns, fed directly as active columns.
//!
//! Run with `RUST_LOG=htm_temporal_memory=debug` to see per-step statistics.

use anyhow::Result;
use htm_temporal_memory::core::{
    monitor::{Metric, TraceRecorder},
    sequence_machine::{ConsecutivePatternMachine, PatternSource, SequenceMachine},
    temporal_memory::{TemporalMemory, TemporalMemoryParams},
};
use tracing_subscriber::EnvFilter;

const TRAINING_PASSES: usize = 15;

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .with_target(false)
        .init();

    let patterns = ConsecutivePatternMachine::new(1024, 16)?;
    let column_dimensions = vec![patterns.n()];
    let mut sequences = SequenceMachine::new(patterns, 7);

    let numbers = sequences.generate_numbers(4, 12, Some(4..8))?;
    let sequence = sequences.generate_from_numbers(&numbers)?;

    println!(
        "Initializing Temporal Memory with {} columns...",
        column_dimensions[0]
    );

    let mut tm = TemporalMemory::new(TemporalMemoryParams {
        column_dimensions,
        cells_per_column: 16,
        activation_threshold: 10,
        min_threshold: 8,
        initial_permanence: 0.55,
        max_new_synapse_count: 16,
        ..Default::default()
    })?;

    println!(
        "Training on {} patterns for {} passes...",
        sequence.len(),
        TRAINING_PASSES
    );

    for _ in 0..TRAINING_PASSES {
        for pattern in &sequence {
            match pattern {
                Some(columns) => tm.compute(columns, true)?,
                None => tm.reset(),
            }
        }
    }

    println!(
        "Learned {} segments with {} synapses.",
        tm.num_segments(),
        tm.num_synapses()
    );

    let mut recorder = TraceRecorder::new(tm.cells_per_column());
    let mut label = 0;
    recorder.set_sequence_label(Some(label.to_string()));
    for pattern in &sequence {
        match pattern {
            Some(columns) => tm.compute_observed(columns, false, &mut recorder)?,
            None => {
                tm.reset_observed(&mut recorder);
                label += 1;
                recorder.set_sequence_label(Some(label.to_string()));
            }
        }
    }

    let predicted = Metric::from_trace(
        &recorder.predicted_active_columns().counts(),
        Some(recorder.resets()),
    );
    let unpredicted = Metric::from_trace(
        &recorder.unpredicted_active_columns().counts(),
        Some(recorder.resets()),
    );

    let accuracy = predicted.sum / (predicted.sum + unpredicted.sum).max(1.0);
    println!(
        "Predicted {:.2}% of active columns after the first element of each sequence.",
        accuracy * 100.0
    );

    for metric in recorder.default_metrics() {
        println!(
            "{:<56} min {:>8.1} max {:>8.1} mean {:>8.2} std {:>8.2}",
            metric.title, metric.min, metric.max, metric.mean, metric.standard_deviation
        );
    }

    let bytes = tm.to_bytes()?;
    let restored = TemporalMemory::from_bytes(&bytes)?;
    println!(
        "Serialized state: {} bytes, restored identically: {}",
        bytes.len(),
        restored == tm
    );

    Ok(())
}
