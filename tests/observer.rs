use htm_temporal_memory::core::monitor::{Metric, TraceRecorder};
use htm_temporal_memory::core::observer::{Phase, PhaseSnapshot, TemporalMemoryObserver};
use htm_temporal_memory::core::sequence_machine::{ConsecutivePatternMachine, PatternSource};
use htm_temporal_memory::core::temporal_memory::{TemporalMemory, TemporalMemoryParams};

fn params() -> TemporalMemoryParams {
    TemporalMemoryParams {
        column_dimensions: vec![64],
        cells_per_column: 4,
        activation_threshold: 3,
        min_threshold: 2,
        initial_permanence: 0.5,
        max_new_synapse_count: 5,
        ..Default::default()
    }
}

#[derive(Default)]
struct PhaseLog {
    phases: Vec<Phase>,
    active_cells: Vec<usize>,
    predictive_cells: Vec<usize>,
    resets: usize,
}

impl TemporalMemoryObserver for PhaseLog {
    fn on_phase(&mut self, snapshot: &PhaseSnapshot<'_>) {
        self.phases.push(snapshot.phase);
        self.active_cells.push(snapshot.active_cells.len());
        self.predictive_cells.push(snapshot.predictive_cells.len());
    }

    fn on_reset(&mut self) {
        self.resets += 1;
    }
}

#[test]
fn observer_sees_every_phase_in_order() {
    let mut tm = TemporalMemory::new(params()).unwrap();
    let mut log = PhaseLog::default();

    tm.compute_observed(&[0, 1], true, &mut log).unwrap();
    tm.compute_observed(&[2], false, &mut log).unwrap();
    tm.reset_observed(&mut log);

    let step = [
        Phase::ActivateCorrectlyPredictiveCells,
        Phase::BurstColumns,
        Phase::LearnOnSegments,
        Phase::ComputePredictiveCells,
    ];
    assert_eq!(log.phases, [step, step].concat());
    assert_eq!(log.resets, 1);

    // Nothing was predicted, so phase 1 activates nothing and bursting activates whole columns.
    assert_eq!(log.active_cells[..4], [0, 8, 8, 8]);
    assert_eq!(log.active_cells[4..], [0, 4, 4, 4]);
    assert!(log.predictive_cells.iter().all(|&count| count == 0));
}

#[test]
fn observed_and_plain_compute_agree() {
    let patterns = ConsecutivePatternMachine::new(64, 5).unwrap();
    let mut plain = TemporalMemory::new(params()).unwrap();
    let mut observed = TemporalMemory::new(params()).unwrap();
    let mut recorder = TraceRecorder::new(4);

    for i in 0..10 {
        let columns = patterns.get(i % 4).unwrap();
        plain.compute(columns, true).unwrap();
        observed.compute_observed(columns, true, &mut recorder).unwrap();
    }

    assert_eq!(plain, observed);
    assert_eq!(recorder.steps(), 10);
}

#[test]
fn recorder_tracks_sequence_learning() {
    let patterns = ConsecutivePatternMachine::new(64, 5).unwrap();
    let mut tm = TemporalMemory::new(params()).unwrap();
    let mut recorder = TraceRecorder::new(tm.cells_per_column());

    for _ in 0..6 {
        for i in 0..4 {
            tm.compute_observed(patterns.get(i).unwrap(), true, &mut recorder)
                .unwrap();
        }
        tm.reset_observed(&mut recorder);
    }

    assert_eq!(recorder.steps(), 24);
    assert_eq!(recorder.active_columns().data[0], vec![0, 1, 2, 3, 4]);
    assert_eq!(recorder.resets().data.iter().filter(|&&r| r).count(), 6);

    // The first pass bursts everywhere, the last pass only at the sequence start.
    let unpredicted = recorder.unpredicted_active_columns().counts();
    assert_eq!(unpredicted.data[..4], [5, 5, 5, 5]);
    assert_eq!(unpredicted.data[20..], [5, 0, 0, 0]);

    let predicted = Metric::from_trace(
        &recorder.predicted_active_columns().counts(),
        Some(recorder.resets()),
    );
    assert_eq!(predicted.count, 18);
    assert!((predicted.max - 5.0).abs() < 1e-6);

    let segments = recorder.num_segments();
    assert!(segments.data.windows(2).all(|w| w[0] <= w[1]));
    assert_eq!(*segments.data.last().unwrap(), tm.num_segments());

    let cumulative = recorder.predicted_active_cells().cumulative_counts();
    assert_eq!(cumulative.data.last().copied(), Some(5 * 3 * 5));

    recorder.clear_history();
    assert_eq!(recorder.steps(), 0);
}

#[test]
fn recorder_measures_sequences_sharing_a_block() {
    let patterns = ConsecutivePatternMachine::new(64, 5).unwrap();
    let mut tm = TemporalMemory::new(params()).unwrap();
    let mut recorder = TraceRecorder::new(tm.cells_per_column());
    let sequences = [("A", [0, 1, 2, 3]), ("B", [4, 1, 2, 5])];

    for _ in 0..6 {
        for (label, numbers) in &sequences {
            recorder.set_sequence_label(Some(label.to_string()));
            for &number in numbers {
                tm.compute_observed(patterns.get(number).unwrap(), true, &mut recorder)
                    .unwrap();
            }
            tm.reset_observed(&mut recorder);
        }
    }

    assert_eq!(recorder.sequence_labels().len(), 48);
    assert_eq!(recorder.sequence_labels().data[4].as_deref(), Some("B"));

    // The first element of each sequence follows a reset and is never predicted.
    let a = recorder.predicted_active_cells_for_sequence("A");
    let b = recorder.predicted_active_cells_for_sequence("B");
    assert!(a.iter().all(|&cell| (5 * 4..20 * 4).contains(&cell)));
    assert!(b.iter().all(|&cell| (5 * 4..15 * 4).contains(&cell) || cell >= 25 * 4));

    // The shared block is first predicted in B through the cells A learned for it.
    let shared = recorder.sequences_predicted_active_cells_shared();
    assert!((shared.max - 2.0).abs() < 1e-6);
    assert!((shared.min - 1.0).abs() < 1e-6);
    assert!(a.iter().any(|cell| b.contains(cell)));

    // The last element of A is learned once and predicted by a single cell per column.
    let per_column = recorder.sequences_predicted_active_cells_per_column();
    assert!((per_column.min - 1.0).abs() < 1e-6);
    assert!(per_column.max >= 1.0);
    assert!(per_column.count >= 3 * 5);
}
