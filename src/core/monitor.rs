//! Step-by-step history of a running temporal memory, for debugging and experiment analysis.
//!
//! [`TraceRecorder`] is a [`TemporalMemoryObserver`]: pass it to
//! [`compute_observed`](super::temporal_memory::TemporalMemory::compute_observed) and
//! [`reset_observed`](super::temporal_memory::TemporalMemory::reset_observed) and it appends one
//! entry per step to each of its traces.
//!
//! Transition traces compare the predictions made in the previous step with what became active:
//! - predicted active cells: predicted and now active.
//! - predicted inactive cells: predicted but not active.
//! - predicted active columns: active columns containing a predicted cell.
//! - predicted inactive columns: columns containing a predicted cell that did not become active.
//! - unpredicted active columns: active columns without any predicted cell (they burst).
//!
//! A [`Metric`] summarizes a counts trace.
//!
//! Steps can be labelled with the sequence being fed via [`TraceRecorder::set_sequence_label`].
//! The predicted active cells of labelled steps are collected per sequence, which shows how
//! sequences share or split their cell representations.

use super::observer::{Phase, PhaseSnapshot, TemporalMemoryObserver};
use fxhash::{FxHashMap, FxHashSet};

/// A titled list of per-step values.
#[derive(Debug, Clone, PartialEq)]
pub struct Trace<T> {
    pub title: String,
    pub data: Vec<T>,
}

impl<T> Trace<T> {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            data: Vec::new(),
        }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn clear(&mut self) {
        self.data.clear();
    }
}

impl Trace<Vec<usize>> {
    /// A trace of the number of indices recorded at each step.
    pub fn counts(&self) -> Trace<usize> {
        Trace {
            title: format!("# {}", self.title),
            data: self.data.iter().map(Vec::len).collect(),
        }
    }

    /// A trace of the running total of indices recorded up to each step.
    pub fn cumulative_counts(&self) -> Trace<usize> {
        let mut total = 0;
        Trace {
            title: format!("# (cumulative) {}", self.title),
            data: self
                .data
                .iter()
                .map(|indices| {
                    total += indices.len();
                    total
                })
                .collect(),
        }
    }
}

/// Summary statistics over a counts trace.
///
/// An empty selection yields a metric with `count == 0` and all statistics zero.
#[derive(Debug, Clone, PartialEq)]
pub struct Metric {
    pub title: String,
    /// Number of steps the statistics were computed over.
    pub count: usize,
    pub min: f64,
    pub max: f64,
    pub sum: f64,
    pub mean: f64,
    /// Population standard deviation.
    pub standard_deviation: f64,
}

impl Metric {
    /// Computes statistics over `trace`.
    /// With `excluded_resets`, steps that immediately follow a reset are skipped.
    pub fn from_trace(trace: &Trace<usize>, excluded_resets: Option<&Trace<bool>>) -> Self {
        let data: Vec<f64> = trace
            .data
            .iter()
            .enumerate()
            .filter(|(step, _)| {
                excluded_resets
                    .map_or(true, |resets| !resets.data.get(*step).copied().unwrap_or(false))
            })
            .map(|(_, &value)| value as f64)
            .collect();

        Self::from_values(trace.title.clone(), &data)
    }

    fn from_values(title: String, data: &[f64]) -> Self {
        if data.is_empty() {
            return Self {
                title,
                count: 0,
                min: 0.0,
                max: 0.0,
                sum: 0.0,
                mean: 0.0,
                standard_deviation: 0.0,
            };
        }

        let count = data.len();
        let min = data.iter().copied().fold(f64::INFINITY, f64::min);
        let max = data.iter().copied().fold(f64::NEG_INFINITY, f64::max);
        let sum: f64 = data.iter().sum();
        let mean = sum / count as f64;
        let variance = data.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / count as f64;

        Self {
            title,
            count,
            min,
            max,
            sum,
            mean,
            standard_deviation: variance.sqrt(),
        }
    }
}

/// Observer recording the per-step history of a temporal memory.
#[derive(Debug, Clone)]
pub struct TraceRecorder {
    cells_per_column: usize,
    reset_pending: bool,

    active_columns: Trace<Vec<usize>>,
    predictive_cells: Trace<Vec<usize>>,
    predicted_active_cells: Trace<Vec<usize>>,
    predicted_inactive_cells: Trace<Vec<usize>>,
    predicted_active_columns: Trace<Vec<usize>>,
    predicted_inactive_columns: Trace<Vec<usize>>,
    unpredicted_active_columns: Trace<Vec<usize>>,
    num_segments: Trace<usize>,
    num_synapses: Trace<usize>,
    resets: Trace<bool>,

    sequence_label: Option<String>,
    sequence_labels: Trace<Option<String>>,
    predicted_active_cells_for_sequence: FxHashMap<String, FxHashSet<usize>>,
}

impl TraceRecorder {
    /// Creates a recorder for a temporal memory with `cells_per_column` cells in each column.
    /// The first recorded step counts as following a reset.
    pub fn new(cells_per_column: usize) -> Self {
        Self {
            cells_per_column: cells_per_column.max(1),
            reset_pending: true,
            active_columns: Trace::new("active columns"),
            predictive_cells: Trace::new("predictive cells"),
            predicted_active_cells: Trace::new("predicted => active cells"),
            predicted_inactive_cells: Trace::new("predicted => inactive cells"),
            predicted_active_columns: Trace::new("predicted => active columns"),
            predicted_inactive_columns: Trace::new("predicted => inactive columns"),
            unpredicted_active_columns: Trace::new("unpredicted => active columns"),
            num_segments: Trace::new("# segments"),
            num_synapses: Trace::new("# synapses"),
            resets: Trace::new("resets"),
            sequence_label: None,
            sequence_labels: Trace::new("sequence labels"),
            predicted_active_cells_for_sequence: FxHashMap::default(),
        }
    }

    /// Labels the steps recorded from now on, until the label is changed again.
    pub fn set_sequence_label(&mut self, label: Option<String>) {
        self.sequence_label = label;
    }

    /// Number of recorded steps.
    pub fn steps(&self) -> usize {
        self.resets.len()
    }

    pub fn active_columns(&self) -> &Trace<Vec<usize>> {
        &self.active_columns
    }

    /// Cells predicted at the end of each step.
    pub fn predictive_cells(&self) -> &Trace<Vec<usize>> {
        &self.predictive_cells
    }

    pub fn predicted_active_cells(&self) -> &Trace<Vec<usize>> {
        &self.predicted_active_cells
    }

    pub fn predicted_inactive_cells(&self) -> &Trace<Vec<usize>> {
        &self.predicted_inactive_cells
    }

    pub fn predicted_active_columns(&self) -> &Trace<Vec<usize>> {
        &self.predicted_active_columns
    }

    pub fn predicted_inactive_columns(&self) -> &Trace<Vec<usize>> {
        &self.predicted_inactive_columns
    }

    pub fn unpredicted_active_columns(&self) -> &Trace<Vec<usize>> {
        &self.unpredicted_active_columns
    }

    /// Segments in the graph at the end of each step.
    pub fn num_segments(&self) -> &Trace<usize> {
        &self.num_segments
    }

    /// Synapses in the graph at the end of each step.
    pub fn num_synapses(&self) -> &Trace<usize> {
        &self.num_synapses
    }

    /// Whether each step directly followed a reset.
    pub fn resets(&self) -> &Trace<bool> {
        &self.resets
    }

    /// The sequence label in effect at each step.
    pub fn sequence_labels(&self) -> &Trace<Option<String>> {
        &self.sequence_labels
    }

    /// Every cell that was predicted and became active while `label` was set.
    pub fn predicted_active_cells_for_sequence(&self, label: &str) -> Vec<usize> {
        self.predicted_active_cells_for_sequence
            .get(label)
            .map(sorted)
            .unwrap_or_default()
    }

    /// For each sequence and each column, the number of that sequence's predicted active cells
    /// in the column.
    pub fn sequences_predicted_active_cells_per_column(&self) -> Metric {
        let mut values = Vec::new();

        for cells in self.predicted_active_cells_for_sequence.values() {
            let mut cells_for_column: FxHashMap<usize, usize> = FxHashMap::default();
            for &cell in cells {
                *cells_for_column.entry(cell / self.cells_per_column).or_default() += 1;
            }
            values.extend(cells_for_column.into_values().map(|count| count as f64));
        }

        Metric::from_values(
            "# predicted => active cells per column for each sequence".to_string(),
            &values,
        )
    }

    /// For each predicted active cell, the number of sequences it was collected in.
    ///
    /// High-order sequences reuse a column's cells in different contexts, so this overcounts
    /// sharing for them.
    pub fn sequences_predicted_active_cells_shared(&self) -> Metric {
        let mut sequences_for_cell: FxHashMap<usize, usize> = FxHashMap::default();

        for cells in self.predicted_active_cells_for_sequence.values() {
            for &cell in cells {
                *sequences_for_cell.entry(cell).or_default() += 1;
            }
        }

        let values: Vec<f64> = sequences_for_cell
            .into_values()
            .map(|count| count as f64)
            .collect();

        Metric::from_values(
            "# sequences each predicted => active cells appears in".to_string(),
            &values,
        )
    }

    /// Metrics over the counts of every indices trace plus the graph size traces,
    /// skipping steps that directly follow a reset, followed by the two sequence metrics.
    pub fn default_metrics(&self) -> Vec<Metric> {
        let indices = [
            &self.active_columns,
            &self.predictive_cells,
            &self.predicted_active_cells,
            &self.predicted_inactive_cells,
            &self.predicted_active_columns,
            &self.predicted_inactive_columns,
            &self.unpredicted_active_columns,
        ];

        indices
            .iter()
            .map(|trace| trace.counts())
            .chain([self.num_segments.clone(), self.num_synapses.clone()])
            .map(|trace| Metric::from_trace(&trace, Some(&self.resets)))
            .chain([
                self.sequences_predicted_active_cells_per_column(),
                self.sequences_predicted_active_cells_shared(),
            ])
            .collect()
    }

    /// Drops all recorded history. The next step counts as following a reset.
    pub fn clear_history(&mut self) {
        self.active_columns.clear();
        self.predictive_cells.clear();
        self.predicted_active_cells.clear();
        self.predicted_inactive_cells.clear();
        self.predicted_active_columns.clear();
        self.predicted_inactive_columns.clear();
        self.unpredicted_active_columns.clear();
        self.num_segments.clear();
        self.num_synapses.clear();
        self.resets.clear();
        self.sequence_labels.clear();
        self.predicted_active_cells_for_sequence.clear();
        self.reset_pending = true;
    }

    fn record_step(&mut self, snapshot: &PhaseSnapshot<'_>) {
        let mut predicted_active_cells = Vec::new();
        let mut predicted_inactive_cells = Vec::new();
        let mut predicted_columns = FxHashSet::default();

        for &cell in snapshot.prev_predictive_cells {
            predicted_columns.insert(cell / self.cells_per_column);
            if snapshot.active_cells.contains(&cell) {
                predicted_active_cells.push(cell);
            } else {
                predicted_inactive_cells.push(cell);
            }
        }

        let (mut predicted_active_columns, mut unpredicted_active_columns): (Vec<usize>, Vec<usize>) =
            snapshot
                .active_columns
                .iter()
                .partition(|&&column| predicted_columns.contains(&column));

        let mut predicted_inactive_columns: Vec<usize> = predicted_columns
            .difference(snapshot.active_columns)
            .copied()
            .collect();

        predicted_active_cells.sort_unstable();
        predicted_inactive_cells.sort_unstable();

        if let Some(label) = &self.sequence_label {
            self.predicted_active_cells_for_sequence
                .entry(label.clone())
                .or_default()
                .extend(predicted_active_cells.iter().copied());
        }
        predicted_active_columns.sort_unstable();
        predicted_inactive_columns.sort_unstable();
        unpredicted_active_columns.sort_unstable();

        self.active_columns.data.push(sorted(snapshot.active_columns));
        self.predictive_cells.data.push(sorted(snapshot.predictive_cells));
        self.predicted_active_cells.data.push(predicted_active_cells);
        self.predicted_inactive_cells.data.push(predicted_inactive_cells);
        self.predicted_active_columns.data.push(predicted_active_columns);
        self.predicted_inactive_columns.data.push(predicted_inactive_columns);
        self.unpredicted_active_columns.data.push(unpredicted_active_columns);
        self.num_segments.data.push(snapshot.connections.num_segments());
        self.num_synapses.data.push(snapshot.connections.num_synapses());
        self.resets.data.push(self.reset_pending);
        self.sequence_labels.data.push(self.sequence_label.clone());
        self.reset_pending = false;
    }
}

impl TemporalMemoryObserver for TraceRecorder {
    fn on_phase(&mut self, snapshot: &PhaseSnapshot<'_>) {
        if snapshot.phase == Phase::ComputePredictiveCells {
            self.record_step(snapshot);
        }
    }

    fn on_reset(&mut self) {
        self.reset_pending = true;
    }
}

fn sorted(set: &FxHashSet<usize>) -> Vec<usize> {
    let mut items: Vec<usize> = set.iter().copied().collect();
    items.sort_unstable();
    items
}
