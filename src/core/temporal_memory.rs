//! The `TemporalMemory` module implements the core component of HTM that learns and predicts temporal sequences.
//!
//! At a high level, it models a set of columns, where each column contains multiple cells.
//! Each cell can form multiple dendritic segments, which in turn consist of synapses.
//! All segments and synapses live in one [`Connections`] graph owned by the temporal memory.
//!
//! Column:
//! - A group of cells that share common feed-forward input.
//! - Columns are the unit of spatial competition; the active ones arrive as input every step.
//!
//! Cell:
//! - An individual processing unit within a column.
//! - Cells are responsible for representing different contexts of the same input.
//!
//! Dendritic Segment (Segment):
//! - A cluster of synapses on a cell that detects patterns of activity from other cells.
//! - A segment is active when enough of its connected synapses read from active cells,
//!   and matching when enough of its synapses (connected or not) do.
//!
//! Synapse:
//! - A connection from a presynaptic cell to a dendritic segment.
//! - Each synapse has a permanence value; it is connected once the permanence reaches `connected_permanence`.
//!
//! Bursting:
//! - When a column becomes active but none of its cells was predicted, all cells in the column are activated.
//!
//! Winner Cells:
//! - One cell per active column that receives learning credit for the step.
//!
//! How It Works:
//! - Every call to [`TemporalMemory::compute`] runs four phases in strict order:
//!   1. Activate correctly predictive cells: predictive cells in active columns become active and winners.
//!   2. Burst unpredicted columns: every cell becomes active, the best matching cell (or the least used one) wins.
//!   3. Learn on segments: adapt the segments that predicted this step and the learning segments of phase 2,
//!      and grow synapses from the previous winner cells onto the learning segments.
//!   4. Compute predictive cells: segments driven by the new active cells predict their cells for the next step.
//! - The active cells, winner cells, predictive cells and active segments of one step are the
//!   "previous" state consulted by the next step. [`TemporalMemory::reset`] clears that state at sequence boundaries.
//!
//! Randomness:
//! - All random choices draw from one seeded source, always in the same order: bursting columns in ascending
//!   column order (one draw per column, only when several cells tie for fewest segments), then learning segments
//!   in ascending segment order (one sample of growth targets per segment). Same seed and same inputs give the
//!   same outputs.

use super::connections::{Cell, Connections, Permanence, Segment};
use super::observer::{NoopObserver, Phase, PhaseSnapshot, TemporalMemoryObserver};
use super::random::Random;
use super::topology::Topology;
use crate::error::{HtmError, Result};
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::mem;
use tracing::{debug, trace};

/// Holds the parameters required for the Temporal Memory algorithm's learning and activation.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalMemoryParams {
    /// Shape of the column space; the number of columns is the product.
    pub column_dimensions: Vec<usize>,
    pub cells_per_column: usize,
    /// Active connected synapses needed for a segment to become active.
    pub activation_threshold: usize,
    /// Active potential synapses needed for a segment to count as matching.
    pub min_threshold: usize,
    pub connected_permanence: Permanence,
    /// Permanence of newly grown synapses.
    pub initial_permanence: Permanence,
    pub permanence_increment: Permanence,
    pub permanence_decrement: Permanence,
    /// Upper bound on synapses grown onto one learning segment per step.
    pub max_new_synapse_count: usize,
    pub seed: u64,
}

impl Default for TemporalMemoryParams {
    fn default() -> Self {
        Self {
            column_dimensions: vec![2048],
            cells_per_column: 32,
            activation_threshold: 13,
            min_threshold: 10,
            connected_permanence: 0.50,
            initial_permanence: 0.21,
            permanence_increment: 0.10,
            permanence_decrement: 0.10,
            max_new_synapse_count: 20,
            seed: 42,
        }
    }
}

impl TemporalMemoryParams {
    /// Checks the parameters, reporting the first problem found as a configuration error.
    pub fn validate(&self) -> Result<()> {
        if self.column_dimensions.is_empty() {
            return Err(HtmError::Configuration(
                "column dimensions must not be empty".to_string(),
            ));
        }

        if self.column_dimensions.contains(&0) {
            return Err(HtmError::Configuration(format!(
                "column dimensions must be positive, got {:?}",
                self.column_dimensions
            )));
        }

        if self.cells_per_column == 0 {
            return Err(HtmError::Configuration(
                "cells per column must be positive".to_string(),
            ));
        }

        let permanences = [
            ("connected_permanence", self.connected_permanence),
            ("initial_permanence", self.initial_permanence),
            ("permanence_increment", self.permanence_increment),
            ("permanence_decrement", self.permanence_decrement),
        ];

        for (name, value) in permanences {
            if !(0.0..=1.0).contains(&value) {
                return Err(HtmError::Configuration(format!(
                    "{} must be in [0, 1], got {}",
                    name, value
                )));
            }
        }

        Ok(())
    }
}

/// Output of phase 1.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct ActivationResult {
    pub active_cells: FxHashSet<Cell>,
    pub winner_cells: FxHashSet<Cell>,
    /// Active columns containing at least one correctly predicted cell.
    pub predicted_columns: FxHashSet<usize>,
}

/// Output of phase 2.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct BurstResult {
    /// Every cell of every bursting column.
    pub active_cells: FxHashSet<Cell>,
    /// One winner per bursting column.
    pub winner_cells: FxHashSet<Cell>,
    /// Matched or newly created segments that grow synapses in phase 3.
    pub learning_segments: FxHashSet<Segment>,
}

/// Output of phase 4.
#[derive(Debug, Default, Clone, PartialEq)]
pub struct PredictionResult {
    pub active_segments: FxHashSet<Segment>,
    pub matching_segments: FxHashSet<Segment>,
    pub predictive_cells: FxHashSet<Cell>,
}

/// Working sets of the step in progress.
#[derive(Default)]
struct StepState {
    active_columns: FxHashSet<usize>,
    prev_predictive_cells: FxHashSet<Cell>,
    predicted_columns: FxHashSet<usize>,
    active_cells: FxHashSet<Cell>,
    winner_cells: FxHashSet<Cell>,
    learning_segments: FxHashSet<Segment>,
    active_segments: FxHashSet<Segment>,
    predictive_cells: FxHashSet<Cell>,
}

impl StepState {
    fn snapshot<'a>(
        &'a self,
        phase: Phase,
        learn: bool,
        connections: &'a Connections,
    ) -> PhaseSnapshot<'a> {
        PhaseSnapshot {
            phase,
            learn,
            active_columns: &self.active_columns,
            prev_predictive_cells: &self.prev_predictive_cells,
            predicted_columns: &self.predicted_columns,
            active_cells: &self.active_cells,
            winner_cells: &self.winner_cells,
            learning_segments: &self.learning_segments,
            active_segments: &self.active_segments,
            predictive_cells: &self.predictive_cells,
            connections,
        }
    }
}

/// Implements the Temporal Memory algorithm which models the activation and learning of temporal sequences.
///
/// The Temporal Memory processes feed-forward input by activating columns and cells, predicting future activity
/// based on past patterns, and adapting synapse permanences through Hebbian-like learning rules. It operates in
/// discrete time steps; the state kept between steps is exactly what the next step reads as "previous".
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TemporalMemory {
    params: TemporalMemoryParams,
    topology: Topology,
    connections: Connections,
    rand: Random,

    // State of the last computed step (t), consulted as t-1 by the next one.
    active_cells: FxHashSet<Cell>,
    winner_cells: FxHashSet<Cell>,
    predictive_cells: FxHashSet<Cell>,
    active_segments: FxHashSet<Segment>,
    matching_segments: FxHashSet<Segment>,

    // Number of computed steps.
    t: u64,
}

impl TemporalMemory {
    /// Constructs a new Temporal Memory instance:
    /// - Validates the parameters and the column topology.
    /// - Creates an empty synapse graph over all cells.
    /// - Seeds the random source from `params.seed`.
    pub fn new(params: TemporalMemoryParams) -> Result<Self> {
        params.validate()?;
        let topology = Topology::new(&params.column_dimensions, params.cells_per_column)?;
        let connections = Connections::new(topology.num_cells());
        let rand = Random::new(params.seed);

        debug!(
            columns = topology.num_columns(),
            cells = topology.num_cells(),
            seed = params.seed,
            "initialized temporal memory"
        );

        Ok(Self {
            params,
            topology,
            connections,
            rand,
            active_cells: FxHashSet::default(),
            winner_cells: FxHashSet::default(),
            predictive_cells: FxHashSet::default(),
            active_segments: FxHashSet::default(),
            matching_segments: FxHashSet::default(),
            t: 0,
        })
    }

    /// Executes one time step of the Temporal Memory algorithm.
    ///
    /// - `active_columns` are the feed-forward active columns; duplicates are ignored.
    /// - With `learn` disabled, cells and predictions are computed as usual but the graph is not modified.
    ///
    /// Fails with a range error, before touching any state, if a column lies outside the topology.
    pub fn compute(&mut self, active_columns: &[usize], learn: bool) -> Result<()> {
        self.compute_observed(active_columns, learn, &mut NoopObserver)
    }

    /// Same as [`compute`](Self::compute), notifying `observer` after each of the four phases.
    pub fn compute_observed(
        &mut self,
        active_columns: &[usize],
        learn: bool,
        observer: &mut dyn TemporalMemoryObserver,
    ) -> Result<()> {
        let active_columns = self.validate_columns(active_columns)?;

        let prev_active_cells = mem::take(&mut self.active_cells);
        let prev_winner_cells = mem::take(&mut self.winner_cells);
        let prev_active_segments = mem::take(&mut self.active_segments);
        self.matching_segments.clear();

        let mut step = StepState {
            active_columns,
            prev_predictive_cells: mem::take(&mut self.predictive_cells),
            ..Default::default()
        };

        let activation =
            self.activate_correctly_predictive_cells(&step.prev_predictive_cells, &step.active_columns)?;
        step.active_cells = activation.active_cells;
        step.winner_cells = activation.winner_cells;
        step.predicted_columns = activation.predicted_columns;
        observer.on_phase(&step.snapshot(
            Phase::ActivateCorrectlyPredictiveCells,
            learn,
            &self.connections,
        ));

        let burst = self.burst_columns(
            &step.active_columns,
            &step.predicted_columns,
            &prev_active_cells,
            &prev_winner_cells,
            learn,
        )?;
        step.active_cells.extend(burst.active_cells);
        step.winner_cells.extend(burst.winner_cells);
        step.learning_segments = burst.learning_segments;
        observer.on_phase(&step.snapshot(Phase::BurstColumns, learn, &self.connections));

        if learn {
            self.learn_on_segments(
                &prev_active_segments,
                &step.learning_segments,
                &prev_active_cells,
                &step.winner_cells,
                &prev_winner_cells,
            )?;
        }
        observer.on_phase(&step.snapshot(Phase::LearnOnSegments, learn, &self.connections));

        let prediction = self.compute_predictive_cells(&step.active_cells);
        step.active_segments = prediction.active_segments;
        step.predictive_cells = prediction.predictive_cells;
        observer.on_phase(&step.snapshot(
            Phase::ComputePredictiveCells,
            learn,
            &self.connections,
        ));

        self.t += 1;

        debug!(
            iteration = self.t,
            learn,
            active_columns = step.active_columns.len(),
            predicted_columns = step.predicted_columns.len(),
            bursting_columns = step.active_columns.len() - step.predicted_columns.len(),
            active_cells = step.active_cells.len(),
            winner_cells = step.winner_cells.len(),
            learning_segments = step.learning_segments.len(),
            active_segments = step.active_segments.len(),
            predictive_cells = step.predictive_cells.len(),
            "computed temporal memory step"
        );

        self.active_cells = step.active_cells;
        self.winner_cells = step.winner_cells;
        self.predictive_cells = step.predictive_cells;
        self.active_segments = step.active_segments;
        self.matching_segments = prediction.matching_segments;

        Ok(())
    }

    /// Clears all state carried between steps, marking a sequence boundary.
    /// The synapse graph and the random source are left untouched.
    pub fn reset(&mut self) {
        self.active_cells.clear();
        self.winner_cells.clear();
        self.predictive_cells.clear();
        self.active_segments.clear();
        self.matching_segments.clear();
        debug!(iteration = self.t, "reset temporal memory");
    }

    /// Same as [`reset`](Self::reset), notifying `observer`.
    pub fn reset_observed(&mut self, observer: &mut dyn TemporalMemoryObserver) {
        self.reset();
        observer.on_reset();
    }

    /// Phase 1: activates the cells that were predicted in the previous step and whose column is now active.
    /// - Each such cell becomes active and winner.
    /// - Its column is recorded as predicted, so it will not burst.
    pub fn activate_correctly_predictive_cells(
        &self,
        prev_predictive_cells: &FxHashSet<Cell>,
        active_columns: &FxHashSet<usize>,
    ) -> Result<ActivationResult> {
        let mut result = ActivationResult::default();

        for &cell in prev_predictive_cells {
            let column = self.topology.column_for_cell(cell)?;
            if active_columns.contains(&column) {
                result.active_cells.insert(cell);
                result.winner_cells.insert(cell);
                result.predicted_columns.insert(column);
            }
        }

        Ok(result)
    }

    /// Phase 2: bursts the active columns that contained no correctly predicted cell.
    /// - Marks all cells in the column as active.
    /// - The owner of the best matching segment (against the previous active cells) becomes the winner,
    ///   and that segment becomes a learning segment.
    /// - Without a matching segment the least used cell wins. If learning is enabled and there are
    ///   previous winner cells to connect to, a new segment is grown on it and becomes a learning segment.
    ///
    /// Columns are visited in ascending order so random tie-breaks are reproducible.
    pub fn burst_columns(
        &mut self,
        active_columns: &FxHashSet<usize>,
        predicted_columns: &FxHashSet<usize>,
        prev_active_cells: &FxHashSet<Cell>,
        prev_winner_cells: &FxHashSet<Cell>,
        learn: bool,
    ) -> Result<BurstResult> {
        let mut result = BurstResult::default();

        let mut unpredicted_columns: Vec<usize> = active_columns
            .difference(predicted_columns)
            .copied()
            .collect();
        unpredicted_columns.sort_unstable();

        for column in unpredicted_columns {
            result
                .active_cells
                .extend(self.topology.cells_for_column(column)?);

            let (winner, matched_segment) = self.best_matching_cell(column, prev_active_cells)?;
            result.winner_cells.insert(winner);

            let learning_segment = match matched_segment {
                Some(segment) => Some(segment),
                None if learn && !prev_winner_cells.is_empty() => {
                    let segment = self.connections.create_segment(winner)?;
                    trace!(column, cell = winner, segment, "grew segment on least used cell");
                    Some(segment)
                }
                None => None,
            };

            if let Some(segment) = learning_segment {
                result.learning_segments.insert(segment);
            }
        }

        Ok(result)
    }

    /// Phase 3: adapts segments and grows new synapses.
    /// - Every segment that was active in the previous step or is a learning segment is adapted against the
    ///   previous active cells: synapses from active cells are reinforced, the others punished.
    /// - Learning segments owned by a current winner cell additionally grow up to `max_new_synapse_count`
    ///   synapses to previous winner cells they are not yet connected to.
    ///
    /// Segments are visited in ascending order so synapse sampling is reproducible.
    pub fn learn_on_segments(
        &mut self,
        prev_active_segments: &FxHashSet<Segment>,
        learning_segments: &FxHashSet<Segment>,
        prev_active_cells: &FxHashSet<Cell>,
        winner_cells: &FxHashSet<Cell>,
        prev_winner_cells: &FxHashSet<Cell>,
    ) -> Result<()> {
        let mut segments: Vec<Segment> = prev_active_segments
            .union(learning_segments)
            .copied()
            .collect();
        segments.sort_unstable();

        for segment in segments {
            self.adapt_segment(segment, prev_active_cells)?;

            if !learning_segments.contains(&segment)
                || !winner_cells.contains(&self.connections.cell_for_segment(segment)?)
            {
                continue;
            }

            let presynaptic_cells = self.pick_cells_to_learn_on(
                self.params.max_new_synapse_count,
                segment,
                prev_winner_cells,
            )?;

            for &presynaptic_cell in &presynaptic_cells {
                self.connections.create_synapse(
                    segment,
                    presynaptic_cell,
                    self.params.initial_permanence,
                )?;
            }

            if !presynaptic_cells.is_empty() {
                trace!(segment, grown = presynaptic_cells.len(), "grew synapses");
            }
        }

        Ok(())
    }

    /// Phase 4: computes the segments driven by `active_cells` and the cells they predict.
    pub fn compute_predictive_cells(&self, active_cells: &FxHashSet<Cell>) -> PredictionResult {
        let activity = self.connections.compute_activity(
            active_cells,
            self.params.connected_permanence,
            self.params.activation_threshold,
        );

        PredictionResult {
            active_segments: self
                .connections
                .active_segments(&activity)
                .into_iter()
                .collect(),
            matching_segments: self
                .connections
                .matching_segments(&activity, self.params.min_threshold)
                .into_iter()
                .collect(),
            predictive_cells: self
                .connections
                .active_cells(&activity)
                .into_iter()
                .collect(),
        }
    }

    /// Returns the best matching segment of `cell` and its number of active potential synapses.
    /// Only segments reaching `min_threshold` qualify; ties go to the lowest segment id.
    pub fn best_matching_segment(
        &self,
        cell: Cell,
        active_cells: &FxHashSet<Cell>,
    ) -> Result<Option<(Segment, usize)>> {
        let best = self.connections.most_active_segment_for_cells(
            &[cell],
            active_cells,
            self.params.min_threshold,
        )?;

        best.map(|segment| {
            self.connections
                .num_active_potential_synapses(segment, active_cells)
                .map(|count| (segment, count))
        })
        .transpose()
    }

    /// Picks the winner cell of a bursting column:
    /// - The owner of the column's best matching segment, together with that segment.
    /// - Otherwise the least used cell of the column, without a segment.
    pub fn best_matching_cell(
        &mut self,
        column: usize,
        active_cells: &FxHashSet<Cell>,
    ) -> Result<(Cell, Option<Segment>)> {
        let cells: Vec<Cell> = self.topology.cells_for_column(column)?.collect();

        match self.connections.most_active_segment_for_cells(
            &cells,
            active_cells,
            self.params.min_threshold,
        )? {
            Some(segment) => Ok((self.connections.cell_for_segment(segment)?, Some(segment))),
            None => Ok((self.least_used_cell(column)?, None)),
        }
    }

    /// Identifies and returns the cell with the fewest segments within a column:
    /// - Iterates through all cells in the column to find the minimum number of segments.
    /// - If multiple cells have the same minimum count, one is chosen at random.
    /// - A single least used cell is returned without consuming randomness.
    pub fn least_used_cell(&mut self, column: usize) -> Result<Cell> {
        let mut min_segments = usize::MAX;
        let mut min_cells = Vec::new();

        for cell in self.topology.cells_for_column(column)? {
            let seg_count = self.connections.num_segments_for_cell(cell)?;
            if seg_count < min_segments {
                min_segments = seg_count;
                min_cells.clear();
                min_cells.push(cell);
            } else if seg_count == min_segments {
                min_cells.push(cell);
            }
        }

        let cell = if min_cells.len() > 1 {
            min_cells[self.rand.index(min_cells.len())]
        } else {
            min_cells[0]
        };

        Ok(cell)
    }

    /// Picks up to `n` cells from `winner_cells` to grow synapses from onto `segment`:
    /// - Cells already presynaptic on the segment are skipped.
    /// - If there are more candidates than `n`, a uniform random subset is chosen.
    ///
    /// Returns the picked cells in ascending order.
    pub fn pick_cells_to_learn_on(
        &mut self,
        n: usize,
        segment: Segment,
        winner_cells: &FxHashSet<Cell>,
    ) -> Result<Vec<Cell>> {
        let existing: FxHashSet<Cell> = self
            .connections
            .presynaptic_cells_for_segment(segment)?
            .into_iter()
            .collect();

        let mut candidates: Vec<Cell> = winner_cells
            .iter()
            .copied()
            .filter(|cell| !existing.contains(cell))
            .collect();
        candidates.sort_unstable();

        Ok(self.rand.sample(&candidates, n))
    }

    /// Adapts `segment` against `active_cells` with the configured increment and decrement.
    pub fn adapt_segment(&mut self, segment: Segment, active_cells: &FxHashSet<Cell>) -> Result<()> {
        self.connections.adapt_segment(
            segment,
            active_cells,
            self.params.permanence_increment,
            self.params.permanence_decrement,
        )
    }

    /// Groups `cells` by their column.
    pub fn map_cells_to_columns(
        &self,
        cells: &FxHashSet<Cell>,
    ) -> Result<FxHashMap<usize, FxHashSet<Cell>>> {
        let mut columns: FxHashMap<usize, FxHashSet<Cell>> = FxHashMap::default();

        for &cell in cells {
            let column = self.topology.column_for_cell(cell)?;
            columns.entry(column).or_default().insert(cell);
        }

        Ok(columns)
    }

    /// Returns the column owning `cell`.
    pub fn column_for_cell(&self, cell: Cell) -> Result<usize> {
        self.topology.column_for_cell(cell)
    }

    /// Returns the cells of `column` in ascending order.
    pub fn cells_for_column(&self, column: usize) -> Result<Vec<Cell>> {
        Ok(self.topology.cells_for_column(column)?.collect())
    }

    pub fn number_of_columns(&self) -> usize {
        self.topology.num_columns()
    }

    pub fn number_of_cells(&self) -> usize {
        self.topology.num_cells()
    }

    pub fn column_dimensions(&self) -> &[usize] {
        self.topology.dimensions()
    }

    pub fn cells_per_column(&self) -> usize {
        self.topology.cells_per_column()
    }

    pub fn params(&self) -> &TemporalMemoryParams {
        &self.params
    }

    /// Returns the synapse graph.
    pub fn connections(&self) -> &Connections {
        &self.connections
    }

    /// Returns the synapse graph for direct edits, e.g. to wire up a known starting state.
    pub fn connections_mut(&mut self) -> &mut Connections {
        &mut self.connections
    }

    /// Number of steps computed so far.
    pub fn iteration(&self) -> u64 {
        self.t
    }

    /// Cells activated in the last step, sorted.
    pub fn active_cells(&self) -> Vec<Cell> {
        sorted(&self.active_cells)
    }

    /// Winner cells of the last step, sorted.
    pub fn winner_cells(&self) -> Vec<Cell> {
        sorted(&self.winner_cells)
    }

    /// Cells predicted for the next step, sorted.
    pub fn predictive_cells(&self) -> Vec<Cell> {
        sorted(&self.predictive_cells)
    }

    /// Segments that became active in the last step, sorted.
    pub fn active_segments(&self) -> Vec<Segment> {
        sorted(&self.active_segments)
    }

    /// Segments that matched in the last step, sorted.
    pub fn matching_segments(&self) -> Vec<Segment> {
        sorted(&self.matching_segments)
    }

    pub fn num_segments(&self) -> usize {
        self.connections.num_segments()
    }

    pub fn num_synapses(&self) -> usize {
        self.connections.num_synapses()
    }

    /// Writes the complete state (parameters, graph, random source and carried-over state) to `writer`.
    pub fn save<W: Write>(&self, writer: W) -> Result<()> {
        bincode::serialize_into(writer, self)?;
        debug!(
            iteration = self.t,
            segments = self.num_segments(),
            synapses = self.num_synapses(),
            "saved temporal memory"
        );
        Ok(())
    }

    /// Restores a temporal memory written by [`save`](Self::save).
    pub fn load<R: Read>(reader: R) -> Result<Self> {
        let tm: Self = bincode::deserialize_from(reader)?;
        tm.check_restored()?;
        debug!(
            iteration = tm.t,
            segments = tm.num_segments(),
            synapses = tm.num_synapses(),
            "loaded temporal memory"
        );
        Ok(tm)
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        let bytes = bincode::serialize(self)?;
        debug!(bytes = bytes.len(), "serialized temporal memory");
        Ok(bytes)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        let tm: Self = bincode::deserialize(bytes)?;
        tm.check_restored()?;
        debug!(bytes = bytes.len(), "deserialized temporal memory");
        Ok(tm)
    }

    /// Rejects restored state whose parts disagree with each other.
    fn check_restored(&self) -> Result<()> {
        self.params.validate()?;

        let topology = Topology::new(&self.params.column_dimensions, self.params.cells_per_column)?;
        if topology != self.topology {
            return Err(HtmError::Configuration(
                "stored topology does not match the parameters".to_string(),
            ));
        }

        if self.topology.num_cells() != self.connections.num_cells() {
            return Err(HtmError::Configuration(format!(
                "topology has {} cells but the synapse graph has {}",
                self.topology.num_cells(),
                self.connections.num_cells()
            )));
        }

        self.connections.check_integrity()?;

        let num_cells = self.connections.num_cells();
        let num_segments = self.connections.num_segments();
        let carried = [
            ("active cells", &self.active_cells, num_cells),
            ("winner cells", &self.winner_cells, num_cells),
            ("predictive cells", &self.predictive_cells, num_cells),
            ("active segments", &self.active_segments, num_segments),
            ("matching segments", &self.matching_segments, num_segments),
        ];

        for (name, ids, len) in carried {
            if let Some(id) = ids.iter().find(|&&id| id >= len) {
                return Err(HtmError::Configuration(format!(
                    "{} hold id {} outside {}",
                    name, id, len
                )));
            }
        }

        Ok(())
    }

    fn validate_columns(&self, active_columns: &[usize]) -> Result<FxHashSet<usize>> {
        active_columns
            .iter()
            .map(|&column| self.topology.check_column(column).map(|_| column))
            .collect()
    }
}

fn sorted(set: &FxHashSet<usize>) -> Vec<usize> {
    let mut items: Vec<usize> = set.iter().copied().collect();
    items.sort_unstable();
    items
}
