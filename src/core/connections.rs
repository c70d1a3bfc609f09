//! `Connections` is the permanence-based synapse graph of a temporal memory layer.
//!
//! Every cell may own dendritic segments, every segment owns synapses, and every synapse points
//! to one presynaptic cell and carries a permanence in `[0, 1]`. A synapse is "connected" when its
//! permanence reaches the connected threshold.
//!
//! Segments and synapses live in two flat pools indexed by their id. Ids are handed out in
//! creation order and never reused or compacted, so callers hold plain integer handles that
//! stay valid for the lifetime of the graph. Nothing outside this module ever holds a reference
//! into the pools across a mutation.
//!
//! Besides the forward links (cell -> segments -> synapses) the graph keeps a reverse index from
//! presynaptic cell to the synapses reading from it. Activity computation walks only that index
//! for the active cells, so its cost scales with the activity, not with the size of the graph.

use crate::error::{HtmError, Result};
use fxhash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

/// Index of a cell in `[0, num_cells)`.
pub type Cell = usize;
/// Id of a dendritic segment, assigned at creation.
pub type Segment = usize;
/// Id of a synapse, assigned at creation.
pub type Synapse = usize;
/// Synapse strength.
pub type Permanence = f64;

pub const MIN_PERMANENCE: Permanence = 0.0;
pub const MAX_PERMANENCE: Permanence = 1.0;

/// A dendritic segment: the cell it belongs to and the synapses it owns, in creation order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SegmentData {
    pub cell: Cell,
    synapses: Vec<Synapse>,
}

impl SegmentData {
    /// Synapses on this segment, in creation order.
    pub fn synapses(&self) -> &[Synapse] {
        &self.synapses
    }
}

/// A synapse: owning segment, presynaptic cell and permanence.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SynapseData {
    pub segment: Segment,
    pub presynaptic_cell: Cell,
    pub permanence: Permanence,
}

/// Counters gathered for a single segment during an activity pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SegmentActivity {
    /// Active synapses whose permanence is at or above the connected threshold.
    pub connected: usize,
    /// All active synapses, connected or not.
    pub potential: usize,
}

/// The result of one activity pass over the graph.
///
/// Only segments with at least one active synapse are recorded; every other segment has zero in
/// both counters.
#[derive(Debug, Clone, PartialEq)]
pub struct Activity {
    segments: FxHashMap<Segment, SegmentActivity>,
    activation_threshold: usize,
}

impl Activity {
    /// Number of active connected synapses on `segment`.
    #[inline]
    pub fn num_active_connected(&self, segment: Segment) -> usize {
        self.segments.get(&segment).map_or(0, |a| a.connected)
    }

    /// Number of active potential synapses on `segment`.
    #[inline]
    pub fn num_active_potential(&self, segment: Segment) -> usize {
        self.segments.get(&segment).map_or(0, |a| a.potential)
    }

    /// The activation threshold this pass was computed with.
    #[inline]
    pub fn activation_threshold(&self) -> usize {
        self.activation_threshold
    }

    /// All segments touched by the pass, sorted by id.
    pub fn segments(&self) -> Vec<Segment> {
        let mut segments: Vec<Segment> = self.segments.keys().copied().collect();
        segments.sort_unstable();
        segments
    }
}

/// The synapse graph of one layer of cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Connections {
    /// Segment ids owned by each cell, in creation order.
    segments_for_cell: Vec<Vec<Segment>>,

    /// All segments, indexed by `Segment`.
    segments: Vec<SegmentData>,

    /// All synapses, indexed by `Synapse`.
    synapses: Vec<SynapseData>,

    /// Reverse index: presynaptic cell -> synapses reading from it.
    synapses_for_presynaptic_cell: Vec<Vec<Synapse>>,
}

impl Connections {
    /// Creates an empty graph over `num_cells` cells.
    pub fn new(num_cells: usize) -> Self {
        Self {
            segments_for_cell: vec![Vec::new(); num_cells],
            segments: Vec::new(),
            synapses: Vec::new(),
            synapses_for_presynaptic_cell: vec![Vec::new(); num_cells],
        }
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.segments_for_cell.len()
    }

    #[inline]
    pub fn num_segments(&self) -> usize {
        self.segments.len()
    }

    #[inline]
    pub fn num_synapses(&self) -> usize {
        self.synapses.len()
    }

    /// Appends a new segment to `cell` and returns its id.
    pub fn create_segment(&mut self, cell: Cell) -> Result<Segment> {
        if cell >= self.num_cells() {
            return Err(HtmError::InvalidCell {
                cell,
                num_cells: self.num_cells(),
            });
        }

        let segment = self.segments.len();
        self.segments.push(SegmentData {
            cell,
            synapses: Vec::new(),
        });
        self.segments_for_cell[cell].push(segment);

        Ok(segment)
    }

    /// Appends a new synapse from `presynaptic_cell` onto `segment` and returns its id.
    ///
    /// The permanence is stored as given. Several synapses on one segment may share a
    /// presynaptic cell.
    pub fn create_synapse(
        &mut self,
        segment: Segment,
        presynaptic_cell: Cell,
        permanence: Permanence,
    ) -> Result<Synapse> {
        if segment >= self.segments.len() {
            return Err(HtmError::InvalidSegment { segment });
        }
        if presynaptic_cell >= self.num_cells() {
            return Err(HtmError::InvalidCell {
                cell: presynaptic_cell,
                num_cells: self.num_cells(),
            });
        }

        let synapse = self.synapses.len();
        self.synapses.push(SynapseData {
            segment,
            presynaptic_cell,
            permanence,
        });
        self.segments[segment].synapses.push(synapse);
        self.synapses_for_presynaptic_cell[presynaptic_cell].push(synapse);

        Ok(synapse)
    }

    /// Segments owned by `cell`, in creation order.
    pub fn segments_for_cell(&self, cell: Cell) -> Result<&[Segment]> {
        self.segments_for_cell
            .get(cell)
            .map(Vec::as_slice)
            .ok_or(HtmError::NotFound { kind: "cell", id: cell })
    }

    /// Number of segments owned by `cell`.
    pub fn num_segments_for_cell(&self, cell: Cell) -> Result<usize> {
        self.segments_for_cell(cell).map(<[Segment]>::len)
    }

    /// Synapses owned by `segment`, in creation order.
    pub fn synapses_for_segment(&self, segment: Segment) -> Result<&[Synapse]> {
        self.data_for_segment(segment).map(SegmentData::synapses)
    }

    pub fn data_for_segment(&self, segment: Segment) -> Result<&SegmentData> {
        self.segments.get(segment).ok_or(HtmError::NotFound {
            kind: "segment",
            id: segment,
        })
    }

    /// The cell owning `segment`.
    pub fn cell_for_segment(&self, segment: Segment) -> Result<Cell> {
        self.data_for_segment(segment).map(|data| data.cell)
    }

    /// Owning segment, presynaptic cell and permanence of `synapse`.
    pub fn data_for_synapse(&self, synapse: Synapse) -> Result<SynapseData> {
        self.synapses
            .get(synapse)
            .copied()
            .ok_or(HtmError::NotFound {
                kind: "synapse",
                id: synapse,
            })
    }

    /// Presynaptic cells of the synapses on `segment`, in synapse order.
    pub fn presynaptic_cells_for_segment(&self, segment: Segment) -> Result<Vec<Cell>> {
        Ok(self
            .synapses_for_segment(segment)?
            .iter()
            .map(|&syn| self.synapses[syn].presynaptic_cell)
            .collect())
    }

    /// Sets the permanence of `synapse`, clamped to `[0, 1]`.
    pub fn update_synapse_permanence(
        &mut self,
        synapse: Synapse,
        permanence: Permanence,
    ) -> Result<()> {
        let data = self
            .synapses
            .get_mut(synapse)
            .ok_or(HtmError::InvalidSynapse { synapse })?;
        data.permanence = permanence.clamp(MIN_PERMANENCE, MAX_PERMANENCE);
        Ok(())
    }

    /// Verifies that all internal links agree with each other:
    /// - every segment belongs to a valid cell and is listed under that cell,
    /// - every synapse belongs to a listed segment and reads from a valid cell,
    /// - the reverse index covers every cell and points back at matching synapses.
    ///
    /// A graph built through `create_segment` / `create_synapse` always passes. Decoded graphs
    /// are checked with this before use, so lookups never hit a dangling id.
    pub fn check_integrity(&self) -> Result<()> {
        let num_cells = self.num_cells();

        if self.synapses_for_presynaptic_cell.len() != num_cells {
            return Err(HtmError::Configuration(format!(
                "reverse index covers {} cells, expected {}",
                self.synapses_for_presynaptic_cell.len(),
                num_cells
            )));
        }

        let mut listed_segments = 0;
        for (cell, segments) in self.segments_for_cell.iter().enumerate() {
            for &segment in segments {
                match self.segments.get(segment) {
                    Some(data) if data.cell == cell => listed_segments += 1,
                    _ => {
                        return Err(HtmError::Configuration(format!(
                            "cell {} lists segment {} it does not own",
                            cell, segment
                        )))
                    }
                }
            }
        }

        if listed_segments != self.segments.len() {
            return Err(HtmError::Configuration(format!(
                "{} segments are listed under cells, graph has {}",
                listed_segments,
                self.segments.len()
            )));
        }

        let mut owned_synapses = 0;
        for (segment, data) in self.segments.iter().enumerate() {
            if data.cell >= num_cells {
                return Err(HtmError::Configuration(format!(
                    "segment {} belongs to cell {} outside {} cells",
                    segment, data.cell, num_cells
                )));
            }

            for &synapse in &data.synapses {
                match self.synapses.get(synapse) {
                    Some(syn) if syn.segment == segment => owned_synapses += 1,
                    _ => {
                        return Err(HtmError::Configuration(format!(
                            "segment {} lists synapse {} it does not own",
                            segment, synapse
                        )))
                    }
                }
            }
        }

        if owned_synapses != self.synapses.len() {
            return Err(HtmError::Configuration(format!(
                "{} synapses are listed under segments, graph has {}",
                owned_synapses,
                self.synapses.len()
            )));
        }

        for (synapse, data) in self.synapses.iter().enumerate() {
            if data.segment >= self.segments.len() || data.presynaptic_cell >= num_cells {
                return Err(HtmError::Configuration(format!(
                    "synapse {} references segment {} and cell {} out of range",
                    synapse, data.segment, data.presynaptic_cell
                )));
            }
        }

        let mut indexed_synapses = 0;
        for (cell, synapses) in self.synapses_for_presynaptic_cell.iter().enumerate() {
            for &synapse in synapses {
                match self.synapses.get(synapse) {
                    Some(syn) if syn.presynaptic_cell == cell => indexed_synapses += 1,
                    _ => {
                        return Err(HtmError::Configuration(format!(
                            "reverse index of cell {} lists synapse {} not reading from it",
                            cell, synapse
                        )))
                    }
                }
            }
        }

        if indexed_synapses != self.synapses.len() {
            return Err(HtmError::Configuration(format!(
                "reverse index holds {} synapses, graph has {}",
                indexed_synapses,
                self.synapses.len()
            )));
        }

        Ok(())
    }

    /// Counts, for every segment, the active synapses given the set of active presynaptic cells.
    ///
    /// Walks the reverse index of each active cell: every synapse found bumps its segment's
    /// potential counter, and also its connected counter when the permanence is at least
    /// `connected_permanence`. Active cells outside the graph have no synapses and are ignored.
    pub fn compute_activity(
        &self,
        active_cells: &FxHashSet<Cell>,
        connected_permanence: Permanence,
        activation_threshold: usize,
    ) -> Activity {
        let mut segments: FxHashMap<Segment, SegmentActivity> = FxHashMap::default();

        for &cell in active_cells {
            let Some(synapses) = self.synapses_for_presynaptic_cell.get(cell) else {
                continue;
            };

            for &synapse in synapses {
                let data = &self.synapses[synapse];
                let counters = segments.entry(data.segment).or_default();
                counters.potential += 1;
                if data.permanence >= connected_permanence {
                    counters.connected += 1;
                }
            }
        }

        Activity {
            segments,
            activation_threshold,
        }
    }

    /// Segments whose connected counter reaches the activation threshold, sorted by id.
    pub fn active_segments(&self, activity: &Activity) -> Vec<Segment> {
        let mut segments: Vec<Segment> = activity
            .segments
            .iter()
            .filter(|(_, counters)| counters.connected >= activity.activation_threshold)
            .map(|(&segment, _)| segment)
            .collect();
        segments.sort_unstable();
        segments
    }

    /// Distinct cells owning an active segment, sorted.
    pub fn active_cells(&self, activity: &Activity) -> Vec<Cell> {
        let mut cells: Vec<Cell> = self
            .active_segments(activity)
            .into_iter()
            .map(|segment| self.segments[segment].cell)
            .collect();
        cells.sort_unstable();
        cells.dedup();
        cells
    }

    /// Segments whose potential counter reaches `min_threshold`, sorted by id.
    pub fn matching_segments(&self, activity: &Activity, min_threshold: usize) -> Vec<Segment> {
        let mut segments: Vec<Segment> = activity
            .segments
            .iter()
            .filter(|(_, counters)| counters.potential >= min_threshold)
            .map(|(&segment, _)| segment)
            .collect();
        segments.sort_unstable();
        segments
    }

    /// Number of synapses on `segment` whose presynaptic cell is in `active_cells`, regardless
    /// of permanence.
    pub fn num_active_potential_synapses(
        &self,
        segment: Segment,
        active_cells: &FxHashSet<Cell>,
    ) -> Result<usize> {
        Ok(self
            .synapses_for_segment(segment)?
            .iter()
            .filter(|&&syn| active_cells.contains(&self.synapses[syn].presynaptic_cell))
            .count())
    }

    /// Among all segments of `cells`, returns the one with the most active potential synapses
    /// against `active_cells`, provided that count reaches `min_threshold`.
    ///
    /// Ties go to the lowest segment id, so the result never depends on iteration order.
    pub fn most_active_segment_for_cells(
        &self,
        cells: &[Cell],
        active_cells: &FxHashSet<Cell>,
        min_threshold: usize,
    ) -> Result<Option<Segment>> {
        let mut best: Option<(Segment, usize)> = None;

        for &cell in cells {
            for &segment in self.segments_for_cell(cell)? {
                let count = self.num_active_potential_synapses(segment, active_cells)?;
                if count < min_threshold {
                    continue;
                }

                let better = match best {
                    None => true,
                    Some((best_segment, best_count)) => {
                        count > best_count || (count == best_count && segment < best_segment)
                    }
                };

                if better {
                    best = Some((segment, count));
                }
            }
        }

        Ok(best.map(|(segment, _)| segment))
    }

    /// Reinforces the synapses of `segment` whose presynaptic cell was active and punishes the
    /// rest. Resulting permanences are clamped to `[0, 1]`.
    pub fn adapt_segment(
        &mut self,
        segment: Segment,
        active_cells: &FxHashSet<Cell>,
        permanence_increment: Permanence,
        permanence_decrement: Permanence,
    ) -> Result<()> {
        let segment_data = self
            .segments
            .get(segment)
            .ok_or(HtmError::InvalidSegment { segment })?;

        for &synapse in &segment_data.synapses {
            let syn = &mut self.synapses[synapse];
            let delta = if active_cells.contains(&syn.presynaptic_cell) {
                permanence_increment
            } else {
                -permanence_decrement
            };
            syn.permanence = (syn.permanence + delta).clamp(MIN_PERMANENCE, MAX_PERMANENCE);
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    const EPSILON: f64 = 1e-6;

    fn set(cells: &[Cell]) -> FxHashSet<Cell> {
        cells.iter().copied().collect()
    }

    fn permanence(connections: &Connections, synapse: Synapse) -> Permanence {
        connections.data_for_synapse(synapse).unwrap().permanence
    }

    /// Four segments on cells 0, 0, 1 and 8, used by several tests below.
    fn sample_graph() -> Connections {
        let mut connections = Connections::new(1024);

        let seg = connections.create_segment(0).unwrap();
        connections.create_synapse(seg, 23, 0.6).unwrap();
        connections.create_synapse(seg, 37, 0.4).unwrap();
        connections.create_synapse(seg, 477, 0.9).unwrap();

        let seg = connections.create_segment(0).unwrap();
        connections.create_synapse(seg, 49, 0.9).unwrap();
        connections.create_synapse(seg, 3, 0.8).unwrap();

        let seg = connections.create_segment(1).unwrap();
        connections.create_synapse(seg, 733, 0.7).unwrap();

        let seg = connections.create_segment(8).unwrap();
        connections.create_synapse(seg, 486, 0.9).unwrap();

        connections
    }

    #[test]
    fn ids_are_assigned_in_creation_order() {
        let connections = sample_graph();

        assert_eq!(connections.num_segments(), 4);
        assert_eq!(connections.num_synapses(), 7);
        assert_eq!(connections.segments_for_cell(0).unwrap(), &[0, 1]);
        assert_eq!(connections.segments_for_cell(1).unwrap(), &[2]);
        assert_eq!(connections.synapses_for_segment(1).unwrap(), &[3, 4]);
        assert_eq!(connections.cell_for_segment(3).unwrap(), 8);

        let data = connections.data_for_synapse(5).unwrap();
        assert_eq!(data.segment, 2);
        assert_eq!(data.presynaptic_cell, 733);
        assert!((data.permanence - 0.7).abs() < EPSILON);
    }

    #[test]
    fn invalid_references_are_rejected() {
        let mut connections = sample_graph();

        assert!(matches!(
            connections.create_segment(1024),
            Err(HtmError::InvalidCell { cell: 1024, .. })
        ));
        assert!(matches!(
            connections.create_synapse(99, 0, 0.5),
            Err(HtmError::InvalidSegment { segment: 99 })
        ));
        assert!(matches!(
            connections.create_synapse(0, 5000, 0.5),
            Err(HtmError::InvalidCell { cell: 5000, .. })
        ));
        assert!(matches!(
            connections.update_synapse_permanence(42, 0.5),
            Err(HtmError::InvalidSynapse { synapse: 42 })
        ));
        assert!(matches!(
            connections.adapt_segment(12, &set(&[]), 0.1, 0.1),
            Err(HtmError::InvalidSegment { segment: 12 })
        ));

        // Failed creations leave the graph untouched.
        assert_eq!(connections.num_segments(), 4);
        assert_eq!(connections.num_synapses(), 7);
    }

    #[test]
    fn lookups_on_unknown_ids_fail() {
        let connections = sample_graph();

        assert!(matches!(
            connections.segments_for_cell(2048),
            Err(HtmError::NotFound { kind: "cell", id: 2048 })
        ));
        assert!(matches!(
            connections.synapses_for_segment(4),
            Err(HtmError::NotFound { kind: "segment", id: 4 })
        ));
        assert!(matches!(
            connections.data_for_synapse(7),
            Err(HtmError::NotFound { kind: "synapse", id: 7 })
        ));
    }

    #[test]
    fn compute_activity_counts_connected_and_potential() {
        let mut connections = Connections::new(1024);

        let seg = connections.create_segment(0).unwrap();
        connections.create_synapse(seg, 23, 0.6).unwrap();
        connections.create_synapse(seg, 37, 0.5).unwrap();
        connections.create_synapse(seg, 477, 0.9).unwrap();

        let seg = connections.create_segment(1).unwrap();
        connections.create_synapse(seg, 733, 0.7).unwrap();
        connections.create_synapse(seg, 733, 0.4).unwrap();

        let seg = connections.create_segment(1).unwrap();
        connections.create_synapse(seg, 974, 0.9).unwrap();

        let seg = connections.create_segment(8).unwrap();
        connections.create_synapse(seg, 486, 0.9).unwrap();

        connections.create_segment(100).unwrap();

        let activity = connections.compute_activity(&set(&[23, 37, 733, 974]), 0.5, 2);

        assert_eq!(activity.num_active_connected(0), 2);
        assert_eq!(activity.num_active_potential(0), 2);
        assert_eq!(activity.num_active_connected(1), 1);
        assert_eq!(activity.num_active_potential(1), 2);
        assert_eq!(activity.num_active_connected(2), 1);
        assert_eq!(activity.num_active_potential(3), 0);
        assert_eq!(activity.segments(), vec![0, 1, 2]);

        assert_eq!(connections.active_segments(&activity), vec![0]);
        assert_eq!(connections.active_cells(&activity), vec![0]);
        assert_eq!(connections.matching_segments(&activity, 2), vec![0, 1]);
    }

    #[test]
    fn compute_activity_is_idempotent() {
        let connections = sample_graph();
        let active = set(&[23, 37, 49, 733]);

        let first = connections.compute_activity(&active, 0.5, 1);
        let second = connections.compute_activity(&active, 0.5, 1);

        assert_eq!(first, second);
    }

    #[test]
    fn active_cells_are_distinct() {
        let connections = sample_graph();
        let activity = connections.compute_activity(&set(&[23, 49, 733]), 0.5, 1);

        assert_eq!(connections.active_segments(&activity), vec![0, 1, 2]);
        assert_eq!(connections.active_cells(&activity), vec![0, 1]);
    }

    #[test]
    fn most_active_segment_prefers_highest_count() {
        let connections = sample_graph();
        let active = set(&[23, 37, 49, 733]);

        assert_eq!(
            connections
                .most_active_segment_for_cells(&[0, 1, 2, 3], &active, 1)
                .unwrap(),
            Some(0)
        );
        assert_eq!(
            connections
                .most_active_segment_for_cells(&[1], &active, 1)
                .unwrap(),
            Some(2)
        );
        assert_eq!(
            connections
                .most_active_segment_for_cells(&[8], &active, 1)
                .unwrap(),
            None
        );
        assert_eq!(
            connections
                .most_active_segment_for_cells(&[0, 1, 2, 3], &active, 3)
                .unwrap(),
            None
        );
    }

    #[test]
    fn most_active_segment_ties_go_to_lowest_id() {
        let mut connections = Connections::new(16);
        let a = connections.create_segment(3).unwrap();
        connections.create_synapse(a, 9, 0.2).unwrap();
        let b = connections.create_segment(1).unwrap();
        connections.create_synapse(b, 9, 0.9).unwrap();

        let best = connections
            .most_active_segment_for_cells(&[1, 3], &set(&[9]), 1)
            .unwrap();
        assert_eq!(best, Some(a));
    }

    #[test]
    fn adapt_segment_punishes_inactive_synapses() {
        let mut connections = sample_graph();
        connections.adapt_segment(0, &set(&[0, 1]), 0.1, 0.1).unwrap();

        assert!((permanence(&connections, 0) - 0.5).abs() < EPSILON);
        assert!((permanence(&connections, 1) - 0.3).abs() < EPSILON);
        assert!((permanence(&connections, 2) - 0.8).abs() < EPSILON);
    }

    #[test]
    fn adapt_segment_reinforces_active_synapses() {
        let mut connections = sample_graph();
        connections.adapt_segment(0, &set(&[23, 37]), 0.1, 0.1).unwrap();

        assert!((permanence(&connections, 0) - 0.7).abs() < EPSILON);
        assert!((permanence(&connections, 1) - 0.5).abs() < EPSILON);
        assert!((permanence(&connections, 2) - 0.8).abs() < EPSILON);
        // Other segments are untouched.
        assert!((permanence(&connections, 3) - 0.9).abs() < EPSILON);
    }

    #[test]
    fn adapt_segment_clamps_to_max() {
        let mut connections = Connections::new(64);
        let seg = connections.create_segment(0).unwrap();
        let syn = connections.create_synapse(seg, 23, 0.9).unwrap();

        connections.adapt_segment(seg, &set(&[23]), 0.1, 0.1).unwrap();
        assert!((permanence(&connections, syn) - 1.0).abs() < EPSILON);

        connections.adapt_segment(seg, &set(&[23]), 0.1, 0.1).unwrap();
        assert!((permanence(&connections, syn) - 1.0).abs() < EPSILON);
    }

    #[test]
    fn adapt_segment_clamps_to_min() {
        let mut connections = Connections::new(64);
        let seg = connections.create_segment(0).unwrap();
        let syn = connections.create_synapse(seg, 23, 0.1).unwrap();

        connections.adapt_segment(seg, &set(&[]), 0.1, 0.1).unwrap();
        assert!(permanence(&connections, syn).abs() < EPSILON);

        connections.adapt_segment(seg, &set(&[]), 0.1, 0.1).unwrap();
        assert!(permanence(&connections, syn).abs() < EPSILON);
    }

    #[test]
    fn update_synapse_permanence_clamps() {
        let mut connections = sample_graph();
        connections.update_synapse_permanence(0, 1.7).unwrap();
        connections.update_synapse_permanence(1, -0.3).unwrap();

        assert!((permanence(&connections, 0) - 1.0).abs() < EPSILON);
        assert!(permanence(&connections, 1).abs() < EPSILON);
    }

    #[test]
    fn integrity_of_built_graph() {
        assert!(sample_graph().check_integrity().is_ok());
        assert!(Connections::new(8).check_integrity().is_ok());
    }

    #[test]
    fn integrity_rejects_dangling_synapse_on_segment() {
        let mut connections = sample_graph();
        connections.segments[0].synapses[0] = 99;

        assert!(matches!(
            connections.check_integrity(),
            Err(HtmError::Configuration(_))
        ));
    }

    #[test]
    fn integrity_rejects_broken_links() {
        let mut connections = sample_graph();
        connections.segments[3].cell = 5000;
        assert!(connections.check_integrity().is_err());

        let mut connections = sample_graph();
        connections.synapses[6].presynaptic_cell = 5000;
        assert!(connections.check_integrity().is_err());

        let mut connections = sample_graph();
        connections.synapses[6].segment = 2;
        assert!(connections.check_integrity().is_err());

        let mut connections = sample_graph();
        connections.segments_for_cell[1].push(0);
        assert!(connections.check_integrity().is_err());

        let mut connections = sample_graph();
        connections.synapses_for_presynaptic_cell[23].push(40);
        assert!(connections.check_integrity().is_err());

        let mut connections = sample_graph();
        connections.synapses_for_presynaptic_cell.pop();
        assert!(connections.check_integrity().is_err());
    }

    proptest! {
        #[test]
        fn prop_adaptation_stays_in_bounds(
            initial in proptest::collection::vec(0.0f64..=1.0, 1..8),
            rounds in proptest::collection::vec((any::<bool>(), 0.0f64..0.5, 0.0f64..0.5), 1..30),
        ) {
            let mut connections = Connections::new(16);
            let seg = connections.create_segment(0).unwrap();
            for (i, &perm) in initial.iter().enumerate() {
                connections.create_synapse(seg, i + 1, perm).unwrap();
            }

            for (active, inc, dec) in rounds {
                let active_cells = if active { (1..16).collect() } else { FxHashSet::default() };
                connections.adapt_segment(seg, &active_cells, inc, dec).unwrap();
                for &syn in connections.synapses_for_segment(seg).unwrap() {
                    let perm = connections.data_for_synapse(syn).unwrap().permanence;
                    prop_assert!((MIN_PERMANENCE..=MAX_PERMANENCE).contains(&perm));
                }
            }
        }
    }
}
