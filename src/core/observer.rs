//! Read-only hooks into the temporal memory's per-step computation.
//!
//! Monitoring and debugging tools subscribe to a running temporal memory instead of wrapping or
//! extending it. The temporal memory notifies the observer once after each of its four phases,
//! handing out a snapshot that borrows the working state of the current step.

use super::connections::{Cell, Connections, Segment};
use fxhash::FxHashSet;

/// The four phases of one temporal memory step, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    ActivateCorrectlyPredictiveCells,
    BurstColumns,
    LearnOnSegments,
    ComputePredictiveCells,
}

/// The working state of a step as seen at a phase boundary.
///
/// Sets produced by a later phase are empty until that phase has run.
#[derive(Debug, Clone, Copy)]
pub struct PhaseSnapshot<'a> {
    /// The phase that just completed.
    pub phase: Phase,
    pub learn: bool,
    pub active_columns: &'a FxHashSet<usize>,
    /// Predictive cells carried over from the previous step.
    pub prev_predictive_cells: &'a FxHashSet<Cell>,
    /// Active columns that contained a correctly predicted cell.
    pub predicted_columns: &'a FxHashSet<usize>,
    pub active_cells: &'a FxHashSet<Cell>,
    pub winner_cells: &'a FxHashSet<Cell>,
    pub learning_segments: &'a FxHashSet<Segment>,
    pub active_segments: &'a FxHashSet<Segment>,
    pub predictive_cells: &'a FxHashSet<Cell>,
    pub connections: &'a Connections,
}

/// Subscriber notified by [`TemporalMemory::compute_observed`](super::temporal_memory::TemporalMemory::compute_observed).
pub trait TemporalMemoryObserver {
    /// Called once after every phase of a step.
    fn on_phase(&mut self, snapshot: &PhaseSnapshot<'_>);

    /// Called when the temporal memory is reset at a sequence boundary.
    fn on_reset(&mut self) {}
}

/// Observer that ignores every notification.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl TemporalMemoryObserver for NoopObserver {
    #[inline]
    fn on_phase(&mut self, _snapshot: &PhaseSnapshot<'_>) {}
}
