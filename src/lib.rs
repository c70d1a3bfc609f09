//! Hierarchical Temporal Memory (HTM) sequence memory in Rust.
//!
//! The crate implements the temporal memory layer of HTM: a sparse, permanence-based synapse
//! graph (`Connections`) and the four-phase algorithm that, on every time step, activates cells,
//! bursts unpredicted columns, adapts synapses and predicts the next step.
//!
//! ```rust
//! use htm_temporal_memory::core::temporal_memory::{TemporalMemory, TemporalMemoryParams};
//!
//! let mut tm = TemporalMemory::new(TemporalMemoryParams {
//!     column_dimensions: vec![64],
//!     cells_per_column: 4,
//!     ..Default::default()
//! })
//! .unwrap();
//!
//! tm.compute(&[1, 7, 12], true).unwrap();
//! assert_eq!(tm.active_cells().len(), 3 * 4);
//! ```
//!
//! The spatial pooler that produces active columns is not part of this crate; any source of
//! column indices in `[0, number_of_columns)` can drive the temporal memory.

pub mod core;
pub mod error;

pub use error::{HtmError, Result};
