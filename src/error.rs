//! Error types shared by the synapse graph and the temporal memory.
//!
//! Every accessor on the graph validates the ids it is given and reports a typed error
//! instead of falling back to a default. These errors point at a bug in the caller, so
//! nothing in the crate ever retries them.

use thiserror::Error;

/// Main error type for temporal memory operations.
#[derive(Error, Debug)]
pub enum HtmError {
    /// Invalid parameters given at construction.
    #[error("Invalid configuration: {0}")]
    Configuration(String),

    /// A cell id outside `[0, num_cells)` was handed to a mutating graph operation.
    #[error("Invalid cell {cell} (number of cells: {num_cells})")]
    InvalidCell {
        /// The offending cell.
        cell: usize,
        /// Number of cells in the graph.
        num_cells: usize,
    },

    /// A segment id that was never created was handed to a mutating graph operation.
    #[error("Invalid segment {segment}")]
    InvalidSegment {
        /// The offending segment.
        segment: usize,
    },

    /// A synapse id that was never created was handed to a mutating graph operation.
    #[error("Invalid synapse {synapse}")]
    InvalidSynapse {
        /// The offending synapse.
        synapse: usize,
    },

    /// A lookup was given an unknown id.
    #[error("No {kind} with id {id}")]
    NotFound {
        /// Which entity was looked up ("cell", "segment", "synapse").
        kind: &'static str,
        /// The unknown id.
        id: usize,
    },

    /// An index outside its index space, such as a column or cell outside the layer topology.
    #[error("{kind} index {index} out of range (size: {len})")]
    Range {
        /// Which index space was violated ("column", "cell", "pattern", ...).
        kind: &'static str,
        /// The offending index.
        index: usize,
        /// The size of the index space.
        len: usize,
    },

    /// Encoding or decoding of persisted state failed.
    #[error("Persistence error: {0}")]
    Persistence(#[from] bincode::Error),

    /// I/O failure while reading or writing persisted state.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias using [`HtmError`].
pub type Result<T> = std::result::Result<T, HtmError>;
