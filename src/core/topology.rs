//! Topology represents the column space of a temporal memory layer and the cells stacked in it.
//!
//! Columns live in an N-dimensional space described by a list of dimensions. The space is
//! flattened into linear indices using precomputed strides (row-major, last dimension varies fastest).
//!
//! Each column owns `cells_per_column` contiguous cells, so cell `c` belongs to column
//! `c / cells_per_column` and column `k` owns the cells `k * cells_per_column .. (k + 1) * cells_per_column`.

use crate::error::{HtmError, Result};
use serde::{Deserialize, Serialize};
use std::ops::Range;

/// The shape of the column space plus the number of cells per column.
/// `dims` stores the size of each dimension, `strides` the cumulative products used to
/// convert coordinates into linear column indices.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Topology {
    dims: Vec<usize>,
    strides: Vec<usize>,
    cells_per_column: usize,
}

impl Topology {
    /// Creates a new `Topology`, rejecting empty or zero-sized dimensions, zero cells per
    /// column, and shapes whose cell count does not fit in `usize`.
    pub fn new(column_dimensions: &[usize], cells_per_column: usize) -> Result<Self> {
        if column_dimensions.is_empty() {
            return Err(HtmError::Configuration(
                "column dimensions must not be empty".to_string(),
            ));
        }

        if let Some(pos) = column_dimensions.iter().position(|&dim| dim == 0) {
            return Err(HtmError::Configuration(format!(
                "column dimension {} must be positive",
                pos
            )));
        }

        if cells_per_column == 0 {
            return Err(HtmError::Configuration(
                "cells per column must be positive".to_string(),
            ));
        }

        // Strides and cell ids stay below num_cells, so one check covers them all.
        column_dimensions
            .iter()
            .try_fold(cells_per_column, |cells, &dim| cells.checked_mul(dim))
            .ok_or_else(|| {
                HtmError::Configuration(format!(
                    "{:?} columns of {} cells overflow the cell index",
                    column_dimensions, cells_per_column
                ))
            })?;

        let dims = column_dimensions.to_vec();
        let strides = Self::strides(&dims);

        Ok(Self {
            dims,
            strides,
            cells_per_column,
        })
    }

    /// Computes the stride values for each dimension.
    #[inline]
    fn strides(dims: &[usize]) -> Vec<usize> {
        let mut strides = vec![1; dims.len()];

        for i in (0..dims.len() - 1).rev() {
            strides[i] = strides[i + 1] * dims[i + 1];
        }

        strides
    }

    /// The size of each column dimension.
    #[inline]
    pub fn dimensions(&self) -> &[usize] {
        &self.dims
    }

    #[inline]
    pub fn cells_per_column(&self) -> usize {
        self.cells_per_column
    }

    /// Number of columns, the product of all dimensions.
    #[inline]
    pub fn num_columns(&self) -> usize {
        self.dims.iter().product()
    }

    #[inline]
    pub fn num_cells(&self) -> usize {
        self.num_columns() * self.cells_per_column
    }

    /// Returns the column owning `cell`.
    #[inline]
    pub fn column_for_cell(&self, cell: usize) -> Result<usize> {
        self.check_cell(cell)?;
        Ok(cell / self.cells_per_column)
    }

    /// Returns the contiguous range of cells owned by `column`.
    #[inline]
    pub fn cells_for_column(&self, column: usize) -> Result<Range<usize>> {
        self.check_column(column)?;
        let start = column * self.cells_per_column;
        Ok(start..start + self.cells_per_column)
    }

    /// Converts a linear column index into its coordinates, one per dimension.
    pub fn coordinates(&self, column: usize) -> Result<Vec<usize>> {
        self.check_column(column)?;
        let mut remainder = column;

        Ok(self
            .strides
            .iter()
            .map(|&stride| {
                let coord = remainder / stride;
                remainder %= stride;
                coord
            })
            .collect())
    }

    /// Converts coordinates back into a linear column index.
    /// The number of coordinates must match the number of dimensions and each coordinate must
    /// lie inside its dimension.
    pub fn index_from_coordinates(&self, coords: &[usize]) -> Result<usize> {
        if coords.len() != self.dims.len() {
            return Err(HtmError::Configuration(format!(
                "expected {} coordinates, got {}",
                self.dims.len(),
                coords.len()
            )));
        }

        for (&coord, &dim) in coords.iter().zip(&self.dims) {
            if coord >= dim {
                return Err(HtmError::Range {
                    kind: "coordinate",
                    index: coord,
                    len: dim,
                });
            }
        }

        Ok(coords.iter().zip(&self.strides).map(|(&c, &s)| c * s).sum())
    }

    #[inline]
    pub fn check_column(&self, column: usize) -> Result<()> {
        let len = self.num_columns();
        if column >= len {
            return Err(HtmError::Range {
                kind: "column",
                index: column,
                len,
            });
        }
        Ok(())
    }

    #[inline]
    pub fn check_cell(&self, cell: usize) -> Result<()> {
        let len = self.num_cells();
        if cell >= len {
            return Err(HtmError::Range {
                kind: "cell",
                index: cell,
                len,
            });
        }
        Ok(())
    }
}
