// src/matrix.rs

//! Conversions between the nested-array wire format and `ndarray` storage.
//!
//! Every payload arrives as `Vec<Vec<f64>>`. These helpers enforce the shape
//! invariants (rectangular rows, square where required, shared point
//! dimensionality) once, so the numerical code can assume well-formed input.

use crate::error::{ComputeError, Result};
use ndarray::{Array2, ArrayView2};

/// Row-major nested representation used on the wire.
pub type NestedMatrix = Vec<Vec<f64>>;

/// Builds a rectangular matrix, rejecting ragged or empty input.
pub fn matrix_from_rows(rows: &[Vec<f64>]) -> Result<Array2<f64>> {
    let n_rows = rows.len();
    if n_rows == 0 {
        return Err(ComputeError::invalid_input("Matrix must not be empty"));
    }
    let n_cols = rows[0].len();
    if n_cols == 0 {
        return Err(ComputeError::invalid_input("Matrix rows must not be empty"));
    }
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != n_cols) {
        return Err(ComputeError::invalid_input(format!(
            "Matrix rows must all have length {}, but row {} has length {}",
            n_cols,
            idx,
            row.len()
        )));
    }
    check_finite(rows.iter().flatten(), "Matrix")?;
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((n_rows, n_cols), flat)
        .map_err(|e| ComputeError::invalid_input(format!("Invalid matrix shape: {}", e)))
}

/// Builds a square matrix of order at most `max_order`.
pub fn square_matrix_from_rows(rows: &[Vec<f64>], max_order: usize) -> Result<Array2<f64>> {
    let matrix = matrix_from_rows(rows)?;
    let (n_rows, n_cols) = matrix.dim();
    if n_rows != n_cols {
        return Err(ComputeError::invalid_input(format!(
            "Matrix must be square, got shape ({}, {})",
            n_rows, n_cols
        )));
    }
    if n_rows > max_order {
        return Err(ComputeError::invalid_input(format!(
            "Matrix order {} exceeds the supported maximum of {}",
            n_rows, max_order
        )));
    }
    Ok(matrix)
}

/// Builds a point set (one point per row) with shared dimensionality.
///
/// An empty list is a valid point set; `expected_dim` is then reported as the
/// column count so the result still has a meaningful shape.
pub fn points_from_rows(rows: &[Vec<f64>], expected_dim: Option<usize>) -> Result<Array2<f64>> {
    let dim = match (rows.first(), expected_dim) {
        (Some(first), _) => first.len(),
        (None, Some(d)) => return Ok(Array2::zeros((0, d))),
        (None, None) => return Ok(Array2::zeros((0, 0))),
    };
    if let Some((idx, row)) = rows.iter().enumerate().find(|(_, r)| r.len() != dim) {
        return Err(ComputeError::invalid_input(format!(
            "All points must have dimensionality {}, but point {} has {}",
            dim,
            idx,
            row.len()
        )));
    }
    if let Some(expected) = expected_dim {
        if dim != expected {
            return Err(ComputeError::invalid_input(format!(
                "Point dimensionality {} does not match matrix dimensionality {}",
                dim, expected
            )));
        }
    }
    check_finite(rows.iter().flatten(), "Points")?;
    let flat: Vec<f64> = rows.iter().flatten().copied().collect();
    Array2::from_shape_vec((rows.len(), dim), flat)
        .map_err(|e| ComputeError::invalid_input(format!("Invalid point set shape: {}", e)))
}

fn check_finite<'a>(mut values: impl Iterator<Item = &'a f64>, what: &str) -> Result<()> {
    if values.any(|v| !v.is_finite()) {
        return Err(ComputeError::invalid_input(format!(
            "{} must contain only finite numbers",
            what
        )));
    }
    Ok(())
}

/// Back to the nested wire format, row by row.
pub fn to_rows(matrix: ArrayView2<f64>) -> NestedMatrix {
    matrix.rows().into_iter().map(|row| row.to_vec()).collect()
}

/// Back to the nested wire format, one inner vector per column.
pub fn columns_to_rows(matrix: ArrayView2<f64>) -> NestedMatrix {
    matrix.columns().into_iter().map(|col| col.to_vec()).collect()
}
