// src/linalg_backends.rs

//! Trait seam over the LAPACK routines the crate needs.

#[derive(Debug, Default, Copy, Clone)]
pub struct LinAlgBackendProvider<F: 'static + Copy + Send + Sync> {
    _phantom: PhantomData<F>,
}

impl<F: 'static + Copy + Send + Sync> LinAlgBackendProvider<F> {
    pub fn new() -> Self {
        Self { _phantom: PhantomData }
    }
}

use crate::error::ThreadSafeStdError;
use ndarray::{Array1, Array2};
use ndarray_linalg::c64;
use std::error::Error;
use std::marker::PhantomData;

// --- Trait Definitions ---

/// Output of a symmetric eigendecomposition.
#[derive(Debug)]
pub struct EighOutput<F: 'static> {
    /// Eigenvalues, sorted in ascending order.
    pub eigenvalues: Array1<F>,
    /// Eigenvectors as columns of the matrix.
    /// eigenvector_matrix.column(i) corresponds to eigenvalues[i].
    pub eigenvectors: Array2<F>,
}

/// Trait for symmetric eigendecomposition (LAPACK's DSYEV family).
/// Implementers expect `matrix` to be symmetric and only read the upper triangle.
pub trait BackendEigh<F: 'static + Copy + Send + Sync> {
    fn eigh_upper(&self, matrix: &Array2<F>) -> Result<EighOutput<F>, ThreadSafeStdError>;
}

/// Output of a general (non-symmetric) eigendecomposition.
#[derive(Debug)]
pub struct EigOutput {
    /// Eigenvalues in the backend's native order. Complex conjugate pairs
    /// are adjacent, positive imaginary part first.
    pub eigenvalues: Array1<c64>,
    /// Right eigenvectors as columns, each with unit Euclidean norm.
    pub eigenvectors: Array2<c64>,
}

/// Trait for general eigendecomposition of a real square matrix (LAPACK's DGEEV).
pub trait BackendEig<F: 'static + Copy + Send + Sync> {
    fn eig(&self, matrix: &Array2<F>) -> Result<EigOutput, ThreadSafeStdError>;
}

/// Trait for the determinant of a square matrix via LU factorization.
pub trait BackendDeterminant<F: 'static + Copy + Send + Sync> {
    fn det(&self, matrix: &Array2<F>) -> Result<F, ThreadSafeStdError>;
}

// --- NdarrayLinAlgBackend Implementation ---
use ndarray_linalg::{Determinant as NdLinalgDeterminant, Eig as NdLinalgEig, Eigh as NdLinalgEigh, UPLO};

#[derive(Debug, Default, Copy, Clone)]
pub struct NdarrayLinAlgBackend;

// Helper to convert ndarray-linalg's error to Box<dyn Error + Send + Sync>
fn to_dyn_error<E: Error + Send + Sync + 'static>(e: E) -> ThreadSafeStdError {
    Box::new(e)
}

fn ensure_square<F>(matrix: &Array2<F>, operation: &str) -> Result<(), ThreadSafeStdError> {
    if matrix.nrows() != matrix.ncols() {
        return Err(format!(
            "Matrix must be square for {}, got shape ({}, {})",
            operation,
            matrix.nrows(),
            matrix.ncols()
        )
        .into());
    }
    Ok(())
}

impl BackendEigh<f64> for NdarrayLinAlgBackend {
    fn eigh_upper(&self, matrix: &Array2<f64>) -> Result<EighOutput<f64>, ThreadSafeStdError> {
        ensure_square(matrix, "eigendecomposition")?;
        if matrix.is_empty() {
            return Ok(EighOutput { eigenvalues: Array1::zeros(0), eigenvectors: Array2::zeros((0, 0)) });
        }
        let (eigenvalues, eigenvectors) = matrix.eigh(UPLO::Upper).map_err(to_dyn_error)?;
        Ok(EighOutput { eigenvalues, eigenvectors })
    }
}

impl BackendEig<f64> for NdarrayLinAlgBackend {
    fn eig(&self, matrix: &Array2<f64>) -> Result<EigOutput, ThreadSafeStdError> {
        ensure_square(matrix, "eigendecomposition")?;
        if matrix.is_empty() {
            return Ok(EigOutput { eigenvalues: Array1::zeros(0), eigenvectors: Array2::zeros((0, 0)) });
        }
        let (eigenvalues, eigenvectors) = matrix.eig().map_err(to_dyn_error)?;
        Ok(EigOutput { eigenvalues, eigenvectors })
    }
}

impl BackendDeterminant<f64> for NdarrayLinAlgBackend {
    fn det(&self, matrix: &Array2<f64>) -> Result<f64, ThreadSafeStdError> {
        ensure_square(matrix, "determinant")?;
        if matrix.is_empty() {
            // Empty product.
            return Ok(1.0);
        }
        matrix.det().map_err(to_dyn_error)
    }
}

// --- LinAlgBackendProvider Dispatch ---
//
// The provider is what the rest of the crate talks to. The LAPACK flavour
// underneath (OpenBLAS or MKL, static or system) is picked by cargo features.

impl<F> BackendEigh<F> for LinAlgBackendProvider<F>
where
    F: 'static + Copy + Send + Sync,
    NdarrayLinAlgBackend: BackendEigh<F>,
{
    fn eigh_upper(&self, matrix: &Array2<F>) -> Result<EighOutput<F>, ThreadSafeStdError> {
        NdarrayLinAlgBackend.eigh_upper(matrix)
    }
}

impl<F> BackendEig<F> for LinAlgBackendProvider<F>
where
    F: 'static + Copy + Send + Sync,
    NdarrayLinAlgBackend: BackendEig<F>,
{
    fn eig(&self, matrix: &Array2<F>) -> Result<EigOutput, ThreadSafeStdError> {
        NdarrayLinAlgBackend.eig(matrix)
    }
}

impl<F> BackendDeterminant<F> for LinAlgBackendProvider<F>
where
    F: 'static + Copy + Send + Sync,
    NdarrayLinAlgBackend: BackendDeterminant<F>,
{
    fn det(&self, matrix: &Array2<F>) -> Result<F, ThreadSafeStdError> {
        NdarrayLinAlgBackend.det(matrix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn eigh_returns_ascending_eigenvalues() {
        let backend = LinAlgBackendProvider::<f64>::new();
        let out = backend.eigh_upper(&array![[2.0, 1.0], [1.0, 2.0]]).unwrap();
        assert_abs_diff_eq!(out.eigenvalues[0], 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.eigenvalues[1], 3.0, epsilon = 1e-12);
        assert_eq!(out.eigenvectors.dim(), (2, 2));
    }

    #[test]
    fn eig_reports_complex_pairs_for_rotations() {
        let backend = LinAlgBackendProvider::<f64>::new();
        let out = backend.eig(&array![[0.0, -1.0], [1.0, 0.0]]).unwrap();
        assert_abs_diff_eq!(out.eigenvalues[0].re, 0.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.eigenvalues[0].im.abs(), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(out.eigenvalues[0].im, -out.eigenvalues[1].im, epsilon = 1e-12);
    }

    #[test]
    fn det_uses_lu_for_larger_matrices() {
        let backend = LinAlgBackendProvider::<f64>::new();
        let m = array![[2.0, 0.0, 1.0], [1.0, 3.0, 2.0], [1.0, 1.0, 2.0]];
        assert_abs_diff_eq!(backend.det(&m).unwrap(), 6.0, epsilon = 1e-10);
    }

    #[test]
    fn non_square_input_is_rejected() {
        let backend = LinAlgBackendProvider::<f64>::new();
        let m = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let err = backend.det(&m).unwrap_err();
        assert!(err.to_string().contains("must be square"));
        assert!(backend.eig(&m).is_err());
    }
}
