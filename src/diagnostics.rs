// src/diagnostics.rs

//! Fit-quality metrics for a PCA model.

use crate::pca::PCA;
use ndarray::{Array2, ArrayView2};
use serde::{Deserialize, Serialize};

/// Quality metrics for a fitted PCA, measured against the data it was fitted on.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PcaFitDiagnostics {
    pub n_samples: usize,
    pub n_features: usize,
    pub orthogonality_error: Option<f64>,      // ||I - R^T R||_F
    pub reconstruction_error_rel: Option<f64>, // ||X - inverse(transform(X))||_F / ||X||_F
    pub explained_variance_ratio_sum: Option<f64>,
}

/// Computes the Frobenius norm of a matrix.
pub fn compute_frob_norm(matrix: &ArrayView2<f64>) -> f64 {
    if matrix.is_empty() {
        return 0.0;
    }
    matrix.iter().map(|&x| x * x).sum::<f64>().sqrt()
}

/// Computes orthogonality error ||I - Q^T Q||_F.
pub fn compute_orthogonality_error(q_matrix: &ArrayView2<f64>) -> Option<f64> {
    if q_matrix.nrows() == 0 || q_matrix.ncols() == 0 {
        return None;
    }
    let qtq = q_matrix.t().dot(q_matrix);
    let identity = Array2::<f64>::eye(qtq.nrows());
    let diff = identity - qtq;
    Some(compute_frob_norm(&diff.view()))
}

/// Computes the relative reconstruction error ||A - B||_F / ||A||_F.
pub fn compute_reconstruction_error(original: &ArrayView2<f64>, reconstructed: &ArrayView2<f64>) -> Option<f64> {
    if original.is_empty() || original.dim() != reconstructed.dim() {
        return None;
    }
    let diff = original - reconstructed;
    let norm_diff = compute_frob_norm(&diff.view());
    let norm_original = compute_frob_norm(original);
    if norm_original < 1e-12 {
        if norm_diff < 1e-12 {
            Some(0.0)
        } else {
            Some(f64::INFINITY)
        }
    } else {
        Some(norm_diff / norm_original)
    }
}

/// Collects the fit-quality metrics of `pca` on `data`.
///
/// Returns `None` if the model is not fitted or `data` has the wrong width.
pub fn pca_fit_diagnostics(pca: &PCA, data: &Array2<f64>) -> Option<PcaFitDiagnostics> {
    let rotation = pca.rotation()?;
    let scores = pca.transform(data.clone()).ok()?;
    let restored = pca.inverse_transform(scores).ok()?;
    Some(PcaFitDiagnostics {
        n_samples: data.nrows(),
        n_features: data.ncols(),
        orthogonality_error: compute_orthogonality_error(&rotation.view()),
        reconstruction_error_rel: compute_reconstruction_error(&data.view(), &restored.view()),
        explained_variance_ratio_sum: pca.explained_variance_ratio().map(|r| r.sum()),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::array;

    #[test]
    fn frob_norm_of_known_matrix() {
        let m = array![[3.0, 0.0], [0.0, 4.0]];
        assert_abs_diff_eq!(compute_frob_norm(&m.view()), 5.0, epsilon = 1e-12);
    }

    #[test]
    fn identity_is_perfectly_orthogonal() {
        let eye = Array2::<f64>::eye(3);
        assert_abs_diff_eq!(compute_orthogonality_error(&eye.view()).unwrap(), 0.0, epsilon = 1e-15);
        let skewed = array![[1.0, 1.0], [0.0, 1.0]];
        assert!(compute_orthogonality_error(&skewed.view()).unwrap() > 0.5);
    }

    #[test]
    fn reconstruction_error_handles_zero_matrices() {
        let zeros = Array2::<f64>::zeros((2, 2));
        assert_eq!(compute_reconstruction_error(&zeros.view(), &zeros.view()), Some(0.0));
        let ones = Array2::<f64>::ones((2, 2));
        assert_eq!(
            compute_reconstruction_error(&zeros.view(), &ones.view()),
            Some(f64::INFINITY)
        );
        assert_eq!(compute_reconstruction_error(&ones.view(), &zeros.view()), Some(1.0));
    }

    #[test]
    fn unfitted_model_has_no_diagnostics() {
        assert!(pca_fit_diagnostics(&PCA::new(), &array![[1.0, 2.0]]).is_none());
    }
}
