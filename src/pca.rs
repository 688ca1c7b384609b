// src/pca.rs

//! Principal component analysis (PCA).

use crate::diagnostics::{compute_orthogonality_error, pca_fit_diagnostics};
use crate::error::{ComputeError, Result};
use crate::linalg_backends::{BackendEigh, LinAlgBackendProvider};
use crate::matrix::{columns_to_rows, to_rows, NestedMatrix};
use log::{debug, warn};
use ndarray::{Array1, Array2, ArrayView1, Axis};
use serde::{Deserialize, Serialize};

/// Total variance at or below this is treated as a degenerate (constant) point cloud.
const ZERO_VARIANCE: f64 = 1e-12;

/// Principal component analysis structure.
///
/// Holds the centroid, the rotation matrix (principal axes as columns) and the
/// variance along each axis. Data is mean-centered but not rescaled: the
/// components are the eigenvectors of the plain covariance matrix, so they
/// live in the same units as the input points.
#[derive(Serialize, Deserialize, Debug, Clone)]
pub struct PCA {
    /// Principal axes as unit-length columns, ordered by decreasing variance.
    /// Shape: (n_features, n_features)
    rotation: Option<Array2<f64>>,
    /// Mean vector of the fitted points.
    /// Shape: (n_features)
    mean: Option<Array1<f64>>,
    /// Variance along each principal axis (covariance eigenvalues, clamped at zero).
    /// Shape: (n_features)
    explained_variance: Option<Array1<f64>>,
}

impl Default for PCA {
    fn default() -> Self {
        Self::new()
    }
}

impl PCA {
    /// Creates a new, unfitted PCA struct.
    ///
    /// # Examples
    ///
    /// ```
    /// use mosaic_compute::PCA;
    /// let pca = PCA::new();
    /// assert!(pca.mean().is_none());
    /// ```
    pub fn new() -> Self {
        Self {
            rotation: None,
            mean: None,
            explained_variance: None,
        }
    }

    /// Returns the centroid of the fitted data, if fitted.
    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    /// Returns the rotation matrix (principal components as columns), if fitted.
    pub fn rotation(&self) -> Option<&Array2<f64>> {
        self.rotation.as_ref()
    }

    /// Returns the absolute variance along each principal component, largest first.
    pub fn explained_variance(&self) -> Option<&Array1<f64>> {
        self.explained_variance.as_ref()
    }

    /// Fraction of the total variance carried by each component.
    ///
    /// Sums to 1 when the data has any spread at all. A point cloud with zero
    /// total variance yields all zeros rather than NaNs.
    pub fn explained_variance_ratio(&self) -> Option<Array1<f64>> {
        let variances = self.explained_variance.as_ref()?;
        let total: f64 = variances.sum();
        if total <= ZERO_VARIANCE {
            return Some(Array1::zeros(variances.len()));
        }
        Some(variances.mapv(|v| v / total))
    }

    /// Fits the PCA model via an eigen-decomposition of the covariance matrix.
    ///
    /// The covariance uses the unbiased `n - 1` denominator. Eigen-pairs are
    /// sorted by decreasing eigenvalue with a stable sort, so ties keep the
    /// backend's order and repeated fits of the same data agree exactly.
    ///
    /// * `data_matrix` - Input points as rows, shape (n_samples, n_features).
    ///
    /// # Errors
    /// Returns `InvalidInput` if there are fewer than 2 samples or fewer than
    /// 2 features or the covariance overflows, and `Backend` if the
    /// eigen-decomposition fails.
    ///
    /// # Examples
    ///
    /// ```
    /// use ndarray::array;
    /// use mosaic_compute::PCA;
    ///
    /// let data = array![[1.0, 2.0], [3.0, 4.0], [5.0, 7.0]];
    /// let mut pca = PCA::new();
    /// pca.fit(data).unwrap();
    /// assert_eq!(pca.rotation().unwrap().dim(), (2, 2));
    /// ```
    pub fn fit(&mut self, mut data_matrix: Array2<f64>) -> Result<()> {
        let n_samples = data_matrix.nrows();
        let n_features = data_matrix.ncols();

        if n_samples < 2 {
            return Err(ComputeError::invalid_input(format!(
                "PCA requires at least 2 points, got {}",
                n_samples
            )));
        }
        if n_features < 2 {
            return Err(ComputeError::invalid_input(format!(
                "PCA requires points with at least 2 dimensions, got {}",
                n_features
            )));
        }

        let mean_vector = data_matrix
            .mean_axis(Axis(0))
            .ok_or_else(|| ComputeError::invalid_input("Failed to compute mean of the data."))?;
        data_matrix -= &mean_vector;

        let mut cov_matrix = data_matrix.t().dot(&data_matrix);
        cov_matrix /= (n_samples - 1) as f64;
        if cov_matrix.iter().any(|v| !v.is_finite()) {
            return Err(ComputeError::invalid_input(
                "PCA input is too large in magnitude: the covariance matrix overflows",
            ));
        }

        let eig = LinAlgBackendProvider::<f64>::new().eigh_upper(&cov_matrix)?;
        if eig.eigenvalues.iter().any(|v| !v.is_finite()) {
            return Err(ComputeError::invalid_input(
                "PCA failed: the covariance eigenvalues are not finite",
            ));
        }

        let mut eig_pairs: Vec<(f64, Array1<f64>)> = eig
            .eigenvalues
            .into_iter()
            .zip(eig.eigenvectors.columns().into_iter().map(|col| col.to_owned()))
            .collect();
        eig_pairs.sort_by(|(a, _), (b, _)| b.partial_cmp(a).unwrap_or(std::cmp::Ordering::Equal));

        let mut rotation_matrix = Array2::<f64>::zeros((n_features, n_features));
        let mut sorted_eigenvalues: Vec<f64> = Vec::with_capacity(n_features);
        for (i, (eig_val, mut eig_vec)) in eig_pairs.into_iter().enumerate() {
            sorted_eigenvalues.push(eig_val.max(0.0));
            let norm = eig_vec.dot(&eig_vec).sqrt();
            if norm > 1e-12 {
                eig_vec.mapv_inplace(|x| x / norm);
            }
            rotation_matrix.column_mut(i).assign(&eig_vec);
        }

        let total: f64 = sorted_eigenvalues.iter().sum();
        if total <= ZERO_VARIANCE {
            warn!(
                "PCA input of {} points has zero total variance; explained variance will be all zeros.",
                n_samples
            );
        }
        if let Some(err) = compute_orthogonality_error(&rotation_matrix.view()) {
            debug!("PCA fit on {}x{}: orthogonality error {:e}", n_samples, n_features, err);
        }

        self.mean = Some(mean_vector);
        self.rotation = Some(rotation_matrix);
        self.explained_variance = Some(Array1::from(sorted_eigenvalues));
        Ok(())
    }

    /// Projects points into principal-component coordinates.
    ///
    /// # Errors
    /// Returns an error if the model is not fitted or the feature count differs.
    pub fn transform(&self, mut x: Array2<f64>) -> Result<Array2<f64>> {
        let (rotation, mean) = self.fitted()?;
        self.check_features(x.ncols(), mean.view())?;
        x -= mean;
        Ok(x.dot(rotation))
    }

    /// Maps principal-component coordinates back to the original space.
    ///
    /// With all components kept this is the exact inverse of [`PCA::transform`]
    /// up to floating-point error, since the rotation is orthonormal.
    pub fn inverse_transform(&self, scores: Array2<f64>) -> Result<Array2<f64>> {
        let (rotation, mean) = self.fitted()?;
        self.check_features(scores.ncols(), mean.view())?;
        let mut restored = scores.dot(&rotation.t());
        restored += mean;
        Ok(restored)
    }

    fn fitted(&self) -> Result<(&Array2<f64>, &Array1<f64>)> {
        match (&self.rotation, &self.mean) {
            (Some(rotation), Some(mean)) => Ok((rotation, mean)),
            _ => Err(ComputeError::invalid_input("PCA not fitted yet.")),
        }
    }

    fn check_features(&self, n_features: usize, mean: ArrayView1<f64>) -> Result<()> {
        if n_features != mean.len() {
            return Err(ComputeError::invalid_input(format!(
                "Input has {} features, but the PCA model was fitted with {}",
                n_features,
                mean.len()
            )));
        }
        Ok(())
    }
}

/// Everything the PCA view needs, in wire form.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResult {
    /// Unit-length principal directions, one inner vector per component.
    pub principal_components: NestedMatrix,
    /// Variance fraction per component, descending, co-indexed with the components.
    pub explained_variance: Vec<f64>,
    /// Each input point in principal-component coordinates.
    pub projected_data: NestedMatrix,
    /// Centroid of the input points.
    pub mean: Vec<f64>,
}

/// Fits a PCA on `data` and projects the same points.
pub fn compute_pca(data: &Array2<f64>) -> Result<PcaResult> {
    let mut pca = PCA::new();
    pca.fit(data.clone())?;
    let projected = pca.transform(data.clone())?;
    let (rotation, mean) = pca.fitted()?;
    let ratios = pca
        .explained_variance_ratio()
        .ok_or_else(|| ComputeError::invalid_input("PCA not fitted yet."))?;
    if let Some(diag) = pca_fit_diagnostics(&pca, data) {
        debug!(
            "PCA diagnostics: reconstruction error {:?}, orthogonality error {:?}, variance ratio sum {:?}",
            diag.reconstruction_error_rel, diag.orthogonality_error, diag.explained_variance_ratio_sum
        );
    }

    Ok(PcaResult {
        principal_components: columns_to_rows(rotation.view()),
        explained_variance: ratios.to_vec(),
        projected_data: to_rows(projected.view()),
        mean: mean.to_vec(),
    })
}
