// src/linear_ops.rs

//! Linear maps over points and grids, determinants and eigen-decomposition.

use crate::error::{ComputeError, Result};
use crate::linalg_backends::{BackendDeterminant, BackendEig, LinAlgBackendProvider};
use float_cmp::approx_eq;
use log::{debug, trace};
use ndarray::{Array1, Array2, ArrayView1};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Imaginary parts smaller than this (relative to the eigenvalue's scale)
/// are treated as round-off and the eigenvalue is reported as real.
const COMPLEX_TOLERANCE: f64 = 1e-12;

/// Where the points to transform come from.
#[derive(Debug, Clone)]
pub enum PointSource {
    /// Explicit points, one per row.
    Points(Array2<f64>),
    /// A synthetic square grid centered at the origin.
    Grid { size: usize, range: f64 },
}

/// Result of applying a matrix to a point set.
#[derive(Debug, Clone)]
pub struct TransformOutput {
    pub original: Array2<f64>,
    pub transformed: Array2<f64>,
}

/// Generates the line grid drawn by the visualization client.
///
/// `size` samples are taken over `[-range, range]` on each axis. The first
/// `size * size` rows are the horizontal lines (y fixed, x varying), the next
/// `size * size` rows are the vertical lines (x fixed, y varying). The client
/// relies on exactly this layout to join consecutive samples into lines.
///
/// # Examples
///
/// ```
/// use mosaic_compute::linear_ops::generate_grid;
/// let grid = generate_grid(5, 2.0);
/// assert_eq!(grid.dim(), (50, 2));
/// ```
pub fn generate_grid(size: usize, range: f64) -> Array2<f64> {
    let axis = linspace(-range, range, size);
    let mut grid = Array2::<f64>::zeros((2 * size * size, 2));

    // Horizontal lines
    for (i, &y) in axis.iter().enumerate() {
        for (j, &x) in axis.iter().enumerate() {
            let row = i * size + j;
            grid[[row, 0]] = x;
            grid[[row, 1]] = y;
        }
    }
    // Vertical lines, appended after the horizontal ones
    let offset = size * size;
    for (i, &x) in axis.iter().enumerate() {
        for (j, &y) in axis.iter().enumerate() {
            let row = offset + i * size + j;
            grid[[row, 0]] = x;
            grid[[row, 1]] = y;
        }
    }
    grid
}

/// Evenly spaced samples with both endpoints included exactly.
pub(crate) fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n - 1) as f64;
            let mut values: Vec<f64> = (0..n).map(|i| start + step * i as f64).collect();
            values[n - 1] = stop;
            values
        }
    }
}

/// Applies `matrix` to every row of `points` (`p' = M p`).
pub fn transform_points(points: &Array2<f64>, matrix: &Array2<f64>) -> Array2<f64> {
    points.dot(&matrix.t())
}

/// Transforms explicit points or a generated grid.
///
/// # Errors
/// Returns `InvalidInput` when the matrix is not square, when point and
/// matrix dimensionality differ, or when grid parameters are unusable.
pub fn transform(matrix: &Array2<f64>, source: PointSource, max_grid_size: usize) -> Result<TransformOutput> {
    let order = ensure_square(matrix)?;
    let original = match source {
        PointSource::Points(points) => {
            if points.ncols() != order && points.nrows() > 0 {
                return Err(ComputeError::invalid_input(format!(
                    "Point dimensionality {} does not match matrix dimensionality {}",
                    points.ncols(),
                    order
                )));
            }
            points
        }
        PointSource::Grid { size, range } => {
            if order != 2 {
                return Err(ComputeError::invalid_input(format!(
                    "Grid generation requires a 2x2 matrix, got shape ({}, {})",
                    order, order
                )));
            }
            if size == 0 || size > max_grid_size {
                return Err(ComputeError::invalid_input(format!(
                    "grid_size must be between 1 and {}, got {}",
                    max_grid_size, size
                )));
            }
            if !range.is_finite() || range <= 0.0 {
                return Err(ComputeError::invalid_input(format!(
                    "grid_range must be a positive finite number, got {}",
                    range
                )));
            }
            generate_grid(size, range)
        }
    };
    let original = if original.nrows() == 0 {
        Array2::zeros((0, order))
    } else {
        original
    };
    let transformed = transform_points(&original, matrix);
    if transformed.iter().any(|v| !v.is_finite()) {
        return Err(ComputeError::invalid_input(
            "Transformed points overflow the floating-point range",
        ));
    }
    Ok(TransformOutput { original, transformed })
}

/// Determinant of a square matrix.
///
/// Orders 1 and 2 use the closed form; larger matrices go through the
/// backend's LU factorization.
pub fn determinant(matrix: &Array2<f64>) -> Result<f64> {
    let order = ensure_square(matrix)?;
    let det = match order {
        1 => matrix[[0, 0]],
        2 => matrix[[0, 0]] * matrix[[1, 1]] - matrix[[0, 1]] * matrix[[1, 0]],
        _ => LinAlgBackendProvider::<f64>::new().det(matrix)?,
    };
    if !det.is_finite() {
        return Err(ComputeError::invalid_input(format!(
            "Determinant of the {}x{} matrix overflows the floating-point range",
            order, order
        )));
    }
    debug!("Determinant of {}x{} matrix: {}", order, order, det);
    Ok(det)
}

/// An eigenvalue of a real matrix: either real, or one half of a complex
/// conjugate pair.
///
/// On the wire a real eigenvalue is a plain number and a complex one is
/// `[real, imaginary]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(from = "WireEigenvalue", into = "WireEigenvalue")]
pub enum Eigenvalue {
    Real(f64),
    Complex { re: f64, im: f64 },
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum WireEigenvalue {
    Real(f64),
    Complex([f64; 2]),
}

impl From<WireEigenvalue> for Eigenvalue {
    fn from(wire: WireEigenvalue) -> Self {
        match wire {
            WireEigenvalue::Real(v) => Eigenvalue::Real(v),
            WireEigenvalue::Complex([re, im]) => Eigenvalue::Complex { re, im },
        }
    }
}

impl From<Eigenvalue> for WireEigenvalue {
    fn from(value: Eigenvalue) -> Self {
        match value {
            Eigenvalue::Real(v) => WireEigenvalue::Real(v),
            Eigenvalue::Complex { re, im } => WireEigenvalue::Complex([re, im]),
        }
    }
}

impl Eigenvalue {
    fn classify(re: f64, im: f64) -> Self {
        let scale = re.abs().max(1.0);
        if approx_eq!(f64, im, 0.0, epsilon = COMPLEX_TOLERANCE * scale) {
            Eigenvalue::Real(re)
        } else {
            Eigenvalue::Complex { re, im }
        }
    }

    pub fn re(&self) -> f64 {
        match *self {
            Eigenvalue::Real(v) => v,
            Eigenvalue::Complex { re, .. } => re,
        }
    }

    pub fn im(&self) -> f64 {
        match *self {
            Eigenvalue::Real(_) => 0.0,
            Eigenvalue::Complex { im, .. } => im,
        }
    }

    pub fn is_real(&self) -> bool {
        matches!(self, Eigenvalue::Real(_))
    }

    /// Modulus |λ|, the length the client scales the paired direction by.
    pub fn magnitude(&self) -> f64 {
        self.re().hypot(self.im())
    }
}

/// Eigenvalues and co-indexed real eigenvector directions.
///
/// `eigenvectors[i]` belongs to `eigenvalues[i]`. Order is the backend's
/// native (LAPACK `geev`) order, which is deterministic for identical input;
/// complex conjugate pairs are adjacent with the positive imaginary part first.
///
/// Every eigenvector is real and unit length. For a complex eigenvalue the true
/// eigenvector is complex; the direction reported is the normalized real part
/// of it (or the imaginary part when the real part vanishes). This is an
/// approximation kept for the 2D visualization, which draws one real arrow per
/// eigen-pair.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EigenResult {
    pub eigenvalues: Vec<Eigenvalue>,
    pub eigenvectors: Vec<Vec<f64>>,
}

impl EigenResult {
    pub fn pairs(&self) -> impl Iterator<Item = (&Eigenvalue, &[f64])> {
        self.eigenvalues
            .iter()
            .zip(self.eigenvectors.iter().map(|v| v.as_slice()))
    }
}

/// Eigenvalues and eigenvectors of a real square matrix.
pub fn eigen(matrix: &Array2<f64>) -> Result<EigenResult> {
    let order = ensure_square(matrix)?;
    let out = LinAlgBackendProvider::<f64>::new().eig(matrix)?;
    if out.eigenvalues.iter().any(|z| !z.re.is_finite() || !z.im.is_finite()) {
        return Err(ComputeError::invalid_input(
            "Eigenvalues overflow the floating-point range",
        ));
    }

    let mut eigenvalues = Vec::with_capacity(order);
    let mut eigenvectors = Vec::with_capacity(order);
    for (i, lambda) in out.eigenvalues.iter().enumerate() {
        let value = Eigenvalue::classify(lambda.re, lambda.im);
        let column = out.eigenvectors.column(i);
        let re_part: Array1<f64> = column.mapv(|z| z.re);
        let im_part: Array1<f64> = column.mapv(|z| z.im);
        let direction = if value.is_real() || norm(re_part.view()) > COMPLEX_TOLERANCE {
            unit(re_part)
        } else {
            unit(im_part)
        };
        trace!("Eigen-pair {}: {:?} -> {:?}", i, value, direction);
        eigenvalues.push(value);
        eigenvectors.push(direction.to_vec());
    }
    debug!(
        "Eigen-decomposition of {}x{} matrix: {} real, {} complex eigenvalues",
        order,
        order,
        eigenvalues.iter().filter(|v| v.is_real()).count(),
        eigenvalues.iter().filter(|v| !v.is_real()).count()
    );
    Ok(EigenResult { eigenvalues, eigenvectors })
}

fn norm(v: ArrayView1<f64>) -> f64 {
    v.dot(&v).sqrt()
}

fn unit(mut v: Array1<f64>) -> Array1<f64> {
    let n = norm(v.view());
    if n > COMPLEX_TOLERANCE {
        v.mapv_inplace(|x| x / n);
    }
    v
}

fn ensure_square(matrix: &Array2<f64>) -> Result<usize> {
    let (rows, cols) = matrix.dim();
    if rows != cols || rows == 0 {
        return Err(ComputeError::invalid_input(format!(
            "Matrix must be square, got shape ({}, {})",
            rows, cols
        )));
    }
    Ok(rows)
}

// --- 2D matrix constructors ---

/// Counter-clockwise rotation by `angle` radians.
pub fn rotation_matrix(angle: f64) -> Array2<f64> {
    let (sin_a, cos_a) = angle.sin_cos();
    ndarray::array![[cos_a, -sin_a], [sin_a, cos_a]]
}

pub fn scale_matrix(sx: f64, sy: f64) -> Array2<f64> {
    ndarray::array![[sx, 0.0], [0.0, sy]]
}

/// Shear: `x' = x + kx*y`, `y' = ky*x + y`.
pub fn shear_matrix(kx: f64, ky: f64) -> Array2<f64> {
    ndarray::array![[1.0, kx], [ky, 1.0]]
}

/// Axis to reflect across.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReflectionAxis {
    X,
    Y,
}

impl FromStr for ReflectionAxis {
    type Err = ComputeError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "x" => Ok(ReflectionAxis::X),
            "y" => Ok(ReflectionAxis::Y),
            _ => Err(ComputeError::invalid_input("Axis must be 'x' or 'y'")),
        }
    }
}

pub fn reflection_matrix(axis: ReflectionAxis) -> Array2<f64> {
    match axis {
        ReflectionAxis::X => ndarray::array![[1.0, 0.0], [0.0, -1.0]],
        ReflectionAxis::Y => ndarray::array![[-1.0, 0.0], [0.0, 1.0]],
    }
}
