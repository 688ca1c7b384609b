// src/statistics.rs

//! Descriptive statistics and chart data over a parsed [`Dataset`].

use crate::error::{ComputeError, Result};
use crate::linear_ops::linspace;
use crate::tabular::{Dataset, OrderedMap};
use log::{debug, warn};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

/// Eight-figure summary of one numeric column.
///
/// All figures except `count` and `missing` are computed over present values only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnStatistics {
    pub mean: f64,
    pub median: f64,
    /// Sample standard deviation (`n - 1` denominator); `None` with a single value.
    pub std: Option<f64>,
    pub min: f64,
    pub max: f64,
    pub q25: f64,
    pub q75: f64,
    pub count: usize,
    pub missing: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramResult {
    pub counts: Vec<u64>,
    pub bin_edges: Vec<f64>,
    pub bin_centers: Vec<f64>,
}

/// Index-aligned value pairs of two columns, missing rows dropped.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterResult {
    pub x: Vec<f64>,
    pub y: Vec<f64>,
}

/// Pearson correlation matrix over the numeric columns, `None` where undefined.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CorrelationResult {
    pub columns: Vec<String>,
    pub values: Vec<Vec<Option<f64>>>,
}

/// R-7 quantile (linear interpolation between order statistics) of sorted data.
pub fn quantile_sorted(sorted: &[f64], p: f64) -> Option<f64> {
    let n = sorted.len();
    if n == 0 || !(0.0..=1.0).contains(&p) {
        return None;
    }
    if n == 1 {
        return Some(sorted[0]);
    }
    let h = (n - 1) as f64 * p;
    let j = h.floor() as usize;
    let g = h - h.floor();
    if j + 1 >= n {
        Some(sorted[n - 1])
    } else {
        Some((1.0 - g) * sorted[j] + g * sorted[j + 1])
    }
}

/// Summarizes a column's values; `None` when no value is present.
pub fn describe(values: &[Option<f64>]) -> Option<ColumnStatistics> {
    let mut present: Vec<f64> = values.iter().flatten().copied().collect();
    let count = present.len();
    if count == 0 {
        return None;
    }
    present.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));

    let mean = present.iter().sum::<f64>() / count as f64;
    let std = (count > 1).then(|| {
        let ss: f64 = present.iter().map(|v| (v - mean).powi(2)).sum();
        (ss / (count - 1) as f64).sqrt()
    });

    Some(ColumnStatistics {
        mean,
        median: quantile_sorted(&present, 0.5)?,
        std,
        min: present[0],
        max: present[count - 1],
        q25: quantile_sorted(&present, 0.25)?,
        q75: quantile_sorted(&present, 0.75)?,
        count,
        missing: values.len() - count,
    })
}

/// Statistics for every numeric column, in header order.
///
/// Numeric columns without a single present value are left out.
pub fn compute_statistics(dataset: &Dataset) -> OrderedMap<ColumnStatistics> {
    let columns = dataset.numeric_column_values();
    let summaries: Vec<(String, Option<ColumnStatistics>)> = columns
        .par_iter()
        .map(|(name, values)| (name.to_string(), describe(values)))
        .collect();

    OrderedMap(
        summaries
            .into_iter()
            .filter_map(|(name, stats)| {
                if stats.is_none() {
                    warn!("Column '{}' has no values; omitted from statistics", name);
                }
                stats.map(|s| (name, s))
            })
            .collect(),
    )
}

/// Checks a requested bin count against `1..=max_bins`.
pub fn validate_bins(bins: i64, max_bins: usize) -> Result<usize> {
    match usize::try_from(bins) {
        Ok(b) if (1..=max_bins).contains(&b) => Ok(b),
        _ => Err(ComputeError::invalid_upload(format!(
            "bins must be between 1 and {}, got {}",
            max_bins, bins
        ))),
    }
}

/// Equal-width histogram over the present values of `column`.
///
/// Bins are half-open `[e_i, e_i+1)` except the last, which also includes its
/// upper edge. A constant column is binned over `[v - 0.5, v + 0.5]`.
pub fn histogram(dataset: &Dataset, column: &str, bins: usize) -> Result<HistogramResult> {
    if bins == 0 {
        return Err(ComputeError::invalid_upload("bins must be a positive integer"));
    }
    let values: Vec<f64> = dataset.numeric_column(column)?.iter().flatten().copied().collect();
    if values.is_empty() {
        return Err(ComputeError::invalid_upload(format!(
            "Column '{}' has no values to plot",
            column
        )));
    }

    let (mut lo, mut hi) = values
        .iter()
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| (lo.min(v), hi.max(v)));
    if lo == hi {
        warn!("Column '{}' is constant ({}); widening histogram range", column, lo);
        lo -= 0.5;
        hi += 0.5;
    }
    debug!("Histogram of '{}': {} bins over [{}, {}]", column, bins, lo, hi);

    let width = hi - lo;
    let bin_edges = linspace(lo, hi, bins + 1);
    if !width.is_finite() || width <= 0.0 || bin_edges.windows(2).any(|w| w[0] >= w[1]) {
        return Err(ComputeError::invalid_upload(format!(
            "Too many bins for data range. Cannot create {} finite-sized bins over [{}, {}]",
            bins, lo, hi
        )));
    }
    let mut counts = vec![0u64; bins];
    let scale = bins as f64 / width;
    for &v in &values {
        counts[bin_index(v, lo, scale, &bin_edges)] += 1;
    }
    let bin_centers = bin_edges.windows(2).map(|w| (w[0] + w[1]) / 2.0).collect();

    Ok(HistogramResult { counts, bin_edges, bin_centers })
}

/// Bin of `v`, with the arithmetic guess corrected against the actual edges.
fn bin_index(v: f64, lo: f64, scale: f64, edges: &[f64]) -> usize {
    let bins = edges.len() - 1;
    let mut idx = (((v - lo) * scale) as usize).min(bins - 1);
    if idx > 0 && v < edges[idx] {
        idx -= 1;
    } else if idx + 1 < bins && v >= edges[idx + 1] {
        idx += 1;
    }
    idx
}

/// Pairs of present values from two numeric columns.
pub fn scatter(dataset: &Dataset, x_column: &str, y_column: &str) -> Result<ScatterResult> {
    let xs = dataset.numeric_column(x_column)?;
    let ys = dataset.numeric_column(y_column)?;
    let (x, y) = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .unzip();
    Ok(ScatterResult { x, y })
}

/// Pearson correlation of the rows where both columns are present.
pub fn pearson(xs: &[Option<f64>], ys: &[Option<f64>]) -> Option<f64> {
    let pairs: Vec<(f64, f64)> = xs
        .iter()
        .zip(ys)
        .filter_map(|(x, y)| Some(((*x)?, (*y)?)))
        .collect();
    if pairs.len() < 2 {
        return None;
    }
    let n = pairs.len() as f64;
    let mx = pairs.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pairs.iter().map(|p| p.1).sum::<f64>() / n;
    let (mut sxy, mut sxx, mut syy) = (0.0, 0.0, 0.0);
    for (x, y) in &pairs {
        sxy += (x - mx) * (y - my);
        sxx += (x - mx).powi(2);
        syy += (y - my).powi(2);
    }
    if sxx <= 0.0 || syy <= 0.0 {
        return None;
    }
    Some((sxy / (sxx.sqrt() * syy.sqrt())).clamp(-1.0, 1.0))
}

/// Pairwise-complete correlation matrix over all numeric columns.
pub fn correlation(dataset: &Dataset) -> CorrelationResult {
    let columns = dataset.numeric_column_values();
    let values = columns
        .par_iter()
        .enumerate()
        .map(|(i, (_, xs))| {
            columns
                .iter()
                .enumerate()
                .map(|(j, (_, ys))| {
                    let r = pearson(xs, ys);
                    if i == j { r.map(|_| 1.0) } else { r }
                })
                .collect()
        })
        .collect();
    CorrelationResult {
        columns: columns.iter().map(|(name, _)| name.to_string()).collect(),
        values,
    }
}
