// src/api.rs

//! Request/response contracts and the stateless service facade.
//!
//! Every operation takes its full input on each call and holds no state
//! between calls, so one [`ComputeService`] can be shared across any number
//! of worker threads. The transport itself (HTTP, multipart decoding) lives
//! outside this crate; [`ComputeService::dispatch_json`] and
//! [`ComputeService::dispatch_upload`] give a host the status code and JSON
//! body to answer with.

use crate::error::{ComputeError, ErrorBody, Result};
use crate::linear_ops::{self, EigenResult, PointSource};
use crate::matrix::{points_from_rows, square_matrix_from_rows, to_rows, NestedMatrix};
use crate::pca::{compute_pca, PcaResult};
use crate::statistics::{self, ColumnStatistics, CorrelationResult, HistogramResult, ScatterResult};
use crate::tabular::{Dataset, DatasetSummary, OrderedMap};
use log::{debug, info, warn};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;

/// Limits and defaults applied by [`ComputeService`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServiceConfig {
    /// Uploads larger than this are rejected with `PayloadTooLarge`.
    pub max_upload_bytes: usize,
    /// Rows included in the upload preview.
    pub preview_rows: usize,
    pub max_bins: usize,
    pub default_bins: usize,
    pub default_grid_size: usize,
    pub default_grid_range: f64,
    pub max_grid_size: usize,
    /// Largest accepted matrix order for the matrix endpoints.
    pub max_matrix_order: usize,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        ServiceConfig {
            max_upload_bytes: 10 * 1024 * 1024,
            preview_rows: 10,
            max_bins: 200,
            default_bins: 20,
            default_grid_size: 10,
            default_grid_range: 5.0,
            max_grid_size: 500,
            max_matrix_order: 64,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatrixRequest {
    pub matrix: NestedMatrix,
}

/// Either `points` or the grid parameters; `points` wins when both are given.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct TransformRequest {
    pub matrix: NestedMatrix,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub points: Option<NestedMatrix>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_size: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub grid_range: Option<f64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransformResponse {
    pub original: NestedMatrix,
    pub transformed: NestedMatrix,
    pub matrix: NestedMatrix,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DeterminantResponse {
    pub determinant: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaRequest {
    pub data: NestedMatrix,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PcaResponse {
    pub original_data: NestedMatrix,
    #[serde(flatten)]
    pub result: PcaResult,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StatisticsResponse {
    pub statistics: OrderedMap<ColumnStatistics>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HistogramRequest {
    pub column: String,
    #[serde(default)]
    pub bins: Option<i64>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScatterRequest {
    pub x_column: String,
    pub y_column: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

/// A file received from a multipart upload.
#[derive(Debug, Clone)]
pub struct UploadedFile {
    pub filename: Option<String>,
    pub content: Vec<u8>,
}

impl UploadedFile {
    pub fn new(filename: impl Into<String>, content: impl Into<Vec<u8>>) -> Self {
        UploadedFile {
            filename: Some(filename.into()),
            content: content.into(),
        }
    }
}

/// Routes served by the core, with the paths clients call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Endpoint {
    Root,
    Hello,
    Transform,
    Determinant,
    Eigen,
    Pca,
    Upload,
    Statistics,
    Histogram,
    Scatter,
    Correlation,
}

impl Endpoint {
    pub const ALL: [Endpoint; 11] = [
        Endpoint::Root,
        Endpoint::Hello,
        Endpoint::Transform,
        Endpoint::Determinant,
        Endpoint::Eigen,
        Endpoint::Pca,
        Endpoint::Upload,
        Endpoint::Statistics,
        Endpoint::Histogram,
        Endpoint::Scatter,
        Endpoint::Correlation,
    ];

    pub fn path(self) -> &'static str {
        match self {
            Endpoint::Root => "/",
            Endpoint::Hello => "/hello",
            Endpoint::Transform => "/api/data-science/vektor/transform",
            Endpoint::Determinant => "/api/data-science/vektor/determinant",
            Endpoint::Eigen => "/api/data-science/vektor/eigen",
            Endpoint::Pca => "/api/data-science/vektor/pca",
            Endpoint::Upload => "/api/data-science/statlab/upload",
            Endpoint::Statistics => "/api/data-science/statlab/stats",
            Endpoint::Histogram => "/api/data-science/statlab/histogram",
            Endpoint::Scatter => "/api/data-science/statlab/scatter",
            Endpoint::Correlation => "/api/data-science/statlab/correlation",
        }
    }

    pub fn from_path(path: &str) -> Option<Endpoint> {
        Endpoint::ALL.into_iter().find(|e| e.path() == path)
    }

    /// True for the routes that take a multipart file instead of a JSON body.
    pub fn takes_upload(self) -> bool {
        matches!(
            self,
            Endpoint::Upload | Endpoint::Statistics | Endpoint::Histogram | Endpoint::Scatter | Endpoint::Correlation
        )
    }
}

/// Stateless facade over the numerical core.
#[derive(Debug, Clone, Default)]
pub struct ComputeService {
    config: ServiceConfig,
}

impl ComputeService {
    pub fn new(config: ServiceConfig) -> Self {
        ComputeService { config }
    }

    pub fn config(&self) -> &ServiceConfig {
        &self.config
    }

    pub fn root(&self) -> MessageResponse {
        MessageResponse {
            message: "Hello from the Mosaic compute core!".to_string(),
        }
    }

    pub fn hello(&self) -> MessageResponse {
        MessageResponse {
            message: "Hello World from the Mosaic compute core! Mosaic is ready to go.".to_string(),
        }
    }

    /// Applies `matrix` to explicit points or to a generated grid.
    pub fn transform(&self, request: &TransformRequest) -> Result<TransformResponse> {
        let matrix = square_matrix_from_rows(&request.matrix, self.config.max_matrix_order)?;
        let source = match (&request.points, request.grid_size, request.grid_range) {
            (Some(points), _, _) => PointSource::Points(points_from_rows(points, Some(matrix.nrows()))?),
            (None, None, None) => {
                return Err(ComputeError::invalid_input(
                    "Either points or grid_size and grid_range must be provided",
                ))
            }
            (None, size, range) => {
                let size = size.map_or(Ok(self.config.default_grid_size), |s| {
                    usize::try_from(s).map_err(|_| {
                        ComputeError::invalid_input(format!(
                            "grid_size must be between 1 and {}, got {}",
                            self.config.max_grid_size, s
                        ))
                    })
                })?;
                PointSource::Grid {
                    size,
                    range: range.unwrap_or(self.config.default_grid_range),
                }
            }
        };
        info!(
            "transform: {}x{} matrix, {}",
            matrix.nrows(),
            matrix.ncols(),
            match &source {
                PointSource::Points(p) => format!("{} points", p.nrows()),
                PointSource::Grid { size, range } => format!("grid {} over +/-{}", size, range),
            }
        );

        let out = linear_ops::transform(&matrix, source, self.config.max_grid_size)?;
        Ok(TransformResponse {
            original: to_rows(out.original.view()),
            transformed: to_rows(out.transformed.view()),
            matrix: to_rows(matrix.view()),
        })
    }

    pub fn determinant(&self, request: &MatrixRequest) -> Result<DeterminantResponse> {
        let matrix = square_matrix_from_rows(&request.matrix, self.config.max_matrix_order)?;
        info!("determinant: {}x{} matrix", matrix.nrows(), matrix.ncols());
        Ok(DeterminantResponse {
            determinant: linear_ops::determinant(&matrix)?,
        })
    }

    pub fn eigen(&self, request: &MatrixRequest) -> Result<EigenResult> {
        let matrix = square_matrix_from_rows(&request.matrix, self.config.max_matrix_order)?;
        info!("eigen: {}x{} matrix", matrix.nrows(), matrix.ncols());
        linear_ops::eigen(&matrix)
    }

    pub fn pca(&self, request: &PcaRequest) -> Result<PcaResponse> {
        let data = points_from_rows(&request.data, None)?;
        info!("pca: {} points of dimension {}", data.nrows(), data.ncols());
        let result = compute_pca(&data)?;
        Ok(PcaResponse {
            original_data: request.data.clone(),
            result,
        })
    }

    /// Parses an uploaded CSV and describes its shape and columns.
    pub fn upload_csv(&self, file: &UploadedFile) -> Result<DatasetSummary> {
        match file.filename.as_deref() {
            Some(name) if name.ends_with(".csv") => {}
            _ => return Err(ComputeError::invalid_upload("File must be a CSV file")),
        }
        let dataset = self.load(file)?;
        info!("upload: {:?} parsed as {:?}", file.filename, dataset.shape());
        Ok(dataset.summary(self.config.preview_rows))
    }

    pub fn statistics(&self, file: &UploadedFile) -> Result<StatisticsResponse> {
        let dataset = self.load(file)?;
        info!("statistics: {} numeric columns", dataset.numeric_columns().len());
        Ok(StatisticsResponse {
            statistics: statistics::compute_statistics(&dataset),
        })
    }

    pub fn histogram(&self, file: &UploadedFile, request: &HistogramRequest) -> Result<HistogramResult> {
        let bins = statistics::validate_bins(
            request.bins.unwrap_or(self.config.default_bins as i64),
            self.config.max_bins,
        )?;
        let dataset = self.load(file)?;
        info!("histogram: column '{}', {} bins", request.column, bins);
        statistics::histogram(&dataset, &request.column, bins)
    }

    pub fn scatter(&self, file: &UploadedFile, request: &ScatterRequest) -> Result<ScatterResult> {
        let dataset = self.load(file)?;
        info!("scatter: '{}' against '{}'", request.x_column, request.y_column);
        statistics::scatter(&dataset, &request.x_column, &request.y_column)
    }

    pub fn correlation(&self, file: &UploadedFile) -> Result<CorrelationResult> {
        let dataset = self.load(file)?;
        info!("correlation: {} numeric columns", dataset.numeric_columns().len());
        Ok(statistics::correlation(&dataset))
    }

    fn load(&self, file: &UploadedFile) -> Result<Dataset> {
        let size = file.content.len();
        if size > self.config.max_upload_bytes {
            warn!("Rejecting upload of {} bytes (limit {})", size, self.config.max_upload_bytes);
            return Err(ComputeError::PayloadTooLarge {
                size,
                limit: self.config.max_upload_bytes,
            });
        }
        Dataset::parse(&file.content)
    }

    /// Runs a JSON endpoint and returns the status and body to answer with.
    ///
    /// Bodies that fail to deserialize (missing fields, wrong types) are
    /// rejected as `InvalidInput`.
    pub fn dispatch_json(&self, endpoint: Endpoint, body: &[u8]) -> (u16, Value) {
        debug!("dispatch {} ({} byte body)", endpoint.path(), body.len());
        match endpoint {
            Endpoint::Root => respond(Ok(self.root())),
            Endpoint::Hello => respond(Ok(self.hello())),
            Endpoint::Transform => respond(parse_body(body).and_then(|r| self.transform(&r))),
            Endpoint::Determinant => respond(parse_body(body).and_then(|r| self.determinant(&r))),
            Endpoint::Eigen => respond(parse_body(body).and_then(|r| self.eigen(&r))),
            Endpoint::Pca => respond(parse_body(body).and_then(|r| self.pca(&r))),
            _ => respond::<Value>(Err(ComputeError::invalid_input(format!(
                "{} expects a multipart file upload",
                endpoint.path()
            )))),
        }
    }

    /// Runs an upload endpoint with the decoded file and form fields.
    pub fn dispatch_upload(
        &self,
        endpoint: Endpoint,
        file: &UploadedFile,
        fields: &HashMap<String, String>,
    ) -> (u16, Value) {
        debug!("dispatch {} ({} byte upload)", endpoint.path(), file.content.len());
        match endpoint {
            Endpoint::Upload => respond(self.upload_csv(file)),
            Endpoint::Statistics => respond(self.statistics(file)),
            Endpoint::Histogram => respond(histogram_form(fields).and_then(|r| self.histogram(file, &r))),
            Endpoint::Scatter => respond(scatter_form(fields).and_then(|r| self.scatter(file, &r))),
            Endpoint::Correlation => respond(self.correlation(file)),
            _ => respond::<Value>(Err(ComputeError::invalid_input(format!(
                "{} expects a JSON body",
                endpoint.path()
            )))),
        }
    }
}

fn parse_body<T: DeserializeOwned>(body: &[u8]) -> Result<T> {
    serde_json::from_slice(body).map_err(|e| ComputeError::invalid_input(format!("Invalid request body: {}", e)))
}

fn required_field<'a>(fields: &'a HashMap<String, String>, name: &str) -> Result<&'a str> {
    fields
        .get(name)
        .map(String::as_str)
        .ok_or_else(|| ComputeError::invalid_input(format!("Field required: {}", name)))
}

fn histogram_form(fields: &HashMap<String, String>) -> Result<HistogramRequest> {
    let bins = match fields.get("bins") {
        Some(raw) => Some(raw.trim().parse::<i64>().map_err(|_| {
            ComputeError::invalid_input(format!("bins must be an integer, got '{}'", raw))
        })?),
        None => None,
    };
    Ok(HistogramRequest {
        column: required_field(fields, "column")?.to_string(),
        bins,
    })
}

fn scatter_form(fields: &HashMap<String, String>) -> Result<ScatterRequest> {
    Ok(ScatterRequest {
        x_column: required_field(fields, "x_column")?.to_string(),
        y_column: required_field(fields, "y_column")?.to_string(),
    })
}

fn respond<T: Serialize>(result: Result<T>) -> (u16, Value) {
    let result = result.and_then(|body| {
        serde_json::to_value(body).map_err(|e| ComputeError::Backend(format!("Failed to encode response: {}", e)))
    });
    match result {
        Ok(value) => (200, value),
        Err(err) => {
            if err.status_code() >= 500 {
                warn!("Request failed: {}", err);
            } else {
                debug!("Request rejected ({}): {}", err.status_code(), err);
            }
            let body = ErrorBody::from(&err);
            (err.status_code(), serde_json::json!({ "detail": body.detail }))
        }
    }
}
