// src/lib.rs

#![doc = include_str!("../README.md")]

pub mod api;
pub mod diagnostics;
pub mod error;
pub mod linalg_backends;
pub mod linear_ops;
pub mod matrix;
pub mod pca;
pub mod statistics;
pub mod tabular;

pub use api::{ComputeService, Endpoint, ServiceConfig, UploadedFile};
pub use error::{ComputeError, ErrorBody, Result};
pub use linear_ops::{EigenResult, Eigenvalue};
pub use pca::{PcaResult, PCA};
pub use tabular::Dataset;
