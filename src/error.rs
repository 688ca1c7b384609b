// src/error.rs

//! Error taxonomy shared by every operation in the crate.

use serde::{Deserialize, Serialize};
use std::error::Error;
use thiserror::Error;

/// A thread-safe wrapper for standard dynamic errors,
/// so they implement `Send` and `Sync`.
pub type ThreadSafeStdError = Box<dyn Error + Send + Sync + 'static>;

/// Result alias used throughout the crate.
pub type Result<T> = std::result::Result<T, ComputeError>;

/// Errors a single request can fail with.
///
/// None of these are fatal: each one rejects exactly the request that
/// produced it.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ComputeError {
    /// Malformed JSON payload: matrix or point shapes, missing fields.
    #[error("{0}")]
    InvalidInput(String),

    /// Anything wrong with a file-upload request: unreadable or malformed
    /// CSV, a non-numeric column selection, an out-of-range bin count.
    #[error("{0}")]
    InvalidUpload(String),

    /// A referenced column does not exist in the dataset.
    #[error("{0}")]
    NotFound(String),

    /// Uploaded file exceeds the configured limit.
    #[error("Uploaded file is {size} bytes, which exceeds the limit of {limit} bytes")]
    PayloadTooLarge {
        /// Size of the rejected upload in bytes
        size: usize,
        /// Configured limit in bytes
        limit: usize,
    },

    /// The linear-algebra backend failed on otherwise valid input.
    #[error("Linear algebra backend failure: {0}")]
    Backend(String),
}

impl ComputeError {
    pub(crate) fn invalid_input(msg: impl Into<String>) -> Self {
        Self::InvalidInput(msg.into())
    }

    pub(crate) fn invalid_upload(msg: impl Into<String>) -> Self {
        Self::InvalidUpload(msg.into())
    }

    pub(crate) fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    /// HTTP status a transport layer should answer with.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) => 422,
            Self::InvalidUpload(_) => 400,
            Self::NotFound(_) => 404,
            Self::PayloadTooLarge { .. } => 413,
            Self::Backend(_) => 500,
        }
    }

    /// True for every client-side validation failure.
    pub fn is_invalid_input(&self) -> bool {
        matches!(self, Self::InvalidInput(_) | Self::InvalidUpload(_))
    }

    /// Human-readable message surfaced verbatim by clients.
    pub fn detail(&self) -> String {
        self.to_string()
    }
}

impl From<ThreadSafeStdError> for ComputeError {
    fn from(err: ThreadSafeStdError) -> Self {
        Self::Backend(err.to_string())
    }
}

/// Serialized body of a failed response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ErrorBody {
    pub detail: String,
}

impl From<&ComputeError> for ErrorBody {
    fn from(err: &ComputeError) -> Self {
        Self {
            detail: err.detail(),
        }
    }
}
