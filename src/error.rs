// Error types for the reporting pipeline.
//
// Cell-level coercion failures never surface here; they degrade to
// missing values inside `prep`. What remains are I/O problems, a missing
// dataset, and caller-side parameter violations.

use thiserror::Error;

/// Result type alias for convenience
pub type Result<T> = std::result::Result<T, Error>;

#[derive(Error, Debug)]
pub enum Error {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Clustering error: {0}")]
    Clustering(#[from] linfa_clustering::KMeansError),

    /// No dataset was found and none was supplied.
    #[error("No data: {message}")]
    NoData { message: String },

    #[error("Invalid parameter: {message}")]
    InvalidParameter { message: String },
}

impl Error {
    pub fn no_data(message: impl Into<String>) -> Self {
        Self::NoData {
            message: message.into(),
        }
    }

    pub fn invalid_parameter(message: impl Into<String>) -> Self {
        Self::InvalidParameter {
            message: message.into(),
        }
    }
}
