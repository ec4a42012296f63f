//! Error taxonomy for a batch run.
//!
//! None of these are caught inside the batch loop: the first error aborts
//! the run and the report keeps only the blocks written before it.

use std::path::PathBuf;

#[derive(Debug, thiserror::Error)]
pub enum BatchError {
    #[error("Failed to read input directory {path}: {source}")]
    ReadDir {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to load image {path}: {source}")]
    ImageLoad {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },

    #[error("Centroid detection failed: {0}")]
    Detect(String),

    #[error("Failed to solve {image}: {reason}")]
    Solve { image: String, reason: String },

    #[error("Solver setup failed: {0}")]
    SolverSetup(String),

    #[error("Report I/O error on {path}: {source}")]
    Report {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to write overlay {path}: {source}")]
    Overlay {
        path: PathBuf,
        #[source]
        source: image::ImageError,
    },
}

pub type Result<T> = std::result::Result<T, BatchError>;
