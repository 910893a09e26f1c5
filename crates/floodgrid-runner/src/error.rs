//! Runner error type.

use floodgrid_cluster::ClusterError;
use floodgrid_geohash::GeohashError;
use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur while running a CLI command.
#[derive(Debug, Error)]
pub enum RunnerError {
    #[error("IO error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("JSON error in {path}: {source}")]
    Json {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("JSON output error: {0}")]
    Output(#[from] serde_json::Error),

    #[error(transparent)]
    Cluster(#[from] ClusterError),

    #[error("Geohash error: {0}")]
    Geohash(#[from] GeohashError),

    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("{failed} date(s) failed to regenerate")]
    GenerationFailed { failed: usize },
}

impl RunnerError {
    pub(crate) fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        RunnerError::Io {
            path: path.into(),
            source,
        }
    }

    pub(crate) fn json(path: impl Into<PathBuf>, source: serde_json::Error) -> Self {
        RunnerError::Json {
            path: path.into(),
            source,
        }
    }
}
