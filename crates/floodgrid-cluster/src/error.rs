//! Error types for the clustering engine.

use chrono::NaiveDate;
use floodgrid_geohash::GeohashError;
use thiserror::Error;

/// A rejected input value: a raw point, a query parameter, or a geohash.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// Coordinate or geohash rejected by the codec.
    #[error(transparent)]
    Geohash(#[from] GeohashError),

    /// Forecast value is negative or not finite.
    #[error("Forecast value {0} must be a finite, non-negative number")]
    InvalidForecastValue(f64),

    /// Date string is not an ISO-8601 calendar date.
    #[error("Invalid date {0:?} (expected YYYY-MM-DD)")]
    InvalidDate(String),

    /// Zoom level outside `0..=20`.
    #[error("Invalid zoom level {0} (must be 0-20)")]
    InvalidZoomLevel(u8),

    /// Bounding box with inverted or out-of-range edges.
    #[error("Invalid bounding box north={north} south={south} east={east} west={west}: {reason}")]
    InvalidBoundingBox {
        north: f64,
        south: f64,
        east: f64,
        west: f64,
        reason: &'static str,
    },

    /// Unknown return-period label.
    #[error("Unknown return period {0:?} (expected 2-year, 5-year or 20-year)")]
    InvalidReturnPeriod(String),

    /// Unknown risk-level label.
    #[error("Unknown risk level {0:?} (expected low, medium, high or extreme)")]
    InvalidRiskLevel(String),
}

impl ValidationError {
    /// Short, stable label used as the `reason` metric label.
    pub fn reason(&self) -> &'static str {
        match self {
            ValidationError::Geohash(GeohashError::InvalidLatitude(_)) => "latitude",
            ValidationError::Geohash(GeohashError::InvalidLongitude(_)) => "longitude",
            ValidationError::Geohash(_) => "geohash",
            ValidationError::InvalidForecastValue(_) => "forecast_value",
            ValidationError::InvalidDate(_) => "date",
            ValidationError::InvalidZoomLevel(_) => "zoom_level",
            ValidationError::InvalidBoundingBox { .. } => "bounding_box",
            ValidationError::InvalidReturnPeriod(_) => "return_period",
            ValidationError::InvalidRiskLevel(_) => "risk_level",
        }
    }
}

/// Errors that can occur while generating or querying clusters.
#[derive(Debug, Error)]
pub enum ClusterError {
    /// An input value was rejected.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Drill-down requested with a child zoom level not above the parent.
    #[error("Child zoom level {child_zoom} must be greater than parent zoom level {parent_zoom}")]
    InvalidRange {
        /// Requested parent zoom level.
        parent_zoom: u8,
        /// Requested child zoom level.
        child_zoom: u8,
    },

    /// Invalid configuration. Raised at startup, never at query time.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O error reading a configuration file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML parsing error.
    #[error("YAML parsing error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    /// A point or cluster store operation failed.
    #[error("Store error: {0}")]
    Store(String),

    /// A generation run failed; the previous generation for the scope is untouched.
    #[error("Generation failed for date {date}{}: {source}", zoom_suffix(.zoom_level))]
    Generation {
        /// Date whose generation failed.
        date: NaiveDate,
        /// Zoom level being built when the failure happened, if any.
        zoom_level: Option<u8>,
        /// Underlying failure.
        #[source]
        source: Box<ClusterError>,
    },
}

fn zoom_suffix(zoom_level: &Option<u8>) -> String {
    zoom_level
        .map(|zoom| format!(" at zoom level {}", zoom))
        .unwrap_or_default()
}

impl ClusterError {
    /// Wrap an error with the generation scope it occurred in.
    pub fn in_scope(self, date: NaiveDate, zoom_level: Option<u8>) -> Self {
        match self {
            already @ ClusterError::Generation { .. } => already,
            other => ClusterError::Generation {
                date,
                zoom_level,
                source: Box::new(other),
            },
        }
    }
}
