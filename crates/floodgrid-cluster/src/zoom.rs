//! Zoom level to geohash precision mapping.

use std::collections::BTreeMap;

use floodgrid_geohash::{MAX_PRECISION, MIN_PRECISION};
use serde::{Deserialize, Serialize};

use crate::error::{ClusterError, ValidationError};
use crate::types::MAX_ZOOM_LEVEL;
use crate::Result;

/// Fallback precision for zoom levels missing from the production table.
pub const DEFAULT_FALLBACK_PRECISION: usize = 6;

/// Maps a display zoom level to the geohash precision its clusters use.
///
/// Zoom levels absent from `table` resolve to `fallback`. With no fallback an
/// unmapped zoom level is a configuration error, reported by [`validate`](Self::validate)
/// at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ZoomPrecisionMap {
    pub table: BTreeMap<u8, usize>,
    pub fallback: Option<usize>,
}

impl Default for ZoomPrecisionMap {
    fn default() -> Self {
        Self::production()
    }
}

impl ZoomPrecisionMap {
    /// Production table: zoom 0..=4 map to precision 1..=5, everything else to 6.
    pub fn production() -> Self {
        Self {
            table: (0u8..=4).map(|zoom| (zoom, zoom as usize + 1)).collect(),
            fallback: Some(DEFAULT_FALLBACK_PRECISION),
        }
    }

    /// Override (or add) the precision for one zoom level.
    pub fn with_precision(mut self, zoom_level: u8, precision: usize) -> Self {
        self.table.insert(zoom_level, precision);
        self
    }

    /// Replace the fallback precision.
    pub fn with_fallback(mut self, fallback: Option<usize>) -> Self {
        self.fallback = fallback;
        self
    }

    /// Geohash precision used for clusters at `zoom_level`.
    pub fn precision(&self, zoom_level: u8) -> Result<usize> {
        if zoom_level > MAX_ZOOM_LEVEL {
            return Err(ValidationError::InvalidZoomLevel(zoom_level).into());
        }
        self.table
            .get(&zoom_level)
            .copied()
            .or(self.fallback)
            .ok_or_else(|| {
                ClusterError::Config(format!(
                    "zoom level {} has no precision mapping and no fallback is configured",
                    zoom_level
                ))
            })
    }

    /// Check that every zoom level up to `max_zoom_level` resolves to a supported precision.
    pub fn validate(&self, max_zoom_level: u8) -> Result<()> {
        if max_zoom_level > MAX_ZOOM_LEVEL {
            return Err(ClusterError::Config(format!(
                "max_zoom_level {} exceeds {}",
                max_zoom_level, MAX_ZOOM_LEVEL
            )));
        }
        if let Some(&zoom) = self.table.keys().find(|&&zoom| zoom > MAX_ZOOM_LEVEL) {
            return Err(ClusterError::Config(format!(
                "zoom level {} in precision table exceeds {}",
                zoom, MAX_ZOOM_LEVEL
            )));
        }
        let supported = MIN_PRECISION..=MAX_PRECISION;
        if let Some(fallback) = self.fallback {
            if !supported.contains(&fallback) {
                return Err(ClusterError::Config(format!(
                    "fallback precision {} outside {}..={}",
                    fallback, MIN_PRECISION, MAX_PRECISION
                )));
            }
        }
        for zoom in 0..=max_zoom_level {
            let precision = self.precision(zoom)?;
            if !supported.contains(&precision) {
                return Err(ClusterError::Config(format!(
                    "zoom level {} maps to precision {} outside {}..={}",
                    zoom, precision, MIN_PRECISION, MAX_PRECISION
                )));
            }
        }
        Ok(())
    }

    /// Whether precision never decreases as zoom increases over `0..=max_zoom_level`.
    ///
    /// Hierarchical generation relies on this: a child prefix can only extend
    /// its parent when the child precision is at least the parent precision.
    pub fn is_monotonic(&self, max_zoom_level: u8) -> bool {
        let mut previous = 0;
        for zoom in 0..=max_zoom_level {
            match self.precision(zoom) {
                Ok(precision) if precision >= previous => previous = precision,
                _ => return false,
            }
        }
        true
    }
}
