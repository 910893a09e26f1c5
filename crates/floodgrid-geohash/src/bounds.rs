//! Geographic bounds of a geohash cell.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Bounding box encoded by a geohash, in WGS84 degrees.
#[derive(Debug, Clone, Copy, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct GeohashBounds {
    /// Maximum latitude (north edge).
    pub north: f64,
    /// Minimum latitude (south edge).
    pub south: f64,
    /// Maximum longitude (east edge).
    pub east: f64,
    /// Minimum longitude (west edge).
    pub west: f64,
}

impl GeohashBounds {
    /// The whole globe, the starting range of every bisection.
    pub const WORLD: GeohashBounds = GeohashBounds {
        north: 90.0,
        south: -90.0,
        east: 180.0,
        west: -180.0,
    };

    /// Check if a coordinate is within the bounds (edges inclusive).
    pub fn contains(&self, lat: f64, lon: f64) -> bool {
        lat >= self.south && lat <= self.north && lon >= self.west && lon <= self.east
    }

    /// Check if `other` lies entirely inside these bounds (edges inclusive).
    pub fn contains_bounds(&self, other: &GeohashBounds) -> bool {
        other.south >= self.south
            && other.north <= self.north
            && other.west >= self.west
            && other.east <= self.east
    }

    /// Geometric centre of the cell as `(lat, lon)`.
    pub fn center(&self) -> (f64, f64) {
        ((self.south + self.north) / 2.0, (self.west + self.east) / 2.0)
    }

    /// Height of the cell in degrees of latitude.
    pub fn lat_span(&self) -> f64 {
        self.north - self.south
    }

    /// Width of the cell in degrees of longitude.
    pub fn lon_span(&self) -> f64 {
        self.east - self.west
    }
}
