//! Error types for the geohash crate.

use thiserror::Error;

/// Errors that can occur when encoding or decoding geohashes.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum GeohashError {
    /// Latitude is not a finite value in `[-90, 90]`.
    #[error("Latitude {0} is outside the valid range [-90, 90]")]
    InvalidLatitude(f64),

    /// Longitude is not a finite value in `[-180, 180]`.
    #[error("Longitude {0} is outside the valid range [-180, 180]")]
    InvalidLongitude(f64),

    /// Requested precision is outside the supported range.
    #[error("Invalid geohash precision {precision} (must be {min}-{max})")]
    InvalidPrecision {
        /// Requested precision.
        precision: usize,
        /// Smallest supported precision.
        min: usize,
        /// Largest supported precision.
        max: usize,
    },

    /// Geohash contains a character outside the base-32 alphabet.
    #[error("Invalid character {character:?} at position {position} in geohash {geohash:?}")]
    InvalidCharacter {
        /// The offending geohash.
        geohash: String,
        /// The offending character.
        character: char,
        /// Byte position of the character.
        position: usize,
    },

    /// Geohash string is empty.
    #[error("Geohash is empty")]
    Empty,
}
