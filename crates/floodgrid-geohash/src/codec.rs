//! Geohash encode/decode.

use crate::{GeohashBounds, GeohashError, Result};

/// The geohash base-32 alphabet (no `a`, `i`, `l`, `o`).
pub const BASE32: &[u8; 32] = b"0123456789bcdefghjkmnpqrstuvwxyz";

/// Smallest supported encode precision, in characters.
pub const MIN_PRECISION: usize = 1;

/// Largest supported encode precision, in characters.
///
/// Twelve characters resolve to a few centimetres, well past the limit of
/// meaningful f64 bisection for map display.
pub const MAX_PRECISION: usize = 12;

const BITS_PER_CHAR: u32 = 5;

/// Map an ASCII byte to its 5-bit value, or `None` if it is not in the alphabet.
fn char_value(byte: u8) -> Option<u8> {
    BASE32.iter().position(|&c| c == byte).map(|idx| idx as u8)
}

/// Encode a coordinate as a geohash of `precision` characters.
///
/// Bisects longitude then latitude, alternating, appending one character per
/// five bisection decisions.
///
/// # Arguments
/// * `lat` - Latitude in decimal degrees, `[-90, 90]`
/// * `lon` - Longitude in decimal degrees, `[-180, 180]`
/// * `precision` - Number of characters, `1..=12`
///
/// # Errors
/// Returns an error for non-finite or out-of-range coordinates and for
/// unsupported precisions.
pub fn encode(lat: f64, lon: f64, precision: usize) -> Result<String> {
    if !(-90.0..=90.0).contains(&lat) {
        return Err(GeohashError::InvalidLatitude(lat));
    }
    if !(-180.0..=180.0).contains(&lon) {
        return Err(GeohashError::InvalidLongitude(lon));
    }
    if !(MIN_PRECISION..=MAX_PRECISION).contains(&precision) {
        return Err(GeohashError::InvalidPrecision {
            precision,
            min: MIN_PRECISION,
            max: MAX_PRECISION,
        });
    }

    let (mut lat_min, mut lat_max) = (-90.0_f64, 90.0_f64);
    let (mut lon_min, mut lon_max) = (-180.0_f64, 180.0_f64);

    let mut hash = String::with_capacity(precision);
    let mut bit = 0u32;
    let mut ch = 0u8;
    let mut even = true;

    while hash.len() < precision {
        if even {
            let mid = (lon_min + lon_max) / 2.0;
            if lon >= mid {
                ch |= 1 << (BITS_PER_CHAR - 1 - bit);
                lon_min = mid;
            } else {
                lon_max = mid;
            }
        } else {
            let mid = (lat_min + lat_max) / 2.0;
            if lat >= mid {
                ch |= 1 << (BITS_PER_CHAR - 1 - bit);
                lat_min = mid;
            } else {
                lat_max = mid;
            }
        }
        even = !even;

        bit += 1;
        if bit == BITS_PER_CHAR {
            hash.push(BASE32[ch as usize] as char);
            bit = 0;
            ch = 0;
        }
    }

    Ok(hash)
}

/// Decode a geohash into the bounding box it encodes.
///
/// Replays the bisection used by [`encode`]; the result contains every
/// coordinate that encodes to `geohash` (edges inclusive).
///
/// # Errors
/// Returns an error for empty strings and characters outside [`BASE32`].
pub fn decode_bounds(geohash: &str) -> Result<GeohashBounds> {
    if geohash.is_empty() {
        return Err(GeohashError::Empty);
    }

    let mut bounds = GeohashBounds::WORLD;
    let mut even = true;

    for (position, byte) in geohash.bytes().enumerate() {
        let value = char_value(byte).ok_or_else(|| GeohashError::InvalidCharacter {
            geohash: geohash.to_string(),
            character: geohash[position..].chars().next().unwrap_or(byte as char),
            position,
        })?;

        for shift in (0..BITS_PER_CHAR).rev() {
            let set = (value >> shift) & 1 == 1;
            if even {
                let mid = (bounds.west + bounds.east) / 2.0;
                if set {
                    bounds.west = mid;
                } else {
                    bounds.east = mid;
                }
            } else {
                let mid = (bounds.south + bounds.north) / 2.0;
                if set {
                    bounds.south = mid;
                } else {
                    bounds.north = mid;
                }
            }
            even = !even;
        }
    }

    Ok(bounds)
}

/// Check whether `geohash` is a non-empty string over the geohash alphabet.
pub fn is_valid_geohash(geohash: &str) -> bool {
    !geohash.is_empty() && geohash.bytes().all(|b| char_value(b).is_some())
}
