//! # floodgrid-geohash
//!
//! Geohash encoding and decoding for the floodgrid clustering engine.
//!
//! A geohash is a base-32 string produced by recursively bisecting the
//! longitude range `[-180, 180]` and the latitude range `[-90, 90]`,
//! alternating between the two and starting with longitude. Every five
//! bisection decisions become one character of the alphabet
//! `0123456789bcdefghjkmnpqrstuvwxyz`.
//!
//! ## Overview
//!
//! Two properties make geohashes useful for multi-resolution clustering:
//!
//! - **Prefix monotonicity**: `encode(lat, lon, p)` is always a prefix of
//!   `encode(lat, lon, p + 1)`, so a point's cell at a coarse precision is
//!   a prefix of its cell at every finer precision.
//! - **Nesting**: the bounding box of `prefix + c` lies inside the bounding
//!   box of `prefix` for every character `c`.
//!
//! Both functions in this crate are pure and keep all bit-accumulation state
//! in local variables, so they can be called concurrently from any number of
//! threads without synchronization.
//!
//! ## Examples
//!
//! ```
//! use floodgrid_geohash::{decode_bounds, encode};
//!
//! let hash = encode(57.64911, 10.40744, 6)?;
//! assert_eq!(hash, "u4pruy");
//!
//! let bounds = decode_bounds(&hash)?;
//! assert!(bounds.contains(57.64911, 10.40744));
//! # Ok::<(), floodgrid_geohash::GeohashError>(())
//! ```

mod bounds;
mod codec;
mod error;

pub use bounds::GeohashBounds;
pub use codec::{decode_bounds, encode, is_valid_geohash, BASE32, MAX_PRECISION, MIN_PRECISION};
pub use error::GeohashError;

/// Result type for geohash operations.
pub type Result<T> = std::result::Result<T, GeohashError>;
