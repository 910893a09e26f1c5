//! Property tests for geohash encode/decode over seeded random coordinates.

use floodgrid_geohash::{decode_bounds, encode, BASE32, MAX_PRECISION, MIN_PRECISION};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

const SAMPLES: usize = 2_000;

fn random_coords(seed: u64) -> Vec<(f64, f64)> {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut coords: Vec<(f64, f64)> = (0..SAMPLES)
        .map(|_| (rng.gen_range(-90.0..=90.0), rng.gen_range(-180.0..=180.0)))
        .collect();

    // Poles, antimeridian and the origin are where bisection edge cases live
    coords.extend_from_slice(&[
        (90.0, 180.0),
        (-90.0, -180.0),
        (90.0, -180.0),
        (-90.0, 180.0),
        (0.0, 0.0),
        (45.0, 90.0),
        (-0.0, -0.0),
    ]);
    coords
}

#[test]
fn test_decoded_bounds_contain_encoded_point() {
    for (lat, lon) in random_coords(7) {
        for precision in MIN_PRECISION..=MAX_PRECISION {
            let hash = encode(lat, lon, precision).expect("valid coordinate");
            assert_eq!(hash.len(), precision);

            let bounds = decode_bounds(&hash).expect("encoded hash decodes");
            assert!(
                bounds.contains(lat, lon),
                "({}, {}) not inside {:?} for {}",
                lat,
                lon,
                bounds,
                hash
            );
        }
    }
}

#[test]
fn test_prefix_monotonicity() {
    for (lat, lon) in random_coords(11) {
        for precision in MIN_PRECISION..MAX_PRECISION {
            let coarse = encode(lat, lon, precision).unwrap();
            let fine = encode(lat, lon, precision + 1).unwrap();
            assert!(
                fine.starts_with(&coarse),
                "{} is not a prefix of {} for ({}, {})",
                coarse,
                fine,
                lat,
                lon
            );
        }
    }
}

#[test]
fn test_child_cells_strictly_nest() {
    let mut rng = ChaCha8Rng::seed_from_u64(23);

    for _ in 0..200 {
        let len = rng.gen_range(1..MAX_PRECISION);
        let prefix: String = (0..len)
            .map(|_| BASE32[rng.gen_range(0..32)] as char)
            .collect();
        let parent = decode_bounds(&prefix).unwrap();

        for &c in BASE32.iter() {
            let child_hash = format!("{}{}", prefix, c as char);
            let child = decode_bounds(&child_hash).unwrap();

            assert!(parent.contains_bounds(&child), "{} escapes {}", child_hash, prefix);
            assert!(child.lat_span() < parent.lat_span() || child.lon_span() < parent.lon_span());
            assert!(child.lat_span() * child.lon_span() < parent.lat_span() * parent.lon_span());
        }
    }
}

#[test]
fn test_encode_is_thread_safe() {
    let coords = random_coords(31);
    let expected: Vec<String> = coords
        .iter()
        .map(|&(lat, lon)| encode(lat, lon, 8).unwrap())
        .collect();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            let coords = coords.clone();
            std::thread::spawn(move || {
                coords
                    .iter()
                    .map(|&(lat, lon)| encode(lat, lon, 8).unwrap())
                    .collect::<Vec<_>>()
            })
        })
        .collect();

    for handle in handles {
        assert_eq!(handle.join().unwrap(), expected);
    }
}
