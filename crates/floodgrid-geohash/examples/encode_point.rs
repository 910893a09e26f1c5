//! Example: Encode a coordinate at every precision and print the cell bounds.
//!
//! Usage: cargo run --example encode_point -- <lat> <lon>

use floodgrid_geohash::{decode_bounds, encode, MAX_PRECISION, MIN_PRECISION};
use std::env;

fn main() {
    let args: Vec<String> = env::args().collect();

    if args.len() < 3 {
        eprintln!("Usage: {} <lat> <lon>", args[0]);
        eprintln!("Example: {} 47.6062 -122.3321", args[0]);
        std::process::exit(1);
    }

    let lat: f64 = args[1].parse().expect("Invalid latitude");
    let lon: f64 = args[2].parse().expect("Invalid longitude");

    for precision in MIN_PRECISION..=MAX_PRECISION {
        let hash = match encode(lat, lon, precision) {
            Ok(hash) => hash,
            Err(e) => {
                eprintln!("Error: {}", e);
                std::process::exit(1);
            }
        };
        let bounds = decode_bounds(&hash).expect("encoded geohash decodes");
        println!(
            "{:>2} {:<12} lat {:.6}..{:.6}  lon {:.6}..{:.6}",
            precision, hash, bounds.south, bounds.north, bounds.west, bounds.east
        );
    }
}
