//! Decode a tile, load it into a persisted store and query it.
//!
//! Run with: cargo run --example basic -- /path/to/N35E138.hgt

use elevation::{
    BulkLoad, ElevationError, ElevationService, HgtTile, InterpolationMethod, PointFileStore,
};
use std::env;

fn main() -> Result<(), ElevationError> {
    let tile_path = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example basic -- /path/to/N35E138.hgt");
        std::process::exit(1);
    });

    let tile = HgtTile::open(&tile_path)?;
    let records = tile.records()?;
    println!(
        "{}: {:?}, {} non-void samples",
        tile.name(),
        tile.resolution(),
        records.len()
    );

    let store_path = env::temp_dir().join(format!("{}.points", tile.name()));
    let mut store = PointFileStore::open_or_create(&store_path)?;
    store.load(&records)?;
    drop(store);

    let service = ElevationService::builder(&store_path)
        .resolution(tile.resolution())
        .build()?;

    // Query the tile center with every method
    let (lat, lng) = tile.origin();
    let (lat, lng) = (lat as f64 + 0.5, lng as f64 + 0.5);
    for method in [
        InterpolationMethod::Nearest,
        InterpolationMethod::Bilinear,
        InterpolationMethod::Bicubic,
    ] {
        match service.point_elevation(lat, lng, method) {
            Ok(point) => println!("{:>8}: {:.2}m", method, point.elevation),
            Err(e) => println!("{:>8}: error - {}", method, e),
        }
    }

    Ok(())
}
