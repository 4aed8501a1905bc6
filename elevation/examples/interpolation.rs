//! Compare grid interpolation against neighbor-based methods on a tile directory.
//!
//! Run with: cargo run --example interpolation -- /path/to/hgt/files

use elevation::{ElevationError, ElevationServiceBuilder, InterpolationMethod, Resolution};
use std::env;

fn main() -> Result<(), ElevationError> {
    let data_dir = env::args().nth(1).unwrap_or_else(|| {
        eprintln!("Usage: cargo run --example interpolation -- /path/to/hgt/files");
        std::process::exit(1);
    });

    let service = ElevationServiceBuilder::new(&data_dir)
        .resolution(Resolution::Srtm3)
        .cache_size(10)
        .build()?;

    let lat = 35.3606;
    let lng = 138.7274;

    println!("Comparing elevation methods at ({}, {}):", lat, lng);
    println!("{:-<50}", "");

    match service.grid_elevation(lat, lng) {
        Ok(point) => println!("Grid bilinear: {:.2}m", point.elevation),
        Err(e) => {
            println!("Error: {}", e);
            return Ok(());
        }
    }

    for method in [
        InterpolationMethod::Nearest,
        InterpolationMethod::Bilinear,
        InterpolationMethod::Bicubic,
    ] {
        match service.point_elevation(lat, lng, method) {
            Ok(point) => println!("{:<13} {:.2}m", format!("{}:", method), point.elevation),
            Err(e) => println!("{:<13} {}", format!("{}:", method), e),
        }
    }

    Ok(())
}
