//! Tile identifier utilities.
//!
//! This module converts between tile identifiers and the integer coordinates
//! of their south-west corner.
//!
//! # Identifier Format
//!
//! Tiles are named `{N|S}{lat}{E|W}{lng}`:
//!
//! - Latitude: 2 digits with N/S prefix (e.g., N00, S15)
//! - Longitude: 3 digits with E/W prefix (e.g., E006, W040)
//!
//! The identifier names the **south-west corner** of the 1° × 1° tile. Files
//! carry it as their stem: `N00E006.hgt`, `N00E006.hgt.zip` or
//! `N00E006.SRTMGL1.hgt.zip`.

use std::path::Path;

use crate::error::{ElevationError, Result};

/// Parse a tile identifier into the (latitude, longitude) of its south-west corner.
///
/// Only the bare identifier is accepted; use [`tile_name_from_path`] to strip
/// directories and extensions first.
///
/// # Examples
///
/// ```
/// use elevation::filename::parse_tile_name;
///
/// assert_eq!(parse_tile_name("N00E006").unwrap(), (0, 6));
/// assert_eq!(parse_tile_name("S15W040").unwrap(), (-15, -40));
/// assert!(parse_tile_name("N00E06").is_err());
/// ```
pub fn parse_tile_name(name: &str) -> Result<(i32, i32)> {
    let invalid = || ElevationError::InvalidTileName {
        name: name.to_string(),
    };

    let bytes = name.as_bytes();
    if bytes.len() != 7 {
        return Err(invalid());
    }

    let lat_sign = match bytes[0] {
        b'N' => 1,
        b'S' => -1,
        _ => return Err(invalid()),
    };
    let lng_sign = match bytes[3] {
        b'E' => 1,
        b'W' => -1,
        _ => return Err(invalid()),
    };

    let lat = parse_digits(&bytes[1..3]).ok_or_else(invalid)?;
    let lng = parse_digits(&bytes[4..7]).ok_or_else(invalid)?;

    Ok((lat * lat_sign, lng * lng_sign))
}

/// Decimal value of an ASCII digit run. `str::parse` would also accept a sign.
fn parse_digits(digits: &[u8]) -> Option<i32> {
    digits.iter().try_fold(0i32, |acc, &b| {
        b.is_ascii_digit().then(|| acc * 10 + i32::from(b - b'0'))
    })
}

/// Identifier of the tile containing the given coordinates.
///
/// The floor of each coordinate is the tile origin; zero counts as
/// non-negative.
///
/// # Examples
///
/// ```
/// use elevation::filename::tile_name_for;
///
/// assert_eq!(tile_name_for(0.5, 6.5), "N00E006");
/// assert_eq!(tile_name_for(-14.2, -39.1), "S15W040");
/// assert_eq!(tile_name_for(0.5, -0.5), "N00W001");
/// ```
pub fn tile_name_for(lat: f64, lng: f64) -> String {
    coords_to_tile_name(lat.floor() as i32, lng.floor() as i32)
}

/// Identifier of the tile whose south-west corner is `(lat, lng)`.
pub fn coords_to_tile_name(lat: i32, lng: i32) -> String {
    let lat_prefix = if lat >= 0 { 'N' } else { 'S' };
    let lng_prefix = if lng >= 0 { 'E' } else { 'W' };

    format!(
        "{}{:02}{}{:03}",
        lat_prefix,
        lat.unsigned_abs(),
        lng_prefix,
        lng.unsigned_abs()
    )
}

/// `.hgt` filename for the tile containing the given coordinates.
///
/// ```
/// use elevation::filename::lat_lng_to_filename;
///
/// assert_eq!(lat_lng_to_filename(35.5, 138.7), "N35E138.hgt");
/// ```
pub fn lat_lng_to_filename(lat: f64, lng: f64) -> String {
    format!("{}.hgt", tile_name_for(lat, lng))
}

/// Extract the tile identifier from a path such as `/data/N00E006.SRTMGL1.hgt.zip`.
///
/// Returns the part of the file name before the first `.`; the result is not
/// validated.
pub fn tile_name_from_path(path: &Path) -> Option<&str> {
    let name = path.file_name()?.to_str()?;
    name.split('.').next().filter(|stem| !stem.is_empty())
}

/// Parse the tile origin out of a file path.
///
/// ```
/// use std::path::Path;
/// use elevation::filename::filename_to_lat_lng;
///
/// assert_eq!(filename_to_lat_lng(Path::new("/data/S15W040.hgt")).unwrap(), (-15, -40));
/// ```
pub fn filename_to_lat_lng(path: &Path) -> Result<(i32, i32)> {
    let name = tile_name_from_path(path).ok_or_else(|| ElevationError::InvalidTileName {
        name: path.display().to_string(),
    })?;
    parse_tile_name(name)
}

/// Validate that coordinates are within the degree range `[-90,90] × [-180,180]`.
pub fn coordinates_valid(lat: f64, lng: f64) -> bool {
    (-90.0..=90.0).contains(&lat) && (-180.0..=180.0).contains(&lng)
}
