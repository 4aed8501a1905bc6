//! HGT tile parsing and decoding into point records.
//!
//! This module provides the [`HgtTile`] struct for reading `.hgt` and
//! `.hgt.zip` files, plus the free functions [`decode`] and [`sample_at`]
//! that work on a raw sample buffer.

use std::fs::File;
use std::io::Read;
use std::path::Path;
use std::str::FromStr;

use memmap2::Mmap;

use crate::error::{ElevationError, Result};
use crate::filename::{coords_to_tile_name, filename_to_lat_lng, parse_tile_name};
use crate::record::PointRecord;
use crate::store::Spacing;

/// File size for SRTM1 (1 arc-second, ~30m resolution): 3601 × 3601 × 2 bytes
const SRTM1_SIZE: usize = 3601 * 3601 * 2; // 25,934,402 bytes

/// File size for SRTM3 (3 arc-second, ~90m resolution): 1201 × 1201 × 2 bytes
const SRTM3_SIZE: usize = 1201 * 1201 * 2; // 2,884,802 bytes

/// Number of samples per row/column for SRTM1
const SRTM1_SAMPLES: usize = 3601;

/// Number of samples per row/column for SRTM3
const SRTM3_SAMPLES: usize = 1201;

/// Value indicating no data (void) in HGT files
pub const VOID_VALUE: i16 = -32768;

/// Resolution of an HGT tile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Resolution {
    /// SRTM1: 1 arc-second (~30m) resolution, 3601 samples per side
    Srtm1,
    /// SRTM3: 3 arc-second (~90m) resolution, 1201 samples per side
    Srtm3,
}

impl Resolution {
    /// Infer the resolution from a raw buffer length.
    pub fn from_byte_len(size: usize) -> Result<Self> {
        match size {
            SRTM1_SIZE => Ok(Resolution::Srtm1),
            SRTM3_SIZE => Ok(Resolution::Srtm3),
            size => Err(ElevationError::InvalidTileSize { size }),
        }
    }

    /// Returns the number of samples per row/column for this resolution.
    pub fn samples(&self) -> usize {
        match self {
            Resolution::Srtm1 => SRTM1_SAMPLES,
            Resolution::Srtm3 => SRTM3_SAMPLES,
        }
    }

    /// Returns the raw buffer size in bytes.
    pub fn byte_len(&self) -> usize {
        match self {
            Resolution::Srtm1 => SRTM1_SIZE,
            Resolution::Srtm3 => SRTM3_SIZE,
        }
    }

    /// Degrees between adjacent samples: `1 / (samples - 1)`.
    pub fn step(&self) -> f64 {
        1.0 / (self.samples() - 1) as f64
    }

    /// Half-width used for neighbor queries against points of this resolution.
    pub fn spacing(&self) -> Spacing {
        match self {
            Resolution::Srtm1 => Spacing::SRTM1,
            Resolution::Srtm3 => Spacing::SRTM3,
        }
    }

    /// Returns the approximate resolution in meters.
    pub fn meters(&self) -> f64 {
        match self {
            Resolution::Srtm1 => 30.0,
            Resolution::Srtm3 => 90.0,
        }
    }
}

impl FromStr for Resolution {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "srtm1" | "1" | "3601" => Ok(Resolution::Srtm1),
            "srtm3" | "3" | "1201" => Ok(Resolution::Srtm3),
            other => Err(format!("unknown resolution {:?} (expected srtm1 or srtm3)", other)),
        }
    }
}

/// Coordinates of the sample at `(row, col)` of a tile with the given origin.
///
/// Row 0 is the northern edge (`origin_lat + 1`), the last row lies exactly
/// on `origin_lat`.
pub fn pixel_position(
    resolution: Resolution,
    origin_lat: i32,
    origin_lng: i32,
    row: usize,
    col: usize,
) -> (f64, f64) {
    let intervals = (resolution.samples() - 1) as f64;
    let lat = origin_lat as f64 + (intervals - row as f64) / intervals;
    let lng = origin_lng as f64 + col as f64 / intervals;
    (lat, lng)
}

/// Decode a raw tile buffer into point records, dropping void samples.
///
/// The resolution is inferred from the buffer length. Records are emitted in
/// row-major order starting at the north-west corner.
///
/// # Errors
///
/// Returns [`ElevationError::InvalidTileSize`] unless the buffer holds exactly
/// 1201² or 3601² samples.
pub fn decode(bytes: &[u8], origin_lat: i32, origin_lng: i32) -> Result<Vec<PointRecord>> {
    let resolution = Resolution::from_byte_len(bytes.len())?;
    let mut records = Vec::with_capacity(resolution.samples() * resolution.samples());
    for_each_record(bytes, origin_lat, origin_lng, |record| records.push(record))?;
    Ok(records)
}

/// Streaming form of [`decode`]: calls `f` for every non-void sample.
///
/// Returns the number of records emitted.
pub fn for_each_record<F>(bytes: &[u8], origin_lat: i32, origin_lng: i32, mut f: F) -> Result<usize>
where
    F: FnMut(PointRecord),
{
    let resolution = Resolution::from_byte_len(bytes.len())?;
    let samples = resolution.samples();
    let mut emitted = 0;

    for (index, chunk) in bytes.chunks_exact(2).enumerate() {
        let elevation = i16::from_be_bytes([chunk[0], chunk[1]]);
        if elevation == VOID_VALUE {
            continue;
        }
        let (lat, lng) = pixel_position(
            resolution,
            origin_lat,
            origin_lng,
            index / samples,
            index % samples,
        );
        f(PointRecord::new(lat, lng, elevation as f64));
        emitted += 1;
    }

    Ok(emitted)
}

/// Read the raw sample at pixel `(x, y)` (x = column, y = row).
pub fn sample_at(bytes: &[u8], resolution: Resolution, x: usize, y: usize) -> Result<i16> {
    let samples = resolution.samples();
    let out_of_bounds = ElevationError::PixelOutOfBounds { x, y, samples };
    if x >= samples || y >= samples {
        return Err(out_of_bounds);
    }

    // 2 bytes per sample, row-major order
    let offset = (y * samples + x) * 2;
    match bytes.get(offset..offset + 2) {
        Some(pair) => Ok(i16::from_be_bytes([pair[0], pair[1]])),
        None => Err(out_of_bounds),
    }
}

/// Backing storage of a tile's raw samples.
enum TileData {
    /// Memory-mapped `.hgt` file
    Mapped(Mmap),
    /// Buffer read from an archive or handed in by the caller
    Owned(Vec<u8>),
}

impl AsRef<[u8]> for TileData {
    fn as_ref(&self) -> &[u8] {
        match self {
            TileData::Mapped(mmap) => mmap,
            TileData::Owned(bytes) => bytes,
        }
    }
}

/// A single 1° × 1° tile of raw elevation samples.
///
/// # Example
///
/// ```ignore
/// use elevation::HgtTile;
///
/// let tile = HgtTile::open("N00E006.hgt")?;
/// let records = tile.records()?;
/// println!("{} points", records.len());
/// ```
pub struct HgtTile {
    /// Raw big-endian samples
    data: TileData,
    /// Resolution type
    resolution: Resolution,
    /// Southwest corner latitude (integer)
    origin_lat: i32,
    /// Southwest corner longitude (integer)
    origin_lng: i32,
}

impl HgtTile {
    /// Open a `.hgt` or `.hgt.zip` file, taking the origin from its name.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let is_zip = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("zip"))
            .unwrap_or(false);

        if is_zip {
            Self::from_zip(path)
        } else {
            let (lat, lng) = filename_to_lat_lng(path)?;
            Self::from_file_with_coords(path, lat, lng)
        }
    }

    /// Load a `.hgt` file with explicit origin coordinates.
    ///
    /// Useful when the filename doesn't follow the naming convention.
    pub fn from_file_with_coords<P: AsRef<Path>>(
        path: P,
        origin_lat: i32,
        origin_lng: i32,
    ) -> Result<Self> {
        let file = File::open(&path)?;

        // SAFETY: Memory mapping is safe as long as the file is not modified
        // while mapped. We open the file read-only and don't expose the mapping.
        let mmap = unsafe { Mmap::map(&file)? };
        let resolution = Resolution::from_byte_len(mmap.len())?;

        Ok(Self {
            data: TileData::Mapped(mmap),
            resolution,
            origin_lat,
            origin_lng,
        })
    }

    /// Load the first `.hgt` entry of a zip archive.
    ///
    /// The origin comes from the entry name, falling back to the archive name.
    pub fn from_zip<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let (entry_name, bytes) = read_zip_entry(path)?;
        let (lat, lng) = filename_to_lat_lng(Path::new(&entry_name))
            .or_else(|_| filename_to_lat_lng(path))?;
        Self::from_bytes(bytes, lat, lng)
    }

    /// Load the first `.hgt` entry of a zip archive with explicit origin
    /// coordinates, ignoring the entry and archive names.
    pub fn from_zip_with_coords<P: AsRef<Path>>(
        path: P,
        origin_lat: i32,
        origin_lng: i32,
    ) -> Result<Self> {
        let (_, bytes) = read_zip_entry(path.as_ref())?;
        Self::from_bytes(bytes, origin_lat, origin_lng)
    }

    /// Wrap a raw buffer, e.g. one read from stdin.
    pub fn from_bytes(bytes: Vec<u8>, origin_lat: i32, origin_lng: i32) -> Result<Self> {
        let resolution = Resolution::from_byte_len(bytes.len())?;
        Ok(Self {
            data: TileData::Owned(bytes),
            resolution,
            origin_lat,
            origin_lng,
        })
    }

    /// Wrap a raw buffer whose origin is given by a tile identifier.
    pub fn from_named_bytes(bytes: Vec<u8>, name: &str) -> Result<Self> {
        let (lat, lng) = parse_tile_name(name)?;
        Self::from_bytes(bytes, lat, lng)
    }

    /// Decode every non-void sample into a [`PointRecord`].
    pub fn records(&self) -> Result<Vec<PointRecord>> {
        decode(self.bytes(), self.origin_lat, self.origin_lng)
    }

    /// Raw sample at column `x`, row `y`.
    pub fn sample(&self, x: usize, y: usize) -> Result<i16> {
        sample_at(self.bytes(), self.resolution, x, y)
    }

    /// Coordinates of the sample at column `x`, row `y`.
    pub fn position(&self, x: usize, y: usize) -> (f64, f64) {
        pixel_position(self.resolution, self.origin_lat, self.origin_lng, y, x)
    }

    /// Whether `(lat, lng)` falls inside `[origin, origin + 1)` on both axes.
    pub fn contains(&self, lat: f64, lng: f64) -> bool {
        let lat0 = self.origin_lat as f64;
        let lng0 = self.origin_lng as f64;
        (lat0..lat0 + 1.0).contains(&lat) && (lng0..lng0 + 1.0).contains(&lng)
    }

    /// Fractional pixel coordinates `(x, y)` of a position inside the tile.
    pub fn pixel_coords(&self, lat: f64, lng: f64) -> (f64, f64) {
        let intervals = (self.samples() - 1) as f64;
        let x = (lng - self.origin_lng as f64) * intervals;
        let y = (self.origin_lat as f64 + 1.0 - lat) * intervals;
        (x, y)
    }

    /// Raw big-endian sample buffer.
    pub fn bytes(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the resolution of this tile.
    pub fn resolution(&self) -> Resolution {
        self.resolution
    }

    /// Returns the number of samples per row/column.
    pub fn samples(&self) -> usize {
        self.resolution.samples()
    }

    /// Returns the origin (southwest corner) as `(lat, lng)`.
    pub fn origin(&self) -> (i32, i32) {
        (self.origin_lat, self.origin_lng)
    }

    /// Tile identifier, e.g. `N00E006`.
    pub fn name(&self) -> String {
        coords_to_tile_name(self.origin_lat, self.origin_lng)
    }
}

/// Name and contents of the first `.hgt` entry in a zip archive.
fn read_zip_entry(path: &Path) -> Result<(String, Vec<u8>)> {
    let zip_error = |e: zip::result::ZipError| ElevationError::Zip {
        path: path.to_path_buf(),
        message: e.to_string(),
    };

    let file = File::open(path)?;
    let mut archive = zip::ZipArchive::new(file).map_err(zip_error)?;

    for i in 0..archive.len() {
        let mut entry = archive.by_index(i).map_err(zip_error)?;
        if !entry.name().to_ascii_lowercase().ends_with(".hgt") {
            continue;
        }

        let entry_name = entry.name().to_string();
        let mut bytes = Vec::with_capacity(entry.size() as usize);
        entry.read_to_end(&mut bytes)?;
        tracing::debug!(archive = %path.display(), entry = %entry_name, "Read tile from zip");
        return Ok((entry_name, bytes));
    }

    Err(ElevationError::Zip {
        path: path.to_path_buf(),
        message: "no .hgt entry in archive".to_string(),
    })
}
