//! # Elevation - HGT point ingestion and interpolation
//!
//! Turns SRTM `.hgt` tiles into geographic point records, stores them, and
//! estimates the elevation at arbitrary coordinates from the stored points.
//!
//! ## Features
//!
//! - **Decoding**: `.hgt` and `.hgt.zip` tiles, SRTM1 or SRTM3 detected from size
//! - **Storage**: in-memory, persisted (memory-mapped file) or straight from a
//!   tile directory, all behind the [`NeighborSource`] trait
//! - **Interpolation**: nearest neighbor, bilinear and bicubic (Catmull-Rom)
//!
//! ## Quick Start
//!
//! ```ignore
//! use elevation::{BulkLoad, ElevationService, HgtTile, InterpolationMethod, PointFileStore};
//!
//! // Ingest a tile into a persisted store
//! let tile = HgtTile::open("/data/N35E138.hgt")?;
//! let mut store = PointFileStore::open_or_create("/data/points.bin")?;
//! store.load(&tile.records()?)?;
//!
//! // Query it
//! let service = ElevationService::builder("/data/points.bin")
//!     .resolution(tile.resolution())
//!     .build()?;
//! let point = service.point_elevation(35.3606, 138.7274, InterpolationMethod::Bilinear)?;
//! println!("Elevation: {:.1}m", point.elevation);
//! ```
//!
//! ## HGT Data Format
//!
//! - **SRTM1**: 3601×3601 samples, 1 arc-second (~30m) resolution
//! - **SRTM3**: 1201×1201 samples, 3 arc-second (~90m) resolution
//!
//! Each sample is a 16-bit big-endian signed integer in meters, row 0 being
//! the northern edge. The value -32768 marks a void.

pub mod error;
pub mod filename;
pub mod interpolate;
pub mod point_file;
pub mod record;
pub mod service;
pub mod store;
pub mod tile;
pub mod tile_store;

// Re-export main types at crate root for convenience
pub use error::{ElevationError, Result};
pub use interpolate::{
    estimate, estimate_within_tile, estimate_within_tile_with, InterpolationMethod, VoidPolicy,
};
pub use point_file::PointFileStore;
pub use record::{read_csv, write_csv, PointRecord};
pub use service::{ElevationService, ElevationServiceBuilder, IncompletePolicy, QueryConfig};
pub use store::{BulkLoad, MemoryStore, NeighborSet, NeighborSource, SourceStats, Spacing};
pub use tile::{decode, sample_at, HgtTile, Resolution, VOID_VALUE};
pub use tile_store::{BoundingBox, CacheStats, PreloadStats, TileStore};
