//! Error types for the elevation library.

use std::path::PathBuf;
use thiserror::Error;

/// Errors that can occur when decoding tiles, loading stores or answering queries.
#[derive(Error, Debug)]
pub enum ElevationError {
    /// IO error when reading or writing files.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// Point record CSV could not be read or written.
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Tile identifier doesn't match `[NS]dd[EW]ddd`.
    #[error("Invalid tile name: {name:?} (expected e.g. N00E006 or S15W040)")]
    InvalidTileName { name: String },

    /// Buffer size doesn't match SRTM1 or SRTM3 format.
    #[error("Invalid tile size: {size} bytes (expected 25934402 for SRTM1 or 2884802 for SRTM3)")]
    InvalidTileSize { size: usize },

    /// Coordinates are outside the tile or the valid degree range.
    #[error("Coordinates out of bounds: lat={lat}, lng={lng}")]
    OutOfBounds { lat: f64, lng: f64 },

    /// Pixel index outside the tile grid.
    #[error("Pixel out of bounds: ({x},{y}) for a {samples}x{samples} grid")]
    PixelOutOfBounds { x: usize, y: usize, samples: usize },

    /// Unrecognized interpolation token.
    #[error("Invalid interpolation method: {method:?} (expected nearest, bilinear or bicubic)")]
    InvalidInterpolationMethod { method: String },

    /// The storage backend failed to answer a neighbor query.
    #[error("Neighbor query failed: {message}")]
    NeighborQuery { message: String },

    /// The backend returned fewer points than the method needs.
    #[error("Incomplete neighbor set for {method}: expected {expected} points, found {found}")]
    IncompleteNeighborSet {
        method: &'static str,
        expected: usize,
        found: usize,
    },

    /// A zipped tile could not be read.
    #[error("Zip error in {path}: {message}")]
    Zip { path: PathBuf, message: String },

    /// A point store file is truncated or has the wrong header.
    #[error("Invalid point store {path}: {reason}")]
    InvalidStoreFile { path: PathBuf, reason: String },

    /// A nearest-point query ran against a store with no points.
    #[error("Point store is empty")]
    EmptyStore,
}

/// Result type alias using [`ElevationError`].
pub type Result<T> = std::result::Result<T, ElevationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ElevationError::InvalidTileSize { size: 1000 };
        assert!(err.to_string().contains("1000"));

        let err = ElevationError::OutOfBounds {
            lat: 91.0,
            lng: 0.0,
        };
        assert!(err.to_string().contains("91"));

        let err = ElevationError::InvalidTileName {
            name: "X35E138".to_string(),
        };
        assert!(err.to_string().contains("X35E138"));

        let err = ElevationError::IncompleteNeighborSet {
            method: "bicubic",
            expected: 16,
            found: 9,
        };
        let msg = err.to_string();
        assert!(msg.contains("bicubic"));
        assert!(msg.contains("16"));
        assert!(msg.contains('9'));
    }
}
