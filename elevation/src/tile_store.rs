//! Neighbor queries answered straight from a directory of HGT tiles.
//!
//! [`TileStore`] loads `.hgt` or `.hgt.zip` files on demand and keeps them in
//! an LRU cache, so a query never needs the tile to be ingested first.

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Instant;

use moka::sync::Cache;

use crate::error::{ElevationError, Result};
use crate::filename::{coordinates_valid, coords_to_tile_name, filename_to_lat_lng};
use crate::interpolate::{estimate_within_tile_with, VoidPolicy};
use crate::record::PointRecord;
use crate::store::{NeighborSet, NeighborSource, SourceStats, Spacing};
use crate::tile::{HgtTile, VOID_VALUE};

/// File name suffixes tried for a tile, in order of preference.
const TILE_SUFFIXES: [&str; 6] = [
    ".hgt",
    ".hgt.zip",
    ".SRTMGL1.hgt",
    ".SRTMGL1.hgt.zip",
    ".SRTMGL3.hgt",
    ".SRTMGL3.hgt.zip",
];

/// Pixels searched around a void sample when looking for the nearest point.
const NEAREST_SEARCH_RADIUS: usize = 2;

/// Statistics about cache usage.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    /// Number of tiles currently in the cache.
    pub entry_count: u64,
    /// Number of cache hits (requests served from cache).
    pub hit_count: u64,
    /// Number of cache misses (tiles loaded from disk).
    pub miss_count: u64,
}

impl CacheStats {
    /// Calculate the cache hit rate (0.0 to 1.0).
    ///
    /// Returns 0.0 if no requests have been made.
    pub fn hit_rate(&self) -> f64 {
        let total = self.hit_count + self.miss_count;
        if total == 0 {
            0.0
        } else {
            self.hit_count as f64 / total as f64
        }
    }
}

/// A geographic bounding box for filtering tiles during preload.
#[derive(Debug, Clone, Copy)]
pub struct BoundingBox {
    pub min_lat: f64,
    pub min_lng: f64,
    pub max_lat: f64,
    pub max_lng: f64,
}

impl BoundingBox {
    pub fn new(min_lat: f64, min_lng: f64, max_lat: f64, max_lng: f64) -> Self {
        Self {
            min_lat,
            min_lng,
            max_lat,
            max_lng,
        }
    }

    /// Check if this bounding box overlaps the tile covering
    /// `[tile_lat, tile_lat+1) × [tile_lng, tile_lng+1)`.
    pub fn overlaps_tile(&self, tile_lat: i32, tile_lng: i32) -> bool {
        self.min_lat < (tile_lat + 1) as f64
            && self.max_lat > tile_lat as f64
            && self.min_lng < (tile_lng + 1) as f64
            && self.max_lng > tile_lng as f64
    }
}

/// Statistics from a preload operation.
#[derive(Debug, Clone, Default)]
pub struct PreloadStats {
    /// Number of tiles successfully loaded into cache.
    pub tiles_loaded: u64,
    /// Number of tiles that were already in cache.
    pub tiles_already_cached: u64,
    /// Number of tiles that failed to load.
    pub tiles_failed: u64,
    /// Number of tiles that matched the bounding box filter.
    pub tiles_matched: u64,
    /// Total elapsed time in milliseconds.
    pub elapsed_ms: u64,
}

/// Tile directory backend with an LRU cache of decoded tiles.
///
/// Neighbor queries use the grid of the tile containing the query:
/// the nearest sample, the 2×2 cell around the query, or the 4×4 window
/// around that cell shifted to stay inside the tile. Void samples are
/// left out, so sets over voids come back incomplete.
///
/// # Example
///
/// ```ignore
/// use elevation::{NeighborSource, Spacing, TileStore};
///
/// let store = TileStore::new("/data/srtm", 100);
/// let set = store.four_neighbors(35.3606, 138.7274, Spacing::SRTM3)?;
/// println!("{} of {} neighbors", set.len(), set.expected());
/// ```
pub struct TileStore {
    /// Directory containing .hgt / .hgt.zip files.
    data_dir: PathBuf,
    /// LRU cache of loaded tiles, keyed by (floor_lat, floor_lng).
    tile_cache: Cache<(i32, i32), Arc<HgtTile>>,
    hit_count: AtomicU64,
    miss_count: AtomicU64,
    void_policy: VoidPolicy,
}

impl TileStore {
    /// Create a store over `data_dir` caching at most `cache_size` tiles.
    pub fn new<P: AsRef<Path>>(data_dir: P, cache_size: u64) -> Self {
        Self {
            data_dir: data_dir.as_ref().to_path_buf(),
            tile_cache: Cache::builder().max_capacity(cache_size).build(),
            hit_count: AtomicU64::new(0),
            miss_count: AtomicU64::new(0),
            void_policy: VoidPolicy::default(),
        }
    }

    /// Set how [`Self::elevation_within_tile`] treats void cell corners.
    pub fn with_void_policy(mut self, policy: VoidPolicy) -> Self {
        self.void_policy = policy;
        self
    }

    /// Bilinear elevation straight from the tile grid.
    pub fn elevation_within_tile(&self, lat: f64, lng: f64) -> Result<f64> {
        let tile = self.tile_for(lat, lng)?;
        let (origin_lat, origin_lng) = tile.origin();
        estimate_within_tile_with(
            tile.bytes(),
            tile.resolution(),
            origin_lat,
            origin_lng,
            lat,
            lng,
            self.void_policy,
        )
    }

    /// The tile covering `(lat, lng)`, from cache or disk.
    pub fn tile_for(&self, lat: f64, lng: f64) -> Result<Arc<HgtTile>> {
        if !coordinates_valid(lat, lng) {
            return Err(ElevationError::OutOfBounds { lat, lng });
        }
        self.load_tile((lat.floor() as i32, lng.floor() as i32))
    }

    fn load_tile(&self, key: (i32, i32)) -> Result<Arc<HgtTile>> {
        if let Some(tile) = self.tile_cache.get(&key) {
            self.hit_count.fetch_add(1, Ordering::Relaxed);
            return Ok(tile);
        }
        self.miss_count.fetch_add(1, Ordering::Relaxed);

        let name = coords_to_tile_name(key.0, key.1);
        let path = TILE_SUFFIXES
            .iter()
            .map(|suffix| self.data_dir.join(format!("{}{}", name, suffix)))
            .find(|path| path.exists())
            .ok_or_else(|| ElevationError::NeighborQuery {
                message: format!("no tile {} in {}", name, self.data_dir.display()),
            })?;

        // The cache key is the origin, whatever a zip entry is called
        let tile = if path.extension().map_or(false, |ext| ext == "zip") {
            HgtTile::from_zip_with_coords(&path, key.0, key.1)?
        } else {
            HgtTile::from_file_with_coords(&path, key.0, key.1)?
        };

        tracing::debug!(tile = %name, resolution = ?tile.resolution(), "Loaded tile");
        let tile = Arc::new(tile);
        self.tile_cache.insert(key, tile.clone());
        Ok(tile)
    }

    /// Get cache statistics.
    pub fn cache_stats(&self) -> CacheStats {
        CacheStats {
            entry_count: self.tile_cache.entry_count(),
            hit_count: self.hit_count.load(Ordering::Relaxed),
            miss_count: self.miss_count.load(Ordering::Relaxed),
        }
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn cache_capacity(&self) -> u64 {
        self.tile_cache.policy().max_capacity().unwrap_or(0)
    }

    /// Clear all tiles from the cache.
    pub fn clear_cache(&self) {
        self.tile_cache.invalidate_all();
    }

    /// Scan the data directory for `.hgt` and `.hgt.zip` files.
    ///
    /// Returns sorted tile filenames (e.g. `["N35E138.hgt"]`); a tile present
    /// both plain and zipped appears once.
    pub fn scan_tile_files(&self) -> Vec<String> {
        let mut filenames = HashSet::new();

        let entries = match std::fs::read_dir(&self.data_dir) {
            Ok(entries) => entries,
            Err(_) => return Vec::new(),
        };

        for entry in entries.flatten() {
            let name = entry.file_name();
            let name = name.to_string_lossy();

            if let Some(hgt_name) = name.strip_suffix(".zip") {
                if hgt_name.ends_with(".hgt") {
                    filenames.insert(hgt_name.to_string());
                }
            } else if name.ends_with(".hgt") {
                filenames.insert(name.to_string());
            }
        }

        let mut result: Vec<String> = filenames.into_iter().collect();
        result.sort();
        result
    }

    /// Load tiles into the cache, optionally only those overlapping one of
    /// `bounds`.
    pub fn preload(&self, bounds: Option<&[BoundingBox]>) -> PreloadStats {
        let start = Instant::now();
        let mut stats = PreloadStats::default();

        for filename in self.scan_tile_files() {
            let key = match filename_to_lat_lng(Path::new(&filename)) {
                Ok(key) => key,
                Err(_) => continue,
            };

            if let Some(boxes) = bounds {
                if !boxes.iter().any(|b| b.overlaps_tile(key.0, key.1)) {
                    continue;
                }
            }

            stats.tiles_matched += 1;

            if self.tile_cache.contains_key(&key) {
                stats.tiles_already_cached += 1;
                continue;
            }

            match self.load_tile(key) {
                Ok(_) => stats.tiles_loaded += 1,
                Err(e) => {
                    tracing::warn!(tile = %filename, error = %e, "Failed to preload tile");
                    stats.tiles_failed += 1;
                }
            }
        }

        stats.elapsed_ms = start.elapsed().as_millis() as u64;
        stats
    }
}

/// Non-void samples of `tile` in the given pixel ranges, sorted by position.
fn collect_window(
    tile: &HgtTile,
    cols: std::ops::RangeInclusive<usize>,
    rows: std::ops::RangeInclusive<usize>,
) -> Result<Vec<PointRecord>> {
    let mut points = Vec::with_capacity(16);
    for y in rows {
        for x in cols.clone() {
            let value = tile.sample(x, y)?;
            if value == VOID_VALUE {
                continue;
            }
            let (lat, lng) = tile.position(x, y);
            points.push(PointRecord::new(lat, lng, value as f64));
        }
    }
    points.sort_by(PointRecord::cmp_position);
    Ok(points)
}

/// Top-left pixel of the cell containing fractional pixel coordinate `v`.
fn cell_start(v: f64, samples: usize) -> usize {
    v.floor().clamp(0.0, (samples - 2) as f64) as usize
}

/// First index of a `len`-wide window around `cell`, kept inside the tile.
fn window_start(cell: usize, len: usize, samples: usize) -> usize {
    cell.saturating_sub(len / 2 - 1).min(samples - len)
}

impl NeighborSource for TileStore {
    fn nearest(&self, lat: f64, lng: f64) -> Result<PointRecord> {
        let tile = self.tile_for(lat, lng)?;
        let samples = tile.samples();
        let (x, y) = tile.pixel_coords(lat, lng);
        let last = (samples - 1) as f64;
        let px = x.round().clamp(0.0, last) as usize;
        let py = y.round().clamp(0.0, last) as usize;

        let value = tile.sample(px, py)?;
        if value != VOID_VALUE {
            let (plat, plng) = tile.position(px, py);
            return Ok(PointRecord::new(plat, plng, value as f64));
        }

        let r = NEAREST_SEARCH_RADIUS;
        let cols = px.saturating_sub(r)..=(px + r).min(samples - 1);
        let rows = py.saturating_sub(r)..=(py + r).min(samples - 1);
        collect_window(&tile, cols, rows)?
            .into_iter()
            .min_by(|a, b| a.distance_sq(lat, lng).total_cmp(&b.distance_sq(lat, lng)))
            .ok_or_else(|| ElevationError::NeighborQuery {
                message: format!("only void samples near ({}, {}) in {}", lat, lng, tile.name()),
            })
    }

    fn four_neighbors(&self, lat: f64, lng: f64, _spacing: Spacing) -> Result<NeighborSet> {
        let tile = self.tile_for(lat, lng)?;
        let samples = tile.samples();
        let (x, y) = tile.pixel_coords(lat, lng);
        let (x0, y0) = (cell_start(x, samples), cell_start(y, samples));

        let points = collect_window(&tile, x0..=x0 + 1, y0..=y0 + 1)?;
        Ok(NeighborSet::new(points, 4))
    }

    fn sixteen_neighbors(&self, lat: f64, lng: f64, _spacing: Spacing) -> Result<NeighborSet> {
        let tile = self.tile_for(lat, lng)?;
        let samples = tile.samples();
        let (x, y) = tile.pixel_coords(lat, lng);
        let xs = window_start(cell_start(x, samples), 4, samples);
        let ys = window_start(cell_start(y, samples), 4, samples);

        let points = collect_window(&tile, xs..=xs + 3, ys..=ys + 3)?;
        Ok(NeighborSet::new(points, 16))
    }

    fn stats(&self) -> SourceStats {
        SourceStats::Tiles(self.cache_stats())
    }
}
