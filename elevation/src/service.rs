//! Elevation queries over a configured storage backend.
//!
//! [`ElevationService`] validates the query coordinate, asks its
//! [`NeighborSource`] for the points the interpolation method needs, and
//! returns the estimate as a [`PointRecord`] at the query position.
//!
//! ```ignore
//! use elevation::{ElevationServiceBuilder, InterpolationMethod};
//!
//! let service = ElevationServiceBuilder::new("/data/points.bin")
//!     .resolution(elevation::Resolution::Srtm3)
//!     .build()?;
//!
//! let point = service.point_elevation(0.5, 6.5, InterpolationMethod::Bicubic)?;
//! println!("{}", point);
//! ```

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

use crate::error::{ElevationError, Result};
use crate::filename::coordinates_valid;
use crate::interpolate::{estimate, InterpolationMethod, VoidPolicy};
use crate::point_file::PointFileStore;
use crate::record::PointRecord;
use crate::store::{NeighborSet, NeighborSource, SourceStats, Spacing};
use crate::tile::Resolution;
use crate::tile_store::TileStore;

/// Default number of tiles kept by the tile backend.
const DEFAULT_CACHE_SIZE: u64 = 100;

/// What to do when a backend returns fewer neighbors than a method needs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum IncompletePolicy {
    /// Fail with [`ElevationError::IncompleteNeighborSet`].
    #[default]
    Reject,
    /// Answer with the nearest stored point instead.
    Degrade,
}

impl FromStr for IncompletePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "reject" => Ok(IncompletePolicy::Reject),
            "degrade" => Ok(IncompletePolicy::Degrade),
            other => Err(format!(
                "unknown incomplete policy {:?} (expected reject or degrade)",
                other
            )),
        }
    }
}

/// Query parameters shared by every request.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct QueryConfig {
    /// Half-width of neighbor windows, normally the sample spacing.
    pub spacing: Spacing,
    pub incomplete: IncompletePolicy,
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            spacing: Spacing::SRTM1,
            incomplete: IncompletePolicy::Reject,
        }
    }
}

/// Point elevation queries against one storage backend.
///
/// The backend is shared behind an `Arc`, so a service can be queried from
/// many threads at once.
pub struct ElevationService {
    source: Arc<dyn NeighborSource>,
    tiles: Option<Arc<TileStore>>,
    config: QueryConfig,
}

impl ElevationService {
    /// Wrap any neighbor source.
    pub fn new(source: Arc<dyn NeighborSource>, config: QueryConfig) -> Self {
        Self {
            source,
            tiles: None,
            config,
        }
    }

    /// Query a tile directory; also enables [`Self::grid_elevation`].
    pub fn from_tiles(tiles: TileStore, config: QueryConfig) -> Self {
        let tiles = Arc::new(tiles);
        Self {
            source: tiles.clone(),
            tiles: Some(tiles),
            config,
        }
    }

    pub fn builder<P: AsRef<Path>>(store: P) -> ElevationServiceBuilder {
        ElevationServiceBuilder::new(store)
    }

    pub fn config(&self) -> &QueryConfig {
        &self.config
    }

    /// The tile backend, if this service reads a tile directory.
    pub fn tiles(&self) -> Option<&TileStore> {
        self.tiles.as_deref()
    }

    /// Estimate the elevation at `(lat, lng)` with the given method.
    ///
    /// The returned record carries the query coordinate, not the coordinate
    /// of any stored point.
    ///
    /// # Errors
    ///
    /// - [`ElevationError::OutOfBounds`] for coordinates outside
    ///   `[-90,90] × [-180,180]`
    /// - [`ElevationError::IncompleteNeighborSet`] when the backend finds too
    ///   few neighbors and the policy is [`IncompletePolicy::Reject`]
    /// - whatever the backend reports for failed lookups
    pub fn point_elevation(
        &self,
        lat: f64,
        lng: f64,
        method: InterpolationMethod,
    ) -> Result<PointRecord> {
        if !coordinates_valid(lat, lng) {
            return Err(ElevationError::OutOfBounds { lat, lng });
        }

        let elevation = match method {
            InterpolationMethod::Nearest => self.source.nearest(lat, lng)?.elevation,
            InterpolationMethod::Bilinear => {
                let set = self.source.four_neighbors(lat, lng, self.config.spacing)?;
                self.interpolate(method, &set, lat, lng)?
            }
            InterpolationMethod::Bicubic => {
                let set = self.source.sixteen_neighbors(lat, lng, self.config.spacing)?;
                self.interpolate(method, &set, lat, lng)?
            }
        };

        Ok(PointRecord::new(lat, lng, elevation))
    }

    fn interpolate(
        &self,
        method: InterpolationMethod,
        set: &NeighborSet,
        lat: f64,
        lng: f64,
    ) -> Result<f64> {
        if set.is_complete() || self.config.incomplete == IncompletePolicy::Reject {
            return estimate(method, set, lat, lng);
        }

        tracing::debug!(
            %method,
            found = set.len(),
            expected = set.expected(),
            lat,
            lng,
            "Incomplete neighbor set, falling back to nearest point"
        );
        Ok(self.source.nearest(lat, lng)?.elevation)
    }

    /// Bilinear elevation straight from the tile grid, honoring the tile
    /// backend's void policy.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::NeighborQuery`] when the service is not
    /// backed by a tile directory.
    pub fn grid_elevation(&self, lat: f64, lng: f64) -> Result<PointRecord> {
        let tiles = self.tiles.as_ref().ok_or_else(|| ElevationError::NeighborQuery {
            message: "grid interpolation needs a tile directory backend".to_string(),
        })?;
        let elevation = tiles.elevation_within_tile(lat, lng)?;
        Ok(PointRecord::new(lat, lng, elevation))
    }

    /// What the backend holds.
    pub fn stats(&self) -> SourceStats {
        self.source.stats()
    }
}

/// Builder for [`ElevationService`].
///
/// A directory selects the [`TileStore`] backend, a file the
/// [`PointFileStore`].
#[derive(Debug, Clone)]
pub struct ElevationServiceBuilder {
    store: PathBuf,
    resolution: Resolution,
    cache_size: u64,
    incomplete: IncompletePolicy,
    void_fill: VoidPolicy,
}

impl ElevationServiceBuilder {
    pub fn new<P: AsRef<Path>>(store: P) -> Self {
        Self {
            store: store.as_ref().to_path_buf(),
            resolution: Resolution::Srtm1,
            cache_size: DEFAULT_CACHE_SIZE,
            incomplete: IncompletePolicy::Reject,
            void_fill: VoidPolicy::Zero,
        }
    }

    /// Create a builder configured from environment variables.
    ///
    /// | Variable | Description | Default |
    /// |----------|-------------|---------|
    /// | `ELEVATION_STORE` | Point store file or tile directory | Required |
    /// | `ELEVATION_RESOLUTION` | `srtm1` or `srtm3` | `srtm1` |
    /// | `ELEVATION_CACHE_SIZE` | Maximum tiles in cache | 100 |
    /// | `ELEVATION_INCOMPLETE` | `reject` or `degrade` | `reject` |
    /// | `ELEVATION_VOID_FILL` | `zero` or `nearest-valid` | `zero` |
    ///
    /// Unparseable optional values fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns an error if `ELEVATION_STORE` is not set.
    pub fn from_env() -> Result<Self> {
        let store = std::env::var("ELEVATION_STORE").map_err(|_| {
            ElevationError::Io(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "ELEVATION_STORE environment variable not set",
            ))
        })?;

        let mut builder = Self::new(store);
        if let Some(resolution) = env_parse("ELEVATION_RESOLUTION") {
            builder.resolution = resolution;
        }
        if let Some(cache_size) = env_parse("ELEVATION_CACHE_SIZE") {
            builder.cache_size = cache_size;
        }
        if let Some(incomplete) = env_parse("ELEVATION_INCOMPLETE") {
            builder.incomplete = incomplete;
        }
        if let Some(void_fill) = env_parse("ELEVATION_VOID_FILL") {
            builder.void_fill = void_fill;
        }
        Ok(builder)
    }

    pub fn store<P: AsRef<Path>>(mut self, path: P) -> Self {
        self.store = path.as_ref().to_path_buf();
        self
    }

    /// Sample resolution of the stored points; sets the neighbor spacing.
    pub fn resolution(mut self, resolution: Resolution) -> Self {
        self.resolution = resolution;
        self
    }

    /// Maximum number of tiles cached by the tile backend.
    pub fn cache_size(mut self, size: u64) -> Self {
        self.cache_size = size;
        self
    }

    pub fn incomplete(mut self, policy: IncompletePolicy) -> Self {
        self.incomplete = policy;
        self
    }

    pub fn void_fill(mut self, policy: VoidPolicy) -> Self {
        self.void_fill = policy;
        self
    }

    /// Open the backend and build the service.
    ///
    /// # Errors
    ///
    /// Fails if a point store path doesn't exist or isn't a valid store.
    pub fn build(self) -> Result<ElevationService> {
        let config = QueryConfig {
            spacing: self.resolution.spacing(),
            incomplete: self.incomplete,
        };

        if self.store.is_dir() {
            tracing::info!(dir = %self.store.display(), cache_size = self.cache_size, "Using tile directory");
            let tiles = TileStore::new(&self.store, self.cache_size).with_void_policy(self.void_fill);
            Ok(ElevationService::from_tiles(tiles, config))
        } else {
            let store = PointFileStore::open(&self.store)?;
            tracing::info!(path = %self.store.display(), points = store.len(), "Using point store");
            Ok(ElevationService::new(Arc::new(store), config))
        }
    }
}

fn env_parse<T: FromStr>(name: &str) -> Option<T>
where
    T::Err: std::fmt::Display,
{
    let value = std::env::var(name).ok()?;
    match value.parse() {
        Ok(parsed) => Some(parsed),
        Err(e) => {
            tracing::warn!(variable = name, value = %value, error = %e, "Ignoring invalid setting");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::tests::grid;
    use crate::store::{BulkLoad, MemoryStore};
    use crate::tile::tests::{filled_srtm3, set_sample};
    use tempfile::TempDir;

    const STEP: f64 = 1.0 / 3600.0;

    /// 10×10 SRTM1-spaced grid at the origin where elevation = row*10 + col.
    fn memory_service(incomplete: IncompletePolicy) -> ElevationService {
        let store = MemoryStore::from_records(grid(0.0, 0.0, STEP, 10)).unwrap();
        ElevationService::new(
            Arc::new(store),
            QueryConfig {
                spacing: Spacing::SRTM1,
                incomplete,
            },
        )
    }

    #[test]
    fn test_point_elevation_methods() {
        let service = memory_service(IncompletePolicy::Reject);
        let (lat, lng) = (4.5 * STEP, 6.5 * STEP);

        // Plane: elevation = 10*row + col, so the cell center is 51.5
        let bilinear = service
            .point_elevation(lat, lng, InterpolationMethod::Bilinear)
            .unwrap();
        assert_eq!((bilinear.latitude, bilinear.longitude), (lat, lng));
        assert!((bilinear.elevation - 51.5).abs() < 1e-6);

        let bicubic = service
            .point_elevation(lat, lng, InterpolationMethod::Bicubic)
            .unwrap();
        assert!((bicubic.elevation - 51.5).abs() < 1e-6);

        let nearest = service
            .point_elevation(4.1 * STEP, 6.2 * STEP, InterpolationMethod::Nearest)
            .unwrap();
        assert_eq!(nearest.elevation, 46.0);
        assert_eq!(nearest.latitude, 4.1 * STEP);
    }

    #[test]
    fn test_point_elevation_out_of_bounds() {
        let service = memory_service(IncompletePolicy::Reject);
        for (lat, lng) in [(90.5, 0.0), (-91.0, 0.0), (0.0, 180.1), (f64::NAN, 0.0)] {
            assert!(matches!(
                service.point_elevation(lat, lng, InterpolationMethod::Nearest),
                Err(ElevationError::OutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_incomplete_rejected() {
        let service = memory_service(IncompletePolicy::Reject);
        // Past the grid's east edge: only one column in the window
        let result = service.point_elevation(4.5 * STEP, 9.5 * STEP, InterpolationMethod::Bilinear);
        match result {
            Err(ElevationError::IncompleteNeighborSet {
                expected, found, ..
            }) => {
                assert_eq!(expected, 4);
                assert_eq!(found, 2);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_incomplete_degrades_to_nearest() {
        let service = memory_service(IncompletePolicy::Degrade);
        let p = service
            .point_elevation(4.2 * STEP, 9.5 * STEP, InterpolationMethod::Bicubic)
            .unwrap();
        assert_eq!(p.elevation, 49.0);
    }

    #[test]
    fn test_stats() {
        let service = memory_service(IncompletePolicy::Reject);
        assert!(matches!(service.stats(), SourceStats::Points { count: 100 }));
    }

    #[test]
    fn test_grid_elevation_requires_tiles() {
        let service = memory_service(IncompletePolicy::Reject);
        assert!(matches!(
            service.grid_elevation(0.0, 0.0),
            Err(ElevationError::NeighborQuery { .. })
        ));
    }

    #[test]
    fn test_build_from_point_store() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("points.bin");
        let mut store = PointFileStore::open_or_create(&path).unwrap();
        store.load(&grid(0.0, 0.0, STEP, 4)).unwrap();

        let service = ElevationServiceBuilder::new(&path).build().unwrap();
        assert_eq!(service.config().spacing, Spacing::SRTM1);
        let p = service
            .point_elevation(1.5 * STEP, 1.5 * STEP, InterpolationMethod::Bilinear)
            .unwrap();
        assert!((p.elevation - 16.5).abs() < 1e-6);
    }

    #[test]
    fn test_build_missing_store_fails() {
        let dir = TempDir::new().unwrap();
        assert!(ElevationServiceBuilder::new(dir.path().join("nope.bin"))
            .build()
            .is_err());
    }

    #[test]
    fn test_build_from_tile_directory() {
        let dir = TempDir::new().unwrap();
        let mut data = filled_srtm3(0);
        set_sample(&mut data, Resolution::Srtm3, 600, 600, 500);
        std::fs::write(dir.path().join("N35E138.hgt"), data).unwrap();

        let service = ElevationServiceBuilder::new(dir.path())
            .resolution(Resolution::Srtm3)
            .cache_size(5)
            .build()
            .unwrap();

        let p = service
            .point_elevation(35.5, 138.5, InterpolationMethod::Nearest)
            .unwrap();
        assert_eq!(p.elevation, 500.0);

        let grid = service.grid_elevation(35.5, 138.5).unwrap();
        assert!((grid.elevation - 500.0).abs() < 1e-3);

        assert!(matches!(service.stats(), SourceStats::Tiles(_)));
        assert_eq!(service.tiles().unwrap().cache_capacity(), 5);
    }

    #[test]
    fn test_policy_parse() {
        assert_eq!(
            "Degrade".parse::<IncompletePolicy>().unwrap(),
            IncompletePolicy::Degrade
        );
        assert_eq!(
            "reject".parse::<IncompletePolicy>().unwrap(),
            IncompletePolicy::Reject
        );
        assert!("ignore".parse::<IncompletePolicy>().is_err());
    }

    // Environment tests share process state, so they live in one test.
    #[test]
    fn test_from_env() {
        const VARS: [&str; 5] = [
            "ELEVATION_STORE",
            "ELEVATION_RESOLUTION",
            "ELEVATION_CACHE_SIZE",
            "ELEVATION_INCOMPLETE",
            "ELEVATION_VOID_FILL",
        ];
        let originals: Vec<Option<String>> = VARS.iter().map(|v| std::env::var(v).ok()).collect();
        for var in VARS {
            std::env::remove_var(var);
        }

        // Missing store
        assert!(ElevationServiceBuilder::from_env().is_err());

        // Defaults
        let temp_dir = TempDir::new().unwrap();
        std::env::set_var("ELEVATION_STORE", temp_dir.path());
        let builder = ElevationServiceBuilder::from_env().unwrap();
        assert_eq!(builder.store, temp_dir.path());
        assert_eq!(builder.resolution, Resolution::Srtm1);
        assert_eq!(builder.cache_size, 100);
        assert_eq!(builder.incomplete, IncompletePolicy::Reject);
        assert_eq!(builder.void_fill, VoidPolicy::Zero);

        // Explicit values
        std::env::set_var("ELEVATION_RESOLUTION", "srtm3");
        std::env::set_var("ELEVATION_CACHE_SIZE", "50");
        std::env::set_var("ELEVATION_INCOMPLETE", "degrade");
        std::env::set_var("ELEVATION_VOID_FILL", "nearest-valid");
        let builder = ElevationServiceBuilder::from_env().unwrap();
        assert_eq!(builder.resolution, Resolution::Srtm3);
        assert_eq!(builder.cache_size, 50);
        assert_eq!(builder.incomplete, IncompletePolicy::Degrade);
        assert_eq!(builder.void_fill, VoidPolicy::NearestValid);

        // Garbage falls back to defaults
        std::env::set_var("ELEVATION_CACHE_SIZE", "lots");
        std::env::set_var("ELEVATION_INCOMPLETE", "maybe");
        let builder = ElevationServiceBuilder::from_env().unwrap();
        assert_eq!(builder.cache_size, 100);
        assert_eq!(builder.incomplete, IncompletePolicy::Reject);

        for (var, original) in VARS.iter().zip(originals) {
            match original {
                Some(v) => std::env::set_var(var, v),
                None => std::env::remove_var(var),
            }
        }
    }
}
