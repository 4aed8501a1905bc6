//! Spatial neighbor queries over stored point records.
//!
//! Every storage backend implements [`NeighborSource`]; backends that accept
//! ingested records also implement [`BulkLoad`]. [`MemoryStore`] is the
//! reference in-memory backend, [`crate::PointFileStore`] the persisted one and
//! [`crate::TileStore`] answers straight from `.hgt` grids.

use std::cmp::Ordering;

use crate::error::{ElevationError, Result};
use crate::filename::coordinates_valid;
use crate::record::PointRecord;
use crate::tile_store::CacheStats;

/// Half-width in degrees of a neighbor query window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Spacing(pub f64);

impl Spacing {
    /// 1 arc-second, the SRTM1 sample spacing.
    pub const SRTM1: Spacing = Spacing(1.0 / 3600.0);
    /// 3 arc-seconds, the SRTM3 sample spacing.
    pub const SRTM3: Spacing = Spacing(3.0 / 3600.0);

    pub fn degrees(&self) -> f64 {
        self.0
    }
}

/// Points returned by a neighbor query together with the number the query
/// asked for.
///
/// Sparse data may yield fewer points than requested; callers decide what an
/// incomplete set means for them.
#[derive(Debug, Clone, PartialEq)]
pub struct NeighborSet {
    points: Vec<PointRecord>,
    expected: usize,
}

impl NeighborSet {
    pub fn new(points: Vec<PointRecord>, expected: usize) -> Self {
        Self { points, expected }
    }

    /// True when exactly the requested number of points was found.
    pub fn is_complete(&self) -> bool {
        self.points.len() == self.expected
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn expected(&self) -> usize {
        self.expected
    }

    /// Points ordered by (latitude, longitude) ascending.
    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }

    pub fn into_points(self) -> Vec<PointRecord> {
        self.points
    }
}

/// Summary of what a backend holds, reported by the service's stats endpoint.
#[derive(Debug, Clone)]
pub enum SourceStats {
    /// A point store and the number of records in it.
    Points { count: u64 },
    /// A tile directory and its cache usage.
    Tiles(CacheStats),
}

/// Query capability every storage backend provides.
pub trait NeighborSource: Send + Sync {
    /// The stored point closest to `(lat, lng)` by squared planar distance.
    fn nearest(&self, lat: f64, lng: f64) -> Result<PointRecord>;

    /// Up to four points within `±spacing` on both axes.
    fn four_neighbors(&self, lat: f64, lng: f64, spacing: Spacing) -> Result<NeighborSet>;

    /// Up to sixteen points within `±2*spacing` on both axes.
    fn sixteen_neighbors(&self, lat: f64, lng: f64, spacing: Spacing) -> Result<NeighborSet>;

    fn stats(&self) -> SourceStats;
}

/// Bulk ingestion. A load either stores every record or none of them.
pub trait BulkLoad {
    /// Store `records`, replacing any existing point at the same position.
    ///
    /// Returns the number of points held afterwards.
    fn load(&mut self, records: &[PointRecord]) -> Result<usize>;
}

/// Random access to points sorted by (latitude, longitude).
pub(crate) trait SortedPoints {
    fn len(&self) -> usize;
    fn point(&self, index: usize) -> PointRecord;
}

impl SortedPoints for [PointRecord] {
    fn len(&self) -> usize {
        <[PointRecord]>::len(self)
    }

    fn point(&self, index: usize) -> PointRecord {
        self[index]
    }
}

/// Index of the first point whose latitude is `>= lat`.
fn lower_bound<S: SortedPoints + ?Sized>(points: &S, lat: f64) -> usize {
    let (mut lo, mut hi) = (0, points.len());
    while lo < hi {
        let mid = lo + (hi - lo) / 2;
        if points.point(mid).latitude < lat {
            lo = mid + 1;
        } else {
            hi = mid;
        }
    }
    lo
}

/// Closest point to `(lat, lng)`; ties go to the point that sorts first.
pub(crate) fn nearest_sorted<S: SortedPoints + ?Sized>(
    points: &S,
    lat: f64,
    lng: f64,
) -> Option<PointRecord> {
    let start = lower_bound(points, lat);
    let mut best: Option<(f64, PointRecord)> = None;

    let mut consider = |p: PointRecord| -> bool {
        let dlat = p.latitude - lat;
        if let Some((best_d, _)) = best {
            // Every further point in this direction is at least this far away
            if dlat * dlat > best_d {
                return false;
            }
        }
        let d = p.distance_sq(lat, lng);
        let better = match best {
            None => true,
            Some((best_d, best_p)) => {
                d < best_d || (d == best_d && p.cmp_position(&best_p) == Ordering::Less)
            }
        };
        if better {
            best = Some((d, p));
        }
        true
    };

    for i in start..points.len() {
        if !consider(points.point(i)) {
            break;
        }
    }
    for i in (0..start).rev() {
        if !consider(points.point(i)) {
            break;
        }
    }

    best.map(|(_, p)| p)
}

/// Points within `±half_width` of `(lat, lng)` on both axes, in sorted order,
/// trimmed to at most `side * side` points.
pub(crate) fn window_sorted<S: SortedPoints + ?Sized>(
    points: &S,
    lat: f64,
    lng: f64,
    half_width: f64,
    side: usize,
) -> Vec<PointRecord> {
    let (lat_min, lat_max) = (lat - half_width, lat + half_width);
    let (lng_min, lng_max) = (lng - half_width, lng + half_width);

    let mut found = Vec::new();
    for i in lower_bound(points, lat_min)..points.len() {
        let p = points.point(i);
        if p.latitude > lat_max {
            break;
        }
        if p.longitude >= lng_min && p.longitude <= lng_max {
            found.push(p);
        }
    }

    if found.len() > side * side {
        found = trim_to_cell(found, lat, lng, side);
    }
    found
}

/// Keep the `side` latitudes and `side` longitudes that best surround the
/// query. A window can hold an extra row or column when the query sits on a
/// grid line.
fn trim_to_cell(points: Vec<PointRecord>, lat: f64, lng: f64, side: usize) -> Vec<PointRecord> {
    let mut lats: Vec<f64> = points.iter().map(|p| p.latitude).collect();
    lats.dedup();
    let mut lngs: Vec<f64> = points.iter().map(|p| p.longitude).collect();
    lngs.sort_by(f64::total_cmp);
    lngs.dedup();

    let (lat_lo, lat_hi) = centered_range(&lats, lat, side);
    let (lng_lo, lng_hi) = centered_range(&lngs, lng, side);

    points
        .into_iter()
        .filter(|p| {
            (lat_lo..=lat_hi).contains(&p.latitude) && (lng_lo..=lng_hi).contains(&p.longitude)
        })
        .collect()
}

/// Bounds of the `side` consecutive values around `q`, with the value at or
/// below `q` as the last of the lower half.
fn centered_range(values: &[f64], q: f64, side: usize) -> (f64, f64) {
    if values.len() <= side {
        return (values[0], values[values.len() - 1]);
    }
    let floor = values.partition_point(|&v| v <= q).saturating_sub(1);
    let start = floor
        .saturating_sub(side / 2 - 1)
        .min(values.len() - side);
    (values[start], values[start + side - 1])
}

/// Sort by position and drop duplicates, keeping the last occurrence.
pub(crate) fn normalize(mut records: Vec<PointRecord>) -> Vec<PointRecord> {
    // Stable sort keeps later duplicates after earlier ones
    records.sort_by(PointRecord::cmp_position);

    let mut out: Vec<PointRecord> = Vec::with_capacity(records.len());
    for record in records {
        match out.last_mut() {
            Some(last) if last.same_position(&record) => *last = record,
            _ => out.push(record),
        }
    }
    out
}

/// Reject records that could never be queried.
pub(crate) fn validate_records(records: &[PointRecord]) -> Result<()> {
    match records
        .iter()
        .find(|r| !coordinates_valid(r.latitude, r.longitude) || !r.elevation.is_finite())
    {
        Some(bad) => Err(ElevationError::OutOfBounds {
            lat: bad.latitude,
            lng: bad.longitude,
        }),
        None => Ok(()),
    }
}

/// Reference backend holding all points in a sorted vector.
#[derive(Debug, Clone, Default)]
pub struct MemoryStore {
    points: Vec<PointRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a store from unsorted records; later duplicates win.
    pub fn from_records(records: Vec<PointRecord>) -> Result<Self> {
        let mut store = Self::new();
        store.load(&records)?;
        Ok(store)
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// All points in (latitude, longitude) order.
    pub fn points(&self) -> &[PointRecord] {
        &self.points
    }
}

impl BulkLoad for MemoryStore {
    fn load(&mut self, records: &[PointRecord]) -> Result<usize> {
        validate_records(records)?;

        let mut merged = std::mem::take(&mut self.points);
        merged.extend_from_slice(records);
        self.points = normalize(merged);

        tracing::debug!(loaded = records.len(), total = self.points.len(), "Loaded points");
        Ok(self.points.len())
    }
}

impl NeighborSource for MemoryStore {
    fn nearest(&self, lat: f64, lng: f64) -> Result<PointRecord> {
        nearest_sorted(self.points.as_slice(), lat, lng).ok_or(ElevationError::EmptyStore)
    }

    fn four_neighbors(&self, lat: f64, lng: f64, spacing: Spacing) -> Result<NeighborSet> {
        let points = window_sorted(self.points.as_slice(), lat, lng, spacing.0, 2);
        Ok(NeighborSet::new(points, 4))
    }

    fn sixteen_neighbors(&self, lat: f64, lng: f64, spacing: Spacing) -> Result<NeighborSet> {
        let points = window_sorted(self.points.as_slice(), lat, lng, 2.0 * spacing.0, 4);
        Ok(NeighborSet::new(points, 16))
    }

    fn stats(&self) -> SourceStats {
        SourceStats::Points {
            count: self.points.len() as u64,
        }
    }
}
