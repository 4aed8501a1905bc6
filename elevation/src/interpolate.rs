//! Elevation estimation from grid samples and from neighbor point sets.
//!
//! Two query paths exist:
//!
//! - [`estimate_within_tile`] interpolates directly on one tile's raw sample
//!   buffer.
//! - [`estimate`] works on the [`NeighborSet`] returned by a
//!   [`crate::NeighborSource`], using nearest-neighbor, bilinear or bicubic
//!   (Catmull-Rom) interpolation.

use std::fmt;
use std::str::FromStr;

use crate::error::{ElevationError, Result};
use crate::record::PointRecord;
use crate::store::NeighborSet;
use crate::tile::{sample_at, Resolution, VOID_VALUE};

/// How an elevation is derived from the stored points around a query.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum InterpolationMethod {
    /// Closest stored point (1 neighbor)
    Nearest,
    /// Area-weighted average of the enclosing rectangle (4 neighbors)
    #[default]
    Bilinear,
    /// Catmull-Rom spline over a 4×4 neighborhood (16 neighbors)
    Bicubic,
}

impl InterpolationMethod {
    /// Number of neighbor points the method consumes.
    pub fn neighbors(&self) -> usize {
        match self {
            InterpolationMethod::Nearest => 1,
            InterpolationMethod::Bilinear => 4,
            InterpolationMethod::Bicubic => 16,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            InterpolationMethod::Nearest => "nearest",
            InterpolationMethod::Bilinear => "bilinear",
            InterpolationMethod::Bicubic => "bicubic",
        }
    }
}

impl fmt::Display for InterpolationMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.pad(self.as_str())
    }
}

impl FromStr for InterpolationMethod {
    type Err = ElevationError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "nearest" => Ok(InterpolationMethod::Nearest),
            "bilinear" => Ok(InterpolationMethod::Bilinear),
            "bicubic" => Ok(InterpolationMethod::Bicubic),
            other => Err(ElevationError::InvalidInterpolationMethod {
                method: other.to_string(),
            }),
        }
    }
}

/// What in-tile interpolation returns when one of the four cell corners is void.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VoidPolicy {
    /// Return 0.0.
    #[default]
    Zero,
    /// Return the closest non-void corner, or 0.0 if all four are void.
    NearestValid,
}

impl FromStr for VoidPolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "zero" => Ok(VoidPolicy::Zero),
            "nearest-valid" | "nearest_valid" => Ok(VoidPolicy::NearestValid),
            other => Err(format!(
                "unknown void policy {:?} (expected zero or nearest-valid)",
                other
            )),
        }
    }
}

/// Bilinear elevation at `(lat, lng)` from one tile's raw samples, with
/// void corners resolved to zero.
///
/// See [`estimate_within_tile_with`].
pub fn estimate_within_tile(
    samples: &[u8],
    resolution: Resolution,
    origin_lat: i32,
    origin_lng: i32,
    lat: f64,
    lng: f64,
) -> Result<f64> {
    estimate_within_tile_with(
        samples,
        resolution,
        origin_lat,
        origin_lng,
        lat,
        lng,
        VoidPolicy::Zero,
    )
}

/// Bilinear elevation at `(lat, lng)` from one tile's raw samples.
///
/// The query must satisfy `origin ≤ coordinate < origin + 1` on both axes.
/// The cell is clamped so the last row and column reuse the cell before them.
///
/// # Errors
///
/// Returns [`ElevationError::OutOfBounds`] for coordinates outside the tile.
pub fn estimate_within_tile_with(
    samples: &[u8],
    resolution: Resolution,
    origin_lat: i32,
    origin_lng: i32,
    lat: f64,
    lng: f64,
    policy: VoidPolicy,
) -> Result<f64> {
    let lat0 = origin_lat as f64;
    let lng0 = origin_lng as f64;
    if !(lat >= lat0 && lat < lat0 + 1.0 && lng >= lng0 && lng < lng0 + 1.0) {
        return Err(ElevationError::OutOfBounds { lat, lng });
    }

    let pixel_size = resolution.step();
    let x = (lng - lng0) / pixel_size;
    let y = (lat0 + 1.0 - lat) / pixel_size;

    let last_cell = (resolution.samples() - 2) as f64;
    let x0 = x.floor().clamp(0.0, last_cell) as usize;
    let y0 = y.floor().clamp(0.0, last_cell) as usize;
    let (x1, y1) = (x0 + 1, y0 + 1);

    let z00 = sample_at(samples, resolution, x0, y0)?;
    let z10 = sample_at(samples, resolution, x1, y0)?;
    let z01 = sample_at(samples, resolution, x0, y1)?;
    let z11 = sample_at(samples, resolution, x1, y1)?;

    let fx = x - x0 as f64;
    let fy = y - y0 as f64;

    let corners = [z00, z10, z01, z11];
    if corners.contains(&VOID_VALUE) {
        return Ok(fill_void(policy, corners, fx, fy));
    }

    let (z00, z10, z01, z11) = (z00 as f64, z10 as f64, z01 as f64, z11 as f64);
    // First along x on both rows, then along y
    let z0 = z00 * (1.0 - fx) + z10 * fx;
    let z1 = z01 * (1.0 - fx) + z11 * fx;
    Ok(z0 * (1.0 - fy) + z1 * fy)
}

/// Resolve a cell with at least one void corner. Corners are ordered
/// `(x0,y0), (x1,y0), (x0,y1), (x1,y1)`.
fn fill_void(policy: VoidPolicy, corners: [i16; 4], fx: f64, fy: f64) -> f64 {
    match policy {
        VoidPolicy::Zero => 0.0,
        VoidPolicy::NearestValid => {
            const OFFSETS: [(f64, f64); 4] = [(0.0, 0.0), (1.0, 0.0), (0.0, 1.0), (1.0, 1.0)];
            corners
                .iter()
                .zip(OFFSETS)
                .filter(|(z, _)| **z != VOID_VALUE)
                .map(|(z, (cx, cy))| ((fx - cx).powi(2) + (fy - cy).powi(2), *z))
                .min_by(|a, b| a.0.total_cmp(&b.0))
                .map(|(_, z)| z as f64)
                .unwrap_or(0.0)
        }
    }
}

/// Estimate the elevation at `(lat, lng)` from a neighbor set.
///
/// # Errors
///
/// Returns [`ElevationError::IncompleteNeighborSet`] unless the set holds
/// exactly [`InterpolationMethod::neighbors`] points.
pub fn estimate(method: InterpolationMethod, set: &NeighborSet, lat: f64, lng: f64) -> Result<f64> {
    let points = set.points();
    let incomplete = || ElevationError::IncompleteNeighborSet {
        method: method.as_str(),
        expected: method.neighbors(),
        found: points.len(),
    };

    match method {
        InterpolationMethod::Nearest => match points {
            [point] => Ok(nearest_neighbor(point)),
            _ => Err(incomplete()),
        },
        InterpolationMethod::Bilinear => {
            let corners: &[PointRecord; 4] = points.try_into().map_err(|_| incomplete())?;
            Ok(bilinear(corners, lat, lng))
        }
        InterpolationMethod::Bicubic => {
            let grid: &[PointRecord; 16] = points.try_into().map_err(|_| incomplete())?;
            Ok(bicubic(grid, lat, lng))
        }
    }
}

/// The elevation of the single closest point.
pub fn nearest_neighbor(point: &PointRecord) -> f64 {
    point.elevation
}

/// Area-weighted bilinear interpolation over four points forming an
/// axis-aligned rectangle around the query.
///
/// Corners are assigned by rank: after sorting by (latitude, longitude) the
/// points are bottom-left, bottom-right, top-left, top-right. A rectangle with
/// zero width or height yields the bottom-left elevation.
pub fn bilinear(points: &[PointRecord; 4], lat: f64, lng: f64) -> f64 {
    let mut sorted = *points;
    sorted.sort_by(PointRecord::cmp_position);
    let [q11, q21, q12, q22] = sorted;

    let (mut x1, mut x2) = (f64::INFINITY, f64::NEG_INFINITY);
    let (mut y1, mut y2) = (f64::INFINITY, f64::NEG_INFINITY);
    for p in points {
        x1 = x1.min(p.longitude);
        x2 = x2.max(p.longitude);
        y1 = y1.min(p.latitude);
        y2 = y2.max(p.latitude);
    }

    let area = (x2 - x1) * (y2 - y1);
    if area == 0.0 {
        return q11.elevation;
    }

    q11.elevation * (x2 - lng) * (y2 - lat) / area
        + q21.elevation * (lng - x1) * (y2 - lat) / area
        + q12.elevation * (x2 - lng) * (lat - y1) / area
        + q22.elevation * (lng - x1) * (lat - y1) / area
}

/// Catmull-Rom spline (tension 0.5) between `p1` and `p2` at `t ∈ [0, 1]`.
pub fn catmull_rom(p0: f64, p1: f64, p2: f64, p3: f64, t: f64) -> f64 {
    let t2 = t * t;
    let t3 = t2 * t;

    0.5 * (2.0 * p1
        + (-p0 + p2) * t
        + (2.0 * p0 - 5.0 * p1 + 4.0 * p2 - p3) * t2
        + (-p0 + 3.0 * p1 - 3.0 * p2 + p3) * t3)
}

/// Bicubic interpolation over sixteen points assumed to form a regular 4×4 grid.
///
/// Points are sorted row-major by (latitude, longitude). The query is
/// normalized against the grid's outer bounds and clamped to `[0, 1]`; the
/// spline parameter is that fraction rescaled onto the central cell, which is
/// where a Catmull-Rom segment lives. Rows are interpolated first, then the
/// column of row results.
pub fn bicubic(points: &[PointRecord; 16], lat: f64, lng: f64) -> f64 {
    let mut sorted = *points;
    sorted.sort_by(PointRecord::cmp_position);

    let mut grid = [[0.0; 4]; 4];
    for (i, p) in sorted.iter().enumerate() {
        grid[i / 4][i % 4] = p.elevation;
    }

    let (min_lat, max_lat) = (sorted[0].latitude, sorted[15].latitude);
    let (min_lng, max_lng) = (sorted[0].longitude, sorted[3].longitude);

    let tx = central_segment(normalize(lng, min_lng, max_lng));
    let ty = central_segment(normalize(lat, min_lat, max_lat));

    let mut column = [0.0; 4];
    for (row, value) in grid.iter().zip(column.iter_mut()) {
        *value = catmull_rom(row[0], row[1], row[2], row[3], tx);
    }

    catmull_rom(column[0], column[1], column[2], column[3], ty)
}

/// Fraction of `[min, max]` covered up to `v`, clamped to `[0, 1]`.
fn normalize(v: f64, min: f64, max: f64) -> f64 {
    let extent = max - min;
    if extent == 0.0 {
        return 0.0;
    }
    ((v - min) / extent).clamp(0.0, 1.0)
}

/// Map a fraction of the three-interval span onto the middle interval.
fn central_segment(fraction: f64) -> f64 {
    (3.0 * fraction - 1.0).clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tile::tests::{filled_srtm3, set_sample};

    fn approx_eq(a: f64, b: f64) -> bool {
        (a - b).abs() < 1e-9
    }

    fn cell(elevations: [f64; 4]) -> [PointRecord; 4] {
        // bottom-left, bottom-right, top-left, top-right
        [
            PointRecord::new(0.0, 0.0, elevations[0]),
            PointRecord::new(0.0, 1.0, elevations[1]),
            PointRecord::new(1.0, 0.0, elevations[2]),
            PointRecord::new(1.0, 1.0, elevations[3]),
        ]
    }

    /// 4×4 grid with unit spacing where elevation = a*row + b*col + c.
    fn planar_grid(a: f64, b: f64, c: f64) -> [PointRecord; 16] {
        let mut out = [PointRecord::new(0.0, 0.0, 0.0); 16];
        for row in 0..4 {
            for col in 0..4 {
                out[row * 4 + col] =
                    PointRecord::new(row as f64, col as f64, a * row as f64 + b * col as f64 + c);
            }
        }
        out
    }

    #[test]
    fn test_method_parse() {
        assert_eq!(
            "nearest".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Nearest
        );
        assert_eq!(
            "bilinear".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Bilinear
        );
        assert_eq!(
            "bicubic".parse::<InterpolationMethod>().unwrap(),
            InterpolationMethod::Bicubic
        );
        match "cubic".parse::<InterpolationMethod>() {
            Err(ElevationError::InvalidInterpolationMethod { method }) => assert_eq!(method, "cubic"),
            other => panic!("unexpected {:?}", other),
        }
        assert_eq!(InterpolationMethod::default(), InterpolationMethod::Bilinear);
        assert_eq!(InterpolationMethod::Bicubic.neighbors(), 16);
    }

    #[test]
    fn test_bilinear_flat() {
        let corners = cell([0.0, 0.0, 0.0, 0.0]);
        assert_eq!(bilinear(&corners, 0.3, 0.7), 0.0);
    }

    #[test]
    fn test_bilinear_top_edge_higher() {
        let corners = cell([0.0, 0.0, 10.0, 10.0]);
        for lng in [0.0, 0.25, 0.5, 0.9, 1.0] {
            assert!(approx_eq(bilinear(&corners, 0.5, lng), 5.0));
        }
    }

    #[test]
    fn test_bilinear_corner_values_and_order_independence() {
        let corners = cell([1.0, 2.0, 3.0, 4.0]);
        assert!(approx_eq(bilinear(&corners, 0.0, 0.0), 1.0));
        assert!(approx_eq(bilinear(&corners, 0.0, 1.0), 2.0));
        assert!(approx_eq(bilinear(&corners, 1.0, 0.0), 3.0));
        assert!(approx_eq(bilinear(&corners, 1.0, 1.0), 4.0));
        assert!(approx_eq(bilinear(&corners, 0.5, 0.5), 2.5));

        let shuffled = [corners[3], corners[0], corners[2], corners[1]];
        assert!(approx_eq(bilinear(&shuffled, 0.25, 0.75), bilinear(&corners, 0.25, 0.75)));
    }

    #[test]
    fn test_bilinear_degenerate() {
        let points = [
            PointRecord::new(0.0, 0.0, 7.0),
            PointRecord::new(0.0, 1.0, 8.0),
            PointRecord::new(0.0, 0.0, 9.0),
            PointRecord::new(0.0, 1.0, 10.0),
        ];
        assert_eq!(bilinear(&points, 0.0, 0.5), 7.0);
    }

    #[test]
    fn test_catmull_rom_endpoints() {
        assert_eq!(catmull_rom(1.0, 2.0, 3.0, 4.0, 0.0), 2.0);
        assert_eq!(catmull_rom(1.0, 2.0, 3.0, 4.0, 1.0), 3.0);
        assert!(approx_eq(catmull_rom(0.0, 0.0, 10.0, 10.0, 0.5), 5.0));
    }

    #[test]
    fn test_bicubic_planar_matches_bilinear() {
        let grid = planar_grid(3.0, -2.0, 100.0);
        let enclosing = [grid[5], grid[6], grid[9], grid[10]];

        for (lat, lng) in [(1.5, 1.5), (1.2, 1.9), (1.0, 1.0), (2.0, 1.4), (1.75, 1.05)] {
            let cubic = bicubic(&grid, lat, lng);
            let linear = bilinear(&enclosing, lat, lng);
            assert!(
                (cubic - linear).abs() < 1e-9,
                "({}, {}): bicubic {} vs bilinear {}",
                lat,
                lng,
                cubic,
                linear
            );
        }
    }

    #[test]
    fn test_bicubic_curved_surface_uses_central_cell() {
        // elevation = row², constant along each row
        let mut grid = [PointRecord::new(0.0, 0.0, 0.0); 16];
        for (i, p) in grid.iter_mut().enumerate() {
            let (row, col) = ((i / 4) as f64, (i % 4) as f64);
            *p = PointRecord::new(row, col, row * row);
        }

        // lat 1.2 is 0.4 of the outer span and 0.2 into the central cell;
        // Catmull-Rom over 0,1,4,9 at t=0.2 gives 1.44
        let value = bicubic(&grid, 1.2, 1.5);
        assert!(approx_eq(value, 1.44), "got {}", value);
        // Using the outer-span fraction directly as t would give 1.96
        assert!(!approx_eq(value, catmull_rom(0.0, 1.0, 4.0, 9.0, 0.4)));

        assert!(approx_eq(bicubic(&grid, 1.5, 0.0), 2.25));
        assert!(approx_eq(bicubic(&grid, 1.0, 3.0), 1.0));
        assert!(approx_eq(bicubic(&grid, 2.0, 1.0), 4.0));
    }

    #[test]
    fn test_bicubic_order_independent_and_clamped() {
        let grid = planar_grid(1.0, 1.0, 0.0);
        let mut reversed = grid;
        reversed.reverse();
        assert!(approx_eq(bicubic(&reversed, 1.5, 1.5), bicubic(&grid, 1.5, 1.5)));

        // Outside the central cell the parameter clamps to its edges
        assert!(approx_eq(bicubic(&grid, -5.0, -5.0), 2.0));
        assert!(approx_eq(bicubic(&grid, 10.0, 10.0), 4.0));
    }

    #[test]
    fn test_estimate_checks_cardinality() {
        let set = NeighborSet::new(cell([0.0, 0.0, 10.0, 10.0]).to_vec(), 4);
        assert!(approx_eq(
            estimate(InterpolationMethod::Bilinear, &set, 0.5, 0.5).unwrap(),
            5.0
        ));

        let short = NeighborSet::new(cell([0.0; 4])[..3].to_vec(), 4);
        match estimate(InterpolationMethod::Bilinear, &short, 0.5, 0.5) {
            Err(ElevationError::IncompleteNeighborSet {
                method,
                expected,
                found,
            }) => {
                assert_eq!(method, "bilinear");
                assert_eq!(expected, 4);
                assert_eq!(found, 3);
            }
            other => panic!("unexpected {:?}", other),
        }

        let single = NeighborSet::new(vec![PointRecord::new(0.0, 0.0, 12.0)], 1);
        assert_eq!(
            estimate(InterpolationMethod::Nearest, &single, 0.2, 0.2).unwrap(),
            12.0
        );
        assert!(estimate(InterpolationMethod::Bicubic, &set, 0.5, 0.5).is_err());
    }

    #[test]
    fn test_within_tile_corner_samples() {
        let mut data = filled_srtm3(0);
        set_sample(&mut data, Resolution::Srtm3, 0, 0, 1000);
        set_sample(&mut data, Resolution::Srtm3, 0, 1200, 321);

        // South-west corner maps onto the last row with fx = 0, fy = 1
        let sw = estimate_within_tile(&data, Resolution::Srtm3, 35, 138, 35.0, 138.0).unwrap();
        assert!((sw - 321.0).abs() < 1e-6);

        // Just inside the north-west corner
        let nw =
            estimate_within_tile(&data, Resolution::Srtm3, 35, 138, 36.0 - 1e-12, 138.0).unwrap();
        assert!((nw - 1000.0).abs() < 1e-3);
    }

    #[test]
    fn test_within_tile_interpolates() {
        let mut data = filled_srtm3(0);
        // Cell (600,600)-(601,601): top row 100, bottom row 200
        set_sample(&mut data, Resolution::Srtm3, 600, 600, 100);
        set_sample(&mut data, Resolution::Srtm3, 601, 600, 100);
        set_sample(&mut data, Resolution::Srtm3, 600, 601, 200);
        set_sample(&mut data, Resolution::Srtm3, 601, 601, 200);

        let step = 1.0 / 1200.0;
        // Half a pixel south of row 600, a quarter pixel east of col 600
        let lat = 36.0 - 600.5 * step;
        let lng = 138.0 + 600.25 * step;
        let z = estimate_within_tile(&data, Resolution::Srtm3, 35, 138, lat, lng).unwrap();
        assert!((z - 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_within_tile_out_of_bounds() {
        let data = filled_srtm3(0);
        for (lat, lng) in [(36.0, 138.5), (34.9, 138.5), (35.5, 139.0), (35.5, 137.99)] {
            assert!(matches!(
                estimate_within_tile(&data, Resolution::Srtm3, 35, 138, lat, lng),
                Err(ElevationError::OutOfBounds { .. })
            ));
        }
    }

    #[test]
    fn test_within_tile_void_policies() {
        let mut data = filled_srtm3(50);
        set_sample(&mut data, Resolution::Srtm3, 600, 600, VOID_VALUE);
        set_sample(&mut data, Resolution::Srtm3, 601, 600, 80);

        let step = 1.0 / 1200.0;
        // Close to (601,600)
        let lat = 36.0 - 600.1 * step;
        let lng = 138.0 + 600.9 * step;

        let zero = estimate_within_tile(&data, Resolution::Srtm3, 35, 138, lat, lng).unwrap();
        assert_eq!(zero, 0.0);

        let nearest = estimate_within_tile_with(
            &data,
            Resolution::Srtm3,
            35,
            138,
            lat,
            lng,
            VoidPolicy::NearestValid,
        )
        .unwrap();
        assert_eq!(nearest, 80.0);
    }

    #[test]
    fn test_fill_void_all_void() {
        assert_eq!(
            fill_void(VoidPolicy::NearestValid, [VOID_VALUE; 4], 0.5, 0.5),
            0.0
        );
    }

    #[test]
    fn test_void_policy_parse() {
        assert_eq!("zero".parse::<VoidPolicy>().unwrap(), VoidPolicy::Zero);
        assert_eq!(
            "nearest-valid".parse::<VoidPolicy>().unwrap(),
            VoidPolicy::NearestValid
        );
        assert!("average".parse::<VoidPolicy>().is_err());
    }
}
