//! Persisted point store backed by a memory-mapped sorted record file.
//!
//! File layout (little endian):
//!
//! | Offset | Size | Content |
//! |--------|------|---------|
//! | 0 | 8 | magic `HGTPTS01` |
//! | 8 | 8 | record count `n` (u64) |
//! | 16 | 24·n | records `(latitude, longitude, elevation)` as three f64 |
//!
//! Records are sorted by (latitude, longitude) and keys are unique, so window
//! and nearest queries binary-search the map directly without loading it.

use std::cmp::Ordering;
use std::fs::File;
use std::io::{BufWriter, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use memmap2::Mmap;
use tempfile::NamedTempFile;

use crate::error::{ElevationError, Result};
use crate::record::PointRecord;
use crate::store::{
    nearest_sorted, normalize, validate_records, window_sorted, BulkLoad, NeighborSet,
    NeighborSource, SortedPoints, SourceStats, Spacing,
};

const MAGIC: &[u8; 8] = b"HGTPTS01";
const HEADER_LEN: usize = 16;
const RECORD_LEN: usize = 24;

/// Sorted records viewed in place inside the mapped file.
struct MappedPoints<'a> {
    bytes: &'a [u8],
}

impl SortedPoints for MappedPoints<'_> {
    fn len(&self) -> usize {
        self.bytes.len() / RECORD_LEN
    }

    fn point(&self, index: usize) -> PointRecord {
        let offset = index * RECORD_LEN;
        PointRecord::new(
            read_f64(self.bytes, offset),
            read_f64(self.bytes, offset + 8),
            read_f64(self.bytes, offset + 16),
        )
    }
}

fn read_f64(bytes: &[u8], offset: usize) -> f64 {
    let mut buf = [0u8; 8];
    buf.copy_from_slice(&bytes[offset..offset + 8]);
    f64::from_le_bytes(buf)
}

/// Point store persisted to a single file.
///
/// Loads are transactional: the merged record set is written to a temporary
/// file next to the store and renamed over it, so a failed load leaves the
/// previous file untouched.
///
/// # Example
///
/// ```ignore
/// use elevation::{BulkLoad, HgtTile, NeighborSource, PointFileStore};
///
/// let mut store = PointFileStore::open_or_create("points.bin")?;
/// store.load(&HgtTile::open("N00E006.hgt")?.records()?)?;
/// let p = store.nearest(0.5, 6.5)?;
/// ```
pub struct PointFileStore {
    path: PathBuf,
    map: Mmap,
    len: usize,
}

impl PointFileStore {
    /// Open an existing store file.
    ///
    /// # Errors
    ///
    /// Returns [`ElevationError::InvalidStoreFile`] if the header is wrong or
    /// the file size doesn't match the record count.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let file = File::open(&path)?;

        // SAFETY: the store is only ever replaced by rename, never written in
        // place, so the mapped pages don't change underneath us.
        let map = unsafe { Mmap::map(&file)? };
        let len = validate_header(&path, &map)?;

        tracing::debug!(path = %path.display(), records = len, "Opened point store");
        Ok(Self { path, map, len })
    }

    /// Open a store, creating an empty one if the file doesn't exist.
    pub fn open_or_create<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        if !path.exists() {
            write_store(path, std::iter::empty())?;
            tracing::info!(path = %path.display(), "Created empty point store");
        }
        Self::open(path)
    }

    /// Number of stored points.
    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Copy every record out of the store, in (latitude, longitude) order.
    pub fn records(&self) -> Vec<PointRecord> {
        let points = self.points();
        (0..points.len()).map(|i| points.point(i)).collect()
    }

    fn points(&self) -> MappedPoints<'_> {
        MappedPoints {
            bytes: &self.map[HEADER_LEN..HEADER_LEN + self.len * RECORD_LEN],
        }
    }
}

fn validate_header(path: &Path, bytes: &[u8]) -> Result<usize> {
    let invalid = |reason: String| ElevationError::InvalidStoreFile {
        path: path.to_path_buf(),
        reason,
    };

    if bytes.len() < HEADER_LEN {
        return Err(invalid(format!("{} bytes is shorter than the header", bytes.len())));
    }
    if &bytes[..8] != MAGIC {
        return Err(invalid("bad magic".to_string()));
    }

    let mut count = [0u8; 8];
    count.copy_from_slice(&bytes[8..16]);
    let count = u64::from_le_bytes(count) as usize;

    let expected = count
        .checked_mul(RECORD_LEN)
        .and_then(|n| n.checked_add(HEADER_LEN))
        .ok_or_else(|| invalid(format!("record count {} overflows", count)))?;
    if bytes.len() != expected {
        return Err(invalid(format!(
            "{} records need {} bytes, file has {}",
            count,
            expected,
            bytes.len()
        )));
    }
    Ok(count)
}

/// Write `records` (already sorted and unique) to `path` atomically.
///
/// Returns the number of records written.
fn write_store<I>(path: &Path, records: I) -> Result<usize>
where
    I: IntoIterator<Item = PointRecord>,
{
    let dir = match path.parent() {
        Some(parent) if !parent.as_os_str().is_empty() => parent,
        _ => Path::new("."),
    };

    let mut tmp = NamedTempFile::new_in(dir)?;
    let mut count: u64 = 0;
    {
        let mut writer = BufWriter::new(tmp.as_file_mut());
        writer.write_all(MAGIC)?;
        writer.write_all(&count.to_le_bytes())?;
        for r in records {
            writer.write_all(&r.latitude.to_le_bytes())?;
            writer.write_all(&r.longitude.to_le_bytes())?;
            writer.write_all(&r.elevation.to_le_bytes())?;
            count += 1;
        }
        writer.flush()?;
    }

    // Count is only known once the records are streamed
    let file = tmp.as_file_mut();
    file.seek(SeekFrom::Start(MAGIC.len() as u64))?;
    file.write_all(&count.to_le_bytes())?;
    file.sync_all()?;

    tmp.persist(path).map_err(|e| ElevationError::Io(e.error))?;
    Ok(count as usize)
}

/// Merge two sorted, duplicate-free sequences. On equal positions the
/// record from `new` replaces the one from `old`.
fn merge_sorted<'a, S: SortedPoints + ?Sized>(
    old: &'a S,
    new: &'a [PointRecord],
) -> impl Iterator<Item = PointRecord> + 'a {
    let (mut i, mut j) = (0, 0);
    std::iter::from_fn(move || {
        let next = match (i < old.len(), new.get(j)) {
            (false, None) => return None,
            (false, Some(n)) => {
                j += 1;
                *n
            }
            (true, None) => {
                i += 1;
                old.point(i - 1)
            }
            (true, Some(n)) => {
                let o = old.point(i);
                if o.same_position(n) {
                    i += 1;
                    j += 1;
                    *n
                } else if o.cmp_position(n) == Ordering::Less {
                    i += 1;
                    o
                } else {
                    j += 1;
                    *n
                }
            }
        };
        Some(next)
    })
}

impl BulkLoad for PointFileStore {
    fn load(&mut self, records: &[PointRecord]) -> Result<usize> {
        validate_records(records)?;

        let incoming = normalize(records.to_vec());
        write_store(&self.path, merge_sorted(&self.points(), &incoming))?;
        let reopened = Self::open(&self.path)?;
        *self = reopened;

        tracing::info!(
            path = %self.path.display(),
            loaded = records.len(),
            total = self.len,
            "Loaded points into store"
        );
        Ok(self.len)
    }
}

impl NeighborSource for PointFileStore {
    fn nearest(&self, lat: f64, lng: f64) -> Result<PointRecord> {
        nearest_sorted(&self.points(), lat, lng).ok_or(ElevationError::EmptyStore)
    }

    fn four_neighbors(&self, lat: f64, lng: f64, spacing: Spacing) -> Result<NeighborSet> {
        let points = window_sorted(&self.points(), lat, lng, spacing.degrees(), 2);
        Ok(NeighborSet::new(points, 4))
    }

    fn sixteen_neighbors(&self, lat: f64, lng: f64, spacing: Spacing) -> Result<NeighborSet> {
        let points = window_sorted(&self.points(), lat, lng, 2.0 * spacing.degrees(), 4);
        Ok(NeighborSet::new(points, 16))
    }

    fn stats(&self) -> SourceStats {
        SourceStats::Points {
            count: self.len as u64,
        }
    }
}
