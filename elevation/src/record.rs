//! Point records and their CSV form.

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};

use crate::error::Result;

/// A single elevation sample at a geographic position.
///
/// Records produced by the decoder carry integral elevations; records
/// produced by interpolation may be fractional.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PointRecord {
    /// Latitude in decimal degrees.
    pub latitude: f64,
    /// Longitude in decimal degrees.
    pub longitude: f64,
    /// Elevation in meters.
    pub elevation: f64,
}

impl PointRecord {
    pub fn new(latitude: f64, longitude: f64, elevation: f64) -> Self {
        Self {
            latitude,
            longitude,
            elevation,
        }
    }

    /// Squared planar distance in degrees to `(lat, lng)`.
    pub fn distance_sq(&self, lat: f64, lng: f64) -> f64 {
        let dlat = self.latitude - lat;
        let dlng = self.longitude - lng;
        dlat * dlat + dlng * dlng
    }

    /// Orders records by latitude, then longitude.
    pub(crate) fn cmp_position(&self, other: &PointRecord) -> std::cmp::Ordering {
        self.latitude
            .total_cmp(&other.latitude)
            .then(self.longitude.total_cmp(&other.longitude))
    }

    pub(crate) fn same_position(&self, other: &PointRecord) -> bool {
        self.latitude == other.latitude && self.longitude == other.longitude
    }
}

impl fmt::Display for PointRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.latitude, self.longitude, self.elevation)
    }
}

/// Write records as CSV with an optional `latitude,longitude,elevation` header.
pub fn write_csv<W: Write>(writer: W, records: &[PointRecord], header: bool) -> Result<()> {
    let mut csv_writer = csv::WriterBuilder::new()
        .has_headers(header)
        .from_writer(writer);

    for record in records {
        csv_writer.serialize(record)?;
    }
    // An empty slice never triggers the serializer's header row
    if header && records.is_empty() {
        csv_writer.write_record(["latitude", "longitude", "elevation"])?;
    }

    csv_writer.flush()?;
    Ok(())
}

/// Read records from CSV with a `latitude,longitude,elevation` header.
pub fn read_csv<R: Read>(reader: R) -> Result<Vec<PointRecord>> {
    let mut csv_reader = csv::Reader::from_reader(reader);
    let mut records = Vec::new();
    for row in csv_reader.deserialize() {
        records.push(row?);
    }
    Ok(records)
}
