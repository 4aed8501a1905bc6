use anyhow::{Context, Result};
use elevation::{HgtTile, Resolution, VOID_VALUE};
use std::path::PathBuf;

/// Elevation range and void count over a tile's raw samples.
#[derive(Debug, PartialEq)]
struct SampleSummary {
    min: Option<i16>,
    max: Option<i16>,
    voids: u64,
}

fn summarize(bytes: &[u8]) -> SampleSummary {
    let mut summary = SampleSummary {
        min: None,
        max: None,
        voids: 0,
    };

    for chunk in bytes.chunks_exact(2) {
        let value = i16::from_be_bytes([chunk[0], chunk[1]]);
        if value == VOID_VALUE {
            summary.voids += 1;
            continue;
        }
        summary.min = Some(summary.min.map_or(value, |m| m.min(value)));
        summary.max = Some(summary.max.map_or(value, |m| m.max(value)));
    }
    summary
}

pub fn run(tile_path: PathBuf) -> Result<()> {
    let tile = HgtTile::open(&tile_path)
        .with_context(|| format!("Failed to load tile {}", tile_path.display()))?;
    let file_size = std::fs::metadata(&tile_path)?.len();

    let samples = tile.samples();
    let (base_lat, base_lng) = tile.origin();
    let summary = summarize(tile.bytes());

    let resolution_str = match tile.resolution() {
        Resolution::Srtm1 => "SRTM1 (~30m)",
        Resolution::Srtm3 => "SRTM3 (~90m)",
    };

    println!("Tile: {}", tile.name());
    println!("Path: {}", tile_path.display());
    println!();
    println!(
        "Resolution: {} ({}x{} samples)",
        resolution_str, samples, samples
    );
    println!(
        "Coverage: {}{}-{}{}, {}{}-{}{}",
        if base_lat >= 0 { "N" } else { "S" },
        base_lat.abs(),
        if base_lat + 1 >= 0 { "N" } else { "S" },
        (base_lat + 1).abs(),
        if base_lng >= 0 { "E" } else { "W" },
        base_lng.abs(),
        if base_lng + 1 >= 0 { "E" } else { "W" },
        (base_lng + 1).abs()
    );
    println!("File size: {}", format_size(file_size));
    println!();

    if let (Some(min), Some(max)) = (summary.min, summary.max) {
        println!("Min elevation: {}m", min);
        println!("Max elevation: {}m", max);
    }

    let total_samples = (samples * samples) as u64;
    if summary.voids > 0 {
        let void_pct = (summary.voids as f64 / total_samples as f64) * 100.0;
        println!("Void samples: {} ({:.1}%)", summary.voids, void_pct);
    }

    Ok(())
}

fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;
    const GB: u64 = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
