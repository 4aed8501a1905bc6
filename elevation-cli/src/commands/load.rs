use anyhow::{bail, Context, Result};
use elevation::filename::parse_tile_name;
use elevation::{write_csv, BulkLoad, HgtTile, PointFileStore, PointRecord};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::File;
use std::io::{self, BufWriter, Read};
use std::path::{Path, PathBuf};

use crate::Format;

fn is_stdio(path: Option<&Path>) -> bool {
    match path {
        None => true,
        Some(p) => p.as_os_str() == "-",
    }
}

fn is_zip(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("zip"))
        .unwrap_or(false)
}

/// A store can't be streamed to stdout.
fn validate_output(output: Option<&Path>, format: Format) -> Result<()> {
    if format == Format::Store && is_stdio(output) {
        bail!("cannot use store format and stdout together; pass -o FILE");
    }
    Ok(())
}

pub fn run(
    input: Option<PathBuf>,
    tile_name: Option<String>,
    output: Option<PathBuf>,
    format: Format,
) -> Result<()> {
    validate_output(output.as_deref(), format)?;

    let tile = if is_stdio(input.as_deref()) {
        let name = tile_name.context("must pass -t TILE when reading from stdin")?;
        let mut bytes = Vec::new();
        io::stdin()
            .lock()
            .read_to_end(&mut bytes)
            .context("Failed to read stdin")?;
        HgtTile::from_named_bytes(bytes, &name)
            .with_context(|| format!("Failed to decode tile {} from stdin", name))?
    } else {
        let path = input.unwrap_or_default();
        open_tile(&path, tile_name.as_deref())?
    };

    let records = tile.records().context("Failed to decode tile")?;
    tracing::info!(tile = %tile.name(), records = records.len(), "Decoded tile");

    match format {
        Format::Csv => match output.as_deref() {
            Some(path) if !is_stdio(Some(path)) => {
                let file = File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?;
                write_csv(BufWriter::new(file), &records, true)?;
                eprintln!("Wrote {} points to {}", records.len(), path.display());
            }
            _ => write_csv(io::stdout().lock(), &records, true)?,
        },
        Format::Store => {
            let path = output.context("store output needs -o FILE")?;
            let total = load_into_store(&path, &records)?;
            eprintln!(
                "Loaded {} points into {} ({} total)",
                records.len(),
                path.display(),
                total
            );
        }
    }

    Ok(())
}

pub fn run_many(inputs: Vec<PathBuf>, output: PathBuf, format: Format) -> Result<()> {
    validate_output(Some(&output), format)?;

    let pb = ProgressBar::new(inputs.len() as u64);
    pb.set_style(
        ProgressStyle::default_bar()
            .template(
                "{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} tiles ({eta}) {msg}",
            )?
            .progress_chars("#>-"),
    );

    let mut sink = match format {
        Format::Csv => {
            let file = File::create(&output)
                .with_context(|| format!("Failed to create {}", output.display()))?;
            Sink::Csv(csv::Writer::from_writer(BufWriter::new(file)))
        }
        Format::Store => Sink::Store(
            PointFileStore::open_or_create(&output)
                .with_context(|| format!("Failed to open store {}", output.display()))?,
        ),
    };

    let mut points = 0usize;
    for path in &inputs {
        pb.set_message(path.display().to_string());

        let tile = open_tile(path, None)?;
        let records = tile
            .records()
            .with_context(|| format!("Failed to decode {}", path.display()))?;
        sink.write(&records)?;
        points += records.len();

        pb.inc(1);
    }

    sink.finish()?;
    pb.finish_with_message("done");

    eprintln!(
        "Wrote {} points from {} tiles to {}",
        points,
        inputs.len(),
        output.display()
    );
    Ok(())
}

/// Destination for points decoded from many tiles.
enum Sink {
    Csv(csv::Writer<BufWriter<File>>),
    Store(PointFileStore),
}

impl Sink {
    fn write(&mut self, records: &[PointRecord]) -> Result<()> {
        match self {
            Sink::Csv(writer) => {
                for record in records {
                    writer.serialize(record)?;
                }
            }
            // Each tile is its own transaction
            Sink::Store(store) => {
                store.load(records)?;
            }
        }
        Ok(())
    }

    fn finish(self) -> Result<()> {
        if let Sink::Csv(mut writer) = self {
            writer.flush()?;
        }
        Ok(())
    }
}

/// Open a `.hgt` or `.hgt.zip` tile file. An explicit name overrides the
/// origin taken from the file or entry name.
fn open_tile(path: &Path, name: Option<&str>) -> Result<HgtTile> {
    let tile = match name {
        Some(name) => {
            let (lat, lng) = parse_tile_name(name)?;
            if is_zip(path) {
                HgtTile::from_zip_with_coords(path, lat, lng)
            } else {
                HgtTile::from_file_with_coords(path, lat, lng)
            }
        }
        None => HgtTile::open(path),
    };
    tile.with_context(|| format!("Failed to load tile {}", path.display()))
}

fn load_into_store(path: &Path, records: &[PointRecord]) -> Result<usize> {
    let mut store = PointFileStore::open_or_create(path)
        .with_context(|| format!("Failed to open store {}", path.display()))?;
    let total = store
        .load(records)
        .with_context(|| format!("Failed to load points into {}", path.display()))?;
    Ok(total)
}
