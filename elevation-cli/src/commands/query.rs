use anyhow::{Context, Result};
use elevation::{
    ElevationServiceBuilder, IncompletePolicy, InterpolationMethod, Resolution, VoidPolicy,
};
use serde::Serialize;
use std::path::PathBuf;

pub struct QueryArgs {
    pub store: PathBuf,
    pub lat: f64,
    pub lng: f64,
    pub method: InterpolationMethod,
    pub grid: bool,
    pub resolution: Resolution,
    pub incomplete: IncompletePolicy,
    pub void_fill: VoidPolicy,
    pub cache_size: u64,
    pub json: bool,
}

#[derive(Serialize)]
struct ElevationResponse {
    latitude: f64,
    longitude: f64,
    elevation: f64,
    interpolation: String,
}

pub fn run(args: QueryArgs) -> Result<()> {
    let service = ElevationServiceBuilder::new(&args.store)
        .resolution(args.resolution)
        .incomplete(args.incomplete)
        .void_fill(args.void_fill)
        .cache_size(args.cache_size)
        .build()
        .with_context(|| format!("Failed to open {}", args.store.display()))?;

    let (point, interpolation) = if args.grid {
        let point = service
            .grid_elevation(args.lat, args.lng)
            .context("Failed to get elevation")?;
        (point, "grid".to_string())
    } else {
        let point = service
            .point_elevation(args.lat, args.lng, args.method)
            .context("Failed to get elevation")?;
        (point, args.method.to_string())
    };

    if args.json {
        let response = ElevationResponse {
            latitude: point.latitude,
            longitude: point.longitude,
            elevation: point.elevation,
            interpolation,
        };
        println!("{}", serde_json::to_string(&response)?);
    } else {
        println!("{:.2}", point.elevation);
    }

    Ok(())
}
