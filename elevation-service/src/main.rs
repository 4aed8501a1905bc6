//! Elevation Service - HTTP microservice for interpolated elevation queries.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `ELEVATION_STORE` | Point store file or directory of .hgt files | Required |
//! | `ELEVATION_RESOLUTION` | `srtm1` or `srtm3` neighbor spacing | `srtm1` |
//! | `ELEVATION_CACHE_SIZE` | Maximum tiles in cache | 100 |
//! | `ELEVATION_INCOMPLETE` | `reject` or `degrade` | `reject` |
//! | `ELEVATION_VOID_FILL` | `zero` or `nearest-valid` | `zero` |
//! | `ELEVATION_PRELOAD` | `all`, or `min_lat,min_lng,max_lat,max_lng` boxes joined by `;` | None |
//! | `ELEVATION_ADDR` | Listen address | `0.0.0.0` |
//! | `ELEVATION_PORT` | HTTP server port | 8080 |
//! | `RUST_LOG` | Log level (e.g., "info", "debug") | "info" |
//!
//! ## Endpoints
//!
//! - `GET /elevation?latitude=X&longitude=Y&interpolation=M` - Elevation estimate
//! - `GET /health` - Health check
//! - `GET /stats` - Backend statistics
//! - `GET /docs` - OpenAPI documentation (Swagger UI)

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::sync::Arc;

use elevation::{BoundingBox, ElevationServiceBuilder, SourceStats};
use elevation_service::{router, AppState};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "elevation_service=info,tower_http=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let port: u16 = std::env::var("ELEVATION_PORT")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(8080);
    let ip: IpAddr = std::env::var("ELEVATION_ADDR")
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(IpAddr::V4(Ipv4Addr::UNSPECIFIED));

    // The library reads ELEVATION_STORE, ELEVATION_RESOLUTION,
    // ELEVATION_CACHE_SIZE, ELEVATION_INCOMPLETE and ELEVATION_VOID_FILL
    let service = ElevationServiceBuilder::from_env()?.build()?;

    match service.stats() {
        SourceStats::Points { count } => {
            tracing::info!(points = count, port, "Starting elevation service on a point store")
        }
        SourceStats::Tiles(_) => tracing::info!(port, "Starting elevation service on a tile directory"),
    }

    if let Ok(preload_val) = std::env::var("ELEVATION_PRELOAD") {
        match service.tiles() {
            Some(tiles) => {
                let bounds = parse_preload_bounds(&preload_val);
                let bounds_ref = bounds.as_deref();
                tracing::info!(
                    bounds = ?bounds_ref.map(|b| b.len()),
                    "Preloading tiles into cache"
                );
                let stats = tiles.preload(bounds_ref);
                tracing::info!(
                    tiles_loaded = stats.tiles_loaded,
                    tiles_already_cached = stats.tiles_already_cached,
                    tiles_failed = stats.tiles_failed,
                    tiles_matched = stats.tiles_matched,
                    elapsed_ms = stats.elapsed_ms,
                    "Preload complete"
                );
            }
            None => tracing::warn!("ELEVATION_PRELOAD ignored, store is not a tile directory"),
        }
    }

    let state = Arc::new(AppState { service });
    let app = router(state);

    let addr = SocketAddr::new(ip, port);
    let listener = tokio::net::TcpListener::bind(addr).await?;

    tracing::info!("Listening on http://{}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

/// Parse the `ELEVATION_PRELOAD` value into bounding boxes.
///
/// Supported formats:
/// - `true`, `all`, `1`: preload all tiles (returns `None`)
/// - `min_lat,min_lng,max_lat,max_lng`: single bounding box
/// - several boxes separated by `;`
fn parse_preload_bounds(value: &str) -> Option<Vec<BoundingBox>> {
    let trimmed = value.trim();

    if matches!(trimmed.to_lowercase().as_str(), "true" | "all" | "1") {
        return None;
    }

    let boxes: Vec<BoundingBox> = trimmed
        .split(';')
        .filter_map(|bbox_str| {
            let parts: Vec<f64> = bbox_str
                .split(',')
                .filter_map(|s| s.trim().parse::<f64>().ok())
                .collect();
            if parts.len() == 4 {
                Some(BoundingBox::new(parts[0], parts[1], parts[2], parts[3]))
            } else {
                tracing::warn!(
                    bbox = bbox_str,
                    "Invalid bounding box format, expected min_lat,min_lng,max_lat,max_lng"
                );
                None
            }
        })
        .collect();

    if boxes.is_empty() {
        tracing::warn!(
            value = trimmed,
            "Could not parse ELEVATION_PRELOAD value, preloading all tiles"
        );
        None
    } else {
        Some(boxes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_preload_all_keywords() {
        assert!(parse_preload_bounds("all").is_none());
        assert!(parse_preload_bounds(" TRUE ").is_none());
        assert!(parse_preload_bounds("1").is_none());
    }

    #[test]
    fn test_preload_boxes() {
        let boxes = parse_preload_bounds("35,138,36,139; -1.5,5,0.5,7").unwrap();
        assert_eq!(boxes.len(), 2);
        assert_eq!(boxes[1].min_lat, -1.5);
        assert!(boxes[0].overlaps_tile(35, 138));
        assert!(!boxes[0].overlaps_tile(40, 138));
    }

    #[test]
    fn test_preload_skips_bad_boxes() {
        let boxes = parse_preload_bounds("35,138,36;0,0,1,1").unwrap();
        assert_eq!(boxes.len(), 1);
        assert!(parse_preload_bounds("nonsense").is_none());
    }
}
