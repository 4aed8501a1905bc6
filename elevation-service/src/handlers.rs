//! HTTP request handlers for the elevation service.

use axum::{
    extract::{Query, State},
    http::StatusCode,
    response::IntoResponse,
    Json,
};
use elevation::{ElevationError, InterpolationMethod, SourceStats};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{IntoParams, ToSchema};

use crate::AppState;

/// Query parameters for elevation endpoint.
#[derive(Debug, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ElevationQuery {
    /// Latitude in decimal degrees (-90 to 90).
    pub latitude: f64,
    /// Longitude in decimal degrees (-180 to 180).
    pub longitude: f64,
    /// Interpolation method: `nearest`, `bilinear` or `bicubic`.
    /// Default is `bilinear`.
    pub interpolation: Option<String>,
}

/// Successful elevation response.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct ElevationResponse {
    /// Latitude queried.
    pub latitude: f64,
    /// Longitude queried.
    pub longitude: f64,
    /// Estimated elevation in meters.
    pub elevation: f64,
}

/// Error response.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Error message.
    pub error: String,
}

/// Health check response.
#[derive(Debug, Serialize, ToSchema)]
pub struct HealthResponse {
    /// Service status.
    pub status: String,
    /// Service version.
    pub version: String,
}

/// Backend statistics response.
///
/// `points` is set for point stores, the cache fields for tile directories.
#[derive(Debug, Serialize, ToSchema)]
pub struct StatsResponse {
    /// `points` or `tiles`.
    pub backend: String,
    /// Number of stored points.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub points: Option<u64>,
    /// Number of tiles in cache.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cached_tiles: Option<u64>,
    /// Cache hit count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_hits: Option<u64>,
    /// Cache miss count.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cache_misses: Option<u64>,
    /// Cache hit rate (0.0 to 1.0).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hit_rate: Option<f64>,
}

impl From<SourceStats> for StatsResponse {
    fn from(stats: SourceStats) -> Self {
        match stats {
            SourceStats::Points { count } => StatsResponse {
                backend: "points".to_string(),
                points: Some(count),
                cached_tiles: None,
                cache_hits: None,
                cache_misses: None,
                hit_rate: None,
            },
            SourceStats::Tiles(cache) => StatsResponse {
                backend: "tiles".to_string(),
                points: None,
                cached_tiles: Some(cache.entry_count),
                cache_hits: Some(cache.hit_count),
                cache_misses: Some(cache.miss_count),
                hit_rate: Some(cache.hit_rate()),
            },
        }
    }
}

/// Get elevation for given coordinates.
///
/// # Returns
///
/// - `200 OK` with the estimate at the query coordinate
/// - `400 Bad Request` for invalid coordinates or an unknown method
/// - `404 Not Found` if no data or too few neighbors cover the coordinate
/// - `500 Internal Server Error` on unexpected errors
#[utoipa::path(
    get,
    path = "/elevation",
    tag = "elevation",
    params(ElevationQuery),
    responses(
        (status = 200, description = "Elevation estimate", body = ElevationResponse),
        (status = 400, description = "Invalid coordinates or method", body = ErrorResponse),
        (status = 404, description = "No data for the coordinate", body = ErrorResponse),
        (status = 500, description = "Internal error", body = ErrorResponse)
    )
)]
#[axum::debug_handler]
pub async fn get_elevation(
    State(state): State<Arc<AppState>>,
    Query(query): Query<ElevationQuery>,
) -> impl IntoResponse {
    tracing::debug!(
        latitude = query.latitude,
        longitude = query.longitude,
        interpolation = ?query.interpolation,
        "Elevation query"
    );

    let method = match query.interpolation.as_deref() {
        Some(name) => match name.parse::<InterpolationMethod>() {
            Ok(method) => method,
            Err(e) => return error_response(query.latitude, query.longitude, e),
        },
        None => InterpolationMethod::default(),
    };

    match state
        .service
        .point_elevation(query.latitude, query.longitude, method)
    {
        Ok(point) => {
            tracing::info!(
                latitude = point.latitude,
                longitude = point.longitude,
                elevation = point.elevation,
                %method,
                "Elevation found"
            );
            (
                StatusCode::OK,
                Json(ElevationResponse {
                    latitude: point.latitude,
                    longitude: point.longitude,
                    elevation: point.elevation,
                }),
            )
                .into_response()
        }
        Err(e) => error_response(query.latitude, query.longitude, e),
    }
}

fn status_for(e: &ElevationError) -> StatusCode {
    match e {
        ElevationError::OutOfBounds { .. } | ElevationError::InvalidInterpolationMethod { .. } => {
            StatusCode::BAD_REQUEST
        }
        ElevationError::NeighborQuery { .. }
        | ElevationError::IncompleteNeighborSet { .. }
        | ElevationError::EmptyStore => StatusCode::NOT_FOUND,
        _ => StatusCode::INTERNAL_SERVER_ERROR,
    }
}

/// Create an error response for elevation queries.
fn error_response(latitude: f64, longitude: f64, e: ElevationError) -> axum::response::Response {
    let status = status_for(&e);

    tracing::warn!(latitude, longitude, error = %e, "Elevation query failed");

    (status, Json(ErrorResponse { error: e.to_string() })).into_response()
}

/// Health check endpoint.
///
/// Returns service status and version.
#[utoipa::path(
    get,
    path = "/health",
    tag = "system",
    responses((status = 200, description = "Service is up", body = HealthResponse))
)]
pub async fn health_check() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// Get backend statistics.
#[utoipa::path(
    get,
    path = "/stats",
    tag = "system",
    responses((status = 200, description = "Backend statistics", body = StatsResponse))
)]
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Json<StatsResponse> {
    Json(state.service.stats().into())
}

#[cfg(test)]
mod tests {
    use super::*;
    use elevation::CacheStats;

    #[test]
    fn test_elevation_query_deserialize() {
        let json = r#"{"latitude": 35.5, "longitude": 138.7}"#;
        let query: ElevationQuery = serde_json::from_str(json).unwrap();
        assert_eq!(query.latitude, 35.5);
        assert_eq!(query.longitude, 138.7);
        assert!(query.interpolation.is_none());
    }

    #[test]
    fn test_elevation_response_serialize() {
        let response = ElevationResponse {
            latitude: 35.5,
            longitude: 138.7,
            elevation: 1234.5,
        };
        let json = serde_json::to_string(&response).unwrap();
        assert!(json.contains("\"elevation\":1234.5"));
        assert!(json.contains("\"latitude\":35.5"));
    }

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            status_for(&ElevationError::OutOfBounds { lat: 91.0, lng: 0.0 }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ElevationError::InvalidInterpolationMethod {
                method: "cubic".to_string()
            }),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            status_for(&ElevationError::IncompleteNeighborSet {
                method: "bilinear",
                expected: 4,
                found: 2
            }),
            StatusCode::NOT_FOUND
        );
        assert_eq!(status_for(&ElevationError::EmptyStore), StatusCode::NOT_FOUND);
        assert_eq!(
            status_for(&ElevationError::InvalidTileSize { size: 10 }),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_stats_response_from_points() {
        let json = serde_json::to_value(StatsResponse::from(SourceStats::Points { count: 42 }))
            .unwrap();
        assert_eq!(json["backend"], "points");
        assert_eq!(json["points"], 42);
        assert!(json.get("cache_hits").is_none());
    }

    #[test]
    fn test_stats_response_from_tiles() {
        let stats = SourceStats::Tiles(CacheStats {
            entry_count: 2,
            hit_count: 3,
            miss_count: 1,
        });
        let json = serde_json::to_value(StatsResponse::from(stats)).unwrap();
        assert_eq!(json["backend"], "tiles");
        assert_eq!(json["cached_tiles"], 2);
        assert_eq!(json["hit_rate"], 0.75);
        assert!(json.get("points").is_none());
    }
}
