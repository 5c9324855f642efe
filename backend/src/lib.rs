pub mod artifacts;
pub mod basemap;
pub mod config;
pub mod error;
pub mod fetch;
pub mod geodesy;
pub mod motion;
pub mod segments;
pub mod tiles;
pub mod track;

use std::{io::ErrorKind, sync::Arc};

use axum::{
    Json, Router,
    extract::{Path, State},
    http::{Method, StatusCode},
    routing::get,
};
use shared::{ApiError, MapMetadata, Segment, TrackSummary};
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
};

use crate::artifacts::{ArtifactError, load_track, read_manifest, read_metadata};
use crate::config::PipelineSettings;
use crate::motion::Track;
use crate::segments::build_segments;
use crate::track::TrackError;

#[derive(Clone)]
pub struct AppState {
    pub settings: Arc<PipelineSettings>,
}

type ApiResult<T> = Result<Json<T>, (StatusCode, Json<ApiError>)>;

/// Read-only API over the hiking directory and its generated artifacts.
pub fn create_router(state: AppState) -> Router {
    let rasters = ServeDir::new(&state.settings.maps_dir);
    Router::new()
        .route("/api/hikes", get(list_hikes))
        .route("/api/hikes/:filename", get(hike_summary))
        .route("/api/hikes/:filename/segments", get(hike_segments))
        .route("/api/hikes/:filename/map", get(hike_map))
        .nest_service("/maps", rasters)
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods([Method::GET]),
        )
        .with_state(state)
}

async fn list_hikes(State(state): State<AppState>) -> ApiResult<Vec<String>> {
    read_manifest(&state.settings.hiking_dir)
        .map(Json)
        .map_err(artifact_error)
}

async fn hike_summary(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<TrackSummary> {
    let track = live_track(&state, &filename)?;
    Ok(Json(track.summary()))
}

async fn hike_segments(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<Vec<Segment>> {
    let track = live_track(&state, &filename)?;
    Ok(Json(build_segments(&track)))
}

async fn hike_map(
    State(state): State<AppState>,
    Path(filename): Path<String>,
) -> ApiResult<MapMetadata> {
    validate_filename(&filename)?;
    match read_metadata(&state.settings.maps_dir, &filename) {
        Ok(Some(metadata)) => Ok(Json(metadata)),
        Ok(None) => Err(api_error(
            StatusCode::NOT_FOUND,
            format!("no basemap generated for {filename}"),
        )),
        Err(err) => Err(artifact_error(err)),
    }
}

fn live_track(state: &AppState, filename: &str) -> Result<Track, (StatusCode, Json<ApiError>)> {
    validate_filename(filename)?;
    load_track(&state.settings.hiking_dir, filename).map_err(track_error)
}

/// Accept plain `*.gpx` names only; anything that could leave the hiking
/// directory is rejected.
pub fn validate_filename(filename: &str) -> Result<(), (StatusCode, Json<ApiError>)> {
    let plain = !filename.contains(['/', '\\']) && !filename.contains("..");
    if plain && filename.len() > ".gpx".len() && filename.ends_with(".gpx") {
        Ok(())
    } else {
        Err(api_error(
            StatusCode::BAD_REQUEST,
            format!("invalid track filename: {filename}"),
        ))
    }
}

fn api_error(status: StatusCode, message: impl Into<String>) -> (StatusCode, Json<ApiError>) {
    (
        status,
        Json(ApiError {
            message: message.into(),
        }),
    )
}

fn track_error(err: TrackError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        TrackError::Io { source, .. } if source.kind() == ErrorKind::NotFound => StatusCode::NOT_FOUND,
        TrackError::Io { .. } => StatusCode::INTERNAL_SERVER_ERROR,
        TrackError::MalformedInput { .. } => StatusCode::UNPROCESSABLE_ENTITY,
    };
    api_error(status, err.to_string())
}

fn artifact_error(err: ArtifactError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        ArtifactError::MissingManifest(_) => StatusCode::NOT_FOUND,
        ArtifactError::Io { .. } | ArtifactError::Json { .. } => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, err.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filename_validation() {
        assert!(validate_filename("2024-03-02.gpx").is_ok());
        assert!(validate_filename("morning walk.gpx").is_ok());
        for bad in ["../secret.gpx", "a/b.gpx", "a\\b.gpx", ".gpx", "track.json", ""] {
            let (status, _) = validate_filename(bad).unwrap_err();
            assert_eq!(status, StatusCode::BAD_REQUEST, "{bad}");
        }
    }
}
