//! Manifest and per-track basemap artifacts on disk.
//!
//! Layout under the hiking directory:
//!
//! ```text
//! manifest.json        ["2024-03-02.gpx", "2024-01-15.gpx", ...]
//! <stem>.gpx
//! maps/<stem>.jpg      stitched basemap raster
//! maps/<stem>.json     MapMetadata aligned with the raster
//! ```

use std::{
    fs, io,
    path::{Path, PathBuf},
};

use serde::{Serialize, de::DeserializeOwned};
use shared::MapMetadata;
use thiserror::Error;

use crate::{
    basemap::compose_basemap,
    config::{MANIFEST_FILE, PipelineSettings},
    error::PipelineError,
    fetch::{TileFetcher, TileTransport},
    motion::{Track, derive_track},
    segments::build_segments,
    track::{TrackError, read_track},
};

const TRACK_SUFFIX: &str = ".gpx";

#[derive(Debug, Error)]
pub enum ArtifactError {
    #[error("manifest not found at {0:?}, run update_manifest first")]
    MissingManifest(PathBuf),
    #[error("I/O error on {path:?}: {source}")]
    Io { source: io::Error, path: PathBuf },
    #[error("invalid JSON in {path:?}: {source}")]
    Json {
        source: serde_json::Error,
        path: PathBuf,
    },
}

impl ArtifactError {
    fn io(path: &Path) -> impl FnOnce(io::Error) -> Self + '_ {
        move |source| ArtifactError::Io {
            source,
            path: path.to_path_buf(),
        }
    }

    fn json(path: &Path) -> impl FnOnce(serde_json::Error) -> Self + '_ {
        move |source| ArtifactError::Json {
            source,
            path: path.to_path_buf(),
        }
    }
}

/// Track log filenames in `dir`, newest (lexicographically greatest) first.
pub fn list_track_files(dir: &Path) -> Result<Vec<String>, ArtifactError> {
    let mut files = Vec::new();
    for entry in fs::read_dir(dir).map_err(ArtifactError::io(dir))? {
        let entry = entry.map_err(ArtifactError::io(dir))?;
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.ends_with(TRACK_SUFFIX) && entry.path().is_file() {
            files.push(name);
        }
    }
    files.sort_by(|a, b| b.cmp(a));
    Ok(files)
}

/// Rescan `dir` and rewrite its manifest.
pub fn rebuild_manifest(dir: &Path) -> Result<Vec<String>, ArtifactError> {
    let files = list_track_files(dir)?;
    write_json_atomic(&dir.join(MANIFEST_FILE), &files)?;
    tracing::info!("manifest updated with {} track(s)", files.len());
    Ok(files)
}

pub fn read_manifest(dir: &Path) -> Result<Vec<String>, ArtifactError> {
    let path = dir.join(MANIFEST_FILE);
    if !path.exists() {
        return Err(ArtifactError::MissingManifest(path));
    }
    read_json(&path)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArtifactPaths {
    pub raster: PathBuf,
    pub metadata: PathBuf,
}

impl ArtifactPaths {
    pub fn for_track(maps_dir: &Path, filename: &str) -> Self {
        let stem = filename.strip_suffix(TRACK_SUFFIX).unwrap_or(filename);
        Self {
            raster: maps_dir.join(format!("{stem}.jpg")),
            metadata: maps_dir.join(format!("{stem}.json")),
        }
    }
}

/// Persisted metadata for `filename`, `None` when it has not been generated.
pub fn read_metadata(maps_dir: &Path, filename: &str) -> Result<Option<MapMetadata>, ArtifactError> {
    let paths = ArtifactPaths::for_track(maps_dir, filename);
    if !paths.metadata.exists() {
        return Ok(None);
    }
    read_json(&paths.metadata).map(Some)
}

pub fn load_track(hiking_dir: &Path, filename: &str) -> Result<Track, TrackError> {
    read_track(hiking_dir.join(filename)).map(derive_track)
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GenerationOutcome {
    Generated {
        tiles_ok: usize,
        tiles_total: usize,
        width: u32,
        height: u32,
    },
    /// The raster already existed and `force` was not set.
    Skipped,
}

#[derive(Debug)]
pub struct TrackReport {
    pub filename: String,
    pub result: Result<GenerationOutcome, PipelineError>,
}

/// Render and persist the basemap for one track log.
pub async fn generate_track<T: TileTransport>(
    filename: &str,
    settings: &PipelineSettings,
    fetcher: &TileFetcher<T>,
    force: bool,
) -> Result<GenerationOutcome, PipelineError> {
    let paths = ArtifactPaths::for_track(&settings.maps_dir, filename);
    if !force && paths.raster.is_file() {
        tracing::info!("⏭️  {filename}: basemap exists, skipping");
        return Ok(GenerationOutcome::Skipped);
    }

    tracing::info!("🗺️  {filename}: generating basemap");
    let track = load_track(&settings.hiking_dir, filename)?;
    let segments = build_segments(&track);
    let basemap = compose_basemap(&track, segments, fetcher, &settings.basemap).await?;
    let jpeg = basemap.encode_jpeg(settings.basemap.jpeg_quality)?;

    persist(&paths, &jpeg, &basemap.metadata)?;
    tracing::info!(
        "✅ {filename}: saved {:?} ({}/{} tiles)",
        paths.raster,
        basemap.tiles_ok,
        basemap.tiles_total
    );

    Ok(GenerationOutcome::Generated {
        tiles_ok: basemap.tiles_ok,
        tiles_total: basemap.tiles_total,
        width: basemap.metadata.width,
        height: basemap.metadata.height,
    })
}

/// Generate every entry in order. A failing track is logged and reported but
/// never stops the rest of the batch.
pub async fn run_batch<T: TileTransport>(
    entries: &[String],
    settings: &PipelineSettings,
    fetcher: &TileFetcher<T>,
    force: bool,
) -> Vec<TrackReport> {
    let mut reports = Vec::with_capacity(entries.len());
    for filename in entries {
        let result = generate_track(filename, settings, fetcher, force).await;
        if let Err(err) = &result {
            tracing::error!("❌ {filename}: {err}");
        }
        reports.push(TrackReport {
            filename: filename.clone(),
            result,
        });
    }
    reports
}

/// Both files land next to their final names first, so an interrupted run
/// never leaves a half-written artifact behind.
fn persist(paths: &ArtifactPaths, raster: &[u8], metadata: &MapMetadata) -> Result<(), ArtifactError> {
    if let Some(dir) = paths.raster.parent() {
        fs::create_dir_all(dir).map_err(ArtifactError::io(dir))?;
    }
    // The raster marks a track as done, so it lands last.
    write_json_atomic(&paths.metadata, metadata)?;
    write_bytes_atomic(&paths.raster, raster)
}

fn write_json_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<(), ArtifactError> {
    let json = serde_json::to_vec_pretty(value).map_err(ArtifactError::json(path))?;
    write_bytes_atomic(path, &json)
}

fn write_bytes_atomic(path: &Path, bytes: &[u8]) -> Result<(), ArtifactError> {
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".tmp");
    let tmp = PathBuf::from(tmp);
    fs::write(&tmp, bytes).map_err(ArtifactError::io(&tmp))?;
    fs::rename(&tmp, path).map_err(|source| {
        let _ = fs::remove_file(&tmp);
        ArtifactError::io(path)(source)
    })
}

fn read_json<T: DeserializeOwned>(path: &Path) -> Result<T, ArtifactError> {
    let bytes = fs::read(path).map_err(ArtifactError::io(path))?;
    serde_json::from_slice(&bytes).map_err(ArtifactError::json(path))
}
