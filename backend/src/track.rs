use std::{
    fs,
    io::Cursor,
    path::{Path, PathBuf},
};

use chrono::{DateTime, Utc};
use quick_xml::{Reader, events::Event};
use shared::GeoPoint;
use thiserror::Error;

use crate::geodesy;

pub const DEFAULT_TRACK_NAME: &str = "No.1";

/// Element names vendors use for a precomputed total ascent.
const ASCENT_TAGS: &[&str] = &["totalascent", "ascent", "elevationgain", "cumulativeclimb"];

#[derive(Debug, Error)]
pub enum TrackError {
    #[error("failed to read track log {path:?}: {source}")]
    Io {
        source: std::io::Error,
        path: PathBuf,
    },
    #[error("malformed track log `{filename}`: {reason}")]
    MalformedInput { filename: String, reason: String },
}

impl TrackError {
    fn malformed(filename: &str, reason: impl Into<String>) -> Self {
        TrackError::MalformedInput {
            filename: filename.to_string(),
            reason: reason.into(),
        }
    }
}

/// First track of a log, before any speed derivation.
#[derive(Debug, Clone)]
pub struct ParsedTrack {
    pub name: String,
    pub filename: String,
    pub points: Vec<GeoPoint>,
    /// Cumulative hop distance in meters.
    pub distance: f64,
    pub elevation_gain: Option<f64>,
}

pub fn read_track(path: impl AsRef<Path>) -> Result<ParsedTrack, TrackError> {
    let path = path.as_ref();
    let document = fs::read_to_string(path).map_err(|source| TrackError::Io {
        source,
        path: path.into(),
    })?;
    let filename = path
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_default();
    parse_track(&document, &filename)
}

/// Parse the first track of a GPX document.
///
/// Every segment of that track is concatenated in document order. Documents
/// with further tracks only contribute their first one.
pub fn parse_track(document: &str, filename: &str) -> Result<ParsedTrack, TrackError> {
    let gpx = gpx::read(Cursor::new(document.as_bytes()))
        .map_err(|err| TrackError::malformed(filename, err.to_string()))?;

    let track = gpx
        .tracks
        .first()
        .ok_or_else(|| TrackError::malformed(filename, "document contains no tracks"))?;
    if gpx.tracks.len() > 1 {
        tracing::warn!(
            "{filename}: {} tracks found, only the first is used",
            gpx.tracks.len()
        );
    }

    let waypoints: Vec<&gpx::Waypoint> = track
        .segments
        .iter()
        .flat_map(|segment| segment.points.iter())
        .collect();
    if waypoints.is_empty() {
        return Err(TrackError::malformed(filename, "track contains no points"));
    }

    let mut points = Vec::with_capacity(waypoints.len());
    for (idx, waypoint) in waypoints.iter().enumerate() {
        let time = waypoint
            .time
            .as_ref()
            .ok_or_else(|| TrackError::malformed(filename, format!("point {idx} has no timestamp")))
            .and_then(|time| to_utc(time).map_err(|reason| TrackError::malformed(filename, reason)))?;
        let position = waypoint.point();
        points.push(GeoPoint {
            lat: position.y(),
            lon: position.x(),
            time,
        });
    }

    let elevations: Vec<Option<f64>> = waypoints.iter().map(|w| w.elevation).collect();
    let elevation_gain = resolve_elevation_gain(&elevations, document);

    let name = gpx
        .metadata
        .as_ref()
        .and_then(|meta| meta.name.clone())
        .or_else(|| track.name.clone())
        .filter(|name| !name.trim().is_empty())
        .unwrap_or_else(|| DEFAULT_TRACK_NAME.to_string());

    let distance = geodesy::path_length(&points);

    tracing::debug!(
        "parsed {filename}: {} points, {:.0} m, gain {:?}",
        points.len(),
        distance,
        elevation_gain
    );

    Ok(ParsedTrack {
        name,
        filename: filename.to_string(),
        points,
        distance,
        elevation_gain,
    })
}

fn to_utc(time: &gpx::Time) -> Result<DateTime<Utc>, String> {
    let iso = time.format().map_err(|e| e.to_string())?;
    DateTime::parse_from_rfc3339(&iso)
        .map(|t| t.with_timezone(&Utc))
        .map_err(|e| e.to_string())
}

/// Sum of positive steps between consecutive points that both carry `<ele>`.
fn ascent_from_elevations(elevations: &[Option<f64>]) -> f64 {
    elevations
        .windows(2)
        .filter_map(|w| match (w[0], w[1]) {
            (Some(prev), Some(curr)) if curr > prev => Some(curr - prev),
            _ => None,
        })
        .sum()
}

/// Elevation samples first, then a vendor extension field. `Some(0.0)` means the
/// log has elevations and they never climb; `None` means no information at all.
fn resolve_elevation_gain(elevations: &[Option<f64>], document: &str) -> Option<f64> {
    let from_samples = ascent_from_elevations(elevations);
    if from_samples > 0.0 {
        return Some(from_samples);
    }
    if let Some(from_extension) = extension_ascent(document) {
        return Some(from_extension);
    }
    elevations.iter().any(Option::is_some).then_some(0.0)
}

/// First positive numeric value held by an ascent-like element anywhere in the document.
fn extension_ascent(document: &str) -> Option<f64> {
    let mut reader = Reader::from_str(document);
    reader.config_mut().trim_text(true);

    let mut inside_ascent = false;
    loop {
        match reader.read_event() {
            Ok(Event::Start(element)) => {
                let name = element.local_name();
                inside_ascent = ASCENT_TAGS
                    .iter()
                    .any(|tag| name.as_ref().eq_ignore_ascii_case(tag.as_bytes()));
            }
            Ok(Event::Text(text)) if inside_ascent => {
                inside_ascent = false;
                let value = text
                    .unescape()
                    .ok()
                    .and_then(|raw| raw.trim().parse::<f64>().ok());
                if let Some(value) = value.filter(|v| v.is_finite() && *v > 0.0) {
                    return Some(value);
                }
            }
            Ok(Event::End(_)) => inside_ascent = false,
            Ok(Event::Eof) => return None,
            Err(err) => {
                tracing::debug!("stopped scanning extensions: {err}");
                return None;
            }
            _ => {}
        }
    }
}
