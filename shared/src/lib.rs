use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

pub mod display;
pub mod selection;

pub use display::{Locale, average_speed_kmh, format_distance, format_duration};
pub use selection::{Selection, SelectionToken};

/// A timestamped track point as read from the log.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct GeoPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
}

/// A track point with its derived speed in m/s.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SpeedPoint {
    pub lat: f64,
    pub lon: f64,
    pub time: DateTime<Utc>,
    pub speed: f64,
}

impl SpeedPoint {
    pub fn from_geo(point: GeoPoint, speed: f64) -> Self {
        Self {
            lat: point.lat,
            lon: point.lon,
            time: point.time,
            speed,
        }
    }

    pub fn lat_lon(&self) -> [f64; 2] {
        [self.lat, self.lon]
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SpeedBand {
    Red,
    Amber,
    Gold,
    Green,
}

impl SpeedBand {
    /// Stroke color used when rendering a segment of this band.
    pub fn css_color(self) -> &'static str {
        match self {
            SpeedBand::Red => "#ef4444",
            SpeedBand::Amber => "#f59e0b",
            SpeedBand::Gold => "#d4af37",
            SpeedBand::Green => "#22c55e",
        }
    }
}

/// Contiguous run of points sharing a speed band. Points are `[lat, lon]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Segment {
    pub color: SpeedBand,
    pub points: Vec<[f64; 2]>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapBounds {
    pub min_lat: f64,
    pub max_lat: f64,
    pub min_lon: f64,
    pub max_lon: f64,
}

impl MapBounds {
    /// Bounding box of a point sequence, `None` when empty.
    pub fn enclosing(points: impl IntoIterator<Item = (f64, f64)>) -> Option<Self> {
        let mut iter = points.into_iter();
        let (lat, lon) = iter.next()?;
        let mut bounds = Self {
            min_lat: lat,
            max_lat: lat,
            min_lon: lon,
            max_lon: lon,
        };
        for (lat, lon) in iter {
            bounds.min_lat = bounds.min_lat.min(lat);
            bounds.max_lat = bounds.max_lat.max(lat);
            bounds.min_lon = bounds.min_lon.min(lon);
            bounds.max_lon = bounds.max_lon.max(lon);
        }
        Some(bounds)
    }

    pub fn padded(&self, degrees: f64) -> Self {
        Self {
            min_lat: self.min_lat - degrees,
            max_lat: self.max_lat + degrees,
            min_lon: self.min_lon - degrees,
            max_lon: self.max_lon + degrees,
        }
    }

    /// Project a coordinate onto a raster of `width` x `height` pixels covering
    /// these bounds. Latitude goes through Web Mercator so the result lines up
    /// with a stitched slippy-map tile grid.
    pub fn project(&self, lat: f64, lon: f64, width: u32, height: u32) -> (f64, f64) {
        let lon_span = self.max_lon - self.min_lon;
        let x = if lon_span.abs() < f64::EPSILON {
            0.0
        } else {
            (lon - self.min_lon) / lon_span * width as f64
        };

        let top = mercator_y(self.max_lat);
        let merc_span = top - mercator_y(self.min_lat);
        let y = if merc_span.abs() < f64::EPSILON {
            0.0
        } else {
            (top - mercator_y(lat)) / merc_span * height as f64
        };

        (x, y)
    }
}

fn mercator_y(lat: f64) -> f64 {
    let rad = lat.to_radians();
    (std::f64::consts::FRAC_PI_4 + rad / 2.0).tan().ln()
}

/// Headline numbers stored next to the basemap. `duration` is in milliseconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackStats {
    pub distance: f64,
    pub duration: i64,
    pub start_time: DateTime<Utc>,
    pub name: String,
}

/// Persisted per-track artifact read by the display layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MapMetadata {
    pub bounds: MapBounds,
    pub width: u32,
    pub height: u32,
    pub stats: TrackStats,
    pub segments: Vec<Segment>,
}

/// Lightweight per-track record, available before the basemap metadata loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TrackSummary {
    pub name: String,
    pub filename: String,
    pub distance: f64,
    pub duration: i64,
    pub start_time: DateTime<Utc>,
    /// `None` when the log carries no elevation information at all.
    pub elevation_gain: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiError {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_bounds() -> MapBounds {
        MapBounds {
            min_lat: 30.0,
            max_lat: 31.0,
            min_lon: 120.0,
            max_lon: 121.0,
        }
    }

    #[test]
    fn metadata_uses_camel_case_keys() {
        let meta = MapMetadata {
            bounds: sample_bounds(),
            width: 512,
            height: 256,
            stats: TrackStats {
                distance: 1200.0,
                duration: 60_000,
                start_time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
                name: "Morning".into(),
            },
            segments: vec![Segment {
                color: SpeedBand::Gold,
                points: vec![[30.1, 120.1], [30.2, 120.2]],
            }],
        };

        let value = serde_json::to_value(&meta).unwrap();
        assert_eq!(value["bounds"]["minLat"], 30.0);
        assert_eq!(value["stats"]["startTime"], "2023-11-14T22:13:20Z");
        assert_eq!(value["segments"][0]["color"], "gold");
        assert_eq!(value["segments"][0]["points"][1][0], 30.2);

        let back: MapMetadata = serde_json::from_value(value).unwrap();
        assert_eq!(back, meta);
    }

    #[test]
    fn enclosing_bounds_of_empty_sequence_is_none() {
        assert!(MapBounds::enclosing(Vec::new()).is_none());
    }

    #[test]
    fn enclosing_bounds_cover_all_points() {
        let bounds =
            MapBounds::enclosing(vec![(30.5, 120.2), (30.1, 120.9), (30.7, 120.4)]).unwrap();
        assert_eq!(bounds.min_lat, 30.1);
        assert_eq!(bounds.max_lat, 30.7);
        assert_eq!(bounds.min_lon, 120.2);
        assert_eq!(bounds.max_lon, 120.9);
    }

    #[test]
    fn projection_maps_corners_to_raster_edges() {
        let bounds = sample_bounds();
        let (x, y) = bounds.project(31.0, 120.0, 1024, 768);
        assert!(x.abs() < 1e-9 && y.abs() < 1e-9);
        let (x, y) = bounds.project(30.0, 121.0, 1024, 768);
        assert!((x - 1024.0).abs() < 1e-9);
        assert!((y - 768.0).abs() < 1e-9);
    }

    #[test]
    fn projection_is_mercator_not_linear_in_latitude() {
        let bounds = MapBounds {
            min_lat: 0.0,
            max_lat: 60.0,
            min_lon: 0.0,
            max_lon: 10.0,
        };
        let (_, y) = bounds.project(30.0, 5.0, 100, 1000);
        // Mercator stretches high latitudes, so the midpoint latitude sits below the middle row.
        assert!(y > 500.0);
    }
}
