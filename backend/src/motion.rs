use chrono::{DateTime, Utc};
use shared::{GeoPoint, SpeedPoint, TrackStats, TrackSummary};

use crate::{geodesy, track::ParsedTrack};

/// Lower bound on a time step, in seconds.
const MIN_TIME_STEP_S: f64 = 1e-3;
/// Points on each side of the centered speed window.
const SPEED_WINDOW_RADIUS: usize = 2;

/// A parsed track with per-point speeds and aggregate motion stats.
#[derive(Debug, Clone)]
pub struct Track {
    pub name: String,
    pub filename: String,
    pub points: Vec<SpeedPoint>,
    pub distance: f64,
    pub duration_ms: i64,
    pub start_time: DateTime<Utc>,
    pub elevation_gain: Option<f64>,
}

impl Track {
    pub fn stats(&self) -> TrackStats {
        TrackStats {
            distance: self.distance,
            duration: self.duration_ms,
            start_time: self.start_time,
            name: self.name.clone(),
        }
    }

    pub fn summary(&self) -> TrackSummary {
        TrackSummary {
            name: self.name.clone(),
            filename: self.filename.clone(),
            distance: self.distance,
            duration: self.duration_ms,
            start_time: self.start_time,
            elevation_gain: self.elevation_gain,
        }
    }
}

/// Attach smoothed speeds and compute duration/start time.
pub fn derive_track(parsed: ParsedTrack) -> Track {
    let raw = raw_speeds(&parsed.points);
    let smoothed = smooth_speeds(&raw);

    let backwards = parsed
        .points
        .windows(2)
        .filter(|w| w[1].time < w[0].time)
        .count();
    if backwards > 0 {
        tracing::warn!(
            "{}: {backwards} time step(s) go backwards, their speeds are clamped to 0",
            parsed.filename
        );
    }

    let start_time = parsed
        .points
        .first()
        .map(|p| p.time)
        .unwrap_or_else(Utc::now);
    let duration_ms = duration_ms(&parsed.points);

    let points = parsed
        .points
        .iter()
        .zip(smoothed)
        .map(|(point, speed)| SpeedPoint::from_geo(*point, speed))
        .collect();

    Track {
        name: parsed.name,
        filename: parsed.filename,
        points,
        distance: parsed.distance,
        duration_ms,
        start_time,
        elevation_gain: parsed.elevation_gain,
    }
}

/// Instantaneous speed in m/s from each point's predecessor. Index 0 is always 0,
/// as is any step whose time delta is not positive.
pub fn raw_speeds(points: &[GeoPoint]) -> Vec<f64> {
    let mut speeds = Vec::with_capacity(points.len());
    if points.is_empty() {
        return speeds;
    }
    speeds.push(0.0);
    for pair in points.windows(2) {
        let dt = seconds_between(pair[0].time, pair[1].time);
        let speed = if dt > 0.0 {
            geodesy::distance(&pair[0], &pair[1]) / dt.max(MIN_TIME_STEP_S)
        } else {
            0.0
        };
        speeds.push(speed);
    }
    speeds
}

pub fn smooth_speeds(speeds: &[f64]) -> Vec<f64> {
    centered_mean(speeds, SPEED_WINDOW_RADIUS)
}

/// Unweighted mean over `[i - radius, i + radius]`, clipped at both ends.
pub(crate) fn centered_mean(values: &[f64], radius: usize) -> Vec<f64> {
    (0..values.len())
        .map(|i| {
            let lo = i.saturating_sub(radius);
            let hi = (i + radius + 1).min(values.len());
            let window = &values[lo..hi];
            window.iter().sum::<f64>() / window.len() as f64
        })
        .collect()
}

fn duration_ms(points: &[GeoPoint]) -> i64 {
    match (points.first(), points.last()) {
        (Some(first), Some(last)) if points.len() >= 2 => {
            (last.time - first.time).num_milliseconds().max(0)
        }
        _ => 0,
    }
}

fn seconds_between(a: DateTime<Utc>, b: DateTime<Utc>) -> f64 {
    (b - a).num_milliseconds() as f64 / 1000.0
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    /// Latitude step of exactly `meters` along a meridian.
    fn lat_step(meters: f64) -> f64 {
        (meters / geodesy::EARTH_RADIUS_M).to_degrees()
    }

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_709_280_000, 0).unwrap()
    }

    fn points_at(offsets_s: &[i64], hop_m: f64) -> Vec<GeoPoint> {
        offsets_s
            .iter()
            .enumerate()
            .map(|(i, &s)| GeoPoint {
                lat: 30.0 + lat_step(hop_m) * i as f64,
                lon: 120.0,
                time: t0() + Duration::seconds(s),
            })
            .collect()
    }

    fn parsed(points: Vec<GeoPoint>) -> ParsedTrack {
        ParsedTrack {
            name: "test".into(),
            filename: "test.gpx".into(),
            distance: geodesy::path_length(&points),
            points,
            elevation_gain: None,
        }
    }

    #[test]
    fn two_ten_metre_hops_in_ten_seconds_each() {
        let speeds = raw_speeds(&points_at(&[0, 10, 20], 10.0));
        assert_eq!(speeds.len(), 3);
        assert_eq!(speeds[0], 0.0);
        assert!((speeds[1] - 1.0).abs() < 1e-6);
        assert!((speeds[2] - 1.0).abs() < 1e-6);
    }

    #[test]
    fn non_positive_time_steps_give_zero_speed() {
        let speeds = raw_speeds(&points_at(&[0, 0, 10, 5], 10.0));
        assert_eq!(speeds[1], 0.0);
        assert!((speeds[2] - 1.0).abs() < 1e-6);
        assert_eq!(speeds[3], 0.0);
    }

    #[test]
    fn empty_and_single_point_tracks() {
        assert!(raw_speeds(&[]).is_empty());
        assert_eq!(raw_speeds(&points_at(&[0], 10.0)), vec![0.0]);
    }

    #[test]
    fn smoothing_window_shrinks_at_edges() {
        let smoothed = smooth_speeds(&[0.0, 3.0, 6.0, 9.0, 12.0, 15.0]);
        assert!((smoothed[0] - 3.0).abs() < 1e-9); // mean of 0,3,6
        assert!((smoothed[1] - 4.5).abs() < 1e-9); // mean of 0,3,6,9
        assert!((smoothed[2] - 6.0).abs() < 1e-9); // mean of 0..=12
        assert!((smoothed[5] - 12.0).abs() < 1e-9); // mean of 9,12,15
    }

    #[test]
    fn smoothing_damps_single_spike() {
        let smoothed = smooth_speeds(&[1.0, 1.0, 1.0, 26.0, 1.0, 1.0, 1.0]);
        assert!((smoothed[3] - 6.0).abs() < 1e-9);
        assert!((smoothed[0] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn derived_track_stats() {
        let track = derive_track(parsed(points_at(&[0, 10, 20, 30], 10.0)));
        assert_eq!(track.points.len(), 4);
        assert_eq!(track.duration_ms, 30_000);
        assert_eq!(track.start_time, t0());
        assert!((track.distance - 30.0).abs() < 1e-6);
        assert_eq!(track.summary().filename, "test.gpx");
        assert_eq!(track.stats().duration, 30_000);
    }

    #[test]
    fn single_point_track_has_zero_duration() {
        let track = derive_track(parsed(points_at(&[0], 10.0)));
        assert_eq!(track.duration_ms, 0);
        assert_eq!(track.points[0].speed, 0.0);
    }

    #[test]
    fn reversed_clock_never_yields_negative_duration() {
        let track = derive_track(parsed(points_at(&[20, 10, 0], 10.0)));
        assert_eq!(track.duration_ms, 0);
        assert!(track.points.iter().all(|p| p.speed == 0.0));
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_speeds_finite_and_non_negative(
                steps in proptest::collection::vec((1i64..600, -0.001..0.001f64, -0.001..0.001f64), 1..60)
            ) {
                let mut time = t0();
                let mut lat = 30.0;
                let mut lon = 120.0;
                let mut points = vec![GeoPoint { lat, lon, time }];
                for (dt, dlat, dlon) in steps {
                    time += Duration::seconds(dt);
                    lat += dlat;
                    lon += dlon;
                    points.push(GeoPoint { lat, lon, time });
                }
                let track = derive_track(parsed(points));
                for point in &track.points {
                    prop_assert!(point.speed.is_finite());
                    prop_assert!(point.speed >= 0.0);
                }
            }

            #[test]
            fn prop_first_raw_speed_is_zero(offsets in proptest::collection::vec(-100i64..100, 1..20)) {
                let speeds = raw_speeds(&points_at(&offsets, 5.0));
                prop_assert_eq!(speeds[0], 0.0);
                prop_assert!(speeds.iter().all(|s| s.is_finite() && *s >= 0.0));
            }
        }
    }
}
