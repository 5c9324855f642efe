use shared::{Segment, SpeedBand, SpeedPoint};

use crate::motion::{Track, centered_mean};

/// Approximate upper bound on rendered points per track.
pub const TARGET_POINTS: usize = 800;

const POSITION_WINDOW_RADIUS: usize = 1;
const MPS_TO_KMH: f64 = 3.6;

// Band upper limits in km/h.
const RED_BELOW_KMH: f64 = 2.0;
const AMBER_BELOW_KMH: f64 = 4.0;
const GOLD_BELOW_KMH: f64 = 6.0;

pub fn classify(speed_mps: f64) -> SpeedBand {
    let kmh = speed_mps * MPS_TO_KMH;
    if kmh < RED_BELOW_KMH {
        SpeedBand::Red
    } else if kmh < AMBER_BELOW_KMH {
        SpeedBand::Amber
    } else if kmh < GOLD_BELOW_KMH {
        SpeedBand::Gold
    } else {
        SpeedBand::Green
    }
}

/// Smooth, decimate and split a track into colored polylines.
pub fn build_segments(track: &Track) -> Vec<Segment> {
    let smoothed = smooth_positions(&track.points);
    let reduced = downsample(&smoothed, TARGET_POINTS);
    tracing::debug!(
        "{}: {} points reduced to {}",
        track.filename,
        track.points.len(),
        reduced.len()
    );
    segment(&reduced)
}

/// 3-point centered moving average on latitude and longitude. Speed and time
/// are carried over untouched.
pub fn smooth_positions(points: &[SpeedPoint]) -> Vec<SpeedPoint> {
    let lats: Vec<f64> = points.iter().map(|p| p.lat).collect();
    let lons: Vec<f64> = points.iter().map(|p| p.lon).collect();
    let lats = centered_mean(&lats, POSITION_WINDOW_RADIUS);
    let lons = centered_mean(&lons, POSITION_WINDOW_RADIUS);

    points
        .iter()
        .zip(lats.into_iter().zip(lons))
        .map(|(point, (lat, lon))| SpeedPoint { lat, lon, ..*point })
        .collect()
}

/// Fixed-stride decimation. Keeps every `len / target`-th point and always the
/// last one.
pub fn downsample<T: Clone>(points: &[T], target: usize) -> Vec<T> {
    let stride = (points.len() / target.max(1)).max(1);
    let mut kept: Vec<T> = points.iter().step_by(stride).cloned().collect();
    if let Some(last) = points.last() {
        if (points.len() - 1) % stride != 0 {
            kept.push(last.clone());
        }
    }
    kept
}

/// Split points into maximal same-band runs. The point where the band changes
/// ends the closing run and starts the next one, so the drawn path has no gaps.
pub fn segment(points: &[SpeedPoint]) -> Vec<Segment> {
    let mut segments = Vec::new();
    let Some(first) = points.first() else {
        return segments;
    };

    let mut current = Segment {
        color: classify(first.speed),
        points: vec![first.lat_lon()],
    };
    for point in &points[1..] {
        let color = classify(point.speed);
        current.points.push(point.lat_lon());
        if color != current.color {
            let next = Segment {
                color,
                points: vec![point.lat_lon()],
            };
            segments.push(std::mem::replace(&mut current, next));
        }
    }
    segments.push(current);
    segments
}
