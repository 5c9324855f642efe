use shared::{GeoPoint, SpeedPoint};

pub const EARTH_RADIUS_M: f64 = 6_371_000.0;

/// Anything with a latitude and longitude in degrees.
pub trait LatLon {
    fn lat(&self) -> f64;
    fn lon(&self) -> f64;
}

impl LatLon for GeoPoint {
    fn lat(&self) -> f64 {
        self.lat
    }
    fn lon(&self) -> f64 {
        self.lon
    }
}

impl LatLon for SpeedPoint {
    fn lat(&self) -> f64 {
        self.lat
    }
    fn lon(&self) -> f64 {
        self.lon
    }
}

impl LatLon for (f64, f64) {
    fn lat(&self) -> f64 {
        self.0
    }
    fn lon(&self) -> f64 {
        self.1
    }
}

/// Great-circle distance in meters (haversine).
pub fn distance(a: &impl LatLon, b: &impl LatLon) -> f64 {
    let lat1 = a.lat().to_radians();
    let lat2 = b.lat().to_radians();
    let dlat = (b.lat() - a.lat()).to_radians();
    let dlon = (b.lon() - a.lon()).to_radians();

    let sin_dlat = (dlat / 2.0).sin();
    let sin_dlon = (dlon / 2.0).sin();

    let h = sin_dlat * sin_dlat + lat1.cos() * lat2.cos() * sin_dlon * sin_dlon;
    2.0 * EARTH_RADIUS_M * h.sqrt().min(1.0).asin()
}

/// Sum of consecutive hop distances.
pub fn path_length<P: LatLon>(points: &[P]) -> f64 {
    points.windows(2).map(|w| distance(&w[0], &w[1])).sum()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_point_is_zero() {
        let point = (45.0, 5.0);
        assert_eq!(distance(&point, &point), 0.0);
    }

    #[test]
    fn symmetric() {
        let a = (45.0, 5.0);
        let b = (46.0, 6.0);
        assert_eq!(distance(&a, &b), distance(&b, &a));
    }

    #[test]
    fn one_kilometre_north() {
        let d = distance(&(45.0, 5.0), &(45.009, 5.0));
        assert!((d - 1000.0).abs() < 10.0);
    }

    #[test]
    fn paris_to_london() {
        let d = distance(&(48.8566, 2.3522), &(51.5074, -0.1278));
        assert!((d - 343_000.0).abs() < 5_000.0);
    }

    #[test]
    fn path_length_of_short_paths_is_zero() {
        let empty: [(f64, f64); 0] = [];
        assert_eq!(path_length(&empty), 0.0);
        assert_eq!(path_length(&[(45.0, 5.0)]), 0.0);
    }

    #[test]
    fn path_length_sums_hops() {
        let path = [(45.0, 5.0), (45.009, 5.0), (45.018, 5.0)];
        let expected = distance(&path[0], &path[1]) + distance(&path[1], &path[2]);
        assert!((path_length(&path) - expected).abs() < 1e-9);
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        fn valid_coord() -> impl Strategy<Value = (f64, f64)> {
            (-90.0..=90.0, -180.0..=180.0)
        }

        proptest! {
            #[test]
            fn prop_non_negative(a in valid_coord(), b in valid_coord()) {
                prop_assert!(distance(&a, &b) >= 0.0);
            }

            #[test]
            fn prop_symmetric(a in valid_coord(), b in valid_coord()) {
                prop_assert!((distance(&a, &b) - distance(&b, &a)).abs() < 1e-6);
            }

            #[test]
            fn prop_same_point_is_zero(a in valid_coord()) {
                prop_assert_eq!(distance(&a, &a), 0.0);
            }

            #[test]
            fn prop_bounded_by_half_circumference(a in valid_coord(), b in valid_coord()) {
                let max_distance = std::f64::consts::PI * EARTH_RADIUS_M;
                prop_assert!(distance(&a, &b) <= max_distance + 1.0);
            }

            #[test]
            fn prop_monotonic_along_meridian(lat in -80.0..80.0f64, d1 in 0.0..5.0f64, d2 in 0.0..5.0f64) {
                let (near, far) = if d1 <= d2 { (d1, d2) } else { (d2, d1) };
                let origin = (lat, 10.0);
                prop_assert!(distance(&origin, &(lat + near, 10.0)) <= distance(&origin, &(lat + far, 10.0)) + 1e-6);
            }
        }
    }
}
