//! Slippy-map tile math (Web Mercator, 256 px tiles).

use std::f64::consts::PI;

use shared::MapBounds;

pub const TILE_SIZE: u32 = 256;
pub const DEFAULT_ZOOM: u8 = 15;
/// Deepest zoom tile servers publish.
pub const MAX_ZOOM: u8 = 22;
/// Degrees added on every side of a track before picking tiles.
pub const DEFAULT_PADDING_DEG: f64 = 0.005;

const MAX_MERCATOR_LAT: f64 = 85.051_128_78;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TileCoord {
    pub x: u32,
    pub y: u32,
    pub z: u8,
}

fn tiles_per_axis(zoom: u8) -> f64 {
    2f64.powi(zoom as i32)
}

fn clamp_index(value: f64, zoom: u8) -> u32 {
    let max = tiles_per_axis(zoom) - 1.0;
    value.floor().clamp(0.0, max) as u32
}

pub fn lon_to_tile_x(lon: f64, zoom: u8) -> u32 {
    clamp_index((lon + 180.0) / 360.0 * tiles_per_axis(zoom), zoom)
}

pub fn lat_to_tile_y(lat: f64, zoom: u8) -> u32 {
    let rad = lat.clamp(-MAX_MERCATOR_LAT, MAX_MERCATOR_LAT).to_radians();
    let y = (1.0 - (rad.tan() + 1.0 / rad.cos()).ln() / PI) / 2.0 * tiles_per_axis(zoom);
    clamp_index(y, zoom)
}

/// Longitude of the western edge of tile column `x`.
pub fn tile_x_to_lon(x: u32, zoom: u8) -> f64 {
    x as f64 / tiles_per_axis(zoom) * 360.0 - 180.0
}

/// Latitude of the northern edge of tile row `y`.
pub fn tile_y_to_lat(y: u32, zoom: u8) -> f64 {
    let n = PI - 2.0 * PI * y as f64 / tiles_per_axis(zoom);
    n.sinh().atan().to_degrees()
}

/// Inclusive rectangle of tiles covering a padded bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileGrid {
    pub zoom: u8,
    pub x_start: u32,
    pub x_end: u32,
    pub y_start: u32,
    pub y_end: u32,
}

impl TileGrid {
    /// Zoom levels past [`MAX_ZOOM`] are clamped to it.
    pub fn covering(bounds: &MapBounds, padding: f64, zoom: u8) -> Self {
        let zoom = zoom.min(MAX_ZOOM);
        let padded = bounds.padded(padding);
        Self {
            zoom,
            x_start: lon_to_tile_x(padded.min_lon, zoom),
            x_end: lon_to_tile_x(padded.max_lon, zoom),
            // Tile rows grow southwards.
            y_start: lat_to_tile_y(padded.max_lat, zoom),
            y_end: lat_to_tile_y(padded.min_lat, zoom),
        }
    }

    pub fn columns(&self) -> u32 {
        self.x_end - self.x_start + 1
    }

    pub fn rows(&self) -> u32 {
        self.y_end - self.y_start + 1
    }

    pub fn tile_count(&self) -> usize {
        self.columns() as usize * self.rows() as usize
    }

    pub fn width_px(&self) -> u32 {
        self.columns() * TILE_SIZE
    }

    pub fn height_px(&self) -> u32 {
        self.rows() * TILE_SIZE
    }

    /// Column-major walk: x outer, y inner.
    pub fn tiles(&self) -> impl Iterator<Item = TileCoord> + '_ {
        (self.x_start..=self.x_end).flat_map(move |x| {
            (self.y_start..=self.y_end).map(move |y| TileCoord { x, y, z: self.zoom })
        })
    }

    /// Top-left pixel of `tile` on the stitched canvas.
    pub fn pixel_offset(&self, tile: TileCoord) -> (u32, u32) {
        (
            (tile.x - self.x_start) * TILE_SIZE,
            (tile.y - self.y_start) * TILE_SIZE,
        )
    }

    /// Exact geographic extent of the grid's outer tile edges.
    pub fn bounds(&self) -> MapBounds {
        MapBounds {
            min_lat: tile_y_to_lat(self.y_end + 1, self.zoom),
            max_lat: tile_y_to_lat(self.y_start, self.zoom),
            min_lon: tile_x_to_lon(self.x_start, self.zoom),
            max_lon: tile_x_to_lon(self.x_end + 1, self.zoom),
        }
    }
}

/// A tile endpoint addressed by a `{z}`/`{x}`/`{y}` URL template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TileProvider {
    pub name: String,
    pub url_template: String,
}

impl TileProvider {
    pub fn new(name: impl Into<String>, url_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            url_template: url_template.into(),
        }
    }

    pub fn url(&self, tile: TileCoord) -> String {
        self.url_template
            .replace("{z}", &tile.z.to_string())
            .replace("{x}", &tile.x.to_string())
            .replace("{y}", &tile.y.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn origin_sits_at_grid_centre() {
        assert_eq!(lon_to_tile_x(0.0, 15), 16_384);
        assert_eq!(lat_to_tile_y(0.0, 15), 16_384);
        assert_eq!(lon_to_tile_x(-180.0, 15), 0);
        assert_eq!(lon_to_tile_x(180.0, 15), 32_767);
    }

    #[test]
    fn known_tile_for_hangzhou() {
        // West Lake, Hangzhou.
        assert_eq!(lon_to_tile_x(120.15, 15), 27_320);
        assert_eq!(lat_to_tile_y(30.25, 15), 13_492);
    }

    #[test]
    fn inverse_math_brackets_the_point() {
        let (lat, lon) = (30.2459, 120.1529);
        let x = lon_to_tile_x(lon, 15);
        let y = lat_to_tile_y(lat, 15);
        assert!(tile_x_to_lon(x, 15) <= lon && lon < tile_x_to_lon(x + 1, 15));
        assert!(tile_y_to_lat(y, 15) >= lat && lat > tile_y_to_lat(y + 1, 15));
    }

    #[test]
    fn polar_latitudes_are_clamped() {
        assert_eq!(lat_to_tile_y(90.0, 15), 0);
        assert_eq!(lat_to_tile_y(-90.0, 15), 32_767);
    }

    #[test]
    fn grid_dimensions_and_walk_order() {
        let grid = TileGrid {
            zoom: 15,
            x_start: 10,
            x_end: 12,
            y_start: 20,
            y_end: 21,
        };
        assert_eq!(grid.columns(), 3);
        assert_eq!(grid.rows(), 2);
        assert_eq!(grid.tile_count(), 6);
        assert_eq!((grid.width_px(), grid.height_px()), (768, 512));

        let order: Vec<(u32, u32)> = grid.tiles().map(|t| (t.x, t.y)).collect();
        assert_eq!(
            order,
            vec![(10, 20), (10, 21), (11, 20), (11, 21), (12, 20), (12, 21)]
        );
        assert_eq!(
            grid.pixel_offset(TileCoord { x: 12, y: 21, z: 15 }),
            (512, 256)
        );
    }

    #[test]
    fn grid_bounds_contain_padded_track() {
        let track = MapBounds {
            min_lat: 30.20,
            max_lat: 30.26,
            min_lon: 120.10,
            max_lon: 120.18,
        };
        let grid = TileGrid::covering(&track, DEFAULT_PADDING_DEG, DEFAULT_ZOOM);
        let bounds = grid.bounds();
        let padded = track.padded(DEFAULT_PADDING_DEG);

        assert!(bounds.min_lat <= padded.min_lat && bounds.max_lat >= padded.max_lat);
        assert!(bounds.min_lon <= padded.min_lon && bounds.max_lon >= padded.max_lon);
        assert_eq!(bounds.min_lon, tile_x_to_lon(grid.x_start, 15));
        assert_eq!(bounds.max_lat, tile_y_to_lat(grid.y_start, 15));
    }

    #[test]
    fn zoom_beyond_tile_servers_is_clamped() {
        let track = MapBounds {
            min_lat: 30.24,
            max_lat: 30.25,
            min_lon: 120.14,
            max_lon: 120.15,
        };
        let grid = TileGrid::covering(&track, 0.0, u8::MAX);
        assert_eq!(grid, TileGrid::covering(&track, 0.0, MAX_ZOOM));
        assert_eq!(grid.zoom, MAX_ZOOM);

        let bounds = grid.bounds();
        assert!(bounds.min_lat <= track.min_lat && bounds.max_lon >= track.max_lon);
    }

    #[test]
    fn provider_fills_every_placeholder() {
        let satellite = TileProvider::new("satellite", "http://t/appmaptile?x={x}&y={y}&z={z}");
        let hillshade = TileProvider::new("hillshade", "https://h/tile/{z}/{y}/{x}");
        let tile = TileCoord { x: 27320, y: 13492, z: 15 };
        assert_eq!(satellite.url(tile), "http://t/appmaptile?x=27320&y=13492&z=15");
        assert_eq!(hillshade.url(tile), "https://h/tile/15/13492/27320");
    }

    mod proptests {
        use super::*;
        use proptest::prelude::*;

        proptest! {
            #[test]
            fn prop_grid_covers_bounds(
                lat in -60.0..60.0f64,
                lon in -170.0..170.0f64,
                dlat in 0.0..0.2f64,
                dlon in 0.0..0.2f64,
            ) {
                let track = MapBounds { min_lat: lat, max_lat: lat + dlat, min_lon: lon, max_lon: lon + dlon };
                let grid = TileGrid::covering(&track, DEFAULT_PADDING_DEG, DEFAULT_ZOOM);
                let bounds = grid.bounds();
                prop_assert!(bounds.min_lat <= track.min_lat && bounds.max_lat >= track.max_lat);
                prop_assert!(bounds.min_lon <= track.min_lon && bounds.max_lon >= track.max_lon);
                prop_assert_eq!(grid.tiles().count(), grid.tile_count());
            }
        }
    }
}
