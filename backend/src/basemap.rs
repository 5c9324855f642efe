use image::{
    Rgb, RgbImage,
    codecs::jpeg::JpegEncoder,
    imageops::{self, FilterType},
};
use shared::{MapBounds, MapMetadata, Segment};
use thiserror::Error;

use crate::{
    config::BasemapSettings,
    fetch::{TileFetcher, TileTransport},
    motion::Track,
    tiles::{TILE_SIZE, TileGrid},
};

/// Canvas edge length above which a basemap gets unwieldy in the browser.
const LARGE_CANVAS_PX: u32 = 4000;
/// Hard limits on a single basemap; a track past them is refused before any
/// tile is requested or the canvas is allocated.
pub const MAX_CANVAS_PX: u32 = 16_384;
pub const MAX_GRID_TILES: usize = 2_048;
const BACKGROUND: Rgb<u8> = Rgb([0, 0, 0]);

#[derive(Debug, Error)]
pub enum BasemapError {
    #[error("track has no points to frame")]
    EmptyTrack,
    #[error("only {succeeded}/{total} tiles downloaded, basemap not written")]
    InsufficientCoverage { succeeded: usize, total: usize },
    #[error("tile grid {columns}x{rows} is too large to render")]
    GridTooLarge { columns: u32, rows: u32 },
    #[error("image error: {0}")]
    Image(#[from] image::ImageError),
}

/// Stitched tiles before blending results are checked against the coverage floor.
#[derive(Debug)]
pub struct StitchedGrid {
    pub image: RgbImage,
    pub succeeded: usize,
    pub total: usize,
}

/// A finished basemap raster and the metadata that aligns overlays with it.
#[derive(Debug)]
pub struct Basemap {
    pub image: RgbImage,
    pub metadata: MapMetadata,
    pub tiles_ok: usize,
    pub tiles_total: usize,
}

impl Basemap {
    pub fn encode_jpeg(&self, quality: u8) -> Result<Vec<u8>, BasemapError> {
        let mut bytes = Vec::new();
        JpegEncoder::new_with_quality(&mut bytes, quality).encode_image(&self.image)?;
        Ok(bytes)
    }
}

/// Build the basemap framing `track`, carrying `segments` into its metadata.
pub async fn compose_basemap<T: TileTransport>(
    track: &Track,
    segments: Vec<Segment>,
    fetcher: &TileFetcher<T>,
    settings: &BasemapSettings,
) -> Result<Basemap, BasemapError> {
    let track_bounds = MapBounds::enclosing(track.points.iter().map(|p| (p.lat, p.lon)))
        .ok_or(BasemapError::EmptyTrack)?;
    let grid = TileGrid::covering(&track_bounds, settings.padding_deg, settings.zoom);

    tracing::info!(
        "{}: grid {}x{} tiles, canvas {}x{} px",
        track.filename,
        grid.columns(),
        grid.rows(),
        grid.width_px(),
        grid.height_px()
    );
    if grid.width_px() > LARGE_CANVAS_PX || grid.height_px() > LARGE_CANVAS_PX {
        tracing::warn!(
            "{}: basemap is very large ({}x{} px), consider a lower zoom",
            track.filename,
            grid.width_px(),
            grid.height_px()
        );
    }
    check_grid_size(&grid)?;

    let stitched = stitch_grid(&grid, fetcher, settings).await;
    check_coverage(stitched.succeeded, stitched.total, settings.min_coverage)?;

    let metadata = MapMetadata {
        bounds: grid.bounds(),
        width: grid.width_px(),
        height: grid.height_px(),
        stats: track.stats(),
        segments,
    };

    Ok(Basemap {
        image: stitched.image,
        metadata,
        tiles_ok: stitched.succeeded,
        tiles_total: stitched.total,
    })
}

/// Download every tile of `grid` in order and paint it onto one canvas. Tiles
/// whose satellite image cannot be fetched or decoded stay background-colored;
/// hillshade is best-effort.
pub async fn stitch_grid<T: TileTransport>(
    grid: &TileGrid,
    fetcher: &TileFetcher<T>,
    settings: &BasemapSettings,
) -> StitchedGrid {
    let mut canvas = RgbImage::from_pixel(grid.width_px(), grid.height_px(), BACKGROUND);
    let total = grid.tile_count();
    let mut succeeded = 0;

    for tile in grid.tiles() {
        let Some(bytes) = fetcher.fetch(&settings.satellite, tile).await else {
            continue;
        };
        let satellite = match decode_tile(&bytes) {
            Ok(image) => image,
            Err(err) => {
                tracing::warn!(
                    "undecodable satellite tile {}/{}/{}: {err}",
                    tile.z,
                    tile.x,
                    tile.y
                );
                continue;
            }
        };

        let hillshade = match fetcher.fetch(&settings.hillshade, tile).await {
            Some(bytes) => decode_tile(&bytes)
                .map_err(|err| {
                    tracing::warn!(
                        "undecodable hillshade tile {}/{}/{}: {err}",
                        tile.z,
                        tile.x,
                        tile.y
                    )
                })
                .ok(),
            None => None,
        };

        let painted = match hillshade {
            Some(relief) => multiply_blend(&satellite, &relief, settings.hillshade_opacity),
            None => satellite,
        };

        let (left, top) = grid.pixel_offset(tile);
        imageops::replace(&mut canvas, &painted, i64::from(left), i64::from(top));
        succeeded += 1;
    }

    tracing::info!("{succeeded}/{total} tiles stitched");
    StitchedGrid {
        image: canvas,
        succeeded,
        total,
    }
}

pub fn check_grid_size(grid: &TileGrid) -> Result<(), BasemapError> {
    if grid.tile_count() > MAX_GRID_TILES
        || grid.width_px() > MAX_CANVAS_PX
        || grid.height_px() > MAX_CANVAS_PX
    {
        return Err(BasemapError::GridTooLarge {
            columns: grid.columns(),
            rows: grid.rows(),
        });
    }
    Ok(())
}

pub fn check_coverage(succeeded: usize, total: usize, min_coverage: f64) -> Result<(), BasemapError> {
    if (succeeded as f64) < total as f64 * min_coverage {
        return Err(BasemapError::InsufficientCoverage { succeeded, total });
    }
    Ok(())
}

fn decode_tile(bytes: &[u8]) -> Result<RgbImage, image::ImageError> {
    let tile = image::load_from_memory(bytes)?.to_rgb8();
    if tile.dimensions() == (TILE_SIZE, TILE_SIZE) {
        Ok(tile)
    } else {
        Ok(imageops::resize(&tile, TILE_SIZE, TILE_SIZE, FilterType::Triangle))
    }
}

/// Multiply `relief` over `base`, mixed in at `opacity`.
pub fn multiply_blend(base: &RgbImage, relief: &RgbImage, opacity: f32) -> RgbImage {
    let opacity = opacity.clamp(0.0, 1.0);
    let mut out = base.clone();
    for (x, y, pixel) in out.enumerate_pixels_mut() {
        let Some(shade) = relief.get_pixel_checked(x, y) else {
            continue;
        };
        for channel in 0..3 {
            let b = pixel[channel] as f32;
            let multiplied = b * shade[channel] as f32 / 255.0;
            pixel[channel] = (b + (multiplied - b) * opacity).round().clamp(0.0, 255.0) as u8;
        }
    }
    out
}
