use std::{path::PathBuf, time::Duration};

use crate::{
    fetch::{DEFAULT_TIMEOUT, RetryPolicy},
    tiles::{DEFAULT_PADDING_DEG, DEFAULT_ZOOM, TileProvider},
};

pub const DEFAULT_HIKING_DIR: &str = "public/data/hiking";
pub const MANIFEST_FILE: &str = "manifest.json";
pub const MAPS_SUBDIR: &str = "maps";

pub const SATELLITE_URL: &str =
    "http://wprd01.is.autonavi.com/appmaptile?lang=zh_cn&size=1&style=6&x={x}&y={y}&z={z}";
pub const HILLSHADE_URL: &str = "https://services.arcgisonline.com/arcgis/rest/services/Elevation/World_Hillshade/MapServer/tile/{z}/{y}/{x}";

/// How a basemap is assembled from tiles.
#[derive(Debug, Clone)]
pub struct BasemapSettings {
    pub zoom: u8,
    pub padding_deg: f64,
    pub satellite: TileProvider,
    pub hillshade: TileProvider,
    /// Below this share of satellite tiles the basemap is not written.
    pub min_coverage: f64,
    pub hillshade_opacity: f32,
    pub jpeg_quality: u8,
}

impl Default for BasemapSettings {
    fn default() -> Self {
        Self {
            zoom: DEFAULT_ZOOM,
            padding_deg: DEFAULT_PADDING_DEG,
            satellite: TileProvider::new("satellite", SATELLITE_URL),
            hillshade: TileProvider::new("hillshade", HILLSHADE_URL),
            min_coverage: 0.1,
            hillshade_opacity: 0.4,
            jpeg_quality: 85,
        }
    }
}

#[derive(Debug, Clone)]
pub struct PipelineSettings {
    pub hiking_dir: PathBuf,
    pub maps_dir: PathBuf,
    pub basemap: BasemapSettings,
    pub retry: RetryPolicy,
    pub request_timeout: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self::for_dir(DEFAULT_HIKING_DIR)
    }
}

impl PipelineSettings {
    /// Defaults rooted at `hiking_dir`, with rasters under `<hiking_dir>/maps`.
    pub fn for_dir(hiking_dir: impl Into<PathBuf>) -> Self {
        let hiking_dir = hiking_dir.into();
        Self {
            maps_dir: hiking_dir.join(MAPS_SUBDIR),
            hiking_dir,
            basemap: BasemapSettings::default(),
            retry: RetryPolicy::default(),
            request_timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Defaults overridden by `HIKING_DIR`, `MAPS_DIR`, `SATELLITE_TILE_URL`
    /// and `HILLSHADE_TILE_URL`.
    pub fn from_env() -> Self {
        Self::from_env_in(None)
    }

    /// Like [`PipelineSettings::from_env`], with an explicit `hiking_dir`
    /// taking the place of `HIKING_DIR`. The other overrides still apply.
    pub fn from_env_in(hiking_dir: Option<PathBuf>) -> Self {
        Self::from_lookup_in(hiking_dir, |key| std::env::var(key).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        Self::from_lookup_in(None, lookup)
    }

    pub fn from_lookup_in(
        hiking_dir: Option<PathBuf>,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Self {
        let hiking_dir = hiking_dir.or_else(|| lookup("HIKING_DIR").map(PathBuf::from));
        let mut settings = match hiking_dir {
            Some(dir) => Self::for_dir(dir),
            None => Self::default(),
        };
        if let Some(maps_dir) = lookup("MAPS_DIR") {
            settings.maps_dir = PathBuf::from(maps_dir);
        }
        if let Some(url) = lookup("SATELLITE_TILE_URL") {
            settings.basemap.satellite.url_template = url;
        }
        if let Some(url) = lookup("HILLSHADE_TILE_URL") {
            settings.basemap.hillshade.url_template = url;
        }
        settings
    }

    pub fn manifest_path(&self) -> PathBuf {
        self.hiking_dir.join(MANIFEST_FILE)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn defaults_follow_site_layout() {
        let settings = PipelineSettings::default();
        assert_eq!(settings.hiking_dir, PathBuf::from("public/data/hiking"));
        assert_eq!(settings.maps_dir, PathBuf::from("public/data/hiking/maps"));
        assert_eq!(
            settings.manifest_path(),
            PathBuf::from("public/data/hiking/manifest.json")
        );
        assert_eq!(settings.basemap.zoom, 15);
        assert_eq!(settings.basemap.min_coverage, 0.1);
        assert_eq!(settings.request_timeout, Duration::from_secs(10));
    }

    #[test]
    fn environment_overrides_defaults() {
        let env: HashMap<&str, &str> = [
            ("HIKING_DIR", "/srv/hikes"),
            ("HILLSHADE_TILE_URL", "http://local/{z}/{x}/{y}.png"),
        ]
        .into_iter()
        .collect();
        let settings = PipelineSettings::from_lookup(|key| env.get(key).map(|v| v.to_string()));

        assert_eq!(settings.hiking_dir, PathBuf::from("/srv/hikes"));
        assert_eq!(settings.maps_dir, PathBuf::from("/srv/hikes/maps"));
        assert_eq!(
            settings.basemap.hillshade.url_template,
            "http://local/{z}/{x}/{y}.png"
        );
        assert_eq!(settings.basemap.satellite.url_template, SATELLITE_URL);
    }

    #[test]
    fn explicit_maps_dir_wins() {
        let settings = PipelineSettings::from_lookup(|key| {
            (key == "MAPS_DIR").then(|| "/var/maps".to_string())
        });
        assert_eq!(settings.hiking_dir, PathBuf::from(DEFAULT_HIKING_DIR));
        assert_eq!(settings.maps_dir, PathBuf::from("/var/maps"));
    }

    #[test]
    fn explicit_hiking_dir_keeps_other_overrides() {
        let env: HashMap<&str, &str> = [
            ("HIKING_DIR", "/srv/hikes"),
            ("MAPS_DIR", "/var/maps"),
            ("SATELLITE_TILE_URL", "http://sat/{z}/{x}/{y}"),
        ]
        .into_iter()
        .collect();
        let settings = PipelineSettings::from_lookup_in(Some(PathBuf::from("/data/hiking")), |key| {
            env.get(key).map(|v| v.to_string())
        });

        assert_eq!(settings.hiking_dir, PathBuf::from("/data/hiking"));
        assert_eq!(settings.maps_dir, PathBuf::from("/var/maps"));
        assert_eq!(settings.basemap.satellite.url_template, "http://sat/{z}/{x}/{y}");

        let settings = PipelineSettings::from_lookup_in(Some(PathBuf::from("/data/hiking")), |_| None);
        assert_eq!(settings.maps_dir, PathBuf::from("/data/hiking/maps"));
    }
}
