//! Pre-render a satellite/hillshade basemap and overlay metadata for every
//! track listed in the manifest.
//!
//! Usage:
//!   cargo run --release --bin generate_maps -- --dir public/data/hiking [--force]

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailmap::{
    artifacts::{GenerationOutcome, read_manifest, run_batch},
    config::PipelineSettings,
    fetch::{HttpTransport, TileFetcher},
    tiles::MAX_ZOOM,
};

#[derive(Debug, Parser)]
#[command(author, version, about = "Generate static basemaps for hiking tracks")]
struct Args {
    /// Regenerate even when a basemap already exists
    #[arg(long)]
    force: bool,

    /// Directory holding manifest.json and the *.gpx track logs
    #[arg(long)]
    dir: Option<PathBuf>,

    /// Output directory for <stem>.jpg / <stem>.json (defaults to <dir>/maps)
    #[arg(long)]
    maps_dir: Option<PathBuf>,

    /// Slippy-map zoom level
    #[arg(long, value_parser = clap::value_parser!(u8).range(0..=MAX_ZOOM as i64))]
    zoom: Option<u8>,
}

impl Args {
    fn settings(&self) -> PipelineSettings {
        let mut settings = PipelineSettings::from_env_in(self.dir.clone());
        if let Some(maps_dir) = &self.maps_dir {
            settings.maps_dir = maps_dir.clone();
        }
        if let Some(zoom) = self.zoom {
            settings.basemap.zoom = zoom;
        }
        settings
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailmap=info,generate_maps=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let settings = args.settings();

    tracing::info!("🔧 Basemap generation parameters:");
    tracing::info!("  Tracks: {:?}", settings.hiking_dir);
    tracing::info!("  Output: {:?}", settings.maps_dir);
    tracing::info!("  Zoom: {}", settings.basemap.zoom);
    tracing::info!("  Force: {}", args.force);

    let entries = read_manifest(&settings.hiking_dir)?;
    tracing::info!("📊 {} track(s) in manifest", entries.len());

    let transport = HttpTransport::new(settings.request_timeout)?;
    let fetcher = TileFetcher::new(transport, settings.retry);
    let reports = run_batch(&entries, &settings, &fetcher, args.force).await;

    let mut generated = 0;
    let mut skipped = 0;
    let mut failed = 0;
    for report in &reports {
        match &report.result {
            Ok(GenerationOutcome::Generated { .. }) => generated += 1,
            Ok(GenerationOutcome::Skipped) => skipped += 1,
            Err(_) => failed += 1,
        }
    }

    tracing::info!("🎉 Basemap generation complete!");
    tracing::info!("  Generated: {generated}");
    tracing::info!("  Skipped: {skipped}");
    if failed > 0 {
        tracing::warn!("  Failed: {failed}");
    }
    Ok(())
}
