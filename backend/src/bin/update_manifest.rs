//! Rescan the hiking directory and rewrite `manifest.json`.
//!
//! Usage:
//!   cargo run --bin update_manifest -- --dir public/data/hiking

use std::path::PathBuf;

use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};
use trailmap::{artifacts::rebuild_manifest, config::PipelineSettings};

#[derive(Debug, Parser)]
#[command(author, version, about = "Rebuild the hiking track manifest")]
struct Args {
    /// Directory holding the *.gpx track logs (defaults to $HIKING_DIR or public/data/hiking)
    #[arg(long)]
    dir: Option<PathBuf>,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "trailmap=info,update_manifest=info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();
    let dir = args
        .dir
        .unwrap_or_else(|| PipelineSettings::from_env().hiking_dir);

    let files = rebuild_manifest(&dir)?;
    for file in &files {
        tracing::info!("  {file}");
    }
    tracing::info!("📋 {} track(s) listed in {:?}", files.len(), dir);
    Ok(())
}
