use thiserror::Error;

use crate::{artifacts::ArtifactError, basemap::BasemapError, track::TrackError};

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error(transparent)]
    Track(#[from] TrackError),
    #[error("basemap error: {0}")]
    Basemap(#[from] BasemapError),
    #[error("artifact store error: {0}")]
    Artifact(#[from] ArtifactError),
    #[error("failed to build tile client: {0}")]
    Client(#[from] reqwest::Error),
}
