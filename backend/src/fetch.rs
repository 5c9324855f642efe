use std::time::Duration;

use thiserror::Error;

use crate::tiles::{TileCoord, TileProvider};

/// Some tile servers refuse requests that do not look like a browser.
pub const BROWSER_USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum TileFetchError {
    #[error("request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("server answered with status {0}")]
    Status(u16),
    #[error("empty response body")]
    EmptyBody,
}

/// A single download attempt. Retrying is the caller's business.
#[allow(async_fn_in_trait)]
pub trait TileTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, TileFetchError>;
}

pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self, reqwest::Error> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent(BROWSER_USER_AGENT)
            .build()?;
        Ok(Self { client })
    }
}

impl TileTransport for HttpTransport {
    async fn get(&self, url: &str) -> Result<Vec<u8>, TileFetchError> {
        let response = self.client.get(url).send().await?;
        let status = response.status();
        if !status.is_success() {
            return Err(TileFetchError::Status(status.as_u16()));
        }
        let body = response.bytes().await?;
        if body.is_empty() {
            return Err(TileFetchError::EmptyBody);
        }
        Ok(body.to_vec())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 3,
            backoff: Duration::from_secs(1),
        }
    }
}

/// Bounded-retry tile downloads over any [`TileTransport`].
pub struct TileFetcher<T> {
    transport: T,
    policy: RetryPolicy,
}

impl<T: TileTransport> TileFetcher<T> {
    pub fn new(transport: T, policy: RetryPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// `None` once every attempt has failed; the failure is logged here.
    pub async fn fetch(&self, provider: &TileProvider, tile: TileCoord) -> Option<Vec<u8>> {
        let url = provider.url(tile);
        let attempts = self.policy.attempts.max(1);

        for attempt in 1..=attempts {
            match self.transport.get(&url).await {
                Ok(bytes) => return Some(bytes),
                Err(err) if attempt == attempts => {
                    tracing::warn!(
                        "{} tile {}/{}/{} failed after {attempts} attempts: {err}",
                        provider.name,
                        tile.z,
                        tile.x,
                        tile.y
                    );
                }
                Err(err) => {
                    tracing::info!(
                        "retrying {} tile {}/{}/{} ({attempt}/{attempts}): {err}",
                        provider.name,
                        tile.z,
                        tile.x,
                        tile.y
                    );
                    tokio::time::sleep(self.policy.backoff).await;
                }
            }
        }
        None
    }
}
