//! Metadata provider: season/episode numbering for a show's titles.
//!
//! The bundled [`HttpMetadataProvider`] expects `GET <metadata_url>` to return
//! the show's *full* episode listing as
//! `{"episodes": [{"title", "label"}]}` with `SxxEyy` labels. Providers are
//! known to rate-limit, so requests go through a token-bucket limiter and a
//! 429 back-off, the same shape the TMDB ecosystem clients use.

use std::num::NonZeroU32;
use std::time::Duration;

use async_trait::async_trait;
use governor::{Quota, RateLimiter};
use reqwest::StatusCode;
use serde::Deserialize;
use tracing::warn;

use crate::error::MatchError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);
const MAX_RETRIES: u32 = 3;

/// One `(title, label)` pair from a show's full listing.
#[derive(Debug, Clone)]
pub struct EpisodeListing {
    pub title: String,
    /// `SxxEyy` season/episode label.
    pub label: String,
}

#[async_trait]
pub trait MetadataProvider: Send + Sync {
    /// Fetch the complete episode listing for one show.
    async fn fetch_listing(&self, metadata_url: &str)
        -> Result<Vec<EpisodeListing>, MatchError>;
}

#[derive(Debug, Deserialize)]
struct ListingResponse {
    episodes: Vec<ListingEpisode>,
}

#[derive(Debug, Deserialize)]
struct ListingEpisode {
    title: String,
    label: String,
}

/// HTTP metadata provider with rate limiting and 429 retry.
pub struct HttpMetadataProvider {
    client: reqwest::Client,
    rate_limiter: RateLimiter<
        governor::state::NotKeyed,
        governor::state::InMemoryState,
        governor::clock::DefaultClock,
    >,
}

impl HttpMetadataProvider {
    /// Rate limiting is configured at 2 requests per second; a full listing
    /// is one request, and the matcher's cache makes repeats rare.
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        let quota = Quota::per_second(NonZeroU32::new(2).unwrap());

        Self {
            client,
            rate_limiter: RateLimiter::direct(quota),
        }
    }

    async fn get(&self, url: &str) -> Result<reqwest::Response, MatchError> {
        let mut retries = 0u32;
        loop {
            self.rate_limiter.until_ready().await;

            let resp = self.client.get(url).send().await?;

            if resp.status() == StatusCode::TOO_MANY_REQUESTS && retries < MAX_RETRIES {
                retries += 1;
                let wait = resp
                    .headers()
                    .get("retry-after")
                    .and_then(|v| v.to_str().ok())
                    .and_then(|v| v.parse::<u64>().ok())
                    .unwrap_or(1);
                warn!(
                    retry = retries,
                    wait_secs = wait,
                    "Metadata provider returned 429, backing off"
                );
                tokio::time::sleep(Duration::from_secs(wait)).await;
                continue;
            }

            return Ok(resp.error_for_status()?);
        }
    }
}

impl Default for HttpMetadataProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl MetadataProvider for HttpMetadataProvider {
    async fn fetch_listing(
        &self,
        metadata_url: &str,
    ) -> Result<Vec<EpisodeListing>, MatchError> {
        let response = self.get(metadata_url).await?;
        let listing: ListingResponse = response.json().await?;

        Ok(listing
            .episodes
            .into_iter()
            .map(|ep| EpisodeListing {
                title: ep.title,
                label: ep.label,
            })
            .collect())
    }
}
