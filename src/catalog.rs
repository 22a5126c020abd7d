//! Catalog source: enumerates a show's currently available items.
//!
//! How a catalog enumerates items (site API, feed, scraper) is deliberately
//! out of scope; [`CatalogSource`] is the narrow seam. The bundled
//! [`HttpCatalogSource`] speaks a small JSON contract: `GET <catalog_url>`
//! returns `{"episodes": [{"id", "title", "url", "air_date"?}]}`. The `id`
//! must be stable across calls, since it anchors dedup and history.

use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use serde::Deserialize;

use crate::error::DiscoveryError;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// One item as discovered from the catalog, before enrichment.
#[derive(Debug, Clone)]
pub struct CatalogItem {
    pub source_id: String,
    pub title: String,
    pub source_url: String,
    pub air_date: Option<NaiveDate>,
}

#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Fetch the ordered item listing for one show.
    async fn fetch_items(&self, catalog_url: &str) -> Result<Vec<CatalogItem>, DiscoveryError>;
}

#[derive(Debug, Deserialize)]
struct CatalogResponse {
    episodes: Vec<CatalogEpisode>,
}

#[derive(Debug, Deserialize)]
struct CatalogEpisode {
    id: String,
    title: String,
    url: String,
    #[serde(default)]
    air_date: Option<NaiveDate>,
}

/// HTTP catalog client.
pub struct HttpCatalogSource {
    client: reqwest::Client,
}

impl HttpCatalogSource {
    pub fn new() -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .unwrap_or_else(|e| {
                tracing::warn!("Failed to build HTTP client with timeout: {}", e);
                reqwest::Client::new()
            });

        Self { client }
    }
}

impl Default for HttpCatalogSource {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CatalogSource for HttpCatalogSource {
    async fn fetch_items(&self, catalog_url: &str) -> Result<Vec<CatalogItem>, DiscoveryError> {
        let response = self.client.get(catalog_url).send().await?;

        if !response.status().is_success() {
            return Err(DiscoveryError::InvalidListing(format!(
                "{} returned status {}",
                catalog_url,
                response.status()
            )));
        }

        let listing: CatalogResponse = response
            .json()
            .await
            .map_err(|e| DiscoveryError::InvalidListing(e.to_string()))?;

        let items = listing
            .episodes
            .into_iter()
            .filter(|ep| {
                if ep.id.is_empty() {
                    tracing::warn!("Skipping catalog item with empty id: {}", ep.title);
                    false
                } else {
                    true
                }
            })
            .map(|ep| CatalogItem {
                source_id: ep.id,
                title: ep.title,
                source_url: ep.url,
                air_date: ep.air_date,
            })
            .collect();

        Ok(items)
    }
}
