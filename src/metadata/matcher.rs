//! Cache-first season/episode matching.
//!
//! A lookup normalizes the item title and consults the cache. On a miss the
//! matcher pulls the provider's *full* listing for the show, caches every
//! pair in one write, and re-attempts the match against the now-warm cache.
//! A show whose listing simply lacks the title yields `Ok(None)` — callers
//! proceed without a label.

use std::sync::Arc;

use regex::Regex;
use tracing::debug;

use super::cache::MatchCache;
use super::provider::MetadataProvider;
use crate::error::MatchError;

/// Lowercase, strip characters outside `[a-z0-9:\-\s]`, collapse whitespace.
pub fn normalize_title(title: &str) -> String {
    let lowered = title.to_lowercase();
    let filtered: String = lowered
        .chars()
        .map(|c| match c {
            'a'..='z' | '0'..='9' | ':' | '-' => c,
            c if c.is_whitespace() => ' ',
            _ => ' ',
        })
        .collect();

    filtered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Extract the show slug from a metadata catalog URL
/// (`.../series/<slug>[/...]`).
pub fn show_slug(metadata_url: &str) -> Option<String> {
    // Compiled per call; lookups are rare (one per cache miss).
    let re = Regex::new(r"series/([^/#?]+)").expect("valid slug regex");
    re.captures(metadata_url)
        .map(|caps| caps[1].to_string())
}

pub struct EpisodeMatcher {
    provider: Arc<dyn MetadataProvider>,
    cache: Arc<MatchCache>,
}

impl EpisodeMatcher {
    pub fn new(provider: Arc<dyn MetadataProvider>, cache: Arc<MatchCache>) -> Self {
        Self { provider, cache }
    }

    /// Find the `SxxEyy` label for `title` in the show behind `metadata_url`.
    ///
    /// `Ok(None)` means the provider has no listing or no normalized match;
    /// the item should proceed unenriched. `Err` is a recoverable transport
    /// failure.
    pub async fn lookup(
        &self,
        metadata_url: &str,
        title: &str,
    ) -> Result<Option<String>, MatchError> {
        let slug = show_slug(metadata_url)
            .ok_or_else(|| MatchError::InvalidShowUrl(metadata_url.to_string()))?;
        let normalized = normalize_title(title);

        if let Some(label) = self.cache.get(&slug, &normalized).await {
            debug!(show = %slug, title = %normalized, label = %label, "Match cache hit");
            return Ok(Some(label));
        }

        debug!(show = %slug, title = %normalized, "Match cache miss, refreshing listing");
        let listing = self.provider.fetch_listing(metadata_url).await?;
        if listing.is_empty() {
            return Ok(None);
        }

        let entries = listing
            .into_iter()
            .map(|ep| (normalize_title(&ep.title), ep.label));
        if let Err(e) = self.cache.insert_listing(&slug, entries).await {
            // A failed cache write degrades to refetching next time.
            tracing::error!("Failed to persist match cache: {}", e);
        }

        Ok(self.cache.get(&slug, &normalized).await)
    }
}
