//! Metadata matching: cache-first season/episode labeling backed by an
//! external provider.

pub mod cache;
pub mod matcher;
pub mod provider;

pub use cache::MatchCache;
pub use matcher::{normalize_title, show_slug, EpisodeMatcher};
pub use provider::{EpisodeListing, HttpMetadataProvider, MetadataProvider};
